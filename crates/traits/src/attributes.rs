//! Post-processing of element attributes before they are written.

use qweb_expr::Value;
use std::fmt::Debug;

pub trait AttributeHook: Send + Sync + Debug {
    /// Receives the final attribute list of an element in output order and returns
    /// the list to write. Entries whose value is falsy (other than `""`) are dropped
    /// afterwards.
    fn post_process(&self, tag: &str, attributes: Vec<(String, Value)>) -> Vec<(String, Value)> {
        let _ = tag;
        attributes
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl AttributeHook for NoopHook {}
