//! Template source trees.
//!
//! Templates are parsed with quick-xml into a small owned tree that keeps what the
//! compiler needs: tag names, attributes in document order, text and the source line
//! of every element. Comments and processing instructions are dropped.

use crate::error::QWebError;
use quick_xml::Reader;
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};
use std::fmt::Write;

/// The templating tag: never written to the output, only its content is.
pub const T_TAG: &str = "t";

/// Elements serialized self-closed when they have no children.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    /// Whitespace-only text.
    pub fn is_blank(&self) -> bool {
        matches!(self, Node::Text(t) if t.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
    /// 1-based line of the start tag.
    pub line: usize,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            line: 1,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sets an attribute, keeping its position when it already exists.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// The immediate child declaring `t-name="name"`.
    pub fn named_child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|el| el.get("t-name") == Some(name))
    }

    /// Path segment of the `index`-th child of `self`: the tag name, suffixed with
    /// a 1-based position when siblings share the tag.
    pub fn child_segment(&self, index: usize) -> Option<String> {
        let Some(Node::Element(child)) = self.children.get(index) else {
            return None;
        };
        let same: Vec<usize> = self
            .children
            .iter()
            .enumerate()
            .filter(|(_, n)| matches!(n, Node::Element(e) if e.tag == child.tag))
            .map(|(i, _)| i)
            .collect();
        if same.len() > 1 {
            let position = same.iter().position(|&i| i == index).unwrap_or(0) + 1;
            Some(format!("{}[{}]", child.tag, position))
        } else {
            Some(child.tag.clone())
        }
    }

    /// Writes the element back as markup.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    fn write_xml(&self, out: &mut String) {
        let self_close = self.children.is_empty() && is_void(&self.tag);
        out.push_str(&open_tag(&self.tag, &self.attributes, self_close));
        if self_close {
            return;
        }
        for child in &self.children {
            match child {
                Node::Element(el) => el.write_xml(out),
                Node::Text(text) => out.push_str(&escape_text(text)),
            }
        }
        out.push_str(&close_tag(&self.tag));
    }
}

/// `<tag a="v">`, or `<tag a="v"/>` when `self_close` is set.
pub fn open_tag(tag: &str, attributes: &[(String, String)], self_close: bool) -> String {
    let escaped: Vec<(String, String)> = attributes
        .iter()
        .map(|(name, value)| (name.clone(), escape_attr(value)))
        .collect();
    open_tag_escaped(tag, &escaped, self_close)
}

/// Like [`open_tag`] for attribute values that are already escaped.
pub fn open_tag_escaped(tag: &str, attributes: &[(String, String)], self_close: bool) -> String {
    let mut out = String::with_capacity(tag.len() + 2);
    out.push('<');
    out.push_str(tag);
    for (name, value) in attributes {
        let _ = write!(out, " {}=\"{}\"", name, value);
    }
    out.push_str(if self_close { "/>" } else { ">" });
    out
}

pub fn close_tag(tag: &str) -> String {
    format!("</{}>", tag)
}

pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

/// Parses a template document.
///
/// A document with several top-level nodes is wrapped into a `<t>` root.
pub fn parse(source: &str, reference: &str) -> Result<Element, QWebError> {
    let err = |message: String| QWebError::parse(reference, message);
    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = vec![Element::new(T_TAG)];
    let mut line = 1;
    let mut consumed = 0;

    loop {
        let pos = reader.buffer_position() as usize;
        line += count_lines(source, consumed, pos);
        consumed = pos.max(consumed);
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                stack.push(start_element(e, line, reference)?);
            }
            Ok(Event::Empty(ref e)) => {
                let el = start_element(e, line, reference)?;
                push_node(&mut stack, Node::Element(el));
            }
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if stack.len() < 2 {
                    return Err(err(format!("unexpected closing tag </{}>", name)));
                }
                let Some(el) = stack.pop() else {
                    return Err(err(format!("unexpected closing tag </{}>", name)));
                };
                if el.tag != name {
                    return Err(err(format!(
                        "closing tag </{}> does not match <{}> on line {}",
                        name, el.tag, el.line
                    )));
                }
                push_node(&mut stack, Node::Element(el));
            }
            Ok(Event::Text(ref e)) => {
                let raw = std::str::from_utf8(e.as_ref()).map_err(|e| err(e.to_string()))?;
                let text = unescape(raw).map_err(|e| err(e.to_string()))?;
                push_text(&mut stack, &text);
            }
            Ok(Event::CData(ref e)) => {
                let text = std::str::from_utf8(e.as_ref()).map_err(|e| err(e.to_string()))?;
                push_text(&mut stack, text);
            }
            Ok(Event::GeneralRef(ref e)) => {
                let text = match e.resolve_char_ref().map_err(|e| err(e.to_string()))? {
                    Some(c) => c.to_string(),
                    None => {
                        let name = e.decode().map_err(|e| err(e.to_string()))?;
                        resolve_predefined_entity(&name)
                            .ok_or_else(|| err(format!("unknown entity '&{};'", name)))?
                            .to_string()
                    }
                };
                push_text(&mut stack, &text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(err(format!("line {}: {}", line, e)));
            }
            // Comments, processing instructions, declarations and doctypes.
            Ok(_) => {}
        }
    }

    if stack.len() != 1 {
        let open = stack.last().map(|el| el.tag.clone()).unwrap_or_default();
        return Err(err(format!("unclosed element <{}>", open)));
    }
    let mut wrapper = stack.pop().ok_or_else(|| err("empty document".into()))?;
    let significant = wrapper.children.iter().filter(|n| !n.is_blank()).count();
    let single_element = significant == 1 && wrapper.elements().next().is_some();
    match significant {
        0 => Err(err("template document is empty".into())),
        1 if single_element => wrapper
            .children
            .into_iter()
            .find_map(|n| match n {
                Node::Element(el) => Some(el),
                Node::Text(_) => None,
            })
            .ok_or_else(|| err("template document is empty".into())),
        _ => {
            let first_line = wrapper.elements().next().map(|el| el.line);
            wrapper.line = first_line.unwrap_or(1);
            Ok(wrapper)
        }
    }
}

fn count_lines(source: &str, from: usize, to: usize) -> usize {
    source
        .get(from..to)
        .map(|s| s.bytes().filter(|&b| b == b'\n').count())
        .unwrap_or(0)
}

fn start_element(e: &BytesStart, line: usize, reference: &str) -> Result<Element, QWebError> {
    let err = |message: String| QWebError::parse(reference, message);
    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| err(format!("line {}: {}", line, e)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = std::str::from_utf8(&attr.value).map_err(|e| err(e.to_string()))?;
        let value = unescape(raw).map_err(|e| err(format!("line {}: {}", line, e)))?;
        attributes.push((key, value.into_owned()));
    }
    Ok(Element {
        tag,
        attributes,
        children: Vec::new(),
        line,
    })
}

fn push_node(stack: &mut [Element], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn push_text(stack: &mut [Element], text: &str) {
    if text.is_empty() {
        return;
    }
    let Some(parent) = stack.last_mut() else {
        return;
    };
    match parent.children.last_mut() {
        Some(Node::Text(existing)) => existing.push_str(text),
        _ => parent.children.push(Node::Text(text.to_string())),
    }
}
