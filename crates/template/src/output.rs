//! Destinations for rendered text chunks.

use crate::error::QWebError;

/// Receives rendered chunks in document order.
pub trait OutputSink {
    fn write(&mut self, chunk: &str) -> Result<(), QWebError>;
}

/// Concatenates every chunk into one string.
#[derive(Debug, Default, Clone)]
pub struct StringSink {
    buffer: String,
}

impl StringSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn into_string(self) -> String {
        self.buffer
    }
}

impl OutputSink for StringSink {
    fn write(&mut self, chunk: &str) -> Result<(), QWebError> {
        self.buffer.push_str(chunk);
        Ok(())
    }
}

/// Collects chunks separately, mostly useful to observe chunk boundaries.
impl OutputSink for Vec<String> {
    fn write(&mut self, chunk: &str) -> Result<(), QWebError> {
        self.push(chunk.to_string());
        Ok(())
    }
}
