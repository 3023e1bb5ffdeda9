use std::io;

use bytes::{Bytes, BytesMut};

use crate::header::HeaderMap;

/// Status used until a handler sets one explicitly.
pub const DEFAULT_STATUS: u16 = 200;

/// The write surface a handler produces its response through.
///
/// Headers should be final before the first body write; this trait does not
/// enforce it.
pub trait ResponseWriter {
    fn headers_mut(&mut self) -> &mut HeaderMap;

    fn set_status(&mut self, status: u16);

    /// Append `data` to the body, returning the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> usize;
}

/// In-memory response accumulator for one handler invocation.
#[derive(Debug)]
pub struct ResponseSink {
    status: u16,
    headers: HeaderMap,
    body: BytesMut,
}

impl ResponseSink {
    pub fn new() -> Self {
        Self {
            status: DEFAULT_STATUS,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consume the sink into its status, headers and frozen body.
    pub fn into_parts(self) -> (u16, HeaderMap, Bytes) {
        (self.status, self.headers, self.body.freeze())
    }
}

impl Default for ResponseSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWriter for ResponseSink {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    fn write(&mut self, data: &[u8]) -> usize {
        self.body.extend_from_slice(data);
        data.len()
    }
}

impl io::Write for ResponseSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(ResponseWriter::write(self, buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
