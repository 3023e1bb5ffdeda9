use std::io::{self, Read};

use http::{Method, Uri};

use crate::body::StreamReader;
use crate::error::{BridgeError, BridgeResult};
use crate::header::{self, HeaderMap};
use crate::host::HostRequest;

/// Request body as seen by a handler.
#[derive(Debug, Default)]
pub enum Body {
    /// No body; reads report end of stream immediately.
    #[default]
    Empty,
    Stream(StreamReader),
}

impl Body {
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// Close the underlying host stream, if any.
    pub fn close(&mut self) {
        if let Body::Stream(reader) = self {
            reader.close();
        }
    }
}

impl Read for Body {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Body::Empty => Ok(0),
            Body::Stream(reader) => reader.read(buf),
        }
    }
}

/// A request translated from the host, handed to the handler by reference.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
}

impl Request {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Body) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
        }
    }

    /// Translate a host request.
    ///
    /// Method and URL are taken as-is; the only checks are the ones needed to
    /// build the request at all (method must be a token, URL must parse).
    /// URLs are parsed with [`http::Uri`], which also rejects anything longer
    /// than its 64 KiB limit.
    /// When the host supplies a body, it is wrapped in a fresh
    /// [`StreamReader`].
    pub fn from_host(host: &mut dyn HostRequest) -> BridgeResult<Self> {
        let raw_method = host.method();
        let method = Method::from_bytes(raw_method.as_bytes()).map_err(|_| {
            BridgeError::Construction(format!("invalid method {raw_method:?}"))
        })?;

        let raw_url = host.url();
        let uri = raw_url
            .parse::<Uri>()
            .map_err(|e| BridgeError::Construction(format!("invalid url {raw_url:?}: {e}")))?;

        let headers = header::to_internal(host.header_entries());
        let body = match host.take_body() {
            Some(stream) => Body::Stream(StreamReader::new(stream)),
            None => Body::Empty,
        };

        Ok(Self::new(method, uri, headers, body))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    /// Close the body unless it already reached a terminal state.
    pub fn close_body(&mut self) {
        if let Body::Stream(reader) = &mut self.body {
            if !reader.is_terminated() {
                reader.close();
            }
        }
    }
}
