//! HTTP type conversions between hyper and the fetch host handles.
//!
//! Inbound hyper requests become [`IncomingRequest`] handles; settled
//! [`HostResponse`] values become hyper responses.

use std::fmt::Display;

use bytes::Bytes;
use fetchbridge::{HostBodyStream, HostError, HostHeaders, HostRequest, HostResponse};
use http::{HeaderMap, HeaderName, HeaderValue, Request, Response, StatusCode, Uri};
use http_body_util::Full;
use hyper::body::Body;
use tokio::runtime::Handle;

use crate::body::HyperBodyStream;

/// Convert a status code from u16.
pub fn status_from_u16(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Convert host headers into an `http::HeaderMap`, dropping entries that are
/// not valid on the wire.
pub fn headers_from_host(headers: &HostHeaders) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers.iter() {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.append(name, value);
            }
            _ => tracing::warn!(header = %name, "dropping invalid response header"),
        }
    }
    map
}

/// Convert headers to a list of (name, value) pairs in wire order.
pub fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// Rebuild the absolute URL a fetch event carries from an origin-form URI.
pub fn absolute_url(uri: &Uri, headers: &HeaderMap) -> String {
    if uri.scheme().is_some() {
        return uri.to_string();
    }
    let host = headers
        .get(http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    format!("http://{host}{path}")
}

pub fn into_hyper_response(response: HostResponse) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(response.body));
    *resp.status_mut() = status_from_u16(response.status);
    *resp.headers_mut() = headers_from_host(&response.headers);
    resp
}

/// Response for an event settled through "fail".
pub fn error_response(error: &HostError) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from(error.message().to_string())));
    *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    resp.headers_mut().insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    resp
}

/// A fetch request handle built from an inbound hyper request.
pub struct IncomingRequest {
    method: String,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<Box<dyn HostBodyStream>>,
}

impl IncomingRequest {
    /// Requests whose body is already at its end get no body handle, like a
    /// fetch `GET` with a null body.
    pub fn from_hyper<B>(req: Request<B>, runtime: &Handle) -> Self
    where
        B: Body<Data = Bytes> + Unpin + Send + 'static,
        B::Error: Display + Send,
    {
        let (parts, body) = req.into_parts();
        let body: Option<Box<dyn HostBodyStream>> = if body.is_end_stream() {
            None
        } else {
            Some(Box::new(HyperBodyStream::new(body, runtime.clone())))
        };
        Self {
            method: parts.method.as_str().to_string(),
            url: absolute_url(&parts.uri, &parts.headers),
            headers: header_pairs(&parts.headers),
            body,
        }
    }
}

impl HostRequest for IncomingRequest {
    fn method(&self) -> String {
        self.method.clone()
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    fn header_entries(&self) -> Vec<(String, String)> {
        self.headers.clone()
    }

    fn take_body(&mut self) -> Option<Box<dyn HostBodyStream>> {
        self.body.take()
    }
}
