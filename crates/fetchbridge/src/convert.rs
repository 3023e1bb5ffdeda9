//! Response translation to the host's representation.

use http::StatusCode;

use crate::header;
use crate::host::HostResponse;
use crate::response::ResponseSink;

/// Standard reason phrase for `code`, or `""` when there is none.
pub fn status_text(code: u16) -> &'static str {
    StatusCode::from_u16(code)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("")
}

/// Build the host response from a finished sink.
pub fn into_host_response(sink: ResponseSink) -> HostResponse {
    let (status, headers, body) = sink.into_parts();
    HostResponse {
        status,
        status_text: status_text(status).to_string(),
        headers: header::to_host(&headers),
        body,
    }
}
