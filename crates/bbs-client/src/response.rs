//! Interpreting BBS responses.

use bbs_models::Error;
use bbs_models::proto::CONTENT_TYPE;
use bytes::Bytes;
use http::header::CONTENT_TYPE as CONTENT_TYPE_HEADER;
use http::{HeaderMap, StatusCode};
use prost::Message;

/// Set by the router when it rejects a request before it reaches the BBS.
pub const ROUTER_ERROR_HEADER: &str = "X-Cf-Routererror";

/// The media type without parameters, lowercased.
fn media_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CONTENT_TYPE_HEADER)?.to_str().ok()?;
    let media = value.split(';').next().unwrap_or_default().trim();
    Some(media.to_ascii_lowercase())
}

/// Turn a received response into its typed body.
///
/// A router error wins over everything else. A protobuf body is decoded;
/// any other body is ignored, and its status alone decides success. `None`
/// means the server answered successfully without a protobuf payload.
pub fn interpret<R>(status: StatusCode, headers: &HeaderMap, body: Bytes) -> Result<Option<R>, Error>
where
    R: Message + Default,
{
    if let Some(router_error) = headers.get(ROUTER_ERROR_HEADER) {
        return Err(Error::router_error(
            String::from_utf8_lossy(router_error.as_bytes()).into_owned(),
        ));
    }

    if media_type(headers).as_deref() == Some(CONTENT_TYPE) {
        return R::decode(body).map(Some).map_err(|e| {
            Error::new(
                bbs_models::ErrorKind::InvalidProtobufMessage,
                format!("failed to unmarshal proto: {e}"),
            )
        });
    }

    if status.as_u16() > 299 {
        return Err(Error::invalid_response(format!(
            "Invalid Response with status code: {}",
            status.as_u16()
        )));
    }
    Ok(None)
}
