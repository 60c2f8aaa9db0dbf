//! Route name → HTTP request.

use std::sync::Arc;

use bbs_models::RouteTable;
use bbs_models::proto::CONTENT_TYPE;
use bytes::Bytes;
use http::header::CONTENT_TYPE as CONTENT_TYPE_HEADER;
use http::{Request, Uri};
use http_body_util::Full;

use crate::error::{ClientError, ClientResult};

/// Builds requests for named routes against one BBS base URL.
#[derive(Debug, Clone)]
pub struct RequestGenerator {
    base: String,
    routes: Arc<RouteTable>,
}

impl RequestGenerator {
    pub fn new(base_url: &str, routes: Arc<RouteTable>) -> ClientResult<Self> {
        let uri: Uri = base_url
            .parse()
            .map_err(|e| ClientError::Build(format!("invalid base url {base_url:?}: {e}")))?;
        let (Some(scheme), Some(authority)) = (uri.scheme_str(), uri.authority()) else {
            return Err(ClientError::Build(format!(
                "base url {base_url:?} needs a scheme and host"
            )));
        };
        Ok(Self {
            base: format!("{scheme}://{authority}"),
            routes,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Build the request for `route_name`.
    ///
    /// `params` fill `:name` path segments. Query values must already be URL
    /// safe; anything else is a construction failure.
    pub fn create_request(
        &self,
        route_name: &str,
        params: &[(&str, &str)],
        query: &[(&str, &str)],
        body: Bytes,
    ) -> ClientResult<Request<Full<Bytes>>> {
        let route = self
            .routes
            .lookup(route_name)
            .ok_or_else(|| ClientError::Build(format!("unknown route {route_name}")))?;

        let path = fill_params(route.path, params)?;
        let mut uri = format!("{}{path}", self.base);
        if !query.is_empty() {
            let pairs = query
                .iter()
                .map(|(key, value)| {
                    if is_url_safe(key) && is_url_safe(value) {
                        Ok(format!("{key}={value}"))
                    } else {
                        Err(ClientError::Build(format!(
                            "query parameter {key:?} is not url safe"
                        )))
                    }
                })
                .collect::<ClientResult<Vec<_>>>()?;
            uri.push('?');
            uri.push_str(&pairs.join("&"));
        }

        Request::builder()
            .method(route.method.clone())
            .uri(uri)
            .header(CONTENT_TYPE_HEADER, CONTENT_TYPE)
            .body(Full::new(body))
            .map_err(|e| ClientError::Build(e.to_string()))
    }
}

fn fill_params(path: &str, params: &[(&str, &str)]) -> ClientResult<String> {
    let segments = path
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => params
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
                .ok_or_else(|| ClientError::Build(format!("missing path parameter {name}"))),
            None => Ok(segment.to_string()),
        })
        .collect::<ClientResult<Vec<_>>>()?;
    Ok(segments.join("/"))
}

fn is_url_safe(s: &str) -> bool {
    s.bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~'))
}
