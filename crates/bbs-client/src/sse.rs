//! Server-sent event subscriptions.
//!
//! Frames are `field: value` lines terminated by a blank line. The BBS sets
//! `id`, names the payload type in `event`, and carries the base64 protobuf
//! payload in `data`.
//!
//! A broken connection is re-established with `Last-Event-ID` set to the
//! last delivered frame, under the stream's retry policy. A server that
//! ends the body cleanly ends the stream.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bbs_models::events::EVENT_TYPES;
use bbs_models::{Event, RetryPolicy, proto};
use bytes::Bytes;
use futures::Stream;
use http::{HeaderValue, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use tracing::{debug, warn};

use crate::client::HttpClient;
use crate::error::{ClientError, ClientResult};

pub const LAST_EVENT_ID_HEADER: &str = "Last-Event-ID";

// ── Framing ────────────────────────────────────────────────────────

/// One undecoded frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEvent {
    pub id: String,
    pub name: String,
    pub data: Vec<u8>,
}

impl RawEvent {
    /// The frame as it appears on the wire.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        if !self.id.is_empty() {
            out.push_str(&format!("id: {}\n", self.id));
        }
        if !self.name.is_empty() {
            out.push_str(&format!("event: {}\n", self.name));
        }
        for line in String::from_utf8_lossy(&self.data).split('\n') {
            out.push_str(&format!("data: {line}\n"));
        }
        out.push('\n');
        out
    }

    /// Frame a BBS event: base64 protobuf payload named by event type.
    pub fn from_event(id: impl Into<String>, event: &Event) -> Self {
        Self {
            id: id.into(),
            name: event.event_type().to_string(),
            data: STANDARD.encode(proto::encode_event(event)).into_bytes(),
        }
    }
}

/// Incremental frame parser.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    pending: RawEvent,
    has_data: bool,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Drop any partially received frame.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// The next complete frame, if one has fully arrived.
    pub fn next_event(&mut self) -> Option<RawEvent> {
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            if line.is_empty() {
                if self.has_data || !self.pending.name.is_empty() || !self.pending.id.is_empty() {
                    self.has_data = false;
                    return Some(std::mem::take(&mut self.pending));
                }
                continue;
            }
            self.field(&line);
        }
        None
    }

    fn field(&mut self, line: &[u8]) {
        if line.starts_with(b":") {
            return;
        }
        let (name, value) = match line.iter().position(|b| *b == b':') {
            Some(colon) => {
                let value = &line[colon + 1..];
                (&line[..colon], value.strip_prefix(b" ").unwrap_or(value))
            }
            None => (line, &[][..]),
        };
        match name {
            b"id" => self.pending.id = String::from_utf8_lossy(value).into_owned(),
            b"event" => self.pending.name = String::from_utf8_lossy(value).into_owned(),
            b"data" => {
                if self.has_data {
                    self.pending.data.push(b'\n');
                }
                self.pending.data.extend_from_slice(value);
                self.has_data = true;
            }
            _ => {}
        }
    }
}

/// Decode a BBS event frame.
pub fn decode_raw(raw: &RawEvent) -> ClientResult<Event> {
    if !EVENT_TYPES.contains(&raw.name.as_str()) {
        return Err(ClientError::UnrecognizedEventType(raw.name.clone()));
    }
    let invalid = |reason: String| ClientError::InvalidPayload {
        event_type: raw.name.clone(),
        reason,
    };
    if raw.data.is_empty() {
        return Err(invalid("event with no data".into()));
    }
    let payload = STANDARD
        .decode(&raw.data)
        .map_err(|e| invalid(format!("invalid base64: {e}")))?;
    proto::decode_event(&raw.name, &payload).map_err(|err| invalid(err.message))
}

// ── Event source ───────────────────────────────────────────────────

/// A long-lived subscription yielding typed events.
pub struct EventSource {
    http: HttpClient,
    request: Request<Full<Bytes>>,
    retry: RetryPolicy,
    body: Option<Incoming>,
    decoder: SseDecoder,
    last_event_id: Option<String>,
    closed: bool,
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

impl EventSource {
    /// Open the subscription described by `request`.
    pub(crate) async fn connect(
        http: HttpClient,
        request: Request<Full<Bytes>>,
        retry: RetryPolicy,
    ) -> ClientResult<Self> {
        let mut source = Self {
            http,
            request,
            retry,
            body: None,
            decoder: SseDecoder::default(),
            last_event_id: None,
            closed: false,
        };
        source.reconnect().await?;
        Ok(source)
    }

    fn build_request(&self) -> ClientResult<Request<Full<Bytes>>> {
        let mut request = Request::builder()
            .method(self.request.method().clone())
            .uri(self.request.uri().clone());
        for (name, value) in self.request.headers() {
            request = request.header(name, value);
        }
        if let Some(id) = &self.last_event_id {
            let value =
                HeaderValue::from_str(id).map_err(|e| ClientError::Build(e.to_string()))?;
            request = request.header(LAST_EVENT_ID_HEADER, value);
        }
        request
            .body(self.request.body().clone())
            .map_err(|e| ClientError::Build(e.to_string()))
    }

    async fn reconnect(&mut self) -> ClientResult<()> {
        let mut attempt = 1;
        loop {
            let request = self.build_request()?;
            let failure = match self.http.request(request).await {
                Ok(response) if response.status().is_success() => {
                    debug!(uri = %self.request.uri(), last_event_id = ?self.last_event_id, "event stream connected");
                    self.decoder.reset();
                    self.body = Some(response.into_body());
                    return Ok(());
                }
                Ok(response) if is_retryable(response.status()) => {
                    ClientError::BadResponse(response.status())
                }
                Ok(response) => return Err(ClientError::BadResponse(response.status())),
                Err(err) => ClientError::Transport(err),
            };

            if !self.retry.should_retry(attempt) {
                return Err(failure);
            }
            warn!(error = %failure, attempt, "event stream connect failed, retrying");
            tokio::time::sleep(self.retry.pause_after(attempt)).await;
            attempt += 1;
        }
    }

    /// The next event, or `None` once the server has ended the stream.
    pub async fn next(&mut self) -> ClientResult<Option<Event>> {
        loop {
            if self.closed {
                return Err(ClientError::SourceClosed);
            }
            if let Some(raw) = self.decoder.next_event() {
                if !raw.id.is_empty() {
                    self.last_event_id = Some(raw.id.clone());
                }
                return decode_raw(&raw).map(Some);
            }

            let Some(body) = self.body.as_mut() else {
                return Ok(None);
            };
            match body.frame().await {
                Some(Ok(frame)) => {
                    if let Ok(data) = frame.into_data() {
                        self.decoder.push(&data);
                    }
                }
                Some(Err(err)) => {
                    warn!(error = %err, last_event_id = ?self.last_event_id, "event stream broken, reconnecting");
                    self.body = None;
                    self.reconnect()
                        .await
                        .map_err(|e| ClientError::Stream(e.to_string()))?;
                }
                None => {
                    debug!("event stream ended");
                    self.body = None;
                    return Ok(None);
                }
            }
        }
    }

    /// Stop the subscription and drop the connection. Further calls to
    /// [`next`](Self::next) fail with [`ClientError::SourceClosed`].
    pub fn close(&mut self) {
        self.closed = true;
        self.body = None;
        self.decoder.reset();
    }

    /// Adapt into a `Stream` that ends with the subscription.
    pub fn into_stream(self) -> impl Stream<Item = ClientResult<Event>> {
        futures::stream::unfold(Some(self), |source| async move {
            let mut source = source?;
            match source.next().await {
                Ok(Some(event)) => Some((Ok(event), Some(source))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}
