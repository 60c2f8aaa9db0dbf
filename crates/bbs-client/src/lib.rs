//! bbs-client — talking to the BBS over protobuf-on-HTTP.
//!
//! Typed methods encode a request message, send it to a named route, and
//! decode the typed response, surfacing the error the server embeds in it.
//! Event subscriptions hold a server-sent event stream open and decode each
//! frame into an [`Event`](bbs_models::Event).
//!
//! # Architecture
//!
//! ```text
//! BbsClient::claim_actual_lrp(..)
//!      │
//!      └─ do_request(route, params, query, body)   retry on any failure
//!             ├─ RequestGenerator::create_request  route table → Request
//!             ├─ hyper client                      bounded by timeout
//!             └─ interpret(status, headers, body)  router error / proto / status
//!
//! BbsClient::subscribe_to_events()
//!      └─ EventSource ── SseDecoder ── decode_raw ──► Event
//!             └─ reconnect with Last-Event-ID
//! ```

pub mod client;
pub mod error;
pub mod request;
pub mod response;
pub mod sse;

pub use client::{
    ActualLrpGroupFilter, BbsClient, DELETE_CONTAINER, Evacuation, KEEP_CONTAINER,
};
pub use error::{ClientError, ClientResult};
pub use request::RequestGenerator;
pub use response::{ROUTER_ERROR_HEADER, interpret};
pub use sse::{EventSource, RawEvent, SseDecoder};
