//! Protocol modules (request model + events).
//!
//! - `request`: the throttle request and its legacy positional encoding.
//! - `event`: correlation keys and the events exchanged with evaluators and
//!   the downstream sink.
//!
//! All decoders are panic-free: malformed tuples are reported as
//! `ThrottleError::BadRequest` instead of indexing raw slices.

pub mod event;
pub mod request;

pub use event::{parse_stream_id, stream_id, CorrelationKey, DownstreamEvent, RequestEvent};
pub use request::ThrottleRequest;
