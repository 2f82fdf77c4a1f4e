//! Service layer module
//!
//! Contains the stream accumulator, the reasoning cache, the request rewriter
//! and the upstream transport

pub mod accumulator;
pub mod reasoning_cache;
pub mod rewriter;
pub mod stream;
pub mod upstream;

pub use accumulator::{Finished, StreamAccumulator};
pub use reasoning_cache::{canonical_key, ReasoningCache};
pub use rewriter::{inject_cached_fields, remember_response_body, rewrite_request_body};
pub use stream::ReasoningStream;
pub use upstream::{HttpUpstream, Upstream, UpstreamRequest, UpstreamResponse};
