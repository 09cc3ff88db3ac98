//! HTTP API handlers for bibup-queue
//!
//! User intents come in as REST calls; row snapshots and dialog requests go
//! out over SSE.

pub mod health;
pub mod queue;
pub mod sse;

pub use health::health_routes;
pub use queue::queue_routes;
pub use sse::event_stream;
