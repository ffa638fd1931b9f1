//! Progress Bus (C2): publishes render progress over Redis Pub/Sub with a
//! throttled durable mirror for reconnecting subscribers.

pub mod error;
pub mod progress;

pub use error::{ProgressError, ProgressResult};
pub use progress::{
    ProgressBus, ProgressEvent, DURABLE_WRITE_THROTTLE, HISTORY_TTL_SECS, RECORD_TTL_SECS,
    SUBSCRIBER_BUFFER, SUBSCRIBER_HEARTBEAT_INTERVAL,
};
