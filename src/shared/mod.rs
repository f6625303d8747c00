//! Shared state and messaging between the render loop and the detection worker
//!
//! The tracked box set itself is never shared: it is owned by the render loop.
//! Only statistics, detection results and the cancellation flag cross threads.

pub mod cancel;
pub mod messages;
pub mod state;

pub use cancel::CancelToken;
pub use messages::{DetectionRequest, DetectionResult, DetectionUpdate};
pub use state::{SessionStats, SharedStats};
