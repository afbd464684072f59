//! # Event subscribers.
//!
//! ```text
//! JobActor ── publish(Event) ──► Bus ──► Worker listener ──► SubscriberSet
//!                                                               │
//!                                                 ┌─────────────┼────────────┐
//!                                                 ▼             ▼            ▼
//!                                             LogWriter      Metrics      Custom
//! ```
//!
//! - [`Subscribe`] trait implemented by every handler
//! - [`SubscriberSet`] per-subscriber queues with panic isolation
//! - [`LogWriter`] `tracing` sink (feature `logging`)

#[cfg(feature = "logging")]
mod log;
mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
