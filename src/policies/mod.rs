//! Job policies: stored records and their resolved form.
//!
//! This module groups the data that decides **how often** a job is attempted
//! and **how long** to wait between attempts.
//!
//! ## Contents
//! - [`PolicyRecord`]     raw stored row (serde)
//! - [`PolicyDescriptor`] validated, immutable policy
//! - [`Backoff`]          fixed or staged delays
//! - [`JitterPolicy`]     optional randomization of computed delays
//! - [`Lane`]             `(connection, queue)` routing pair
//!
//! ## Quick wiring
//! ```text
//! PolicyStore ──► PolicyRecord ──► PolicyResolver ──► Arc<PolicyDescriptor>
//!                                                          └─► RetryController
//! ```

mod backoff;
mod descriptor;
mod jitter;
mod record;

pub use backoff::{Backoff, DEFAULT_DELIMITER, MalformedBackoff};
pub use descriptor::{Lane, PolicyDescriptor};
pub use jitter::JitterPolicy;
pub use record::{DEFAULT_MAX_RETRY_COUNT, PolicyRecord};
