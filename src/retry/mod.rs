//! Retry control: directives computed from a resolved policy.
//!
//! ## Contents
//! - [`RetryController`] the per-job state machine
//! - [`AttemptDirective`] what the substrate must honor for one attempt
//! - [`JobExtra`]        what the job body and telemetry see
//! - [`NextStep`], [`Terminal`] decisions after a failed attempt

mod controller;
mod directive;

pub use controller::{ControllerState, NextStep, RetryController, Terminal};
pub use directive::{AttemptDirective, JobExtra};
