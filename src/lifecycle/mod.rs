//! Status lifecycle: transition validation and the status change service.
//!
//! The validator is a pure state table with contextual rules layered on
//! top; the service is the single write path for task status and owns
//! the at-most-one-committed-transition guarantee.

mod service;
mod validator;

pub use service::{ServiceError, StatusChangeOutcome, StatusChangeRequest, StatusChangeService};
pub use validator::{TransitionContext, TransitionValidator, ValidationOutcome};
