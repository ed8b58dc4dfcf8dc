//! Task domain model.
//!
//! A [`Task`] is the root entity of the system: one content-generation
//! request tracked from creation through review and publication. Its
//! status field is mutated exclusively through the lifecycle service.

mod status;
mod types;

pub use status::TaskStatus;
pub use types::{ContentResult, Task};
