//! Append-only audit trail of status transition attempts.
//!
//! Every invocation of the status change service, accepted or rejected,
//! produces exactly one [`StatusChangeRecord`]. Records are immutable
//! once written and are never deleted.

mod log;
mod record;

pub use log::{AuditError, AuditLog, MAX_HISTORY_LIMIT};
pub use record::{AuditMetadata, StatusChangeRecord};
