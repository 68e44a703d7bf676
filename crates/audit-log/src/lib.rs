//! Append-only audit trail for basket lifecycle actions.
//!
//! Every state change on a basket produces exactly one [`AuditEntry`]. Entries
//! are never updated or removed; reads for a single basket come back in
//! non-decreasing timestamp order.

pub mod entry;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod sink;

pub use common::BasketId;
pub use entry::{AuditAction, AuditEntry, EntryId};
pub use error::{AuditError, Result};
pub use memory::InMemoryAuditLog;
pub use postgres::PostgresAuditLog;
pub use query::AuditQuery;
pub use sink::AuditSink;
