// Audit log and signature ledger
// Both are append-only and survive case tombstoning

pub mod audit;
pub mod signatures;

pub use audit::{AuditAction, AuditLog, LogEntry, NewLogEntry};
pub use signatures::{Signature, SignatureLedger};
