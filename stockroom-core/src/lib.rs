//! Stockroom Core - Domain Types
//!
//! Pure data structures for the equipment-issuance domain plus the
//! validation rules that gate every mutation. No I/O; every other crate
//! in the workspace depends on this one.

use chrono::{DateTime, Utc};

pub mod entities;
pub mod enums;
pub mod error;
pub mod validation;

pub use entities::*;
pub use enums::*;
pub use error::*;
pub use validation::*;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Server-assigned record identifier.
///
/// Negative values are local placeholders: records synthesized on the
/// client for immediate feedback that have not yet been confirmed by the
/// server. Placeholders must never reach the durable cache tier.
pub type RecordId = i64;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Returns true for a locally-synthesized (not yet server-confirmed) id.
pub fn is_placeholder_id(id: RecordId) -> bool {
    id < 0
}
