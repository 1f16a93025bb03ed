//! Stockroom API Types
//!
//! Wire contracts shared with the server: the paginated collection
//! envelope, request/response bodies for every mutation endpoint, and
//! the closed push-event sets with their decode boundary. Domain
//! entities themselves live in `stockroom-core` and ride the wire
//! unchanged.

pub mod events;
pub mod types;

pub use events::*;
pub use types::*;
