//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the pipeline core and an
//! external system (the DevRev API, the record source). Implementations
//! live in `src/adapters/`.

pub mod gateway;
pub mod source;

pub use gateway::{GatewayFuture, TicketGateway};
pub use source::{IssueSource, SourceError, SourceFuture};
