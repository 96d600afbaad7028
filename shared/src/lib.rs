//! Shared types for the fulfillment workspace
//!
//! Domain types used by the server and by any client of its API:
//! orders and line items, status vocabularies, batch picking views.

pub mod batch;
pub mod order;
pub mod util;

// Re-exports
pub use batch::{BatchCategory, BatchStats, ConsolidatedLine, OrderBreakdown};
pub use order::{Order, OrderItem, OrderStatus, PickingStatus};
