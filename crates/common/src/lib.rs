//! Shared value types used across the basket tracker crates.

mod item;
mod money;
mod types;

pub use item::Item;
pub use money::Money;
pub use types::{BasketId, ItemId};
