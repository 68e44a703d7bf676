//! Domain layer for the smart-basket tracker.
//!
//! This crate provides:
//! - The basket entity and its lifecycle state machine
//! - Identifier aggregation against a product catalog
//! - Basket stores (in-memory and PostgreSQL) behind the `BasketStore` trait
//! - `BasketService`, which serializes mutations per basket and keeps the
//!   store and audit log consistent
//! - The expiry sweeper that retires idle baskets

pub mod basket;
pub mod clock;
pub mod error;
pub mod locks;
pub mod store;
pub mod sweeper;

pub use basket::{
    AdjustQuantity, Basket, BasketCommand, BasketService, BasketStatus, Catalog, CatalogEntry,
    CatalogError, CheckoutPayload, InMemoryCatalog, PlainTextEncoder, QrEncoder, RecordDecision,
    RetireOutcome, SyncBasket, SyncContents, SyncOutcome, aggregate, merge_items,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{BasketError, Result};
pub use locks::{BasketGuard, BasketLocks};
pub use store::{
    BasketScan, BasketStore, InMemoryBasketStore, PostgresBasketStore, StoreError, StoreResult,
};
pub use sweeper::{ExpirySweeper, SweepReport, SweeperConfig};
