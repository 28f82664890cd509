//! Items, item catalogs and the in-memory embedding set.
//!
//! An [`Item`] pairs a numeric identifier with the path of its artwork. A
//! [`Catalog`] builds the ordered item list a pipeline run works through,
//! and an [`EmbeddingSet`] collects the `(id, embedding)` pairs it produces.

pub mod catalog;
pub mod item;
pub mod set;

// Re-export commonly used types
pub use catalog::Catalog;
pub use item::{Item, ItemId, ItemState};
pub use set::EmbeddingSet;
