//! Shared types for the purchasing system.
//!
//! Identifier newtypes and the [`Money`] value type used by every other
//! crate in the workspace.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{
    ActorId, DraftId, EntryId, LineItemId, OrderId, ProductId, SupplierId, VariantId,
};
