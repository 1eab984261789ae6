//! Order-management core for the purchasing system.
//!
//! This crate provides the four operations exposed to callers:
//! - [`PurchasingService::create_order`]: validate and insert a pending
//!   order, including draft products/variants not yet in the catalog
//! - [`PurchasingService::modify_order`]: edit a pending order with a
//!   before/after audit snapshot
//! - [`PurchasingService::cancel_order`]: terminal cancellation
//! - [`PurchasingService::receive_order`]: finalize quantities and prices,
//!   update the stock ledger, and promote drafts into the catalog
//!
//! All operations run as single transactions against an injected
//! [`store::Store`] implementation.

pub mod error;
pub mod order;

pub use error::{PurchasingError, Result, ValidationErrors};
pub use order::{
    CreateOrder, ItemEdit, LegacyItem, NewDraftProduct, NewDraftVariant, NewLineItem, OrderPatch,
    PurchasingService, ReceivedLine,
};
