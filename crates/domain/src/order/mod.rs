//! Purchase order services and supporting algorithms.

pub mod input;
pub mod matching;
mod receiving;
pub mod service;
pub mod totals;

pub use input::{
    CreateOrder, ItemEdit, LegacyItem, NewDraftProduct, NewDraftVariant, NewLineItem, OrderPatch,
    ReceivedLine,
};
pub use service::PurchasingService;
