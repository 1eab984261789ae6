//! Append-only audit ledgers: price history and order modification history.

use chrono::{DateTime, Utc};
use common::{ActorId, EntryId, Money, OrderId};
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogRef;

/// An append-only record of a cost-price change.
///
/// Always attributed to an order and an actor. Entries are never edited or
/// deleted after insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    /// Unique entry identifier.
    pub id: EntryId,

    /// The product or variant whose cost changed.
    pub target: CatalogRef,

    /// Cost before the change. None when the target was just created.
    pub previous_cost: Option<Money>,

    /// Cost after the change.
    pub new_cost: Money,

    /// Why the cost changed (e.g. "order receipt").
    pub reason: String,

    /// The order the change originated from.
    pub order_id: OrderId,

    /// Who performed the operation that changed the cost.
    pub changed_by: ActorId,

    /// Optional free-text note.
    pub note: Option<String>,

    /// When the change was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl PriceHistoryEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(
        target: CatalogRef,
        previous_cost: Option<Money>,
        new_cost: Money,
        reason: impl Into<String>,
        order_id: OrderId,
        changed_by: ActorId,
    ) -> Self {
        Self {
            id: EntryId::new(),
            target,
            previous_cost,
            new_cost,
            reason: reason.into(),
            order_id,
            changed_by,
            note: None,
            recorded_at: Utc::now(),
        }
    }

    /// Attaches a free-text note to the entry.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// An append-only record of an order edit.
///
/// Carries full before/after snapshots of the order aggregate. Nested draft
/// lists do not diff cleanly, so the snapshot is kept whole rather than
/// reduced to a field-level diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationHistoryEntry {
    /// Unique entry identifier.
    pub id: EntryId,

    /// The order that was edited.
    pub order_id: OrderId,

    /// Who performed the edit.
    pub actor_id: ActorId,

    /// Why the order was edited.
    pub reason: String,

    /// Serialized order aggregate before the edit.
    pub before: serde_json::Value,

    /// Serialized order aggregate after the edit.
    pub after: serde_json::Value,

    /// When the edit was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl ModificationHistoryEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(
        order_id: OrderId,
        actor_id: ActorId,
        reason: impl Into<String>,
        before: serde_json::Value,
        after: serde_json::Value,
    ) -> Self {
        Self {
            id: EntryId::new(),
            order_id,
            actor_id,
            reason: reason.into(),
            before,
            after,
            recorded_at: Utc::now(),
        }
    }
}
