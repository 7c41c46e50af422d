use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use faultline_core::{ContextId, EntityId};

/// What happened to a row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
}

/// A committed row change, published after the backing store accepted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    /// Context that committed the change.
    pub origin: ContextId,
    pub entity_id: EntityId,
    pub change: ChangeKind,
    pub committed_at: DateTime<Utc>,
}

impl ChangeNotification {
    pub fn new(origin: ContextId, entity_id: EntityId, change: ChangeKind) -> Self {
        Self {
            origin,
            entity_id,
            change,
            committed_at: Utc::now(),
        }
    }

    pub fn is_from(&self, context: ContextId) -> bool {
        self.origin == context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_change_kind_in_snake_case() {
        let n = ChangeNotification::new(ContextId::new(), EntityId::new(), ChangeKind::Deleted);
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["change"], "deleted");
        assert_eq!(json["entity_id"], n.entity_id.to_string());

        let back: ChangeNotification = serde_json::from_value(json).unwrap();
        assert_eq!(back, n);
    }
}
