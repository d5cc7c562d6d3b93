use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_postgres::Row;
use uuid::Uuid;

/// Canonical ordering for a participant pair. Both storage and key
/// derivation go through this, so either participant resolves the same
/// conversation row and the same key material.
pub fn normalize_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_a: Uuid,
    pub user_b: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            user_a: row.get("user_a"),
            user_b: row.get("user_b"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            last_message_at: row.get("last_message_at"),
        }
    }

    /// The counterpart of `user` in this conversation, if they participate.
    pub fn other_participant(&self, user: Uuid) -> Option<Uuid> {
        if user == self.user_a {
            Some(self.user_b)
        } else if user == self.user_b {
            Some(self.user_a)
        } else {
            None
        }
    }
}

/// Listing row: the conversation plus the counterpart's public profile and
/// the caller's unread count.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub other_user_id: Uuid,
    pub other_username: Option<String>,
    pub other_user_name: Option<String>,
    pub other_user_image: Option<String>,
    pub unread_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(user_a: Uuid, user_b: Uuid) -> Conversation {
        Conversation {
            id: Uuid::new_v4(),
            user_a,
            user_b,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_message_at: None,
        }
    }

    #[test]
    fn normalize_pair_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(normalize_pair(a, b), normalize_pair(b, a));
    }

    #[test]
    fn normalize_pair_sorts_ascending() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (lo, hi) = normalize_pair(a, b);
        assert!(lo <= hi);
    }

    #[test]
    fn other_participant_resolves_both_sides() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let conv = conversation(a, b);
        assert_eq!(conv.other_participant(a), Some(b));
        assert_eq!(conv.other_participant(b), Some(a));
    }

    #[test]
    fn other_participant_rejects_third_party() {
        let conv = conversation(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(conv.other_participant(Uuid::new_v4()), None);
    }
}
