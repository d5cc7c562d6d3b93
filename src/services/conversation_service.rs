use crate::error::AppError;
use crate::models::conversation::{normalize_pair, Conversation, ConversationSummary};
use deadpool_postgres::Pool;
use tokio_postgres::error::SqlState;
use uuid::Uuid;

pub struct ConversationService;

impl ConversationService {
    /// Look up or lazily create the unique conversation between two
    /// principals.
    ///
    /// Safe under both participants racing to create the pair: the loser of
    /// the insert race hits the unique constraint and re-fetches the winner's
    /// row instead of failing. Returns the conversation and whether this call
    /// created it.
    pub async fn get_or_create(
        db: &Pool,
        current: Uuid,
        other: Uuid,
    ) -> Result<(Conversation, bool), AppError> {
        if current == other {
            return Err(AppError::BadRequest(
                "cannot start a conversation with yourself".into(),
            ));
        }

        let (user_a, user_b) = normalize_pair(current, other);

        if let Some(existing) = Self::find_by_pair(db, user_a, user_b).await? {
            return Ok((existing, false));
        }

        let id = Uuid::new_v4();
        let client = db.get().await?;
        let inserted = client
            .query_one(
                r#"
                INSERT INTO conversations (id, user_a, user_b)
                VALUES ($1, $2, $3)
                RETURNING id, user_a, user_b, created_at, updated_at, last_message_at
                "#,
                &[&id, &user_a, &user_b],
            )
            .await;

        match inserted {
            Ok(row) => Ok((Conversation::from_row(&row), true)),
            Err(e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) => {
                // The other participant created it first.
                let existing = Self::find_by_pair(db, user_a, user_b)
                    .await?
                    .ok_or_else(|| {
                        AppError::Database("conversation missing after unique violation".into())
                    })?;
                Ok((existing, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_pair(
        db: &Pool,
        user_a: Uuid,
        user_b: Uuid,
    ) -> Result<Option<Conversation>, AppError> {
        let client = db.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, user_a, user_b, created_at, updated_at, last_message_at
                FROM conversations
                WHERE user_a = $1 AND user_b = $2
                "#,
                &[&user_a, &user_b],
            )
            .await?;
        Ok(row.map(|r| Conversation::from_row(&r)))
    }

    /// Fetch a conversation only if `user` participates in it. Non-members
    /// get None, indistinguishable from a missing conversation.
    pub async fn find_for_participant(
        db: &Pool,
        conversation_id: Uuid,
        user: Uuid,
    ) -> Result<Option<Conversation>, AppError> {
        let client = db.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, user_a, user_b, created_at, updated_at, last_message_at
                FROM conversations
                WHERE id = $1 AND (user_a = $2 OR user_b = $2)
                "#,
                &[&conversation_id, &user],
            )
            .await?;
        Ok(row.map(|r| Conversation::from_row(&r)))
    }

    /// All conversations for a user, most recently active first, annotated
    /// with the counterpart's public profile and the caller's unread count.
    pub async fn list_for_user(
        db: &Pool,
        user_id: Uuid,
    ) -> Result<Vec<ConversationSummary>, AppError> {
        let client = db.get().await?;
        let rows = client
            .query(
                r#"
                SELECT c.id, c.user_a, c.user_b, c.created_at, c.updated_at, c.last_message_at,
                       CASE WHEN c.user_a = $1 THEN c.user_b ELSE c.user_a END AS other_user_id,
                       u.username AS other_username,
                       TRIM(CONCAT(u.first_name, ' ', u.last_name)) AS other_user_name,
                       u.avatar_url AS other_user_image,
                       (
                           SELECT COUNT(*) FROM messages m
                           WHERE m.conversation_id = c.id
                             AND m.receiver_id = $1
                             AND m.read_at IS NULL
                       ) AS unread_count
                FROM conversations c
                LEFT JOIN users u
                  ON u.id = CASE WHEN c.user_a = $1 THEN c.user_b ELSE c.user_a END
                WHERE c.user_a = $1 OR c.user_b = $1
                ORDER BY c.updated_at DESC
                "#,
                &[&user_id],
            )
            .await?;

        let summaries = rows
            .into_iter()
            .map(|r| {
                let other_user_name: Option<String> = r.get("other_user_name");
                ConversationSummary {
                    conversation: Conversation::from_row(&r),
                    other_user_id: r.get("other_user_id"),
                    other_username: r.get("other_username"),
                    other_user_name: other_user_name.filter(|s| !s.is_empty()),
                    other_user_image: r.get("other_user_image"),
                    unread_count: r.get("unread_count"),
                }
            })
            .collect();

        Ok(summaries)
    }
}
