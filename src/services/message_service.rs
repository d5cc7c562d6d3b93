//! Durable message log.
//!
//! Append and the parent conversation's timestamp bump commit in one
//! transaction: a conversation listing never observes a message without the
//! parent's `last_message_at` reflecting it. Ordering within a conversation
//! is the store-assigned `sequence_number` (counter CTE), never client
//! clocks.

use crate::error::AppError;
use crate::models::conversation::Conversation;
use crate::models::message::{MediaRef, Message, MessageBody, MessageDto, MessageKind};
use crate::services::encryption::EncryptionService;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use uuid::Uuid;

/// Client-supplied send input before classification and encryption.
#[derive(Debug)]
pub struct OutgoingMessage {
    pub content: String,
    pub kind_hint: Option<MessageKind>,
    pub media: Option<MediaRef>,
}

pub struct MessageService;

impl MessageService {
    /// Persist one outgoing message and bump the parent conversation.
    pub async fn append(
        db: &Pool,
        encryption: &EncryptionService,
        conversation: &Conversation,
        sender_id: Uuid,
        outgoing: OutgoingMessage,
    ) -> Result<Message, AppError> {
        let receiver_id = conversation
            .other_participant(sender_id)
            .ok_or(AppError::NotFound)?;

        let body = MessageBody::classify(outgoing.content, outgoing.kind_hint, outgoing.media);
        let ciphertext =
            encryption.encrypt(body.content(), conversation.user_a, conversation.user_b)?;

        let id = Uuid::new_v4();
        let kind = body.kind();
        let kind_str = kind.as_str();
        let media = body.media();
        let media_url = media.map(|m| m.url.clone());
        let media_type = media.and_then(|m| m.content_type.clone());
        let file_name = media.and_then(|m| m.file_name.clone());
        let file_size = media.and_then(|m| m.byte_size);

        let mut client = db.get().await?;
        let tx = client.transaction().await?;

        let row = tx
            .query_one(
                r#"
                WITH next AS (
                    INSERT INTO conversation_counters (conversation_id, last_seq)
                    VALUES ($2, 1)
                    ON CONFLICT (conversation_id)
                    DO UPDATE SET last_seq = conversation_counters.last_seq + 1
                    RETURNING last_seq
                )
                INSERT INTO messages (
                    id,
                    conversation_id,
                    sender_id,
                    receiver_id,
                    message_type,
                    encrypted_content,
                    media_url,
                    media_type,
                    file_name,
                    file_size,
                    sequence_number
                )
                SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, next.last_seq
                FROM next
                RETURNING sequence_number, created_at
                "#,
                &[
                    &id,
                    &conversation.id,
                    &sender_id,
                    &receiver_id,
                    &kind_str,
                    &ciphertext,
                    &media_url,
                    &media_type,
                    &file_name,
                    &file_size,
                ],
            )
            .await?;

        tx.execute(
            "UPDATE conversations SET updated_at = NOW(), last_message_at = NOW() WHERE id = $1",
            &[&conversation.id],
        )
        .await?;

        tx.commit().await?;

        let sequence_number: i64 = row.get("sequence_number");
        let created_at: DateTime<Utc> = row.get("created_at");

        Ok(Message {
            id,
            conversation_id: conversation.id,
            sender_id,
            receiver_id,
            body,
            sequence_number,
            created_at,
            read_at: None,
        })
    }

    /// Page through a conversation's log. Storage order is newest-first; the
    /// window is reversed before return so consumers render oldest-first.
    /// Undecryptable rows degrade to null content instead of failing the
    /// whole listing.
    pub async fn history(
        db: &Pool,
        encryption: &EncryptionService,
        conversation: &Conversation,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MessageDto>, AppError> {
        let limit = limit.clamp(1, 200);
        let offset = offset.max(0);

        let client = db.get().await?;
        let rows = client
            .query(
                r#"
                SELECT m.id, m.sender_id, m.receiver_id, m.message_type, m.encrypted_content,
                       m.media_url, m.media_type, m.file_name, m.file_size,
                       m.sequence_number, m.created_at, m.read_at,
                       u.username AS sender_username,
                       TRIM(CONCAT(u.first_name, ' ', u.last_name)) AS sender_name
                FROM messages m
                LEFT JOIN users u ON u.id = m.sender_id
                WHERE m.conversation_id = $1
                ORDER BY m.sequence_number DESC
                LIMIT $2 OFFSET $3
                "#,
                &[&conversation.id, &limit, &offset],
            )
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows.into_iter().rev() {
            let id: Uuid = r.get("id");
            let encrypted: String = r.get("encrypted_content");
            let content = encryption.decrypt(&encrypted, conversation.user_a, conversation.user_b);
            if content.is_none() {
                tracing::warn!(
                    message_id = %id,
                    conversation_id = %conversation.id,
                    "undecryptable message content, surfacing as null"
                );
            }

            let media_url: Option<String> = r.get("media_url");
            let media = media_url.map(|url| MediaRef {
                url,
                content_type: r.get("media_type"),
                file_name: r.get("file_name"),
                byte_size: r.get("file_size"),
            });

            let created_at: DateTime<Utc> = r.get("created_at");
            let read_at: Option<DateTime<Utc>> = r.get("read_at");
            let sender_name: Option<String> = r.get("sender_name");

            out.push(MessageDto {
                id,
                conversation_id: conversation.id,
                sender_id: r.get("sender_id"),
                receiver_id: r.get("receiver_id"),
                message_type: r.get("message_type"),
                content,
                media,
                sequence_number: r.get("sequence_number"),
                created_at: created_at.to_rfc3339(),
                read_at: read_at.map(|t| t.to_rfc3339()),
                sender_username: r.get("sender_username"),
                sender_name: sender_name.filter(|s| !s.is_empty()),
            });
        }

        Ok(out)
    }

    /// Transition every unread message addressed to `receiver_id` to read.
    /// Idempotent: rows with an existing watermark are excluded and not
    /// recounted. Returns the number of rows transitioned.
    pub async fn mark_read(
        db: &Pool,
        conversation_id: Uuid,
        receiver_id: Uuid,
    ) -> Result<u64, AppError> {
        let client = db.get().await?;
        let count = client
            .execute(
                r#"
                UPDATE messages
                SET read_at = NOW()
                WHERE conversation_id = $1 AND receiver_id = $2 AND read_at IS NULL
                "#,
                &[&conversation_id, &receiver_id],
            )
            .await?;
        Ok(count)
    }
}
