use crate::models::profile::Profile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    File,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Video => "video",
            MessageKind::Audio => "audio",
            MessageKind::File => "file",
        }
    }

    /// Parse the stored column value; unknown strings fall back to text.
    pub fn from_db(s: &str) -> Self {
        match s {
            "image" => MessageKind::Image,
            "video" => MessageKind::Video,
            "audio" => MessageKind::Audio,
            "file" => MessageKind::File,
            _ => MessageKind::Text,
        }
    }

    /// Classify an attachment by its MIME type.
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("image/") {
            MessageKind::Image
        } else if mime.starts_with("video/") {
            MessageKind::Video
        } else if mime.starts_with("audio/") {
            MessageKind::Audio
        } else {
            MessageKind::File
        }
    }
}

/// Reference to an externally stored media blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRef {
    #[serde(rename = "media_url")]
    pub url: String,
    #[serde(rename = "media_type")]
    pub content_type: Option<String>,
    pub file_name: Option<String>,
    #[serde(rename = "file_size")]
    pub byte_size: Option<i64>,
}

/// Message payload as a tagged variant: media kinds carry the blob
/// reference, text carries only its content. Content is present on every
/// variant (possibly empty) so the ciphertext column stays uniform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "lowercase")]
pub enum MessageBody {
    Text {
        content: String,
    },
    Image {
        content: String,
        #[serde(flatten)]
        media: MediaRef,
    },
    Video {
        content: String,
        #[serde(flatten)]
        media: MediaRef,
    },
    Audio {
        content: String,
        #[serde(flatten)]
        media: MediaRef,
    },
    File {
        content: String,
        #[serde(flatten)]
        media: MediaRef,
    },
}

impl MessageBody {
    /// Resolve the payload shape for an outgoing message. An attachment's
    /// MIME type wins over the client hint; without media the message is
    /// plain text.
    pub fn classify(content: String, hint: Option<MessageKind>, media: Option<MediaRef>) -> Self {
        match media {
            None => MessageBody::Text { content },
            Some(media) => {
                let kind = media
                    .content_type
                    .as_deref()
                    .map(MessageKind::from_mime)
                    .or(hint)
                    .unwrap_or(MessageKind::File);
                Self::with_media(kind, content, media)
            }
        }
    }

    fn with_media(kind: MessageKind, content: String, media: MediaRef) -> Self {
        match kind {
            MessageKind::Image => MessageBody::Image { content, media },
            MessageKind::Video => MessageBody::Video { content, media },
            MessageKind::Audio => MessageBody::Audio { content, media },
            MessageKind::Text | MessageKind::File => MessageBody::File { content, media },
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            MessageBody::Text { .. } => MessageKind::Text,
            MessageBody::Image { .. } => MessageKind::Image,
            MessageBody::Video { .. } => MessageKind::Video,
            MessageBody::Audio { .. } => MessageKind::Audio,
            MessageBody::File { .. } => MessageKind::File,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            MessageBody::Text { content }
            | MessageBody::Image { content, .. }
            | MessageBody::Video { content, .. }
            | MessageBody::Audio { content, .. }
            | MessageBody::File { content, .. } => content,
        }
    }

    pub fn media(&self) -> Option<&MediaRef> {
        match self {
            MessageBody::Text { .. } => None,
            MessageBody::Image { media, .. }
            | MessageBody::Video { media, .. }
            | MessageBody::Audio { media, .. }
            | MessageBody::File { media, .. } => Some(media),
        }
    }
}

/// Domain message as stored (content decrypted).
#[derive(Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub body: MessageBody,
    pub sequence_number: i64,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Wire representation of a message. Ciphertext is never serialized;
/// `content` is null when the stored ciphertext could not be decrypted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub message_type: String,
    pub content: Option<String>,
    #[serde(flatten)]
    pub media: Option<MediaRef>,
    pub sequence_number: i64,
    pub created_at: String,
    pub read_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
}

impl MessageDto {
    pub fn from_message(message: &Message, sender: Option<&Profile>) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            message_type: message.body.kind().as_str().to_string(),
            content: Some(message.body.content().to_string()),
            media: message.body.media().cloned(),
            sequence_number: message.sequence_number,
            created_at: message.created_at.to_rfc3339(),
            read_at: message.read_at.map(|t| t.to_rfc3339()),
            sender_username: sender.map(|p| p.username.clone()),
            sender_name: sender.and_then(|p| p.display_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(content_type: Option<&str>) -> MediaRef {
        MediaRef {
            url: "/media/x".into(),
            content_type: content_type.map(|s| s.to_string()),
            file_name: Some("x.bin".into()),
            byte_size: Some(42),
        }
    }

    #[test]
    fn mime_classification_covers_media_families() {
        assert_eq!(MessageKind::from_mime("image/png"), MessageKind::Image);
        assert_eq!(MessageKind::from_mime("video/mp4"), MessageKind::Video);
        assert_eq!(MessageKind::from_mime("audio/ogg"), MessageKind::Audio);
        assert_eq!(
            MessageKind::from_mime("application/pdf"),
            MessageKind::File
        );
    }

    #[test]
    fn classify_without_media_is_text() {
        let body = MessageBody::classify("hi".into(), Some(MessageKind::Image), None);
        assert_eq!(body.kind(), MessageKind::Text);
        assert_eq!(body.content(), "hi");
        assert!(body.media().is_none());
    }

    #[test]
    fn classify_prefers_mime_over_hint() {
        let body = MessageBody::classify(
            String::new(),
            Some(MessageKind::File),
            Some(media(Some("image/jpeg"))),
        );
        assert_eq!(body.kind(), MessageKind::Image);
        assert_eq!(body.content(), "");
    }

    #[test]
    fn classify_uses_hint_when_mime_missing() {
        let body = MessageBody::classify(String::new(), Some(MessageKind::Audio), Some(media(None)));
        assert_eq!(body.kind(), MessageKind::Audio);
    }

    #[test]
    fn classify_defaults_unknown_media_to_file() {
        let body = MessageBody::classify(String::new(), None, Some(media(None)));
        assert_eq!(body.kind(), MessageKind::File);
    }

    #[test]
    fn body_serializes_with_kind_tag_and_media_fields() {
        let body = MessageBody::classify(String::new(), None, Some(media(Some("image/png"))));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["message_type"], "image");
        assert_eq!(json["media_url"], "/media/x");
        assert_eq!(json["media_type"], "image/png");
        assert_eq!(json["file_size"], 42);
    }

    #[test]
    fn text_body_carries_no_media_fields() {
        let body = MessageBody::Text {
            content: "hello".into(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["message_type"], "text");
        assert_eq!(json["content"], "hello");
        assert!(json.get("media_url").is_none());
    }
}
