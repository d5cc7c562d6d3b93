//! Push-channel protocol.
//!
//! Events are JSON objects tagged by `type`; payload keys are camelCase to
//! match the client SDK. Message objects reuse the REST wire shape.

use crate::models::message::MessageDto;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client-to-server events.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinConversation { conversation_id: Uuid },

    #[serde(rename_all = "camelCase")]
    LeaveConversation { conversation_id: Uuid },

    /// Mirrors the synchronous send pipeline; media is passed by reference
    /// (already uploaded), never as inline bytes.
    #[serde(rename_all = "camelCase")]
    SendMessage {
        conversation_id: Uuid,
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        message_type: Option<String>,
        #[serde(default)]
        media_url: Option<String>,
        #[serde(default)]
        media_type: Option<String>,
        #[serde(default)]
        file_name: Option<String>,
        #[serde(default)]
        file_size: Option<i64>,
    },

    /// Ephemeral; relayed to the conversation group and never persisted.
    #[serde(rename_all = "camelCase")]
    Typing {
        conversation_id: Uuid,
        is_typing: bool,
    },

    #[serde(rename_all = "camelCase")]
    MarkRead { conversation_id: Uuid },
}

/// Server-to-client events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Delivered to the conversation's broadcast group.
    NewMessage(MessageDto),

    /// Delivered to the receiver's personal channel for notification badges
    /// outside an open conversation view.
    #[serde(rename_all = "camelCase")]
    MessageReceived {
        conversation_id: Uuid,
        message: MessageDto,
    },

    #[serde(rename_all = "camelCase")]
    UserTyping {
        user_id: Uuid,
        username: String,
        is_typing: bool,
    },

    #[serde(rename_all = "camelCase")]
    MessagesRead {
        conversation_id: Uuid,
        read_by: Uuid,
    },

    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_join_and_leave() {
        let evt: ClientEvent = serde_json::from_value(json!({
            "type": "join-conversation",
            "conversationId": "8c5f54b2-86fa-4b5c-a2d0-6bfaf6f6184a"
        }))
        .unwrap();
        assert!(matches!(evt, ClientEvent::JoinConversation { .. }));

        let evt: ClientEvent = serde_json::from_value(json!({
            "type": "leave-conversation",
            "conversationId": "8c5f54b2-86fa-4b5c-a2d0-6bfaf6f6184a"
        }))
        .unwrap();
        assert!(matches!(evt, ClientEvent::LeaveConversation { .. }));
    }

    #[test]
    fn parses_send_message_with_media_reference() {
        let evt: ClientEvent = serde_json::from_value(json!({
            "type": "send-message",
            "conversationId": "8c5f54b2-86fa-4b5c-a2d0-6bfaf6f6184a",
            "content": "look at this",
            "messageType": "image",
            "mediaUrl": "/media/cat.png",
            "mediaType": "image/png",
            "fileName": "cat.png",
            "fileSize": 1234
        }))
        .unwrap();

        match evt {
            ClientEvent::SendMessage {
                content,
                message_type,
                media_url,
                file_size,
                ..
            } => {
                assert_eq!(content.as_deref(), Some("look at this"));
                assert_eq!(message_type.as_deref(), Some("image"));
                assert_eq!(media_url.as_deref(), Some("/media/cat.png"));
                assert_eq!(file_size, Some(1234));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn parses_minimal_send_message() {
        let evt: ClientEvent = serde_json::from_value(json!({
            "type": "send-message",
            "conversationId": "8c5f54b2-86fa-4b5c-a2d0-6bfaf6f6184a"
        }))
        .unwrap();
        assert!(matches!(
            evt,
            ClientEvent::SendMessage {
                content: None,
                media_url: None,
                ..
            }
        ));
    }

    #[test]
    fn parses_typing_and_mark_read() {
        let evt: ClientEvent = serde_json::from_value(json!({
            "type": "typing",
            "conversationId": "8c5f54b2-86fa-4b5c-a2d0-6bfaf6f6184a",
            "isTyping": true
        }))
        .unwrap();
        assert!(matches!(evt, ClientEvent::Typing { is_typing: true, .. }));

        let evt: ClientEvent = serde_json::from_value(json!({
            "type": "mark-read",
            "conversationId": "8c5f54b2-86fa-4b5c-a2d0-6bfaf6f6184a"
        }))
        .unwrap();
        assert!(matches!(evt, ClientEvent::MarkRead { .. }));
    }

    #[test]
    fn rejects_unknown_event_type() {
        let result: Result<ClientEvent, _> = serde_json::from_value(json!({
            "type": "self-destruct",
            "conversationId": "8c5f54b2-86fa-4b5c-a2d0-6bfaf6f6184a"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn new_message_event_inlines_the_message_and_never_leaks_ciphertext() {
        let dto = MessageDto {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            message_type: "text".into(),
            content: Some("hello".into()),
            media: None,
            sequence_number: 1,
            created_at: "2026-01-01T00:00:00+00:00".into(),
            read_at: None,
            sender_username: Some("sam".into()),
            sender_name: None,
        };

        let json = serde_json::to_value(ServerEvent::NewMessage(dto.clone())).unwrap();
        assert_eq!(json["type"], "new-message");
        assert_eq!(json["content"], "hello");
        assert_eq!(json["message_type"], "text");
        assert!(json.get("encrypted_content").is_none());

        let json = serde_json::to_value(ServerEvent::MessageReceived {
            conversation_id: dto.conversation_id,
            message: dto.clone(),
        })
        .unwrap();
        assert_eq!(json["type"], "message-received");
        assert_eq!(json["conversationId"], dto.conversation_id.to_string());
        assert_eq!(json["message"]["content"], "hello");
    }

    #[test]
    fn outbound_events_use_protocol_names_and_camel_case() {
        let user_id = Uuid::new_v4();
        let typing = serde_json::to_value(ServerEvent::UserTyping {
            user_id,
            username: "sam".into(),
            is_typing: true,
        })
        .unwrap();
        assert_eq!(typing["type"], "user-typing");
        assert_eq!(typing["userId"], user_id.to_string());
        assert_eq!(typing["isTyping"], true);

        let read = serde_json::to_value(ServerEvent::MessagesRead {
            conversation_id: user_id,
            read_by: user_id,
        })
        .unwrap();
        assert_eq!(read["type"], "messages-read");
        assert!(read.get("readBy").is_some());

        let err = serde_json::to_value(ServerEvent::Error {
            message: "nope".into(),
        })
        .unwrap();
        assert_eq!(err["type"], "error");
        assert_eq!(err["message"], "nope");
    }
}
