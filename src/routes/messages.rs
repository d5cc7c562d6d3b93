use crate::error::AppError;
use crate::middleware::guards::User;
use crate::models::message::{MediaRef, MessageDto, MessageKind};
use crate::services::conversation_service::ConversationService;
use crate::services::media_store::StoredMedia;
use crate::services::message_service::{MessageService, OutgoingMessage};
use crate::services::profile_service::ProfileService;
use crate::state::AppState;
use crate::websocket::fanout;
use actix_multipart::{Field, Multipart};
use actix_web::{post, web, HttpResponse};
use futures_util::StreamExt as _;
use uuid::Uuid;

const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

#[derive(Debug, Default)]
struct SendMessageForm {
    conversation_id: Option<Uuid>,
    content: String,
    message_type: Option<String>,
    media: Option<UploadedFile>,
}

#[derive(Debug)]
struct UploadedFile {
    data: Vec<u8>,
    content_type: Option<String>,
    file_name: Option<String>,
}

async fn read_text(field: &mut Field) -> Result<String, AppError> {
    let mut data = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk =
            chunk.map_err(|e| AppError::BadRequest(format!("invalid multipart field: {e}")))?;
        if data.len() + chunk.len() > MAX_TEXT_FIELD_BYTES {
            return Err(AppError::BadRequest("text field too large".into()));
        }
        data.extend_from_slice(&chunk);
    }
    String::from_utf8(data).map_err(|_| AppError::BadRequest("field must be valid UTF-8".into()))
}

/// Read the attachment, enforcing the size cap while streaming so an
/// oversize payload is rejected before any encryption or storage work.
async fn read_attachment(field: &mut Field, max_bytes: usize) -> Result<UploadedFile, AppError> {
    let content_type = field.content_type().map(|m| m.to_string());
    let file_name = field
        .content_disposition()
        .and_then(|cd| cd.get_filename().map(|s| s.to_string()));

    let mut data = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk =
            chunk.map_err(|e| AppError::BadRequest(format!("attachment read failed: {e}")))?;
        if data.len() + chunk.len() > max_bytes {
            return Err(AppError::BadRequest(format!(
                "attachment exceeds {max_bytes} byte limit"
            )));
        }
        data.extend_from_slice(&chunk);
    }

    Ok(UploadedFile {
        data,
        content_type,
        file_name,
    })
}

async fn read_form(mut payload: Multipart, max_bytes: usize) -> Result<SendMessageForm, AppError> {
    let mut form = SendMessageForm::default();

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::BadRequest(format!("invalid multipart payload: {e}")))?;
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "conversation_id" | "conversationId" => {
                let text = read_text(&mut field).await?;
                let id = Uuid::parse_str(text.trim())
                    .map_err(|_| AppError::BadRequest("invalid conversation id".into()))?;
                form.conversation_id = Some(id);
            }
            "content" => form.content = read_text(&mut field).await?,
            "message_type" | "messageType" => {
                form.message_type = Some(read_text(&mut field).await?)
            }
            "media" => form.media = Some(read_attachment(&mut field, max_bytes).await?),
            _ => {
                // Drain and ignore unknown parts.
                while let Some(chunk) = field.next().await {
                    chunk.map_err(|e| {
                        AppError::BadRequest(format!("invalid multipart payload: {e}"))
                    })?;
                }
            }
        }
    }

    Ok(form)
}

/// POST /chat/messages
///
/// Synchronous send: optional plaintext content plus an optional single
/// binary attachment. The response is the decrypted caller-facing message;
/// ciphertext never reaches the wire.
#[post("/messages")]
pub async fn send_message(
    state: web::Data<AppState>,
    user: User,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let form = read_form(payload, state.config.max_attachment_bytes).await?;
    let conversation_id = form
        .conversation_id
        .ok_or_else(|| AppError::BadRequest("conversation id is required".into()))?;

    let conversation =
        ConversationService::find_for_participant(&state.db, conversation_id, user.id)
            .await?
            .ok_or(AppError::NotFound)?;

    let mut stored: Option<StoredMedia> = None;
    let media = match form.media {
        Some(file) => {
            let content_type = file.content_type.clone();
            let file_name = file.file_name.clone();
            let byte_size = Some(file.data.len() as i64);

            let blob = state
                .media
                .put(file.data, content_type.as_deref(), file_name.as_deref())
                .await?;
            let media_ref = MediaRef {
                url: blob.url.clone(),
                content_type,
                file_name,
                byte_size,
            };
            stored = Some(blob);
            Some(media_ref)
        }
        None => None,
    };

    let outgoing = OutgoingMessage {
        content: form.content,
        kind_hint: form.message_type.as_deref().map(MessageKind::from_db),
        media,
    };

    let message =
        match MessageService::append(&state.db, &state.encryption, &conversation, user.id, outgoing)
            .await
        {
            Ok(message) => message,
            Err(e) => {
                // A blob without its message row is an orphan; roll it back.
                if let Some(blob) = stored {
                    state.media.delete(&blob.key).await;
                }
                return Err(e);
            }
        };

    let sender = match ProfileService::get(&state.db, user.id).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(error = %e, "sender profile lookup failed, omitting annotation");
            None
        }
    };

    let dto = MessageDto::from_message(&message, sender.as_ref());
    fanout::broadcast_new_message(&state.redis, conversation.id, message.receiver_id, dto.clone())
        .await;

    Ok(HttpResponse::Created().json(dto))
}
