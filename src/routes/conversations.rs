use crate::error::AppError;
use crate::middleware::guards::User;
use crate::services::conversation_service::ConversationService;
use crate::services::message_service::MessageService;
use crate::state::AppState;
use actix_web::{get, post, put, web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// POST /chat/conversations/{user_id}
///
/// Get or lazily create the conversation with another principal. Idempotent
/// from either side; 201 only when this call created the row.
#[post("/conversations/{user_id}")]
pub async fn create_conversation(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let other = path.into_inner();
    let (conversation, created) =
        ConversationService::get_or_create(&state.db, user.id, other).await?;

    if created {
        Ok(HttpResponse::Created().json(conversation))
    } else {
        Ok(HttpResponse::Ok().json(conversation))
    }
}

/// GET /chat/conversations
///
/// All of the caller's conversations, most recently active first, annotated
/// with counterpart profile fields and unread counts.
#[get("/conversations")]
pub async fn get_conversations(
    state: web::Data<AppState>,
    user: User,
) -> Result<HttpResponse, AppError> {
    let conversations = ConversationService::list_for_user(&state.db, user.id).await?;
    Ok(HttpResponse::Ok().json(conversations))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// GET /chat/conversations/{conversation_id}/messages?limit&offset
///
/// Oldest-first page of decrypted messages. Non-participants get 404.
#[get("/conversations/{conversation_id}/messages")]
pub async fn get_messages(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
    query: web::Query<HistoryParams>,
) -> Result<HttpResponse, AppError> {
    let conversation_id = path.into_inner();
    let conversation =
        ConversationService::find_for_participant(&state.db, conversation_id, user.id)
            .await?
            .ok_or(AppError::NotFound)?;

    let messages = MessageService::history(
        &state.db,
        &state.encryption,
        &conversation,
        query.limit,
        query.offset,
    )
    .await?;

    Ok(HttpResponse::Ok().json(messages))
}

#[derive(Serialize)]
struct MarkReadResponse {
    message: &'static str,
    count: u64,
}

/// PUT /chat/conversations/{conversation_id}/read
///
/// Transition the caller's unread messages to read; returns how many rows
/// transitioned (0 on repeat calls with nothing new).
#[put("/conversations/{conversation_id}/read")]
pub async fn mark_read(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let conversation_id = path.into_inner();
    let conversation =
        ConversationService::find_for_participant(&state.db, conversation_id, user.id)
            .await?
            .ok_or(AppError::NotFound)?;

    let count = MessageService::mark_read(&state.db, conversation.id, user.id).await?;

    Ok(HttpResponse::Ok().json(MarkReadResponse {
        message: "messages marked as read",
        count,
    }))
}
