//! Persistent push channel.
//!
//! One WebSocket connection per logged-in session, keyed by the caller's
//! identity. The credential is validated at the handshake: a bad or missing
//! token refuses the connection instead of surfacing per-event errors.
//! Protocol errors after that are reported with `error` events and the
//! connection stays open.

use crate::error::AppError;
use crate::middleware::error_handling;
use crate::models::message::{MediaRef, MessageDto, MessageKind};
use crate::services::conversation_service::ConversationService;
use crate::services::message_service::{MessageService, OutgoingMessage};
use crate::services::profile_service::ProfileService;
use crate::state::AppState;
use crate::websocket::events::{ClientEvent, ServerEvent};
use crate::websocket::{fanout, SubscriberId};
use actix::{Actor, ActorContext, AsyncContext, Handler, Message as ActixMessage, StreamHandler};
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;
use std::time::{Duration, Instant};
use uuid::Uuid;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// Payload pushed from the registry (or an event handler) to this socket.
#[derive(ActixMessage)]
#[rtype(result = "()")]
pub(crate) struct PushText(pub String);

struct WsSession {
    user_id: Uuid,
    username: String,
    subscriber_id: SubscriberId,
    state: AppState,
    hb: Instant,
}

impl WsSession {
    fn new(user_id: Uuid, username: String, subscriber_id: SubscriberId, state: AppState) -> Self {
        Self {
            user_id,
            username,
            subscriber_id,
            state,
            hb: Instant::now(),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::warn!(
                    user_id = %act.user_id,
                    "WebSocket heartbeat timed out, disconnecting"
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn handle_event(&self, evt: ClientEvent, ctx: &mut ws::WebsocketContext<Self>) {
        let state = self.state.clone();
        let user_id = self.user_id;
        let username = self.username.clone();
        let subscriber_id = self.subscriber_id;
        let addr = ctx.address();

        actix::spawn(async move {
            if let Err(e) = dispatch_event(state, user_id, username, subscriber_id, evt).await {
                let event = ServerEvent::Error {
                    message: e.to_string(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    addr.do_send(PushText(json));
                }
            }
        });
    }
}

async fn dispatch_event(
    state: AppState,
    user_id: Uuid,
    username: String,
    subscriber_id: SubscriberId,
    evt: ClientEvent,
) -> Result<(), AppError> {
    match evt {
        ClientEvent::JoinConversation { conversation_id } => {
            ConversationService::find_for_participant(&state.db, conversation_id, user_id)
                .await?
                .ok_or(AppError::NotFound)?;
            state
                .registry
                .join_conversation(conversation_id, user_id, subscriber_id)
                .await;
            tracing::debug!(
                user_id = %user_id,
                conversation_id = %conversation_id,
                "joined conversation group"
            );
            Ok(())
        }

        ClientEvent::LeaveConversation { conversation_id } => {
            state
                .registry
                .leave_conversation(conversation_id, subscriber_id)
                .await;
            Ok(())
        }

        ClientEvent::SendMessage {
            conversation_id,
            content,
            message_type,
            media_url,
            media_type,
            file_name,
            file_size,
        } => {
            let conversation =
                ConversationService::find_for_participant(&state.db, conversation_id, user_id)
                    .await?
                    .ok_or(AppError::NotFound)?;

            let media = media_url.map(|url| MediaRef {
                url,
                content_type: media_type,
                file_name,
                byte_size: file_size,
            });
            let outgoing = OutgoingMessage {
                content: content.unwrap_or_default(),
                kind_hint: message_type.as_deref().map(MessageKind::from_db),
                media,
            };

            let message =
                MessageService::append(&state.db, &state.encryption, &conversation, user_id, outgoing)
                    .await?;

            let sender = match ProfileService::get(&state.db, user_id).await {
                Ok(profile) => profile,
                Err(e) => {
                    tracing::warn!(error = %e, "sender profile lookup failed, omitting annotation");
                    None
                }
            };

            let dto = MessageDto::from_message(&message, sender.as_ref());
            fanout::broadcast_new_message(&state.redis, conversation.id, message.receiver_id, dto)
                .await;
            Ok(())
        }

        ClientEvent::Typing {
            conversation_id,
            is_typing,
        } => {
            // Ephemeral: relayed to the group, never persisted.
            let event = ServerEvent::UserTyping {
                user_id,
                username,
                is_typing,
            };
            fanout::publish_to_conversation(
                &state.redis,
                conversation_id,
                Some(subscriber_id),
                &event,
            )
            .await;
            Ok(())
        }

        ClientEvent::MarkRead { conversation_id } => {
            let conversation =
                ConversationService::find_for_participant(&state.db, conversation_id, user_id)
                    .await?
                    .ok_or(AppError::NotFound)?;

            MessageService::mark_read(&state.db, conversation.id, user_id).await?;

            // Hint for the counterpart's live sessions; the persisted
            // watermark remains the source of truth.
            let event = ServerEvent::MessagesRead {
                conversation_id: conversation.id,
                read_by: user_id,
            };
            fanout::publish_to_conversation(
                &state.redis,
                conversation.id,
                Some(subscriber_id),
                &event,
            )
            .await;
            Ok(())
        }
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(user_id = %self.user_id, "push-channel session started");
        self.hb(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(user_id = %self.user_id, "push-channel session stopped");

        let registry = self.state.registry.clone();
        let user_id = self.user_id;
        let subscriber_id = self.subscriber_id;
        actix::spawn(async move {
            registry.unregister(user_id, subscriber_id).await;
        });
    }
}

impl Handler<PushText> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: PushText, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(evt) => self.handle_event(evt, ctx),
                Err(e) => {
                    tracing::warn!(
                        user_id = %self.user_id,
                        error = %e,
                        "unparseable push-channel event"
                    );
                    let event = ServerEvent::Error {
                        message: "malformed event".into(),
                    };
                    if let Ok(json) = serde_json::to_string(&event) {
                        ctx.text(json);
                    }
                }
            },
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!(user_id = %self.user_id, "binary frames not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(user_id = %self.user_id, error = %e, "WebSocket protocol error");
                ctx.stop();
            }
        }
    }
}

fn bearer_token(params: &WsParams, req: &HttpRequest) -> Option<String> {
    params.token.clone().or_else(|| {
        req.headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(|s| s.to_string())
    })
}

/// GET /chat/ws?token=…
#[get("/chat/ws")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let params = query.into_inner();

    let claims = match bearer_token(&params, &req)
        .as_deref()
        .map(actix_middleware::validate_token)
    {
        Some(Ok(data)) => data.claims,
        _ => {
            tracing::warn!("push-channel connection refused: missing or invalid credential");
            return Ok(error_handling::into_response(&AppError::Unauthorized));
        }
    };

    let user_id = match Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => return Ok(error_handling::into_response(&AppError::Unauthorized)),
    };

    let (subscriber_id, mut rx) = state.registry.register(user_id).await;
    let session = WsSession::new(
        user_id,
        claims.username,
        subscriber_id,
        state.as_ref().clone(),
    );

    let (addr, resp) = ws::WsResponseBuilder::new(session, &req, stream).start_with_addr()?;

    // Bridge the registry's channel into the actor mailbox; ends when either
    // side goes away.
    actix::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if addr.try_send(PushText(msg)).is_err() {
                break;
            }
        }
    });

    Ok(resp)
}
