//! Cross-instance event fan-out over Redis pub/sub.
//!
//! Every instance publishes its events to one channel and relays what it
//! hears into its local connection registry. Delivery is fire-and-forget: an
//! offline receiver's messages are already persisted and will be fetched on
//! the next poll or reconnect; the gateway never queues or retries push
//! delivery.

use crate::models::message::MessageDto;
use crate::redis_client::RedisClient;
use crate::websocket::events::ServerEvent;
use crate::websocket::{ConnectionRegistry, SubscriberId};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

const FANOUT_CHANNEL: &str = "chat:fanout";

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "scope", rename_all = "snake_case")]
enum FanoutTarget {
    /// A conversation's broadcast group.
    Conversation { id: Uuid },
    /// One user's personal channel (all their live connections).
    User { id: Uuid },
}

#[derive(Debug, Serialize, Deserialize)]
struct FanoutEnvelope {
    #[serde(flatten)]
    target: FanoutTarget,
    /// Originating subscriber to exclude (typing/read hints). Subscriber ids
    /// are instance-local, so foreign instances simply find no match.
    skip: Option<Uuid>,
    /// Serialized ServerEvent, relayed verbatim to sockets.
    payload: String,
}

async fn publish(redis: &RedisClient, target: FanoutTarget, skip: Option<SubscriberId>, event: &ServerEvent) {
    let payload = match serde_json::to_string(event) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize push event");
            return;
        }
    };
    let envelope = FanoutEnvelope {
        target,
        skip: skip.map(|s| s.as_uuid()),
        payload,
    };
    let json = match serde_json::to_string(&envelope) {
        Ok(j) => j,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize fanout envelope");
            return;
        }
    };

    if let Err(e) = redis.publish(FANOUT_CHANNEL, &json).await {
        // Persisted state is unaffected; only live delivery is skipped.
        tracing::warn!(error = %e, "fanout publish failed");
    }
}

pub async fn publish_to_conversation(
    redis: &RedisClient,
    conversation_id: Uuid,
    skip: Option<SubscriberId>,
    event: &ServerEvent,
) {
    publish(
        redis,
        FanoutTarget::Conversation { id: conversation_id },
        skip,
        event,
    )
    .await;
}

pub async fn publish_to_user(redis: &RedisClient, user_id: Uuid, event: &ServerEvent) {
    publish(redis, FanoutTarget::User { id: user_id }, None, event).await;
}

/// Fan a freshly stored message out to the conversation group and to the
/// receiver's personal channel (badges outside an open conversation view).
pub async fn broadcast_new_message(
    redis: &RedisClient,
    conversation_id: Uuid,
    receiver_id: Uuid,
    message: MessageDto,
) {
    publish_to_conversation(
        redis,
        conversation_id,
        None,
        &ServerEvent::NewMessage(message.clone()),
    )
    .await;
    publish_to_user(
        redis,
        receiver_id,
        &ServerEvent::MessageReceived {
            conversation_id,
            message,
        },
    )
    .await;
}

/// Subscribe to the fanout channel and relay events into the local registry.
/// Reconnects with a short backoff when the pub/sub connection drops.
pub async fn start_fanout_listener(redis: RedisClient, registry: ConnectionRegistry) {
    loop {
        let mut pubsub = match redis.pubsub().await {
            Ok(ps) => ps,
            Err(e) => {
                tracing::error!(error = %e, "fanout pubsub connection failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        if let Err(e) = pubsub.subscribe(FANOUT_CHANNEL).await {
            tracing::error!(error = %e, "fanout subscribe failed");
            tokio::time::sleep(Duration::from_secs(1)).await;
            continue;
        }
        tracing::info!(channel = FANOUT_CHANNEL, "fanout listener subscribed");

        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            let raw: String = match msg.get_payload() {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(error = %e, "unreadable fanout payload");
                    continue;
                }
            };
            match serde_json::from_str::<FanoutEnvelope>(&raw) {
                Ok(envelope) => dispatch(&registry, envelope).await,
                Err(e) => tracing::warn!(error = %e, "malformed fanout envelope"),
            }
        }

        tracing::warn!("fanout pubsub stream ended, reconnecting");
    }
}

async fn dispatch(registry: &ConnectionRegistry, envelope: FanoutEnvelope) {
    let skip = envelope.skip.map(SubscriberId::from_uuid);
    match envelope.target {
        FanoutTarget::Conversation { id } => {
            registry
                .broadcast_to_conversation(id, skip, &envelope.payload)
                .await
        }
        FanoutTarget::User { id } => registry.send_to_user(id, &envelope.payload).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips() {
        let envelope = FanoutEnvelope {
            target: FanoutTarget::Conversation { id: Uuid::new_v4() },
            skip: Some(Uuid::new_v4()),
            payload: r#"{"type":"error","message":"x"}"#.into(),
        };
        let json = serde_json::to_string(&envelope).unwrap();
        let parsed: FanoutEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.target, envelope.target);
        assert_eq!(parsed.skip, envelope.skip);
        assert_eq!(parsed.payload, envelope.payload);
    }

    #[test]
    fn envelope_scope_tags_distinguish_targets() {
        let conv = serde_json::to_value(FanoutTarget::Conversation { id: Uuid::new_v4() }).unwrap();
        assert_eq!(conv["scope"], "conversation");
        let user = serde_json::to_value(FanoutTarget::User { id: Uuid::new_v4() }).unwrap();
        assert_eq!(user["scope"], "user");
    }

    #[tokio::test]
    async fn dispatch_routes_to_conversation_group() {
        let registry = ConnectionRegistry::new();
        let alice = Uuid::new_v4();
        let conversation = Uuid::new_v4();
        let (alice_id, mut rx) = registry.register(alice).await;
        registry
            .join_conversation(conversation, alice, alice_id)
            .await;

        dispatch(
            &registry,
            FanoutEnvelope {
                target: FanoutTarget::Conversation { id: conversation },
                skip: None,
                payload: "evt".into(),
            },
        )
        .await;

        assert_eq!(rx.recv().await.unwrap(), "evt");
    }

    #[tokio::test]
    async fn dispatch_routes_to_personal_channel() {
        let registry = ConnectionRegistry::new();
        let alice = Uuid::new_v4();
        let (_id, mut rx) = registry.register(alice).await;

        dispatch(
            &registry,
            FanoutEnvelope {
                target: FanoutTarget::User { id: alice },
                skip: None,
                payload: "badge".into(),
            },
        )
        .await;

        assert_eq!(rx.recv().await.unwrap(), "badge");
    }
}
