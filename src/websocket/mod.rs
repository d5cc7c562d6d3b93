use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

pub mod events;
pub mod fanout;

/// Unique identifier for a connected push-channel session.
///
/// Each WebSocket connection gets one at registration, allowing precise
/// cleanup when the connection closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
struct Subscriber {
    id: SubscriberId,
    sender: UnboundedSender<String>,
}

/// Live-connection registry.
///
/// Every connection sits in its user's personal channel (notification
/// badges, multi-device) and in zero or more conversation broadcast groups
/// it has joined. Dead senders are pruned as they are found.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    users: Arc<RwLock<HashMap<Uuid, Vec<Subscriber>>>>,
    conversations: Arc<RwLock<HashMap<Uuid, Vec<Subscriber>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under its user's personal channel.
    pub async fn register(&self, user_id: Uuid) -> (SubscriberId, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let id = SubscriberId::new();
        let subscriber = Subscriber { id, sender: tx };

        let mut users = self.users.write().await;
        users.entry(user_id).or_default().push(subscriber);

        tracing::debug!(
            user_id = %user_id,
            subscriber_id = %id.as_uuid(),
            sessions = users.get(&user_id).map(|v| v.len()).unwrap_or(0),
            "registered push-channel connection"
        );

        (id, rx)
    }

    /// Subscribe an already-registered connection to a conversation group.
    /// Membership must be verified by the caller before joining.
    pub async fn join_conversation(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        subscriber_id: SubscriberId,
    ) {
        let subscriber = {
            let users = self.users.read().await;
            users
                .get(&user_id)
                .and_then(|subs| subs.iter().find(|s| s.id == subscriber_id))
                .cloned()
        };
        let Some(subscriber) = subscriber else {
            return;
        };

        let mut groups = self.conversations.write().await;
        let entry = groups.entry(conversation_id).or_default();
        if !entry.iter().any(|s| s.id == subscriber_id) {
            entry.push(subscriber);
        }
    }

    pub async fn leave_conversation(&self, conversation_id: Uuid, subscriber_id: SubscriberId) {
        let mut groups = self.conversations.write().await;
        if let Some(subs) = groups.get_mut(&conversation_id) {
            subs.retain(|s| s.id != subscriber_id);
            if subs.is_empty() {
                groups.remove(&conversation_id);
            }
        }
    }

    /// Drop a closed connection from its personal channel and every group it
    /// joined, so stale connections never remain delivery targets.
    pub async fn unregister(&self, user_id: Uuid, subscriber_id: SubscriberId) {
        {
            let mut users = self.users.write().await;
            if let Some(subs) = users.get_mut(&user_id) {
                subs.retain(|s| s.id != subscriber_id);
                if subs.is_empty() {
                    users.remove(&user_id);
                }
            }
        }

        let mut groups = self.conversations.write().await;
        groups.retain(|_, subs| {
            subs.retain(|s| s.id != subscriber_id);
            !subs.is_empty()
        });
    }

    /// Broadcast to a conversation group, optionally skipping the
    /// originating connection.
    pub async fn broadcast_to_conversation(
        &self,
        conversation_id: Uuid,
        skip: Option<SubscriberId>,
        msg: &str,
    ) {
        let mut groups = self.conversations.write().await;
        if let Some(subs) = groups.get_mut(&conversation_id) {
            subs.retain(|s| {
                if Some(s.id) == skip {
                    return true;
                }
                s.sender.send(msg.to_string()).is_ok()
            });
            if subs.is_empty() {
                groups.remove(&conversation_id);
            }
        }
    }

    /// Deliver to every live connection of one user (multi-device).
    pub async fn send_to_user(&self, user_id: Uuid, msg: &str) {
        let mut users = self.users.write().await;
        if let Some(subs) = users.get_mut(&user_id) {
            subs.retain(|s| s.sender.send(msg.to_string()).is_ok());
            if subs.is_empty() {
                users.remove(&user_id);
            }
        }
    }

    /// Group size, for tests and diagnostics.
    pub async fn conversation_subscribers(&self, conversation_id: Uuid) -> usize {
        let groups = self.conversations.read().await;
        groups.get(&conversation_id).map(|v| v.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_joined_connections() {
        let registry = ConnectionRegistry::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let conversation = Uuid::new_v4();

        let (alice_id, mut alice_rx) = registry.register(alice).await;
        let (bob_id, mut bob_rx) = registry.register(bob).await;
        registry.join_conversation(conversation, alice, alice_id).await;
        registry.join_conversation(conversation, bob, bob_id).await;

        registry
            .broadcast_to_conversation(conversation, None, "hello")
            .await;

        assert_eq!(alice_rx.recv().await.unwrap(), "hello");
        assert_eq!(bob_rx.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn broadcast_never_reaches_third_parties() {
        let registry = ConnectionRegistry::new();
        let (alice, bob, eve) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let conversation = Uuid::new_v4();

        let (alice_id, _alice_rx) = registry.register(alice).await;
        let (bob_id, _bob_rx) = registry.register(bob).await;
        let (_eve_id, mut eve_rx) = registry.register(eve).await;
        registry.join_conversation(conversation, alice, alice_id).await;
        registry.join_conversation(conversation, bob, bob_id).await;

        registry
            .broadcast_to_conversation(conversation, None, "private")
            .await;
        registry.send_to_user(alice, "badge").await;

        assert!(eve_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn skip_excludes_the_originating_connection() {
        let registry = ConnectionRegistry::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let conversation = Uuid::new_v4();

        let (alice_id, mut alice_rx) = registry.register(alice).await;
        let (bob_id, mut bob_rx) = registry.register(bob).await;
        registry.join_conversation(conversation, alice, alice_id).await;
        registry.join_conversation(conversation, bob, bob_id).await;

        registry
            .broadcast_to_conversation(conversation, Some(alice_id), "typing")
            .await;

        assert!(alice_rx.try_recv().is_err());
        assert_eq!(bob_rx.recv().await.unwrap(), "typing");
    }

    #[tokio::test]
    async fn multi_device_users_receive_on_every_connection() {
        let registry = ConnectionRegistry::new();
        let alice = Uuid::new_v4();

        let (_phone_id, mut phone_rx) = registry.register(alice).await;
        let (_laptop_id, mut laptop_rx) = registry.register(alice).await;

        registry.send_to_user(alice, "badge").await;

        assert_eq!(phone_rx.recv().await.unwrap(), "badge");
        assert_eq!(laptop_rx.recv().await.unwrap(), "badge");
    }

    #[tokio::test]
    async fn unregister_removes_connection_from_all_groups() {
        let registry = ConnectionRegistry::new();
        let alice = Uuid::new_v4();
        let (c1, c2) = (Uuid::new_v4(), Uuid::new_v4());

        let (alice_id, _rx) = registry.register(alice).await;
        registry.join_conversation(c1, alice, alice_id).await;
        registry.join_conversation(c2, alice, alice_id).await;
        assert_eq!(registry.conversation_subscribers(c1).await, 1);

        registry.unregister(alice, alice_id).await;

        assert_eq!(registry.conversation_subscribers(c1).await, 0);
        assert_eq!(registry.conversation_subscribers(c2).await, 0);
    }

    #[tokio::test]
    async fn join_requires_registration_and_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let alice = Uuid::new_v4();
        let conversation = Uuid::new_v4();

        // Unregistered subscriber id is ignored.
        registry
            .join_conversation(conversation, alice, SubscriberId::new())
            .await;
        assert_eq!(registry.conversation_subscribers(conversation).await, 0);

        let (alice_id, _rx) = registry.register(alice).await;
        registry.join_conversation(conversation, alice, alice_id).await;
        registry.join_conversation(conversation, alice, alice_id).await;
        assert_eq!(registry.conversation_subscribers(conversation).await, 1);
    }

    #[tokio::test]
    async fn dead_connections_are_pruned_on_broadcast() {
        let registry = ConnectionRegistry::new();
        let alice = Uuid::new_v4();
        let conversation = Uuid::new_v4();

        let (alice_id, rx) = registry.register(alice).await;
        registry.join_conversation(conversation, alice, alice_id).await;
        drop(rx);

        registry
            .broadcast_to_conversation(conversation, None, "gone")
            .await;
        assert_eq!(registry.conversation_subscribers(conversation).await, 0);
    }
}
