//! Ordered conversation messages held in an owned, observable cell.
//!
//! All mutation goes through closures applied to the latest value, so no
//! caller ever writes back a copy captured before a suspension point.

use tokio::sync::watch;

use crate::types::{AssistantMessage, ChatMessage, MessageKey};

#[derive(Debug)]
pub struct MessageStore {
    messages: watch::Sender<Vec<ChatMessage>>,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    pub fn new() -> Self {
        let (messages, _) = watch::channel(Vec::new());
        Self { messages }
    }

    /// Subscribe to list changes.
    pub fn watch(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.messages.subscribe()
    }

    /// Copy of the current list.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.borrow().is_empty()
    }

    /// Read the latest list without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&[ChatMessage]) -> R) -> R {
        f(&self.messages.borrow())
    }

    /// Apply `f` to the latest list and commit the result.
    pub fn update<R>(&self, f: impl FnOnce(&mut Vec<ChatMessage>) -> R) -> R {
        let mut out = None;
        self.messages.send_modify(|messages| {
            out = Some(f(messages));
            debug_assert!(
                messages
                    .iter()
                    .rev()
                    .skip(1)
                    .all(|m| !m.is_pending()),
                "only the trailing message may be pending"
            );
        });
        match out {
            Some(out) => out,
            None => unreachable!("send_modify always runs its closure"),
        }
    }

    pub fn push(&self, message: ChatMessage) {
        self.update(|messages| messages.push(message));
    }

    pub fn replace_all(&self, messages: Vec<ChatMessage>) {
        self.update(|current| *current = messages);
    }

    pub fn last(&self) -> Option<ChatMessage> {
        self.messages.borrow().last().cloned()
    }

    pub fn get(&self, key: MessageKey) -> Option<ChatMessage> {
        self.read(|messages| messages.iter().find(|m| m.key() == key).cloned())
    }

    /// Patch the message with `key`. Returns `false` if it is gone.
    pub fn update_message(&self, key: MessageKey, f: impl FnOnce(&mut ChatMessage)) -> bool {
        self.update(|messages| match messages.iter_mut().find(|m| m.key() == key) {
            Some(message) => {
                f(message);
                true
            }
            None => false,
        })
    }

    /// Patch the assistant message with `key`. Returns `false` if it is gone
    /// or not an assistant message.
    pub fn update_assistant(&self, key: MessageKey, f: impl FnOnce(&mut AssistantMessage)) -> bool {
        self.update(|messages| {
            match messages
                .iter_mut()
                .find(|m| m.key() == key)
                .and_then(ChatMessage::as_assistant_mut)
            {
                Some(message) => {
                    f(message);
                    true
                }
                None => false,
            }
        })
    }

    pub fn remove(&self, key: MessageKey) -> Option<ChatMessage> {
        self.update(|messages| {
            let idx = messages.iter().position(|m| m.key() == key)?;
            Some(messages.remove(idx))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserMessage;

    #[test]
    fn updates_apply_to_latest_value() {
        let store = MessageStore::new();
        let placeholder = AssistantMessage::placeholder();
        let key = placeholder.key;
        store.push(ChatMessage::Assistant(placeholder));

        let stale = store.snapshot();
        store.update_assistant(key, |m| m.content.push_str("Hi"));
        store.update_assistant(key, |m| m.content.push_str(" there"));

        assert_eq!(stale[0].content(), "");
        assert_eq!(store.get(key).unwrap().content(), "Hi there");
    }

    #[test]
    fn update_assistant_ignores_user_messages() {
        let store = MessageStore::new();
        let user = UserMessage::new("hello", Vec::new());
        let key = user.key;
        store.push(ChatMessage::User(user));
        assert!(!store.update_assistant(key, |m| m.pending = false));
        assert!(store.update_message(key, |m| m.set_server_id("msg_1")));
        assert_eq!(store.get(key).unwrap().server_id(), Some("msg_1"));
    }

    #[test]
    fn remove_returns_the_message() {
        let store = MessageStore::new();
        let user = UserMessage::new("hello", Vec::new());
        let key = user.key;
        store.push(ChatMessage::User(user));
        assert!(store.remove(key).is_some());
        assert!(store.remove(key).is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn subscribers_observe_commits() {
        let store = MessageStore::new();
        let mut rx = store.watch();
        store.push(ChatMessage::User(UserMessage::new("hi", Vec::new())));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().len(), 1);
    }
}
