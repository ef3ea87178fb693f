//! Caller-supplied callbacks around a send.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::{ChatMessage, Thread};

/// Runs after the thread is resolved and before the user message is
/// persisted. A failure fails the send.
pub type PreSendFn = Arc<dyn Fn(Thread, Vec<ChatMessage>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Receives the resolved thread (if any) and the final assistant content.
pub type CompletionFn = Arc<dyn Fn(Option<Thread>, String) + Send + Sync>;

/// Invalidates list caches that depend on the conversation (thread lists,
/// usage counters).
pub type InvalidateFn = Arc<dyn Fn() + Send + Sync>;

/// Raises the blocking quota modal.
pub type QuotaExceededFn = Arc<dyn Fn(&SessionNotice) + Send + Sync>;

/// Called after a message the user already saw is removed ahead of a send.
pub type RemovedMessageFn = Arc<dyn Fn() + Send + Sync>;

/// Blocking notice published alongside the conversation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    QuotaExceeded {
        message: String,
        retry_after_ms: Option<u64>,
    },
}

#[derive(Clone, Default)]
pub struct SessionHooks {
    pub pre_send: Option<PreSendFn>,
    pub on_complete: Option<CompletionFn>,
    pub invalidate_lists: Option<InvalidateFn>,
    pub on_quota_exceeded: Option<QuotaExceededFn>,
}

impl SessionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pre_send(mut self, hook: PreSendFn) -> Self {
        self.pre_send = Some(hook);
        self
    }

    pub fn with_on_complete(mut self, hook: CompletionFn) -> Self {
        self.on_complete = Some(hook);
        self
    }

    pub fn with_invalidate_lists(mut self, hook: InvalidateFn) -> Self {
        self.invalidate_lists = Some(hook);
        self
    }

    pub fn with_on_quota_exceeded(mut self, hook: QuotaExceededFn) -> Self {
        self.on_quota_exceeded = Some(hook);
        self
    }
}

impl std::fmt::Debug for SessionHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHooks")
            .field("pre_send", &self.pre_send.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("invalidate_lists", &self.invalidate_lists.is_some())
            .field("on_quota_exceeded", &self.on_quota_exceeded.is_some())
            .finish()
    }
}

/// Per-send options.
#[derive(Clone, Default)]
pub struct SendOptions {
    /// Re-run the assistant turn for the existing last user message.
    pub regenerate: bool,
    pub attachments: Vec<crate::types::FileAttachment>,
    pub on_after_remove_sent_message: Option<RemovedMessageFn>,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn regenerate(mut self) -> Self {
        self.regenerate = true;
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<crate::types::FileAttachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn on_after_remove_sent_message(mut self, hook: RemovedMessageFn) -> Self {
        self.on_after_remove_sent_message = Some(hook);
        self
    }
}

impl std::fmt::Debug for SendOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendOptions")
            .field("regenerate", &self.regenerate)
            .field("attachments", &self.attachments.len())
            .finish()
    }
}
