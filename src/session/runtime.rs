//! Conversation session: the send orchestrator and its observable state.
//!
//! A [`ChatSession`] owns one [`RunController`] and one [`MessageStore`] for
//! a single thread. All methods take `&self`; share the session behind an
//! `Arc` to drive sends, cancellation and approval decisions from
//! different tasks.
//!
//! ```ignore
//! let session = Arc::new(ChatSession::new(api, config, assistant));
//! let outcome = session.send_message("Hello", SendOptions::new()).await;
//! assert!(!outcome.aborted);
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::hooks::{SendOptions, SessionHooks, SessionNotice};
use super::store::MessageStore;
use crate::api::{AssistantApi, CreateMessageRequest, CreateRunRequest, CreateThreadRequest};
use crate::config::EngineConfig;
use crate::error::{ErrorCategory, Result, ThreadRunError};
use crate::run_loop::{
    run_to_completion, ApprovalDecision, ApprovalGate, ControllerState, ControllerStatus,
    RunController, RunEventDispatcher, RunTicket, ToolActionResolver, ToolApproval,
};
use crate::tools::{select_tools, ClientFunctions};
use crate::types::{
    Assistant, AssistantMessage, ChatMessage, MessageError, MessageErrorKind, MessageKey, Plan,
    Run, Thread, ThreadMetadata, ToolResources, UserMessage,
};

/// Result of a send.
#[derive(Debug)]
pub struct SendOutcome {
    /// The send was refused (run in flight) or cancelled.
    pub aborted: bool,
    pub thread: Option<Thread>,
    /// Error attached to the conversation, when the send failed.
    pub failure: Option<ThreadRunError>,
}

impl SendOutcome {
    fn refused() -> Self {
        Self {
            aborted: true,
            thread: None,
            failure: None,
        }
    }
}

/// Point-in-time view for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub status: ControllerStatus,
    pub messages: Vec<ChatMessage>,
    /// Plan of the trailing assistant message.
    pub plan: Option<Plan>,
    pub pending_approval: Option<ToolApproval>,
    pub notice: Option<SessionNotice>,
}

/// Where a send currently stands, threaded through the orchestration steps.
struct SendContext {
    ticket: RunTicket,
    text: String,
    options: SendOptions,
    user: Option<MessageKey>,
    draft: MessageKey,
}

pub struct ChatSession {
    api: Arc<dyn AssistantApi>,
    config: EngineConfig,
    assistant: Assistant,
    functions: ClientFunctions,
    hooks: SessionHooks,
    controller: RunController,
    store: MessageStore,
    gate: ApprovalGate,
    thread: watch::Sender<Option<Thread>>,
    notice: watch::Sender<Option<SessionNotice>>,
}

impl ChatSession {
    pub fn new(api: Arc<dyn AssistantApi>, config: EngineConfig, assistant: Assistant) -> Self {
        let (thread, _) = watch::channel(None);
        let (notice, _) = watch::channel(None);
        Self {
            api,
            config,
            assistant,
            functions: ClientFunctions::new(),
            hooks: SessionHooks::new(),
            controller: RunController::new(),
            store: MessageStore::new(),
            gate: ApprovalGate::new(),
            thread,
            notice,
        }
    }

    pub fn with_functions(mut self, functions: ClientFunctions) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_hooks(mut self, hooks: SessionHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Bind an existing thread instead of creating one on first send.
    pub fn with_thread(self, thread: Thread) -> Self {
        self.thread.send_replace(Some(thread));
        self
    }

    pub fn status(&self) -> ControllerStatus {
        self.controller.status()
    }

    pub fn thread(&self) -> Option<Thread> {
        self.thread.borrow().clone()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.store.snapshot()
    }

    pub fn pending_approval(&self) -> Option<ToolApproval> {
        self.gate.pending()
    }

    pub fn notice(&self) -> Option<SessionNotice> {
        self.notice.borrow().clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let messages = self.store.snapshot();
        let plan = messages
            .last()
            .and_then(ChatMessage::as_assistant)
            .map(|m| m.plan.clone());
        SessionSnapshot {
            status: self.controller.status(),
            messages,
            plan,
            pending_approval: self.gate.pending(),
            notice: self.notice(),
        }
    }

    pub fn watch_status(&self) -> watch::Receiver<ControllerState> {
        self.controller.watch()
    }

    pub fn watch_messages(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.store.watch()
    }

    pub fn watch_pending_approval(&self) -> watch::Receiver<Option<ToolApproval>> {
        self.gate.watch()
    }

    pub fn watch_notice(&self) -> watch::Receiver<Option<SessionNotice>> {
        self.notice.subscribe()
    }

    pub fn watch_thread(&self) -> watch::Receiver<Option<Thread>> {
        self.thread.subscribe()
    }

    pub fn dismiss_notice(&self) {
        self.notice.send_if_modified(|n| n.take().is_some());
    }

    /// Resolve the pending approval. Returns `false` when none is waiting.
    pub fn decide_approval(&self, decision: ApprovalDecision) -> bool {
        self.gate.decide(decision)
    }

    /// Request cancellation of the in-flight run. The send that owns the run
    /// performs the cleanup. Returns `false` when nothing was running.
    pub fn cancel(&self) -> bool {
        self.controller.abort()
    }

    /// Send `text` as a new user turn.
    ///
    /// While a run is in flight this is a no-op returning an aborted outcome
    /// without a thread. Failures are attached to the conversation and
    /// reported in [`SendOutcome::failure`]; they never surface as `Err`.
    pub async fn send_message(&self, text: impl Into<String>, options: SendOptions) -> SendOutcome {
        let Some(ticket) = self.controller.try_begin() else {
            debug!("send ignored: a run is in flight");
            return SendOutcome::refused();
        };
        self.run_send(ticket, text.into(), options).await
    }

    /// Re-run the assistant turn for the last user message.
    ///
    /// The trailing assistant message is removed locally and, when it was
    /// persisted, remotely. Refused like [`send_message`](Self::send_message)
    /// while a run is in flight or when there is nothing to regenerate.
    pub async fn regenerate(&self, options: SendOptions) -> SendOutcome {
        let Some(ticket) = self.controller.try_begin() else {
            debug!("regenerate ignored: a run is in flight");
            return SendOutcome::refused();
        };

        let target = self.store.read(|messages| {
            let (last, rest) = messages.split_last()?;
            let assistant = last.as_assistant()?;
            let prompt = rest.iter().rev().find_map(ChatMessage::as_user)?;
            Some((
                assistant.key,
                assistant.server_id.clone(),
                prompt.content.clone(),
                prompt.attachments.clone(),
            ))
        });
        let Some((key, server_id, prompt, attachments)) = target else {
            debug!("regenerate ignored: no assistant reply to replace");
            self.controller.finish(&ticket);
            return SendOutcome::refused();
        };

        self.store.remove(key);
        if let (Some(message_id), Some(thread)) = (server_id, self.thread()) {
            if let Err(err) = self.api.delete_message(&thread.id, &message_id).await {
                warn!(thread_id = %thread.id, message_id = %message_id, error = %err, "failed to delete replaced reply");
            }
        }
        if let Some(hook) = &options.on_after_remove_sent_message {
            hook();
        }

        let mut options = options;
        options.regenerate = true;
        if options.attachments.is_empty() {
            // The replayed turn needs the same knowledge-store tools.
            options.attachments = attachments;
        }
        self.run_send(ticket, prompt, options).await
    }

    /// Fetch a persisted thread and bind it, metadata included.
    ///
    /// The message list is emptied when the session switches to a different
    /// thread; call [`load_history`](Self::load_history) to fill it.
    pub async fn open_thread(&self, thread_id: &str) -> Result<Thread> {
        let ticket = self
            .controller
            .try_begin()
            .ok_or_else(|| ThreadRunError::InvalidState("a run is in flight".into()))?;

        let result = ticket.guard(self.api.retrieve_thread(thread_id)).await;
        let opened = match result {
            Ok(thread) if self.controller.is_current(&ticket) => {
                let previous = self.thread.send_replace(Some(thread.clone()));
                if previous.is_some_and(|p| p.id != thread.id) {
                    self.store.replace_all(Vec::new());
                }
                debug!(thread_id = %thread.id, "opened thread");
                Ok(thread)
            }
            Ok(_) => Err(ThreadRunError::Cancelled),
            Err(err) => Err(err),
        };
        self.controller.finish(&ticket);
        opened
    }

    /// Replace the list with the bound thread's persisted messages.
    pub async fn load_history(&self) -> Result<usize> {
        let thread = self
            .thread()
            .ok_or_else(|| ThreadRunError::InvalidState("no thread bound to the session".into()))?;
        let ticket = self
            .controller
            .try_begin()
            .ok_or_else(|| ThreadRunError::InvalidState("a run is in flight".into()))?;

        let result = ticket.guard(self.api.list_messages(&thread.id)).await;
        let loaded = match result {
            Ok(records) if self.controller.is_current(&ticket) => {
                let messages: Vec<ChatMessage> = records
                    .into_iter()
                    .map(|record| record.into_chat_message())
                    .collect();
                let count = messages.len();
                self.store.replace_all(messages);
                debug!(thread_id = %thread.id, count, "loaded history");
                Ok(count)
            }
            Ok(_) => Err(ThreadRunError::Cancelled),
            Err(err) => Err(err),
        };
        self.controller.finish(&ticket);
        loaded
    }

    /// Fetch (once) and cache the run behind an assistant message.
    pub async fn load_run_detail(&self, key: MessageKey) -> Result<Run> {
        let message = self
            .store
            .get(key)
            .ok_or_else(|| ThreadRunError::InvalidState(format!("unknown message {key}")))?;
        let assistant = message.as_assistant().ok_or_else(|| {
            ThreadRunError::InvalidState(format!("message {key} is not an assistant reply"))
        })?;
        if let Some(run) = &assistant.run_detail {
            return Ok(run.clone());
        }
        let run_id = assistant
            .run_id
            .clone()
            .ok_or_else(|| ThreadRunError::InvalidState(format!("message {key} has no run")))?;
        let thread = self
            .thread()
            .ok_or_else(|| ThreadRunError::InvalidState("no thread bound to the session".into()))?;

        let run = self.api.retrieve_run(&thread.id, &run_id).await?;
        self.store
            .update_assistant(key, |m| m.run_detail = Some(run.clone()));
        Ok(run)
    }

    async fn run_send(&self, ticket: RunTicket, text: String, options: SendOptions) -> SendOutcome {
        let user = (!options.regenerate).then(|| self.insert_user_message(&text, &options));
        let placeholder = AssistantMessage::placeholder();
        let draft = placeholder.key;
        self.store.push(ChatMessage::Assistant(placeholder));

        let cx = SendContext {
            ticket,
            text,
            options,
            user,
            draft,
        };
        info!(regenerate = cx.options.regenerate, "send started");

        let result = self.execute(&cx).await;
        let cancelled = cx.ticket.is_cancelled();
        let failure = match result {
            Ok(()) => None,
            Err(err) if err.is_cancellation() || cancelled => None,
            Err(err) => {
                self.handle_failure(&cx, &err).await;
                Some(err)
            }
        };
        if cancelled {
            self.cleanup_cancelled(&cx).await;
        }
        let thread = self.finalize(&cx);

        SendOutcome {
            aborted: cancelled,
            thread,
            failure,
        }
    }

    /// Append the optimistic user message, dropping a trailing user message
    /// that never reached the server.
    fn insert_user_message(&self, text: &str, options: &SendOptions) -> MessageKey {
        let message = UserMessage::new(text, options.attachments.clone());
        let key = message.key;
        let discarded = self.store.update(|messages| {
            let stray = matches!(
                messages.last(),
                Some(ChatMessage::User(prev)) if prev.server_id.is_none()
            );
            if stray {
                messages.pop();
            }
            messages.push(ChatMessage::User(message));
            stray
        });
        if discarded {
            debug!("discarded unsent trailing user message");
            if let Some(hook) = &options.on_after_remove_sent_message {
                hook();
            }
        }
        key
    }

    async fn execute(&self, cx: &SendContext) -> Result<()> {
        let thread = self.resolve_thread(&cx.text).await?;
        self.ensure_current(&cx.ticket)?;

        if let Some(pre_send) = &self.hooks.pre_send {
            pre_send(thread.clone(), self.store.snapshot())
                .await
                .map_err(|err| match err {
                    ThreadRunError::HookFailed(_) => err,
                    other => ThreadRunError::HookFailed(other.to_string()),
                })?;
            self.ensure_current(&cx.ticket)?;
        }

        if let Some(user) = cx.user {
            let request = CreateMessageRequest::user(cx.text.clone(), cx.options.attachments.clone());
            let record = self.api.create_message(&thread.id, request).await?;
            self.store.update_message(user, |m| m.set_server_id(record.id));
            self.ensure_current(&cx.ticket)?;
        }

        let selection = select_tools(
            &self.assistant,
            &cx.options.attachments,
            self.config.features,
            &thread.metadata,
        );
        let tool_resources = (!selection.extra_knowledge_stores.is_empty())
            .then(|| ToolResources::with_knowledge_stores(selection.extra_knowledge_stores));
        let request = CreateRunRequest {
            assistant_id: self.assistant.id.clone(),
            instructions: self.assistant.instructions.clone(),
            tools: selection.tools,
            required_approvals: selection.required_approvals,
            tool_resources,
        };
        self.ensure_current(&cx.ticket)?;

        info!(thread_id = %thread.id, tools = request.tools.len(), "creating run");
        let stream = cx
            .ticket
            .guard(self.api.create_run_stream(&thread.id, request))
            .await?;

        let mut dispatcher =
            RunEventDispatcher::new(&self.store, &self.controller, &cx.ticket, cx.draft);
        let mut resolver = ToolActionResolver::new(
            self.api.as_ref(),
            &self.functions,
            &self.gate,
            &self.thread,
            &self.controller,
            &cx.ticket,
        );
        run_to_completion(&thread.id, stream, &mut dispatcher, &mut resolver, &cx.ticket).await?;
        info!(thread_id = %thread.id, "run finished");
        Ok(())
    }

    async fn resolve_thread(&self, text: &str) -> Result<Thread> {
        let existing = self.thread.borrow().clone();
        if let Some(thread) = existing {
            return Ok(thread);
        }
        let title = truncate_title(text, self.config.title_max_chars);
        let request = CreateThreadRequest {
            metadata: ThreadMetadata::seeded(title, Some(&self.assistant.id)),
            tool_resources: ToolResources::default(),
        };
        let thread = self.api.create_thread(request).await?;
        info!(thread_id = %thread.id, "created thread");
        self.thread.send_replace(Some(thread.clone()));
        Ok(thread)
    }

    async fn handle_failure(&self, cx: &SendContext, err: &ThreadRunError) {
        if !err.is_quota_exceeded() {
            warn!(error = %err, "send failed");
            let error = message_error(err);
            self.store
                .update_assistant(cx.draft, |m| m.error = Some(error));
            return;
        }

        let notice = match err {
            ThreadRunError::QuotaExceeded {
                message,
                retry_after_ms,
            } => SessionNotice::QuotaExceeded {
                message: message.clone(),
                retry_after_ms: *retry_after_ms,
            },
            other => SessionNotice::QuotaExceeded {
                message: other.to_string(),
                retry_after_ms: None,
            },
        };
        warn!(error = %err, "quota exceeded");
        self.notice.send_replace(Some(notice.clone()));
        if let Some(hook) = &self.hooks.on_quota_exceeded {
            hook(&notice);
        }

        let has_partial = self
            .store
            .get(cx.draft)
            .is_some_and(|m| !m.content().is_empty());
        if cx.options.regenerate && has_partial {
            debug!("keeping partial regenerated reply");
            return;
        }
        self.rollback(cx).await;
    }

    /// Remove the optimistic pair, deleting a persisted user message.
    async fn rollback(&self, cx: &SendContext) {
        self.store.remove(cx.draft);
        let Some(user) = cx.user else {
            return;
        };
        let removed = self.store.remove(user);
        let server_id = removed.as_ref().and_then(|m| m.server_id().map(str::to_string));
        if let (Some(message_id), Some(thread)) = (server_id, self.thread()) {
            if let Err(err) = self.api.delete_message(&thread.id, &message_id).await {
                warn!(thread_id = %thread.id, message_id = %message_id, error = %err, "failed to delete rolled back message");
            }
        }
    }

    async fn cleanup_cancelled(&self, cx: &SendContext) {
        let run_id = self.controller.run_id();
        info!(run_id = ?run_id, "run cancelled");
        if let (Some(run_id), Some(thread)) = (run_id, self.thread()) {
            if let Err(err) = self.api.cancel_run(&thread.id, &run_id).await {
                warn!(thread_id = %thread.id, run_id = %run_id, error = %err, "failed to cancel run");
            }
        }

        if cx.options.regenerate {
            return;
        }
        let blank = self
            .store
            .get(cx.draft)
            .and_then(|m| m.as_assistant().map(AssistantMessage::is_blank))
            .unwrap_or(false);
        if blank {
            self.store.remove(cx.draft);
            if let Some(user) = cx.user {
                self.store.remove(user);
            }
        }
    }

    /// Cleanup shared by every outcome.
    fn finalize(&self, cx: &SendContext) -> Option<Thread> {
        let mut content = String::new();
        self.store.update_assistant(cx.draft, |m| {
            m.pending = false;
            m.plan.pending = false;
            content = m.content.clone();
        });
        self.gate.clear();
        self.controller.finish(&cx.ticket);

        if let Some(invalidate) = &self.hooks.invalidate_lists {
            invalidate();
        }
        let thread = self.thread();
        if let Some(on_complete) = &self.hooks.on_complete {
            on_complete(thread.clone(), content);
        }
        thread
    }

    fn ensure_current(&self, ticket: &RunTicket) -> Result<()> {
        if self.controller.is_current(ticket) {
            Ok(())
        } else {
            Err(ThreadRunError::Cancelled)
        }
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("assistant", &self.assistant.id)
            .field("status", &self.controller.status())
            .field("messages", &self.store.len())
            .finish()
    }
}

/// First `max_chars` characters of the prompt, trimmed.
fn truncate_title(text: &str, max_chars: usize) -> String {
    let title: String = text.trim().chars().take(max_chars).collect();
    title.trim_end().to_string()
}

fn message_error(err: &ThreadRunError) -> MessageError {
    let kind = match err.category() {
        ErrorCategory::Network => MessageErrorKind::Network,
        ErrorCategory::Run => MessageErrorKind::RunFailed,
        ErrorCategory::Protocol => MessageErrorKind::Protocol,
        _ => MessageErrorKind::Other,
    };
    let message = match err {
        ThreadRunError::RunFailed { message, .. } => message.clone(),
        other => other.to_string(),
    };
    MessageError { kind, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_are_truncated_by_characters() {
        assert_eq!(truncate_title("Hello", 50), "Hello");
        assert_eq!(truncate_title("  héllo wörld  ", 7), "héllo w");
        assert_eq!(truncate_title("ab cd", 3), "ab");
    }

    #[test]
    fn run_failures_keep_the_server_message() {
        let err = ThreadRunError::run_failed(Some("server_error"), "model overloaded");
        let error = message_error(&err);
        assert_eq!(error.kind, MessageErrorKind::RunFailed);
        assert_eq!(error.message, "model overloaded");

        let error = message_error(&ThreadRunError::Protocol("bad frame".into()));
        assert_eq!(error.kind, MessageErrorKind::Protocol);
    }
}
