//! Conversation session: message store, hooks and the send orchestrator.

pub mod hooks;
pub mod runtime;
pub mod store;

pub use hooks::{
    CompletionFn, InvalidateFn, PreSendFn, QuotaExceededFn, RemovedMessageFn, SendOptions,
    SessionHooks, SessionNotice,
};
pub use runtime::{ChatSession, SendOutcome, SessionSnapshot};
pub use store::MessageStore;
