//! Applies run-stream frames to the draft assistant message.

use std::collections::HashSet;

use tracing::debug;

use super::controller::{RunController, RunTicket};
use crate::error::{Result, ThreadRunError};
use crate::session::store::MessageStore;
use crate::stream::RunStreamEvent;
use crate::types::{blocks_text, MessageKey, Run};

/// What the stream loop should do after a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Continue,
    /// The run stopped for client input; the stream leg is over.
    RequiresAction(Run),
    /// The run completed; the stream leg is over.
    Completed,
}

/// Maps frames of one send onto the message store and controller.
///
/// One dispatcher lives for the whole send, across every resumed stream
/// leg, so message identity is tracked from the first frame on.
pub struct RunEventDispatcher<'a> {
    store: &'a MessageStore,
    controller: &'a RunController,
    ticket: &'a RunTicket,
    draft: MessageKey,
    active_message: Option<String>,
    /// Messages whose text already reached the draft through created/delta frames.
    streamed: HashSet<String>,
}

impl<'a> RunEventDispatcher<'a> {
    pub fn new(
        store: &'a MessageStore,
        controller: &'a RunController,
        ticket: &'a RunTicket,
        draft: MessageKey,
    ) -> Self {
        Self {
            store,
            controller,
            ticket,
            draft,
            active_message: None,
            streamed: HashSet::new(),
        }
    }

    /// Apply one frame. Frames reaching a stale or cancelled run are refused
    /// with [`ThreadRunError::Cancelled`] before anything is written.
    pub fn apply(&mut self, event: RunStreamEvent) -> Result<DispatchOutcome> {
        if !self.controller.is_current(self.ticket) {
            return Err(ThreadRunError::Cancelled);
        }
        debug!(event = %event.name(), "run frame");

        match event {
            RunStreamEvent::RunCreated(run)
            | RunStreamEvent::RunQueued(run)
            | RunStreamEvent::RunInProgress(run) => {
                self.capture_run(&run);
                Ok(DispatchOutcome::Continue)
            }
            RunStreamEvent::RunRequiresAction(run) => {
                if run.required_action.is_none() {
                    return Err(ThreadRunError::Protocol(format!(
                        "run {} requires action but names none",
                        run.id
                    )));
                }
                self.capture_run(&run);
                self.controller.mark_waiting(self.ticket, &run.id);
                Ok(DispatchOutcome::RequiresAction(run))
            }
            RunStreamEvent::RunCompleted(run) => {
                self.capture_run(&run);
                Ok(DispatchOutcome::Completed)
            }
            RunStreamEvent::RunFailed(run) => {
                self.capture_run(&run);
                let (code, message) = match run.last_error {
                    Some(err) => (err.code, err.message),
                    None => (None, "run failed".to_string()),
                };
                Err(ThreadRunError::run_failed(code.as_deref(), message))
            }
            RunStreamEvent::RunExpired(run) => {
                self.capture_run(&run);
                Err(ThreadRunError::RunExpired)
            }
            RunStreamEvent::MessageCreated(message) => {
                let text = blocks_text(&message.content);
                self.store.update_assistant(self.draft, |draft| {
                    if draft.server_id.is_none() {
                        draft.server_id = Some(message.id.clone());
                    }
                    append_content(draft, &text);
                });
                if !text.is_empty() {
                    self.streamed.insert(message.id.clone());
                }
                self.active_message = Some(message.id);
                Ok(DispatchOutcome::Continue)
            }
            RunStreamEvent::MessageDelta(delta) => {
                if self.active_message.as_deref() != Some(delta.id.as_str()) {
                    return Err(ThreadRunError::Protocol(format!(
                        "delta for message {} without a preceding thread.message.created",
                        delta.id
                    )));
                }
                let mut appended = false;
                self.store.update_assistant(self.draft, |draft| {
                    for segment in delta.text_segments() {
                        appended |= !segment.is_empty();
                        append_content(draft, segment);
                    }
                });
                if appended {
                    self.streamed.insert(delta.id);
                }
                Ok(DispatchOutcome::Continue)
            }
            RunStreamEvent::MessageCompleted(message) => {
                // A completed record stands in for deltas that never came.
                if !self.streamed.contains(&message.id) {
                    let text = blocks_text(&message.content);
                    self.store
                        .update_assistant(self.draft, |draft| append_content(draft, &text));
                    self.streamed.insert(message.id.clone());
                }
                if self.active_message.as_deref() == Some(message.id.as_str()) {
                    self.active_message = None;
                }
                Ok(DispatchOutcome::Continue)
            }
            RunStreamEvent::StepCreated(step) | RunStreamEvent::StepCompleted(step) => {
                self.store
                    .update_assistant(self.draft, |draft| draft.plan.upsert_step(step));
                Ok(DispatchOutcome::Continue)
            }
            RunStreamEvent::StepDelta(delta) => {
                self.store.update_assistant(self.draft, |draft| {
                    draft.plan.apply_step_delta(&delta.id, delta.delta)
                });
                Ok(DispatchOutcome::Continue)
            }
            RunStreamEvent::Retry => {
                self.streamed.clear();
                self.store
                    .update_assistant(self.draft, |draft| draft.content.clear());
                Ok(DispatchOutcome::Continue)
            }
            RunStreamEvent::Unknown { event } => {
                debug!(event = %event, "ignoring unknown run frame");
                Ok(DispatchOutcome::Continue)
            }
        }
    }

    fn capture_run(&self, run: &Run) {
        self.controller.record_run_id(self.ticket, &run.id);
        self.store.update_assistant(self.draft, |draft| {
            if draft.run_id.as_deref() != Some(run.id.as_str()) {
                draft.run_id = Some(run.id.clone());
            }
        });
    }
}

fn append_content(draft: &mut crate::types::AssistantMessage, text: &str) {
    if text.is_empty() {
        return;
    }
    draft.content.push_str(text);
    draft.plan.pending = false;
}
