//! Shared test helpers and a scripted run service.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use threadrun::api::{AssistantApi, CreateMessageRequest, CreateRunRequest, CreateThreadRequest};
use threadrun::config::EngineConfig;
use threadrun::error::{Result, ThreadRunError};
use threadrun::session::ChatSession;
use threadrun::stream::{
    DeltaBlock, MessageDeltaBody, MessageDeltaEvent, RunEventStream, RunStreamEvent, StreamMessage,
};
use threadrun::types::*;

/// One recorded call against the mock service.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateThread(CreateThreadRequest),
    RetrieveThread(String),
    UpdateThread {
        thread_id: String,
        metadata: ThreadMetadata,
    },
    CreateMessage {
        thread_id: String,
        request: CreateMessageRequest,
    },
    ListMessages(String),
    DeleteMessage {
        thread_id: String,
        message_id: String,
    },
    CreateRun {
        thread_id: String,
        request: CreateRunRequest,
    },
    SubmitToolOutputs {
        run_id: String,
        outputs: Vec<ToolOutput>,
    },
    SubmitToolApprovals {
        run_id: String,
        approvals: Vec<ToolApprovalSubmission>,
    },
    CancelRun {
        thread_id: String,
        run_id: String,
    },
    RetrieveRun(String),
}

/// Frames replayed for one stream leg.
pub struct Leg {
    frames: Vec<Result<RunStreamEvent>>,
    hang: bool,
}

impl Leg {
    pub fn frames(frames: Vec<RunStreamEvent>) -> Self {
        Self {
            frames: frames.into_iter().map(Ok).collect(),
            hang: false,
        }
    }

    /// Frames followed by an error item.
    pub fn failing(frames: Vec<RunStreamEvent>, err: ThreadRunError) -> Self {
        let mut leg = Self::frames(frames);
        leg.frames.push(Err(err));
        leg
    }

    /// Frames, then the connection stays open without further frames.
    pub fn hanging(frames: Vec<RunStreamEvent>) -> Self {
        let mut leg = Self::frames(frames);
        leg.hang = true;
        leg
    }

    fn into_stream(self) -> RunEventStream {
        let frames = stream::iter(self.frames);
        if self.hang {
            frames.chain(stream::pending()).boxed()
        } else {
            frames.boxed()
        }
    }
}

/// Scripted [`AssistantApi`]: each stream-opening call pops the next leg.
#[derive(Default)]
pub struct MockApi {
    calls: Mutex<Vec<Call>>,
    legs: Mutex<VecDeque<Leg>>,
    history: Mutex<Vec<MessageRecord>>,
    runs: Mutex<Vec<Run>>,
    threads: Mutex<Vec<Thread>>,
    message_seq: AtomicUsize,
    fail_update_thread: AtomicBool,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_leg(&self, leg: Leg) {
        self.legs.lock().unwrap().push_back(leg);
    }

    pub fn set_history(&self, records: Vec<MessageRecord>) {
        *self.history.lock().unwrap() = records;
    }

    pub fn add_run(&self, run: Run) {
        self.runs.lock().unwrap().push(run);
    }

    pub fn add_thread(&self, thread: Thread) {
        self.threads.lock().unwrap().push(thread);
    }

    pub fn fail_update_thread(&self) {
        self.fail_update_thread.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn cancel_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CancelRun { run_id, .. } => Some(run_id),
                _ => None,
            })
            .collect()
    }

    pub fn approval_submissions(&self) -> Vec<Vec<ToolApprovalSubmission>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SubmitToolApprovals { approvals, .. } => Some(approvals),
                _ => None,
            })
            .collect()
    }

    pub fn deleted_messages(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::DeleteMessage { message_id, .. } => Some(message_id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_leg(&self) -> Result<RunEventStream> {
        let leg = self
            .legs
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ThreadRunError::InvalidState("no scripted stream leg left".into()))?;
        Ok(leg.into_stream())
    }
}

#[async_trait]
impl AssistantApi for MockApi {
    async fn create_thread(&self, request: CreateThreadRequest) -> Result<Thread> {
        self.record(Call::CreateThread(request.clone()));
        Ok(Thread {
            id: "thread_1".into(),
            metadata: request.metadata,
            tool_resources: request.tool_resources,
        })
    }

    async fn retrieve_thread(&self, thread_id: &str) -> Result<Thread> {
        self.record(Call::RetrieveThread(thread_id.into()));
        self.threads
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == thread_id)
            .cloned()
            .ok_or_else(|| ThreadRunError::api(404, "no such thread"))
    }

    async fn update_thread(&self, thread_id: &str, metadata: &ThreadMetadata) -> Result<Thread> {
        self.record(Call::UpdateThread {
            thread_id: thread_id.into(),
            metadata: metadata.clone(),
        });
        if self.fail_update_thread.load(Ordering::SeqCst) {
            return Err(ThreadRunError::api(500, "metadata store unavailable"));
        }
        Ok(Thread {
            id: thread_id.into(),
            metadata: metadata.clone(),
            tool_resources: ToolResources::default(),
        })
    }

    async fn create_message(
        &self,
        thread_id: &str,
        request: CreateMessageRequest,
    ) -> Result<MessageRecord> {
        self.record(Call::CreateMessage {
            thread_id: thread_id.into(),
            request: request.clone(),
        });
        let n = self.message_seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MessageRecord {
            id: format!("msg_user_{n}"),
            role: MessageRole::User,
            content: vec![text_block(&request.content)],
            attachments: request.attachments,
            run_id: None,
            created_at: None,
        })
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<MessageRecord>> {
        self.record(Call::ListMessages(thread_id.into()));
        Ok(self.history.lock().unwrap().clone())
    }

    async fn delete_message(&self, thread_id: &str, message_id: &str) -> Result<()> {
        self.record(Call::DeleteMessage {
            thread_id: thread_id.into(),
            message_id: message_id.into(),
        });
        Ok(())
    }

    async fn create_run_stream(
        &self,
        thread_id: &str,
        request: CreateRunRequest,
    ) -> Result<RunEventStream> {
        self.record(Call::CreateRun {
            thread_id: thread_id.into(),
            request,
        });
        self.next_leg()
    }

    async fn submit_tool_outputs_stream(
        &self,
        _thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<RunEventStream> {
        self.record(Call::SubmitToolOutputs {
            run_id: run_id.into(),
            outputs,
        });
        self.next_leg()
    }

    async fn submit_tool_approvals_stream(
        &self,
        _thread_id: &str,
        run_id: &str,
        approvals: Vec<ToolApprovalSubmission>,
    ) -> Result<RunEventStream> {
        self.record(Call::SubmitToolApprovals {
            run_id: run_id.into(),
            approvals,
        });
        self.next_leg()
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        self.record(Call::CancelRun {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
        });
        Ok(run(run_id, RunStatus::Cancelled))
    }

    async fn retrieve_run(&self, _thread_id: &str, run_id: &str) -> Result<Run> {
        self.record(Call::RetrieveRun(run_id.into()));
        self.runs
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == run_id)
            .cloned()
            .ok_or_else(|| ThreadRunError::api(404, "no such run"))
    }
}

pub fn config() -> EngineConfig {
    EngineConfig::builder()
        .base_url("http://unused.test")
        .assistant_id("asst_1")
        .build()
}

pub fn session(api: &Arc<MockApi>) -> ChatSession {
    ChatSession::new(api.clone(), config(), Assistant::new("asst_1"))
}

pub fn thread_with_approved(tools: &[&str]) -> Thread {
    let mut metadata = ThreadMetadata::seeded("Existing", Some("asst_1"));
    for tool in tools {
        metadata.approve_tool(tool);
    }
    Thread {
        id: "thread_1".into(),
        metadata,
        tool_resources: ToolResources::default(),
    }
}

pub fn text_block(text: &str) -> ContentBlock {
    ContentBlock::Text {
        text: TextValue { value: text.into() },
    }
}

pub fn run(id: &str, status: RunStatus) -> Run {
    Run {
        id: id.into(),
        thread_id: Some("thread_1".into()),
        status,
        required_action: None,
        last_error: None,
        instructions: None,
        tools: Vec::new(),
    }
}

pub fn run_created(id: &str) -> RunStreamEvent {
    RunStreamEvent::RunCreated(run(id, RunStatus::Queued))
}

pub fn run_completed(id: &str) -> RunStreamEvent {
    RunStreamEvent::RunCompleted(run(id, RunStatus::Completed))
}

pub fn run_failed(id: &str, code: &str, message: &str) -> RunStreamEvent {
    let mut failed = run(id, RunStatus::Failed);
    failed.last_error = Some(RunError {
        code: Some(code.into()),
        message: message.into(),
    });
    RunStreamEvent::RunFailed(failed)
}

pub fn requires_outputs(run_id: &str, calls: Vec<(&str, &str, &str)>) -> RunStreamEvent {
    let mut r = run(run_id, RunStatus::RequiresAction);
    r.required_action = Some(RequiredAction::SubmitToolOutputs {
        submit_tool_outputs: ToolOutputsRequest {
            tool_calls: calls
                .into_iter()
                .map(|(id, name, arguments)| FunctionCallRequest {
                    id: id.into(),
                    kind: "function".into(),
                    function: FunctionInvocation {
                        name: name.into(),
                        arguments: arguments.into(),
                    },
                })
                .collect(),
        },
    });
    RunStreamEvent::RunRequiresAction(r)
}

/// `(approval id, tool id)` pairs.
pub fn requires_approvals(run_id: &str, approvals: &[(&str, &str)]) -> RunStreamEvent {
    let mut r = run(run_id, RunStatus::RequiresAction);
    r.required_action = Some(RequiredAction::SubmitToolApprovals {
        submit_tool_approvals: ToolApprovalsRequest {
            tool_approvals: approvals
                .iter()
                .map(|(id, tool_id)| ToolApprovalRequest {
                    id: (*id).into(),
                    tool_id: (*tool_id).into(),
                    tool_call_id: None,
                    arguments: None,
                })
                .collect(),
        },
    });
    RunStreamEvent::RunRequiresAction(r)
}

pub fn message_created(id: &str) -> RunStreamEvent {
    RunStreamEvent::MessageCreated(StreamMessage {
        id: id.into(),
        content: Vec::new(),
    })
}

pub fn message_delta(id: &str, text: &str) -> RunStreamEvent {
    RunStreamEvent::MessageDelta(MessageDeltaEvent {
        id: id.into(),
        delta: MessageDeltaBody {
            content: vec![DeltaBlock {
                index: 0,
                kind: "text".into(),
                text: Some(TextValue { value: text.into() }),
            }],
        },
    })
}

pub fn message_completed(id: &str, text: &str) -> RunStreamEvent {
    RunStreamEvent::MessageCompleted(StreamMessage {
        id: id.into(),
        content: vec![text_block(text)],
    })
}

/// A full reply leg: created, one delta per piece, completed.
pub fn reply(run_id: &str, message_id: &str, pieces: &[&str]) -> Leg {
    let mut frames = vec![run_created(run_id), message_created(message_id)];
    frames.extend(pieces.iter().map(|p| message_delta(message_id, p)));
    frames.push(message_completed(message_id, &pieces.concat()));
    frames.push(run_completed(run_id));
    Leg::frames(frames)
}

pub fn quota_error() -> ThreadRunError {
    ThreadRunError::QuotaExceeded {
        message: "You exceeded your current quota".into(),
        retry_after_ms: None,
    }
}

pub fn last_assistant(session: &ChatSession) -> AssistantMessage {
    session
        .messages()
        .last()
        .and_then(ChatMessage::as_assistant)
        .cloned()
        .expect("trailing assistant message")
}
