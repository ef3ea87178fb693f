//! Typed run-stream frames.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{Result, ThreadRunError};
use crate::types::{ContentBlock, Run, Step, StepDelta, TextValue};

/// Event names recognised on the run stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum RunEventName {
    #[strum(serialize = "thread.run.created")]
    RunCreated,
    #[strum(serialize = "thread.run.queued")]
    RunQueued,
    #[strum(serialize = "thread.run.in_progress")]
    RunInProgress,
    #[strum(serialize = "thread.run.requires_action")]
    RunRequiresAction,
    #[strum(serialize = "thread.run.completed")]
    RunCompleted,
    #[strum(serialize = "thread.run.failed")]
    RunFailed,
    #[strum(serialize = "thread.run.expired")]
    RunExpired,
    #[strum(serialize = "thread.message.created")]
    MessageCreated,
    #[strum(serialize = "thread.message.delta")]
    MessageDelta,
    #[strum(serialize = "thread.message.completed")]
    MessageCompleted,
    #[strum(serialize = "thread.run.step.created")]
    StepCreated,
    #[strum(serialize = "thread.run.step.delta")]
    StepDelta,
    #[strum(serialize = "thread.run.step.completed")]
    StepCompleted,
    #[strum(serialize = "retry")]
    Retry,
}

/// Message object carried by `thread.message.created` / `.completed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamMessage {
    pub id: String,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageDeltaEvent {
    pub id: String,
    pub delta: MessageDeltaBody,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessageDeltaBody {
    #[serde(default)]
    pub content: Vec<DeltaBlock>,
}

/// One content fragment of a message delta.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeltaBlock {
    #[serde(default)]
    pub index: usize,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextValue>,
}

impl MessageDeltaEvent {
    /// Text segments of this fragment, in order.
    pub fn text_segments(&self) -> impl Iterator<Item = &str> {
        self.delta
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_ref().map(|t| t.value.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepDeltaEvent {
    pub id: String,
    #[serde(default)]
    pub delta: StepDelta,
}

/// A decoded frame from the run stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RunStreamEvent {
    RunCreated(Run),
    RunQueued(Run),
    RunInProgress(Run),
    RunRequiresAction(Run),
    RunCompleted(Run),
    RunFailed(Run),
    RunExpired(Run),
    MessageCreated(StreamMessage),
    MessageDelta(MessageDeltaEvent),
    MessageCompleted(StreamMessage),
    StepCreated(Step),
    StepDelta(StepDeltaEvent),
    StepCompleted(Step),
    /// The server is about to resend the whole message.
    Retry,
    /// A frame this client does not know; kept for tracing only.
    Unknown { event: String },
}

impl RunStreamEvent {
    /// Decode one `event:`/`data:` pair.
    pub fn decode(event: &str, data: &str) -> Result<Self> {
        let Ok(name) = event.parse::<RunEventName>() else {
            return Ok(Self::Unknown {
                event: event.to_string(),
            });
        };
        let decoded = match name {
            RunEventName::RunCreated => Self::RunCreated(parse(name, data)?),
            RunEventName::RunQueued => Self::RunQueued(parse(name, data)?),
            RunEventName::RunInProgress => Self::RunInProgress(parse(name, data)?),
            RunEventName::RunRequiresAction => Self::RunRequiresAction(parse(name, data)?),
            RunEventName::RunCompleted => Self::RunCompleted(parse(name, data)?),
            RunEventName::RunFailed => Self::RunFailed(parse(name, data)?),
            RunEventName::RunExpired => Self::RunExpired(parse(name, data)?),
            RunEventName::MessageCreated => Self::MessageCreated(parse(name, data)?),
            RunEventName::MessageDelta => Self::MessageDelta(parse(name, data)?),
            RunEventName::MessageCompleted => Self::MessageCompleted(parse(name, data)?),
            RunEventName::StepCreated => Self::StepCreated(parse(name, data)?),
            RunEventName::StepDelta => Self::StepDelta(parse(name, data)?),
            RunEventName::StepCompleted => Self::StepCompleted(parse(name, data)?),
            RunEventName::Retry => Self::Retry,
        };
        Ok(decoded)
    }

    /// Wire name of the frame.
    pub fn name(&self) -> String {
        let name = match self {
            Self::RunCreated(_) => RunEventName::RunCreated,
            Self::RunQueued(_) => RunEventName::RunQueued,
            Self::RunInProgress(_) => RunEventName::RunInProgress,
            Self::RunRequiresAction(_) => RunEventName::RunRequiresAction,
            Self::RunCompleted(_) => RunEventName::RunCompleted,
            Self::RunFailed(_) => RunEventName::RunFailed,
            Self::RunExpired(_) => RunEventName::RunExpired,
            Self::MessageCreated(_) => RunEventName::MessageCreated,
            Self::MessageDelta(_) => RunEventName::MessageDelta,
            Self::MessageCompleted(_) => RunEventName::MessageCompleted,
            Self::StepCreated(_) => RunEventName::StepCreated,
            Self::StepDelta(_) => RunEventName::StepDelta,
            Self::StepCompleted(_) => RunEventName::StepCompleted,
            Self::Retry => RunEventName::Retry,
            Self::Unknown { event } => return event.clone(),
        };
        name.to_string()
    }
}

fn parse<T: serde::de::DeserializeOwned>(name: RunEventName, data: &str) -> Result<T> {
    serde_json::from_str(data)
        .map_err(|e| ThreadRunError::Protocol(format!("malformed `{name}` payload: {e}")))
}
