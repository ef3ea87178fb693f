//! Plan and step assembly.
//!
//! A run is decomposed into steps, each of which may carry a thought and a
//! list of tool calls. Steps arrive fragmented over several frames: the
//! first sighting of a step id fixes its position, later frames patch the
//! existing record in place.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Kind of tool a call targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolCallKind {
    System,
    User,
    Function,
    CodeInterpreter,
    FileSearch,
}

/// Lifecycle status shared by steps and tool calls.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepStatus {
    #[default]
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepError {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

/// A single tool invocation inside a step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ToolCallKind,
    #[serde(default)]
    pub tool_id: String,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub status: StepStatus,
    #[serde(default)]
    pub caption: Option<String>,
}

/// Partial tool-call fields carried by a step delta.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolCallDelta {
    pub index: usize,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<ToolCallKind>,
    #[serde(default)]
    pub tool_id: Option<String>,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub status: Option<StepStatus>,
    #[serde(default)]
    pub caption: Option<String>,
}

impl ToolCallDelta {
    fn into_call(self) -> ToolCall {
        ToolCall {
            index: self.index,
            id: self.id.unwrap_or_default(),
            kind: self.kind.unwrap_or(ToolCallKind::Function),
            tool_id: self.tool_id.unwrap_or_default(),
            input: self.input.unwrap_or_default(),
            output: self.output,
            status: self.status.unwrap_or_default(),
            caption: self.caption,
        }
    }
}

impl ToolCall {
    /// Merge a partial update: input and output fragments append, scalar
    /// fields overwrite when present.
    fn merge(&mut self, delta: ToolCallDelta) {
        if let Some(id) = delta.id {
            self.id = id;
        }
        if let Some(kind) = delta.kind {
            self.kind = kind;
        }
        if let Some(tool_id) = delta.tool_id {
            self.tool_id = tool_id;
        }
        if let Some(input) = delta.input {
            self.input.push_str(&input);
        }
        if let Some(output) = delta.output {
            self.output.get_or_insert_with(String::new).push_str(&output);
        }
        if let Some(status) = delta.status {
            self.status = status;
        }
        if delta.caption.is_some() {
            self.caption = delta.caption;
        }
    }
}

/// One reasoning/tool-using step of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    pub id: String,
    #[serde(default)]
    pub thought: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub status: StepStatus,
    #[serde(default)]
    pub last_error: Option<StepError>,
}

impl Step {
    /// Mirror the status of the last tool call onto the step.
    fn sync_status(&mut self) {
        if let Some(last) = self.tool_calls.last() {
            self.status = last.status;
        }
    }

    fn merge_calls(&mut self, deltas: Vec<ToolCallDelta>) {
        for delta in deltas {
            match self.tool_calls.iter_mut().find(|c| c.index == delta.index) {
                Some(call) => call.merge(delta),
                None => self.tool_calls.push(delta.into_call()),
            }
        }
        self.sync_status();
    }
}

/// Incremental fields of a `thread.run.step.delta` frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StepDelta {
    #[serde(default)]
    pub thought: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// Ordered steps of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub steps: Vec<Step>,
    /// True until the assistant produced any content.
    pub pending: bool,
}

impl Default for Plan {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            pending: true,
        }
    }
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Insert or update a full step record.
    ///
    /// An unseen id appends; a seen id keeps its position. Fields absent from
    /// the incoming record (thought, calls, error) do not erase what earlier
    /// fragments already delivered.
    pub fn upsert_step(&mut self, incoming: Step) {
        match self.steps.iter_mut().find(|s| s.id == incoming.id) {
            Some(existing) => {
                if incoming.thought.is_some() {
                    existing.thought = incoming.thought;
                }
                if !incoming.tool_calls.is_empty() {
                    existing.tool_calls = incoming.tool_calls;
                }
                if incoming.last_error.is_some() {
                    existing.last_error = incoming.last_error;
                }
                existing.status = incoming.status;
                existing.sync_status();
            }
            None => {
                let mut step = incoming;
                step.sync_status();
                self.steps.push(step);
            }
        }
    }

    /// Apply a fragment to the step with `id`, creating it at the end if the
    /// delta is the first sighting.
    pub fn apply_step_delta(&mut self, id: &str, delta: StepDelta) {
        let idx = match self.steps.iter().position(|s| s.id == id) {
            Some(idx) => idx,
            None => {
                self.steps.push(Step {
                    id: id.to_string(),
                    thought: None,
                    tool_calls: Vec::new(),
                    status: StepStatus::InProgress,
                    last_error: None,
                });
                self.steps.len() - 1
            }
        };
        let step = &mut self.steps[idx];
        if let Some(thought) = delta.thought {
            step.thought.get_or_insert_with(String::new).push_str(&thought);
        }
        if let Some(calls) = delta.tool_calls {
            step.merge_calls(calls);
        }
    }
}
