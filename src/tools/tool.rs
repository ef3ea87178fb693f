//! Client-local functions answering `submit_tool_outputs` actions.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ThreadRunError;
use crate::types::{FunctionCallRequest, ToolOutput};

/// A capability the client resolves locally when the run asks for it.
#[async_trait]
pub trait ClientFunction: Send + Sync {
    /// Function name (must match what the model calls).
    fn name(&self) -> &str;

    /// Compute the output for one call from its decoded JSON arguments.
    async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ThreadRunError>;
}

/// Type alias for the function handler.
type FunctionHandler = dyn Fn(serde_json::Value) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ThreadRunError>> + Send>>
    + Send
    + Sync;

/// Closure-based client function.
pub struct FunctionTool {
    name: String,
    handler: Arc<FunctionHandler>,
}

impl FunctionTool {
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, ThreadRunError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }
}

#[async_trait]
impl ClientFunction for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ThreadRunError> {
        (self.handler)(arguments).await
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .finish()
    }
}

/// Registry of client functions keyed by name.
#[derive(Clone, Default)]
pub struct ClientFunctions {
    functions: HashMap<String, Arc<dyn ClientFunction>>,
}

impl ClientFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, function: impl ClientFunction + 'static) -> Self {
        self.functions
            .insert(function.name().to_string(), Arc::new(function));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ClientFunction>> {
        self.functions.get(name)
    }

    /// Resolve outputs for every call, in request order.
    ///
    /// Failures never abort the batch: an unknown function, undecodable
    /// arguments or a failing function become a JSON error string for that
    /// call, and the server decides how the run proceeds.
    pub async fn resolve(&self, calls: &[FunctionCallRequest]) -> Vec<ToolOutput> {
        let mut outputs = Vec::with_capacity(calls.len());
        for call in calls {
            let output = match self.resolve_one(call).await {
                Ok(value) => match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                },
                Err(err) => {
                    tracing::warn!(function = %call.function.name, error = %err, "client function failed");
                    serde_json::json!({ "error": err.to_string() }).to_string()
                }
            };
            outputs.push(ToolOutput {
                tool_call_id: call.id.clone(),
                output,
            });
        }
        outputs
    }

    async fn resolve_one(
        &self,
        call: &FunctionCallRequest,
    ) -> Result<serde_json::Value, ThreadRunError> {
        let name = call.function.name.as_str();
        let function = self.get(name).ok_or_else(|| ThreadRunError::ToolExecution {
            tool: name.to_string(),
            message: "no client function registered".into(),
        })?;
        let raw = call.function.arguments.trim();
        let arguments = if raw.is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            serde_json::from_str(raw).map_err(|e| ThreadRunError::ToolExecution {
                tool: name.to_string(),
                message: format!("invalid arguments: {e}"),
            })?
        };
        function.call(arguments).await
    }
}

impl std::fmt::Debug for ClientFunctions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("ClientFunctions")
            .field("functions", &names)
            .finish()
    }
}
