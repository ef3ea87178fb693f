//! HTTP implementation of [`AssistantApi`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::http::{bearer_headers, build_client, status_to_error};
use super::{AssistantApi, CreateMessageRequest, CreateRunRequest, CreateThreadRequest};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::stream::{open_event_stream, RunEventStream};
use crate::types::{
    MessageRecord, Run, Thread, ThreadMetadata, ToolApprovalSubmission, ToolOutput,
};

/// Run-service client over HTTP + server-sent events.
#[derive(Debug, Clone)]
pub struct HttpAssistantApi {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    request_timeout: Duration,
}

#[derive(Deserialize)]
struct MessageList {
    #[serde(default)]
    data: Vec<MessageRecord>,
}

impl HttpAssistantApi {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.connect_timeout())?,
            base_url: config.require_base_url()?,
            api_key: config.api_key.clone(),
            request_timeout: config.request_timeout(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(self.url(path))
            .headers(bearer_headers(self.api_key.as_deref()))
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(self.url(path))
            .headers(bearer_headers(self.api_key.as_deref()))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let resp = request.timeout(self.request_timeout).send().await?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body));
        }
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn stream(&self, path: &str, body: serde_json::Value) -> Result<RunEventStream> {
        debug!(path, "opening run stream");
        open_event_stream(self.post(path).json(&body))
    }
}

#[async_trait]
impl AssistantApi for HttpAssistantApi {
    async fn create_thread(&self, request: CreateThreadRequest) -> Result<Thread> {
        self.send_json(self.post("/threads").json(&request)).await
    }

    async fn retrieve_thread(&self, thread_id: &str) -> Result<Thread> {
        self.send_json(self.get(&format!("/threads/{thread_id}"))).await
    }

    async fn update_thread(&self, thread_id: &str, metadata: &ThreadMetadata) -> Result<Thread> {
        let body = serde_json::json!({ "metadata": metadata });
        self.send_json(self.post(&format!("/threads/{thread_id}")).json(&body))
            .await
    }

    async fn create_message(
        &self,
        thread_id: &str,
        request: CreateMessageRequest,
    ) -> Result<MessageRecord> {
        self.send_json(
            self.post(&format!("/threads/{thread_id}/messages"))
                .json(&request),
        )
        .await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<MessageRecord>> {
        let request = self
            .get(&format!("/threads/{thread_id}/messages"))
            .query(&[("order", "asc")]);
        let list: MessageList = self.send_json(request).await?;
        Ok(list.data)
    }

    async fn delete_message(&self, thread_id: &str, message_id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.url(&format!("/threads/{thread_id}/messages/{message_id}")))
            .headers(bearer_headers(self.api_key.as_deref()));
        let resp = request.timeout(self.request_timeout).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body));
        }
        Ok(())
    }

    async fn create_run_stream(
        &self,
        thread_id: &str,
        request: CreateRunRequest,
    ) -> Result<RunEventStream> {
        let mut body = serde_json::to_value(&request)?;
        if let Some(obj) = body.as_object_mut() {
            obj.insert("stream".into(), true.into());
        }
        self.stream(&format!("/threads/{thread_id}/runs"), body)
    }

    async fn submit_tool_outputs_stream(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<RunEventStream> {
        let body = serde_json::json!({ "tool_outputs": outputs, "stream": true });
        self.stream(
            &format!("/threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
            body,
        )
    }

    async fn submit_tool_approvals_stream(
        &self,
        thread_id: &str,
        run_id: &str,
        approvals: Vec<ToolApprovalSubmission>,
    ) -> Result<RunEventStream> {
        let body = serde_json::json!({ "tool_approvals": approvals, "stream": true });
        self.stream(
            &format!("/threads/{thread_id}/runs/{run_id}/submit_tool_approvals"),
            body,
        )
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        self.send_json(self.post(&format!("/threads/{thread_id}/runs/{run_id}/cancel")))
            .await
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        self.send_json(self.get(&format!("/threads/{thread_id}/runs/{run_id}")))
            .await
    }
}
