use std::time::Duration;

use agentcomm_types::{
    AgentEvent, JsonRpcRequest, JsonRpcResponse, SendMessageParams, Task, TaskIdParams,
    METHOD_MESSAGE_SEND, METHOD_MESSAGE_STREAM, METHOD_TASKS_CANCEL, METHOD_TASKS_GET,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ClientError;
use crate::sse::parse_sse_stream;
use crate::transport::{EventStream, Transport};

/// JSON-RPC over HTTP transport.
///
/// Uses two `reqwest::Client` instances:
/// - `client`: 180-second timeout for synchronous request/response calls.
/// - `streaming_client`: no global timeout for SSE streaming responses.
///
/// Auth headers are baked in at construction so every request to the agent
/// carries them.
#[derive(Debug)]
pub struct JsonRpcTransport {
    client: reqwest::Client,
    streaming_client: reqwest::Client,
    url: String,
}

impl JsonRpcTransport {
    /// Create a transport targeting the given endpoint URL with the given
    /// default headers (typically the agent's auth headers).
    pub fn new(url: &str, headers: &[(String, String)]) -> Result<Self, ClientError> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ClientError::InvalidAuthHeader(name.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| ClientError::InvalidAuthHeader(name.to_string()))?;
            header_map.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(180))
            .default_headers(header_map.clone())
            .build()?;

        let streaming_client = reqwest::Client::builder()
            .default_headers(header_map)
            .build()?;

        Ok(Self {
            client,
            streaming_client,
            url: url.to_string(),
        })
    }

    /// Send a synchronous JSON-RPC request and return the raw envelope.
    async fn send_jsonrpc(
        &self,
        method: &str,
        params: impl Serialize,
    ) -> Result<JsonRpcResponse, ClientError> {
        let request = JsonRpcRequest::new(method, params)?;
        tracing::debug!(method, url = %self.url, "sending request");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Send a synchronous request and deserialize the result payload.
    async fn send_jsonrpc_result<T: DeserializeOwned>(
        &self,
        method: &str,
        params: impl Serialize,
    ) -> Result<T, ClientError> {
        let response = self.send_jsonrpc(method, params).await?;
        if let Some(error) = response.error {
            return Err(ClientError::JsonRpc(error));
        }
        let result = response.result.ok_or(ClientError::EmptyResult)?;
        serde_json::from_value(result).map_err(Into::into)
    }

    /// Send a JSON-RPC request and return an SSE event stream.
    async fn send_jsonrpc_stream(
        &self,
        method: &str,
        params: impl Serialize,
    ) -> Result<EventStream, ClientError> {
        let request = JsonRpcRequest::new(method, params)?;
        tracing::debug!(method, url = %self.url, "opening event stream");

        let response = self
            .streaming_client
            .post(&self.url)
            .header("Accept", "text/event-stream")
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        Ok(parse_sse_stream(response.bytes_stream()))
    }
}

#[async_trait::async_trait]
impl Transport for JsonRpcTransport {
    async fn send_message(&self, params: SendMessageParams) -> Result<AgentEvent, ClientError> {
        let response = self.send_jsonrpc(METHOD_MESSAGE_SEND, params).await?;
        AgentEvent::from_response(response).map_err(Into::into)
    }

    async fn send_message_stream(
        &self,
        params: SendMessageParams,
    ) -> Result<EventStream, ClientError> {
        self.send_jsonrpc_stream(METHOD_MESSAGE_STREAM, params).await
    }

    async fn get_task(&self, params: TaskIdParams) -> Result<Task, ClientError> {
        self.send_jsonrpc_result(METHOD_TASKS_GET, params).await
    }

    async fn cancel_task(&self, params: TaskIdParams) -> Result<Task, ClientError> {
        self.send_jsonrpc_result(METHOD_TASKS_CANCEL, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_with_valid_headers() {
        let transport = JsonRpcTransport::new(
            "http://localhost:9999",
            &[("Authorization".into(), "Bearer t-1".into())],
        );
        assert!(transport.is_ok());
    }

    #[test]
    fn test_new_rejects_invalid_header_name() {
        let transport = JsonRpcTransport::new(
            "http://localhost:9999",
            &[("bad header\n".into(), "x".into())],
        );
        match transport {
            Err(ClientError::InvalidAuthHeader(_)) => {}
            other => panic!("Expected InvalidAuthHeader, got {other:?}"),
        }
    }

    #[test]
    fn test_new_rejects_invalid_header_value() {
        let transport = JsonRpcTransport::new(
            "http://localhost:9999",
            &[("X-Api-Key".into(), "bad\nvalue".into())],
        );
        assert!(transport.is_err());
    }
}
