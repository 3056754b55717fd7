//! Streaming client for the remote agent runtime.

use std::time::Duration;

use agent_primitives::AgentIdentity;
use agent_tools::ToolDescriptor;
use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use futures::stream;
use hyper::Body;
use hyper::body::HttpBody;
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::http_client::{HttpJsonClient, ServiceEndpoint};
use crate::traits::{
    AdapterError, AdapterResult, AgentEvent, AgentEventStream, AgentRuntime, InvokeAgentRequest,
    RegisterToolsRequest,
};

const AGENTS_INVOKE: &str = "agents/invoke";
const AGENTS_REGISTER_TOOLS: &str = "agents/register-tools";

/// Longest event line accepted from the agent stream.
pub(crate) const MAX_EVENT_LINE_BYTES: usize = 1024 * 1024;

/// Agent runtime client speaking newline-delimited JSON over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpAgentRuntime {
    http: HttpJsonClient,
}

impl HttpAgentRuntime {
    /// Creates a client for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the HTTPS client cannot be
    /// built.
    pub fn new(endpoint: ServiceEndpoint) -> AdapterResult<Self> {
        Ok(Self {
            http: HttpJsonClient::new(endpoint)?,
        })
    }
}

#[async_trait]
impl AgentRuntime for HttpAgentRuntime {
    async fn register_tools(
        &self,
        identity: &AgentIdentity,
        tools: &[ToolDescriptor],
    ) -> AdapterResult<()> {
        let request = RegisterToolsRequest::new(identity, tools);
        self.http
            .post_ignored(AGENTS_REGISTER_TOOLS, &request)
            .await?;
        info!(
            agent_id = identity.agent_id(),
            tools = tools.len(),
            "registered tool adapters with agent"
        );
        Ok(())
    }

    async fn invoke(&self, request: InvokeAgentRequest) -> AdapterResult<AgentEventStream> {
        request.validate()?;
        debug!(
            agent_id = %request.agent_id,
            session_id = %request.session_id,
            "opening agent stream"
        );
        let response = self.http.send(AGENTS_INVOKE, &request).await?;
        Ok(event_stream(response.into_body(), self.http.timeout()))
    }
}

struct StreamState {
    body: Body,
    decoder: NdjsonDecoder,
    idle_timeout: Duration,
    finished: bool,
}

fn event_stream(body: Body, idle_timeout: Duration) -> AgentEventStream {
    let state = StreamState {
        body,
        decoder: NdjsonDecoder::default(),
        idle_timeout,
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.decoder.next_event() {
                return Some((event, state));
            }
            if state.finished {
                return state.decoder.finish().map(|event| (event, state));
            }

            match timeout(state.idle_timeout, state.body.data()).await {
                Err(_) => {
                    state.finished = true;
                    state.decoder.clear();
                    return Some((Err(AdapterError::transport("agent stream stalled")), state));
                }
                Ok(Some(Ok(chunk))) => state.decoder.push(&chunk),
                Ok(Some(Err(err))) => {
                    state.finished = true;
                    state.decoder.clear();
                    return Some((
                        Err(AdapterError::transport(format!("agent stream failed: {err}"))),
                        state,
                    ));
                }
                Ok(None) => state.finished = true,
            }
        }
    }))
}

/// Incremental decoder for newline-delimited JSON events.
///
/// Chunks may split a line anywhere, including inside a multi-byte character;
/// lines are only decoded once their terminating newline has arrived. A line
/// longer than [`MAX_EVENT_LINE_BYTES`] is reported once and everything after
/// it is discarded.
#[derive(Debug, Default)]
pub(crate) struct NdjsonDecoder {
    buffer: BytesMut,
    /// Bytes already searched for a newline.
    scanned: usize,
    overflowed: bool,
}

impl NdjsonDecoder {
    pub(crate) fn push(&mut self, chunk: &[u8]) {
        if !self.overflowed {
            self.buffer.extend_from_slice(chunk);
        }
    }

    /// Returns the next complete event, skipping blank lines.
    pub(crate) fn next_event(&mut self) -> Option<AdapterResult<AgentEvent>> {
        if self.overflowed {
            return None;
        }
        loop {
            let Some(offset) = self.buffer[self.scanned..]
                .iter()
                .position(|byte| *byte == b'\n')
            else {
                let pending = self.buffer.len();
                self.scanned = pending;
                return self.check_length(pending);
            };

            let newline = self.scanned + offset;
            self.scanned = 0;
            if let Some(err) = self.check_length(newline) {
                return Some(err);
            }
            let line = self.buffer.split_to(newline);
            self.buffer.advance(1);
            if let Some(event) = decode_line(&line) {
                return Some(event);
            }
        }
    }

    /// Decodes a trailing line that was not newline-terminated.
    pub(crate) fn finish(&mut self) -> Option<AdapterResult<AgentEvent>> {
        if self.overflowed {
            return None;
        }
        let pending = self.buffer.len();
        if let Some(err) = self.check_length(pending) {
            return Some(err);
        }
        let rest = self.buffer.split();
        self.scanned = 0;
        decode_line(&rest)
    }

    fn check_length(&mut self, line_len: usize) -> Option<AdapterResult<AgentEvent>> {
        if line_len <= MAX_EVENT_LINE_BYTES {
            return None;
        }
        self.clear();
        self.overflowed = true;
        Some(Err(AdapterError::response(format!(
            "agent event exceeds {MAX_EVENT_LINE_BYTES} bytes"
        ))))
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }
}

fn decode_line(line: &[u8]) -> Option<AdapterResult<AgentEvent>> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }
    Some(
        serde_json::from_slice::<Value>(line)
            .map(AgentEvent::new)
            .map_err(|err| AdapterError::response(format!("malformed agent event: {err}"))),
    )
}
