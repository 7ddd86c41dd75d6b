//! Remote execution through an injected channel.

use crate::config::PortalConfig;
use crate::error::{ChannelError, ExecutionFault, PortalFault};
use crate::executor::PortalExecutor;
use crate::request::{DataPortalRequest, DataPortalResult};
use crate::wire::{WireOutcome, WireRequest, WireResponse};
use async_trait::async_trait;
use portal_codec::{read_frame, write_frame, CodecResult, GraphCodec};
use portal_types::CallId;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Carries one request frame to a host and returns its response frame.
#[async_trait]
pub trait RemoteChannel: Send + Sync {
    async fn send(&self, frame: Vec<u8>) -> Result<Vec<u8>, ChannelError>;
}

/// Forwards calls to a remote host.
///
/// Payload, principal and both contexts are encoded in one codec pass; the
/// response's result and global context are decoded in one pass too. The
/// round trip is bounded by the configured timeout.
#[derive(Clone)]
pub struct RemoteProxy {
    channel: Arc<dyn RemoteChannel>,
    codec: GraphCodec,
    timeout: Duration,
    max_frame_bytes: usize,
}

impl RemoteProxy {
    pub fn new(channel: Arc<dyn RemoteChannel>, codec: GraphCodec) -> Self {
        Self::with_config(channel, codec, &PortalConfig::default())
    }

    pub fn with_config(channel: Arc<dyn RemoteChannel>, codec: GraphCodec, config: &PortalConfig) -> Self {
        Self {
            channel,
            codec,
            timeout: config.timeout(),
            max_frame_bytes: config.max_frame_bytes,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn encode_request(&self, call_id: CallId, request: &DataPortalRequest) -> CodecResult<Vec<u8>> {
        let mut encoder = self.codec.encoder();
        let payload = encoder.encode_value(&request.payload)?;
        let client_context = encoder.encode_context(&request.client_context)?;
        let global_context = encoder.encode_context(&request.global_context)?;
        let wire = WireRequest {
            call_id,
            object_type: request.object_type.clone(),
            operation: request.operation,
            principal: request.principal.clone(),
            payload,
            client_context,
            global_context,
            records: encoder.finish(),
        };
        write_frame(&wire, self.max_frame_bytes)
    }

    fn decode_response(&self, frame: &[u8]) -> Result<DataPortalResult, PortalFault> {
        let response: WireResponse =
            read_frame(frame, self.max_frame_bytes).map_err(ExecutionFault::from)?;
        let value = match response.outcome {
            WireOutcome::Fault(fault) => return Err(fault.into_fault()),
            WireOutcome::Success(value) => value,
        };
        let result = self.codec.decoder(response.records).and_then(|decoder| {
            decoder.resolve_with(|decoder| {
                Ok(DataPortalResult {
                    value: decoder.resolve(&value)?,
                    global_context: decoder.resolve_context(&response.global_context)?,
                })
            })
        });
        result.map_err(|e| ExecutionFault::from(e).into())
    }
}

#[async_trait]
impl PortalExecutor for RemoteProxy {
    async fn execute(
        &self,
        call_id: CallId,
        request: &DataPortalRequest,
    ) -> Result<DataPortalResult, PortalFault> {
        let frame = self
            .encode_request(call_id, request)
            .map_err(ExecutionFault::from)?;
        debug!("Sending {} byte request for call {}", frame.len(), call_id);

        let reply = match tokio::time::timeout(self.timeout, self.channel.send(frame)).await {
            Err(_) => {
                warn!("Call {} timed out after {:?}", call_id, self.timeout);
                return Err(PortalFault::Timeout(self.timeout));
            }
            Ok(Err(ChannelError::Timeout)) => return Err(PortalFault::Timeout(self.timeout)),
            Ok(Err(ChannelError::Connectivity(message))) => {
                return Err(PortalFault::Connectivity(message));
            }
            Ok(Ok(reply)) => reply,
        };

        let result = self.decode_response(&reply);
        if let Err(e) = &result {
            debug!("Call {} returned a fault: {}", call_id, e);
        }
        result
    }
}
