//! Server side of a remote portal, and an in-process channel to it.

use crate::error::{ChannelError, ExecutionFault, PortalFault};
use crate::portal::DataPortal;
use crate::remote::RemoteChannel;
use crate::request::{DataPortalRequest, DataPortalResult};
use crate::wire::{WireFault, WireOutcome, WireRequest, WireResponse};
use async_trait::async_trait;
use portal_codec::{read_frame, write_frame, CodecError, CodecResult, GraphCodec};
use portal_types::CallId;
use std::sync::Arc;
use tracing::{debug, warn};

/// Decodes request frames, runs them through a portal and encodes the
/// reply.
///
/// The wrapped portal applies its own authorization, interceptors and
/// dashboard, usually around a [`LocalExecutor`](crate::LocalExecutor).
pub struct PortalHost {
    portal: DataPortal,
    codec: GraphCodec,
    max_frame_bytes: usize,
}

impl PortalHost {
    pub fn new(portal: DataPortal, codec: GraphCodec) -> Self {
        let max_frame_bytes = portal.config().max_frame_bytes;
        Self {
            portal,
            codec,
            max_frame_bytes,
        }
    }

    pub fn portal(&self) -> &DataPortal {
        &self.portal
    }

    /// Handles one request frame. Every failure, including a corrupt
    /// request, is answered with a fault frame.
    pub async fn handle(&self, frame: &[u8]) -> CodecResult<Vec<u8>> {
        let wire: WireRequest = match read_frame(frame, self.max_frame_bytes) {
            Ok(wire) => wire,
            Err(e) => {
                warn!("Rejecting corrupt request frame: {}", e);
                return self.fault_frame(CallId::new(), &codec_fault(e));
            }
        };
        let call_id = wire.call_id;
        debug!(
            "Hosting {} {} for remote call {}",
            wire.operation, wire.object_type, call_id
        );

        let request = match self.decode_request(wire) {
            Ok(request) => request,
            Err(e) => return self.fault_frame(call_id, &codec_fault(e)),
        };
        match self.portal.execute(request).await {
            Ok(result) => match self.encode_result(call_id, &result) {
                Ok(frame) => Ok(frame),
                Err(e) => self.fault_frame(call_id, &codec_fault(e)),
            },
            Err(e) => self.fault_frame(call_id, &e.cause),
        }
    }

    fn decode_request(&self, wire: WireRequest) -> CodecResult<DataPortalRequest> {
        self.codec.decoder(wire.records)?.resolve_with(|decoder| {
            Ok(DataPortalRequest {
                object_type: wire.object_type,
                operation: wire.operation,
                payload: decoder.resolve(&wire.payload)?,
                principal: wire.principal,
                client_context: decoder.resolve_context(&wire.client_context)?,
                global_context: decoder.resolve_context(&wire.global_context)?,
            })
        })
    }

    fn encode_result(&self, call_id: CallId, result: &DataPortalResult) -> CodecResult<Vec<u8>> {
        let mut encoder = self.codec.encoder();
        let value = encoder.encode_value(&result.value)?;
        let global_context = encoder.encode_context(&result.global_context)?;
        let response = WireResponse {
            call_id,
            outcome: WireOutcome::Success(value),
            global_context,
            records: encoder.finish(),
        };
        write_frame(&response, self.max_frame_bytes)
    }

    fn fault_frame(&self, call_id: CallId, fault: &PortalFault) -> CodecResult<Vec<u8>> {
        let response = WireResponse::fault(call_id, WireFault::from_fault(fault));
        write_frame(&response, self.max_frame_bytes)
    }
}

fn codec_fault(err: CodecError) -> PortalFault {
    PortalFault::Execution(ExecutionFault::Codec(err))
}

/// A [`RemoteChannel`] that hands frames straight to an in-process host.
#[derive(Clone)]
pub struct LoopbackChannel {
    host: Arc<PortalHost>,
}

impl LoopbackChannel {
    pub fn new(host: Arc<PortalHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl RemoteChannel for LoopbackChannel {
    async fn send(&self, frame: Vec<u8>) -> Result<Vec<u8>, ChannelError> {
        self.host
            .handle(&frame)
            .await
            .map_err(|e| ChannelError::Connectivity(e.to_string()))
    }
}
