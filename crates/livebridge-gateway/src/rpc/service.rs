//! Service calls: one request, at most one response.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use livebridge_core::error::{BridgeError, Result};
use livebridge_core::protocol::envelope::{encode, InboundEnvelope, Payload, ServiceCallPacket};

use crate::dispatch::PacketHandler;
use crate::obs::BridgeMetrics;
use crate::rpc::{new_correlation_id, PendingTable};
use crate::transport::{Reliability, Transport};

/// Receives the full response payload, or `Err(Timeout)`.
pub type ServiceCallback = Box<dyn FnOnce(Result<Payload>) + Send + 'static>;

/// Correlates `ros2_service_call` requests with `ros2_service_response`s.
pub struct ServiceCaller {
    transport: Arc<dyn Transport>,
    pending: PendingTable<ServiceCallback>,
    default_timeout: Duration,
    metrics: Arc<BridgeMetrics>,
}

impl ServiceCaller {
    pub fn new(transport: Arc<dyn Transport>, default_timeout: Duration, metrics: Arc<BridgeMetrics>) -> Self {
        Self {
            transport,
            pending: PendingTable::new(),
            default_timeout,
            metrics,
        }
    }

    /// Call a service and receive the response through `on_response`.
    /// Returns the generated request id.
    pub fn call<F>(&self, service_name: &str, service_type: &str, request: Payload, on_response: F) -> Result<String>
    where
        F: FnOnce(Result<Payload>) + Send + 'static,
    {
        self.call_inner(service_name, service_type, request, Some(Box::new(on_response)), self.default_timeout)
    }

    /// Like [`call`](Self::call) with an explicit deadline.
    pub fn call_with_deadline<F>(
        &self,
        service_name: &str,
        service_type: &str,
        request: Payload,
        timeout: Duration,
        on_response: F,
    ) -> Result<String>
    where
        F: FnOnce(Result<Payload>) + Send + 'static,
    {
        self.call_inner(service_name, service_type, request, Some(Box::new(on_response)), timeout)
    }

    /// Fire-and-forget call: nothing is registered, any response is ignored.
    pub fn send(&self, service_name: &str, service_type: &str, request: Payload) -> Result<String> {
        self.call_inner(service_name, service_type, request, None, self.default_timeout)
    }

    fn call_inner(
        &self,
        service_name: &str,
        service_type: &str,
        request: Payload,
        on_response: Option<ServiceCallback>,
        timeout: Duration,
    ) -> Result<String> {
        if !self.transport.is_connected() {
            return Err(BridgeError::NotConnected);
        }

        let request_id = new_correlation_id();
        let packet = ServiceCallPacket::new(service_name, service_type, request, request_id.clone());
        let bytes = encode(&packet)?;

        let registered = on_response.is_some();
        if let Some(cb) = on_response {
            self.pending.insert(request_id.clone(), cb, timeout);
        }

        if let Err(e) = self.transport.send(bytes, Reliability::Reliable, None) {
            if registered {
                self.pending.take(&request_id);
            }
            warn!(service = service_name, %request_id, error = %e, "service call send failed");
            return Err(send_failure(e));
        }

        debug!(service = service_name, %request_id, "service call sent");
        Ok(request_id)
    }

    pub fn is_pending(&self, request_id: &str) -> bool {
        self.pending.contains(request_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Fail every call whose deadline has passed with `Timeout`.
    pub fn sweep_expired(&self, now: Instant) -> usize {
        let expired = self.pending.drain_expired(now);
        let n = expired.len();
        for (request_id, cb) in expired {
            warn!(%request_id, "service call timed out");
            self.metrics.timeouts.inc(&[("kind", "service")]);
            cb(Err(BridgeError::Timeout));
        }
        n
    }

    /// Fail every outstanding call with `err` (used on shutdown).
    pub fn fail_all(&self, err: BridgeError) {
        for (_, cb) in self.pending.drain_all() {
            cb(Err(err.clone()));
        }
    }
}

impl PacketHandler for ServiceCaller {
    fn handle_packet(&self, env: InboundEnvelope) -> Result<()> {
        let request_id = env.request_id().ok_or_else(|| {
            BridgeError::MalformedEnvelope("service response without requestId".into())
        })?;

        match self.pending.take(&request_id) {
            Some(cb) => {
                debug!(%request_id, "service response received");
                cb(Ok(env.into_body()));
            }
            None => debug!(%request_id, "service response without pending call"),
        }
        Ok(())
    }
}

/// Transport errors other than a lost session surface as `SendFailure`.
pub(crate) fn send_failure(e: BridgeError) -> BridgeError {
    match e {
        BridgeError::NotConnected | BridgeError::SendFailure(_) => e,
        other => BridgeError::SendFailure(other.to_string()),
    }
}
