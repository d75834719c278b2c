//! The shared tool channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use rmcp::model::{CallToolRequestParams, CallToolResult, ClientInfo, JsonObject, ProtocolVersion};
use rmcp::service::{ClientInitializeError, ServiceError};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::transport::{ChannelService, ChannelTransport};
use super::{ChannelState, RemoteOperation, RemoteToolNames};
use crate::error::DocentError;

#[derive(Default)]
struct Live {
    state: ChannelState,
    service: Option<Arc<ChannelService>>,
    last_error: Option<String>,
}

/// Process-wide connection to the tool server.
///
/// Created disconnected. `connect` is single-flight: callers that queue up
/// behind an in-flight attempt observe its outcome instead of starting
/// another one. Nothing reconnects in the background; after a failure the
/// next `connect` call retries.
pub struct ToolChannel {
    transport: Box<dyn ChannelTransport>,
    names: RemoteToolNames,
    connect_lock: tokio::sync::Mutex<()>,
    completed_attempts: AtomicU64,
    live: RwLock<Live>,
}

impl ToolChannel {
    pub fn new(transport: Box<dyn ChannelTransport>, names: RemoteToolNames) -> Self {
        Self {
            transport,
            names,
            connect_lock: tokio::sync::Mutex::new(()),
            completed_attempts: AtomicU64::new(0),
            live: RwLock::new(Live::default()),
        }
    }

    pub fn state(&self) -> ChannelState {
        self.read_live(|live| live.state)
    }

    /// Whether remote calls can be made right now. Never performs I/O.
    pub fn is_ready(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    pub fn names(&self) -> &RemoteToolNames {
        &self.names
    }

    /// Establish the connection unless it is already up.
    pub async fn connect(&self) -> Result<(), DocentError> {
        let observed = self.completed_attempts.load(Ordering::Acquire);
        let _guard = self.connect_lock.lock().await;

        if self.is_ready() {
            return Ok(());
        }
        if self.completed_attempts.load(Ordering::Acquire) != observed {
            if let Some(message) = self.read_live(|live| live.last_error.clone()) {
                return Err(DocentError::Connection(message));
            }
        }

        let stale = self.write_live(|live| live.service.take());
        if let Some(stale) = stale {
            shutdown_service(stale).await;
        }

        debug!(target = %self.transport.describe(), "connecting to tool server");
        let outcome = self.connect_with_protocol_fallback().await;
        let result = match outcome {
            Ok(service) => {
                info!(target = %self.transport.describe(), "tool channel connected");
                self.write_live(|live| {
                    live.state = ChannelState::Connected;
                    live.service = Some(Arc::new(service));
                    live.last_error = None;
                });
                Ok(())
            }
            Err(e) => {
                warn!(target = %self.transport.describe(), error = %e, "tool channel connect failed");
                let message = match &e {
                    DocentError::Connection(message) => message.clone(),
                    other => other.to_string(),
                };
                self.write_live(|live| {
                    live.state = ChannelState::Failed;
                    live.last_error = Some(message);
                });
                Err(e)
            }
        };
        self.completed_attempts.fetch_add(1, Ordering::AcqRel);
        result
    }

    /// Tear down the connection. Safe to call in any state.
    pub async fn disconnect(&self) {
        let _guard = self.connect_lock.lock().await;
        let service = self.write_live(|live| {
            live.state = ChannelState::Disconnected;
            live.last_error = None;
            live.service.take()
        });
        if let Some(service) = service {
            shutdown_service(service).await;
            info!("tool channel disconnected");
        }
    }

    /// Invoke a remote operation and return its decoded payload.
    pub async fn call(
        &self,
        operation: RemoteOperation,
        arguments: Value,
    ) -> Result<Value, DocentError> {
        let service = self
            .read_live(|live| match live.state {
                ChannelState::Connected => live.service.clone(),
                _ => None,
            })
            .ok_or(DocentError::NotConnected)?;

        let name = self.names.resolve(operation);
        let arguments = coerce_arguments(arguments)?;
        debug!(operation = %operation, tool = name, "calling tool server");

        let result = service
            .call_tool(CallToolRequestParams {
                meta: None,
                name: name.to_owned().into(),
                arguments,
                task: None,
            })
            .await;

        match result {
            Ok(result) => decode_call_result(operation, result),
            Err(e) => {
                if is_transport_failure(&e) {
                    warn!(operation = %operation, error = %e, "tool channel lost");
                    self.mark_failed(&service, e.to_string());
                }
                Err(map_service_error(operation, e))
            }
        }
    }

    async fn connect_with_protocol_fallback(&self) -> Result<ChannelService, DocentError> {
        let latest = ClientInfo {
            protocol_version: ProtocolVersion::LATEST,
            ..Default::default()
        };

        match self.transport.connect(latest).await {
            Ok(service) => return Ok(service),
            Err(error) if should_retry_protocol_fallback(&error) => {
                debug!("tool server rejected latest protocol version, retrying with 2024-11-05");
            }
            Err(error) => return Err(map_client_initialize_error(error)),
        }

        let fallback = ClientInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            ..Default::default()
        };
        self.transport
            .connect(fallback)
            .await
            .map_err(map_client_initialize_error)
    }

    /// Mark the channel failed, unless it was already replaced by a newer
    /// connection.
    fn mark_failed(&self, failed: &Arc<ChannelService>, message: String) {
        self.write_live(|live| {
            let current = live
                .service
                .as_ref()
                .is_some_and(|service| Arc::ptr_eq(service, failed));
            if current {
                live.state = ChannelState::Failed;
                live.last_error = Some(message);
            }
        });
    }

    fn read_live<T>(&self, f: impl FnOnce(&Live) -> T) -> T {
        let live = self.live.read().unwrap_or_else(|e| e.into_inner());
        f(&live)
    }

    fn write_live<T>(&self, f: impl FnOnce(&mut Live) -> T) -> T {
        let mut live = self.live.write().unwrap_or_else(|e| e.into_inner());
        f(&mut live)
    }
}

impl std::fmt::Debug for ToolChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolChannel")
            .field("target", &self.transport.describe())
            .field("state", &self.state())
            .finish()
    }
}

async fn shutdown_service(service: Arc<ChannelService>) {
    // In-flight calls may still hold a reference; the last drop cancels.
    if let Ok(service) = Arc::try_unwrap(service) {
        if let Err(e) = service.cancel().await {
            warn!(error = %e, "tool server shutdown failed");
        }
    }
}

fn coerce_arguments(value: Value) -> Result<Option<JsonObject>, DocentError> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let parsed: Value = serde_json::from_str(trimmed).map_err(|e| {
                DocentError::InvalidArgument(format!("remote tool arguments must be valid JSON: {e}"))
            })?;
            coerce_arguments(parsed)
        }
        other => Err(DocentError::InvalidArgument(format!(
            "remote tool arguments must be a JSON object; got {other}"
        ))),
    }
}

fn text_content(result: &CallToolResult) -> Option<String> {
    let lines: Vec<&str> = result
        .content
        .iter()
        .filter_map(|item| item.as_text().map(|text| text.text.as_str()))
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Structured content wins; otherwise the text content is decoded as JSON,
/// falling back to a plain string.
fn payload_of(result: &CallToolResult) -> Value {
    if let Some(structured) = &result.structured_content {
        return structured.clone();
    }
    match text_content(result) {
        Some(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        None => Value::Null,
    }
}

fn decode_call_result(
    operation: RemoteOperation,
    result: CallToolResult,
) -> Result<Value, DocentError> {
    let payload = payload_of(&result);
    if result.is_error.unwrap_or(false) {
        return Err(DocentError::RemoteCall {
            operation: operation.to_string(),
            payload,
        });
    }
    Ok(payload)
}

fn is_transport_failure(error: &ServiceError) -> bool {
    matches!(
        error,
        ServiceError::TransportClosed
            | ServiceError::TransportSend(_)
            | ServiceError::Cancelled { .. }
    )
}

fn should_retry_protocol_fallback(error: &ClientInitializeError) -> bool {
    match error {
        ClientInitializeError::JsonRpcError(error) => {
            let message = error.message.to_ascii_lowercase();
            message.contains("protocol") && message.contains("version")
        }
        _ => false,
    }
}

fn map_client_initialize_error(error: ClientInitializeError) -> DocentError {
    match error {
        ClientInitializeError::ConnectionClosed(context) => {
            DocentError::Connection(format!("connection closed during initialize: {context}"))
        }
        ClientInitializeError::TransportError { error, context } => {
            DocentError::Connection(format!("transport error ({context}): {error}"))
        }
        ClientInitializeError::JsonRpcError(error) => DocentError::Connection(format!(
            "initialize rejected with JSON-RPC error {}: {}",
            error.code.0, error.message
        )),
        ClientInitializeError::Cancelled => DocentError::Connection("initialize cancelled".into()),
        other => DocentError::Connection(format!("initialize failed: {other}")),
    }
}

fn map_service_error(operation: RemoteOperation, error: ServiceError) -> DocentError {
    match error {
        ServiceError::McpError(error) => DocentError::RemoteCall {
            operation: operation.to_string(),
            payload: serde_json::json!({
                "code": error.code.0,
                "message": error.message,
            }),
        },
        ServiceError::Timeout { timeout } => DocentError::Timeout(timeout.as_millis() as u64),
        other => DocentError::Connection(format!("{operation}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rmcp::{
        model::ServerJsonRpcMessage,
        service::{serve_directly, RoleClient, RxJsonRpcMessage, ServiceExt, TxJsonRpcMessage},
        transport::Transport as RmcpTransport,
    };
    use serde_json::json;
    use std::{collections::VecDeque, io, sync::Mutex, time::Duration};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

    #[derive(Clone)]
    enum Script {
        /// Reply to `tools/call` with this text content.
        Text(String),
        /// Reply with an `isError` result carrying this text.
        ErrorResult(String),
        /// Drop the connection on the first `tools/call`.
        Disconnect,
    }

    struct ChannelRmcpTransport {
        outbound: UnboundedSender<TxJsonRpcMessage<RoleClient>>,
        inbound: UnboundedReceiver<RxJsonRpcMessage<RoleClient>>,
    }

    impl RmcpTransport<RoleClient> for ChannelRmcpTransport {
        type Error = io::Error;

        fn send(
            &mut self,
            item: TxJsonRpcMessage<RoleClient>,
        ) -> impl std::future::Future<Output = Result<(), Self::Error>> + Send + 'static {
            let tx = self.outbound.clone();
            async move {
                tx.send(item).map_err(|_| {
                    io::Error::new(io::ErrorKind::BrokenPipe, "mock rmcp channel closed")
                })
            }
        }

        async fn receive(&mut self) -> Option<RxJsonRpcMessage<RoleClient>> {
            self.inbound.recv().await
        }

        fn close(&mut self) -> impl std::future::Future<Output = Result<(), Self::Error>> + Send {
            self.inbound.close();
            std::future::ready(Ok(()))
        }
    }

    fn scripted_service(script: Script) -> ChannelService {
        let (outbound_tx, mut outbound_rx) = unbounded_channel::<TxJsonRpcMessage<RoleClient>>();
        let (inbound_tx, inbound_rx) = unbounded_channel::<RxJsonRpcMessage<RoleClient>>();
        let transport = ChannelRmcpTransport {
            outbound: outbound_tx,
            inbound: inbound_rx,
        };

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let Ok(value) = serde_json::to_value(message) else {
                    continue;
                };
                if value.get("method").and_then(|m| m.as_str()) != Some("tools/call") {
                    continue;
                }
                let id = value.get("id").cloned().unwrap_or(Value::Null);
                let result = match &script {
                    Script::Disconnect => return,
                    Script::Text(text) => json!({
                        "content": [{ "type": "text", "text": text }],
                        "isError": false
                    }),
                    Script::ErrorResult(text) => json!({
                        "content": [{ "type": "text", "text": text }],
                        "isError": true
                    }),
                };
                let response: ServerJsonRpcMessage =
                    serde_json::from_value(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
                        .expect("mock tools/call response should deserialize");
                let _ = inbound_tx.send(response);
            }
        });

        serve_directly(().into_dyn(), transport, None)
    }

    struct MockTransport {
        results: Mutex<VecDeque<Result<ChannelService, ClientInitializeError>>>,
        attempted: Arc<Mutex<Vec<ProtocolVersion>>>,
    }

    impl MockTransport {
        fn new(results: Vec<Result<ChannelService, ClientInitializeError>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                attempted: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl ChannelTransport for MockTransport {
        async fn connect(
            &self,
            client_info: ClientInfo,
        ) -> Result<ChannelService, ClientInitializeError> {
            self.attempted
                .lock()
                .unwrap()
                .push(client_info.protocol_version);
            // Let concurrent callers queue up behind this attempt.
            tokio::task::yield_now().await;
            self.results.lock().unwrap().pop_front().unwrap_or_else(|| {
                Err(ClientInitializeError::ConnectionClosed(
                    "missing mock connect result".into(),
                ))
            })
        }

        fn describe(&self) -> String {
            "mock".into()
        }
    }

    fn channel_with(
        results: Vec<Result<ChannelService, ClientInitializeError>>,
    ) -> (ToolChannel, Arc<Mutex<Vec<ProtocolVersion>>>) {
        let transport = MockTransport::new(results);
        let attempted = Arc::clone(&transport.attempted);
        (
            ToolChannel::new(Box::new(transport), RemoteToolNames::default()),
            attempted,
        )
    }

    #[tokio::test]
    async fn starts_disconnected_and_refuses_calls() {
        let (channel, attempted) = channel_with(vec![]);
        assert_eq!(channel.state(), ChannelState::Disconnected);
        assert!(!channel.is_ready());

        let err = channel
            .call(RemoteOperation::ListComponents, Value::Null)
            .await
            .expect_err("calls need a connection");
        assert!(matches!(err, DocentError::NotConnected));
        assert!(attempted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let (channel, attempted) =
            channel_with(vec![Ok(scripted_service(Script::Text("[]".into())))]);

        channel.connect().await.expect("first connect");
        channel.connect().await.expect("second connect is a no-op");

        assert!(channel.is_ready());
        assert_eq!(attempted.lock().unwrap().as_slice(), &[ProtocolVersion::LATEST]);
    }

    #[tokio::test]
    async fn connect_falls_back_to_legacy_protocol_version() {
        let (channel, attempted) = channel_with(vec![
            Err(ClientInitializeError::JsonRpcError(
                rmcp::model::ErrorData::invalid_request("unsupported protocol version", None),
            )),
            Ok(scripted_service(Script::Text("[]".into()))),
        ]);

        channel.connect().await.expect("fallback should succeed");

        let attempted = attempted.lock().unwrap();
        assert_eq!(
            attempted.as_slice(),
            &[ProtocolVersion::LATEST, ProtocolVersion::V_2024_11_05]
        );
    }

    #[tokio::test]
    async fn failed_connect_is_retried_on_next_call() {
        let (channel, attempted) = channel_with(vec![
            Err(ClientInitializeError::ConnectionClosed("spawn failed".into())),
            Ok(scripted_service(Script::Text("[]".into()))),
        ]);

        let err = channel.connect().await.expect_err("first attempt fails");
        assert!(matches!(err, DocentError::Connection(message) if message.contains("spawn failed")));
        assert_eq!(channel.state(), ChannelState::Failed);

        channel.connect().await.expect("second attempt succeeds");
        assert_eq!(channel.state(), ChannelState::Connected);
        assert_eq!(attempted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_connects_share_one_attempt() {
        let (channel, attempted) = channel_with(vec![Err(
            ClientInitializeError::ConnectionClosed("unreachable".into()),
        )]);

        let (first, second) = tokio::join!(channel.connect(), channel.connect());

        assert!(first.is_err());
        assert!(matches!(second, Err(DocentError::Connection(message)) if message.contains("unreachable")));
        assert_eq!(attempted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn call_decodes_json_text_payload() {
        let (channel, _) = channel_with(vec![Ok(scripted_service(Script::Text(
            r#"[{"name":"Button"},{"name":"Card"}]"#.into(),
        )))]);
        channel.connect().await.unwrap();

        let payload = channel
            .call(RemoteOperation::ListComponents, Value::Null)
            .await
            .expect("call should succeed");

        assert_eq!(payload, json!([{"name": "Button"}, {"name": "Card"}]));
    }

    #[tokio::test]
    async fn undecodable_text_is_returned_as_string() {
        let (channel, _) =
            channel_with(vec![Ok(scripted_service(Script::Text("plain words".into())))]);
        channel.connect().await.unwrap();

        let payload = channel
            .call(
                RemoteOperation::ComponentDetails,
                json!({"componentNames": ["Button"]}),
            )
            .await
            .unwrap();

        assert_eq!(payload, json!("plain words"));
    }

    #[tokio::test]
    async fn error_result_maps_to_remote_call_error() {
        let (channel, _) = channel_with(vec![Ok(scripted_service(Script::ErrorResult(
            r#"{"reason":"unknown component"}"#.into(),
        )))]);
        channel.connect().await.unwrap();

        let err = channel
            .call(
                RemoteOperation::ComponentDetails,
                json!({"componentNames": ["Ghost"]}),
            )
            .await
            .expect_err("error results surface as errors");

        assert!(matches!(
            err,
            DocentError::RemoteCall { operation, payload }
            if operation == "ComponentDetails" && payload["reason"] == "unknown component"
        ));
        assert!(channel.is_ready(), "remote errors keep the channel up");
    }

    #[tokio::test]
    async fn transport_loss_marks_channel_failed() {
        let (channel, _) = channel_with(vec![Ok(scripted_service(Script::Disconnect))]);
        channel.connect().await.unwrap();

        let err = channel
            .call(RemoteOperation::ListComponents, Value::Null)
            .await
            .expect_err("dropped connection should fail the call");

        assert!(matches!(err, DocentError::Connection(_)));
        assert_eq!(channel.state(), ChannelState::Failed);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let (channel, _) = channel_with(vec![Ok(scripted_service(Script::Text("[]".into())))]);
        channel.disconnect().await;
        channel.connect().await.unwrap();

        channel.disconnect().await;
        channel.disconnect().await;

        assert_eq!(channel.state(), ChannelState::Disconnected);
    }

    #[test]
    fn arguments_accept_object_and_stringified_object() {
        let parsed = coerce_arguments(json!(r#"{"componentNames":["Button"]}"#))
            .unwrap()
            .unwrap();
        assert_eq!(parsed["componentNames"], json!(["Button"]));
        assert!(coerce_arguments(Value::Null).unwrap().is_none());
        assert!(matches!(
            coerce_arguments(json!(["bad"])),
            Err(DocentError::InvalidArgument(_))
        ));
    }

    #[test]
    fn timeout_maps_to_timeout_error() {
        let err = map_service_error(
            RemoteOperation::ListComponents,
            ServiceError::Timeout {
                timeout: Duration::from_millis(1500),
            },
        );
        assert!(matches!(err, DocentError::Timeout(1500)));
    }
}
