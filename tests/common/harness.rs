//! tests/common/harness.rs
use castlink::config::Config;
use castlink::consumer::SessionConsumer;
use castlink::device::{Device, RouteInfo};
use castlink::error::{Error, Result, StatusCode};
use castlink::session::SessionManager;
use castlink::store::MemorySessionStore;
use castlink::transport::{
    ApplicationConnection, ApplicationMetadata, CastTransport, HandleId, RouteDiscovery,
    SuspensionCause, TransportEvent, TransportEventKind, TransportHandle,
};
use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, Once,
};
use tokio::sync::{mpsc, oneshot};

pub const TEST_APP_ID: &str = "CC1AD845";

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "castlink=debug".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

#[derive(Debug, Default)]
struct MockTransportState {
    events: Option<mpsc::Sender<TransportEvent>>,
    last_handle: Option<TransportHandle>,
    connect_error: Option<StatusCode>,
    launch_error: Option<StatusCode>,
    join_error: Option<StatusCode>,
    stop_error: Option<StatusCode>,
    connected_inline: bool,
    launch_gate: Option<oneshot::Receiver<()>>,
    session_counter: u64,
    launched: Vec<String>,
    joined: Vec<(String, String)>,
    reconnected: Vec<HandleId>,
    stop_calls: u32,
    disconnect_calls: u32,
    status_requests: u32,
    volume: f64,
    muted: bool,
}

/// A scriptable in-memory transport. Tests inject failures through the
/// `fail_*` setters and deliver asynchronous progress with the `emit_*`
/// methods.
#[derive(Debug, Default)]
pub struct MockTransport {
    state: Mutex<MockTransportState>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockTransportState {
                volume: 0.5,
                ..MockTransportState::default()
            }),
        })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockTransportState> {
        self.state.lock().unwrap()
    }

    pub fn fail_connect_with(&self, status: StatusCode) {
        self.state().connect_error = Some(status);
    }

    pub fn fail_launch_with(&self, status: StatusCode) {
        self.state().launch_error = Some(status);
    }

    pub fn fail_join_with(&self, status: StatusCode) {
        self.state().join_error = Some(status);
    }

    pub fn fail_stop_with(&self, status: StatusCode) {
        self.state().stop_error = Some(status);
    }

    /// Makes every subsequent connect deliver `Connected` before returning,
    /// modeling a transport whose handshake finishes inline.
    pub fn complete_connect_inline(&self) {
        self.state().connected_inline = true;
    }

    /// Holds the next launch until the returned sender fires or is dropped.
    pub fn hold_launch(&self) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.state().launch_gate = Some(gate);
        release
    }

    pub fn reconnect_calls(&self) -> Vec<HandleId> {
        self.state().reconnected.clone()
    }

    pub fn last_handle_id(&self) -> Option<HandleId> {
        self.state().last_handle.as_ref().map(|h| h.id())
    }

    pub fn launched_applications(&self) -> Vec<String> {
        self.state().launched.clone()
    }

    pub fn joined_sessions(&self) -> Vec<(String, String)> {
        self.state().joined.clone()
    }

    pub fn stop_calls(&self) -> u32 {
        self.state().stop_calls
    }

    pub fn disconnect_calls(&self) -> u32 {
        self.state().disconnect_calls
    }

    pub fn status_requests(&self) -> u32 {
        self.state().status_requests
    }

    async fn emit(&self, kind: TransportEventKind) {
        let (events, handle) = {
            let state = self.state();
            (
                state.events.clone(),
                state.last_handle.as_ref().map(|h| h.id()),
            )
        };
        let (Some(events), Some(handle)) = (events, handle) else {
            panic!("emit called before a successful connect");
        };
        events
            .send(TransportEvent { handle, kind })
            .await
            .expect("event channel closed");
    }

    /// Delivers `Connected` for the most recent handle.
    pub async fn emit_connected(&self) {
        self.emit(TransportEventKind::Connected).await;
    }

    /// Delivers `ConnectFailed` for the most recent handle.
    pub async fn emit_connect_failed(&self, status: StatusCode) {
        self.emit(TransportEventKind::ConnectFailed { status }).await;
    }

    /// Delivers `Suspended` for the most recent handle.
    pub async fn emit_suspended(&self, cause: SuspensionCause) {
        self.emit(TransportEventKind::Suspended { cause }).await;
    }
}

#[async_trait]
impl CastTransport for MockTransport {
    async fn connect(
        &self,
        handle: &TransportHandle,
        _application_id: &str,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<()> {
        let inline = {
            let mut state = self.state();
            if let Some(status) = state.connect_error.take() {
                return Err(Error::OperationFailed { status });
            }
            state.events = Some(events.clone());
            state.last_handle = Some(handle.clone());
            state.connected_inline
        };
        if inline {
            events
                .send(TransportEvent {
                    handle: handle.id(),
                    kind: TransportEventKind::Connected,
                })
                .await
                .expect("event channel closed");
        }
        Ok(())
    }

    async fn reconnect(&self, handle: &TransportHandle) -> Result<()> {
        self.state().reconnected.push(handle.id());
        Ok(())
    }

    async fn disconnect(&self, _handle: &TransportHandle) {
        self.state().disconnect_calls += 1;
    }

    async fn request_status(&self, _handle: &TransportHandle) -> Result<()> {
        self.state().status_requests += 1;
        Ok(())
    }

    async fn launch_application(
        &self,
        _handle: &TransportHandle,
        application_id: &str,
    ) -> Result<ApplicationConnection> {
        let gate = self.state().launch_gate.take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let mut state = self.state();
        if let Some(status) = state.launch_error.take() {
            return Err(Error::OperationFailed { status });
        }
        state.session_counter += 1;
        let session_id = format!("session-{}", state.session_counter);
        state.launched.push(application_id.to_string());
        Ok(ApplicationConnection {
            metadata: ApplicationMetadata {
                application_id: application_id.to_string(),
                name: "Mock Receiver".to_string(),
            },
            application_status: "Ready".to_string(),
            session_id,
            was_launched: true,
        })
    }

    async fn join_application(
        &self,
        _handle: &TransportHandle,
        application_id: &str,
        session_id: &str,
    ) -> Result<ApplicationConnection> {
        let mut state = self.state();
        if let Some(status) = state.join_error.take() {
            return Err(Error::OperationFailed { status });
        }
        state
            .joined
            .push((application_id.to_string(), session_id.to_string()));
        Ok(ApplicationConnection {
            metadata: ApplicationMetadata {
                application_id: application_id.to_string(),
                name: "Mock Receiver".to_string(),
            },
            application_status: "Ready".to_string(),
            session_id: session_id.to_string(),
            was_launched: false,
        })
    }

    async fn stop_application(&self, _handle: &TransportHandle) -> Result<()> {
        let mut state = self.state();
        state.stop_calls += 1;
        if let Some(status) = state.stop_error.take() {
            return Err(Error::OperationFailed { status });
        }
        Ok(())
    }

    async fn volume(&self, _handle: &TransportHandle) -> Result<f64> {
        Ok(self.state().volume)
    }

    async fn set_volume(&self, _handle: &TransportHandle, level: f64) -> Result<()> {
        self.state().volume = level;
        Ok(())
    }

    async fn is_muted(&self, _handle: &TransportHandle) -> Result<bool> {
        Ok(self.state().muted)
    }

    async fn set_muted(&self, _handle: &TransportHandle, muted: bool) -> Result<()> {
        self.state().muted = muted;
        Ok(())
    }
}

/// A scriptable route table that records scan toggles and default-route
/// selections.
#[derive(Debug, Default)]
pub struct MockDiscovery {
    routes: Mutex<Vec<RouteInfo>>,
    scan_log: Mutex<Vec<bool>>,
    default_selections: AtomicU64,
}

impl MockDiscovery {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_route(&self, route: RouteInfo) {
        self.routes.lock().unwrap().push(route);
    }

    pub fn clear_routes(&self) {
        self.routes.lock().unwrap().clear();
    }

    pub fn scan_log(&self) -> Vec<bool> {
        self.scan_log.lock().unwrap().clone()
    }

    pub fn default_selections(&self) -> u64 {
        self.default_selections.load(Ordering::SeqCst)
    }
}

impl RouteDiscovery for MockDiscovery {
    fn known_routes(&self) -> Vec<RouteInfo> {
        self.routes.lock().unwrap().clone()
    }

    fn select_default_route(&self) {
        self.default_selections.fetch_add(1, Ordering::SeqCst);
    }

    fn set_active_scan(&self, enabled: bool) {
        self.scan_log.lock().unwrap().push(enabled);
    }
}

/// Records every delivered lifecycle event by name for later assertions.
#[derive(Debug, Default)]
pub struct RecordingConsumer {
    events: Mutex<Vec<String>>,
}

impl RecordingConsumer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.as_str() == name || e.starts_with(&format!("{name}(")))
            .count()
    }

    fn record(&self, event: String) -> Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

impl SessionConsumer for RecordingConsumer {
    fn on_cast_device_detected(&self, route: &RouteInfo) -> Result<()> {
        self.record(format!("on_cast_device_detected({})", route.id))
    }

    fn on_connected(&self) -> Result<()> {
        self.record("on_connected".to_string())
    }

    fn on_connectivity_recovered(&self) -> Result<()> {
        self.record("on_connectivity_recovered".to_string())
    }

    fn on_connection_suspended(&self, cause: SuspensionCause) -> Result<()> {
        self.record(format!("on_connection_suspended({cause})"))
    }

    fn on_connection_failed(&self, status: StatusCode) -> Result<()> {
        self.record(format!("on_connection_failed({status})"))
    }

    fn on_disconnected(&self) -> Result<()> {
        self.record("on_disconnected".to_string())
    }

    fn on_application_connected(
        &self,
        _metadata: &ApplicationMetadata,
        _application_status: &str,
        session_id: &str,
        was_launched: bool,
    ) -> Result<()> {
        self.record(format!(
            "on_application_connected({session_id},{was_launched})"
        ))
    }

    fn on_application_connection_failed(&self, status: StatusCode) -> Result<()> {
        self.record(format!("on_application_connection_failed({status})"))
    }

    fn on_application_stop_failed(&self, status: StatusCode) -> Result<()> {
        self.record(format!("on_application_stop_failed({status})"))
    }

    fn on_failed(&self, what: &str, status: StatusCode) -> Result<()> {
        self.record(format!("on_failed({what},{status})"))
    }
}

/// A consumer whose every callback fails, for isolation tests.
#[derive(Debug, Default)]
pub struct FailingConsumer;

impl FailingConsumer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl SessionConsumer for FailingConsumer {
    fn on_connected(&self) -> Result<()> {
        Err(Error::OperationFailed { status: 13 })
    }

    fn on_disconnected(&self) -> Result<()> {
        Err(Error::OperationFailed { status: 13 })
    }

    fn on_connection_failed(&self, status: StatusCode) -> Result<()> {
        Err(Error::OperationFailed { status })
    }

    fn on_cast_device_detected(&self, _route: &RouteInfo) -> Result<()> {
        Err(Error::OperationFailed { status: 13 })
    }

    fn on_failed(&self, _reason: &str, status: StatusCode) -> Result<()> {
        Err(Error::OperationFailed { status })
    }
}

/// A ready-to-use manager wired to mocks, with the event driver spawned.
pub struct TestHarness {
    pub manager: SessionManager,
    pub transport: Arc<MockTransport>,
    pub discovery: Arc<MockDiscovery>,
    pub store: MemorySessionStore,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(Config::new(TEST_APP_ID))
    }

    pub fn with_config(config: Config) -> Self {
        init_tracing();
        let transport = MockTransport::new();
        let discovery = MockDiscovery::new();
        let store = MemorySessionStore::new();
        let (manager, driver) = SessionManager::new(
            config,
            transport.clone(),
            discovery.clone(),
            Arc::new(store.clone()),
        );
        tokio::spawn(driver.run());
        Self {
            manager,
            transport,
            discovery,
            store,
        }
    }

    /// A fresh manager sharing this harness's store, modeling a process
    /// restart. The mocks are new; persisted state carries over.
    pub fn restart(&self) -> Self {
        let transport = MockTransport::new();
        let discovery = MockDiscovery::new();
        let (manager, driver) = SessionManager::new(
            Config::new(TEST_APP_ID),
            transport.clone(),
            discovery.clone(),
            Arc::new(self.store.clone()),
        );
        tokio::spawn(driver.run());
        Self {
            manager,
            transport,
            discovery,
            store: self.store.clone(),
        }
    }

    pub fn test_device(&self) -> Device {
        Device::new("device-1", "Living Room TV", "route-1")
    }

    /// Connects through the full select/connect/launch path and waits for
    /// the session to establish.
    pub async fn connect_and_launch(&self) {
        self.manager.select_device(Some(self.test_device())).await;
        self.transport.emit_connected().await;
        self.wait_until_connected().await;
    }

    pub async fn wait_until_connected(&self) {
        let mut status = self.manager.watch_connection_status();
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while !self.manager.is_connected() {
                status.changed().await.expect("status channel closed");
            }
        })
        .await
        .expect("timed out waiting for the session to connect");
    }

    /// Yields a few times so spawned tasks and the event driver settle.
    pub async fn settle(&self) {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
