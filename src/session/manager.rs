//! 会话管理器门面与连接状态机的驱动逻辑。
//! The session manager facade and the driving logic of the connection
//! state machine.
//!
//! A single logical owner serializes every state transition: the facade
//! methods and the transport-event driver all funnel through one mutex that
//! is never held across an await point. Timed background work (the recovery
//! countdown, the visibility debounce) re-enters through the same facade
//! instead of touching shared state directly.
//!
//! 单一逻辑所有者串行化所有状态转换：门面方法和传输事件驱动器都经过
//! 同一个互斥锁，且该锁从不跨越等待点持有。定时后台工作（恢复倒计时、
//! 可见性防抖）通过同一门面重入，而不直接触碰共享状态。

use crate::config::Config;
use crate::consumer::{ConsumerRegistry, SessionConsumer};
use crate::device::{Device, RouteInfo};
use crate::error::{Error, Result, StatusCode};
use crate::session::reconnect::{CountdownOutcome, ReconnectRun, run_countdown};
use crate::session::state::{ConnectionStatus, MachineState, ReconnectionStatus};
use crate::session::visibility::VisibilityTracker;
use crate::store::{
    KEY_APPLICATION_ID, KEY_ROUTE_ID, KEY_SESSION_ID, KEY_VOLUME_INCREMENT, PersistedSession,
    SessionStore,
};
use crate::transport::{
    ApplicationConnection, CastTransport, RouteDiscovery, SuspensionCause, TransportEvent,
    TransportEventKind, TransportHandle,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

/// Capacity of the transport event channel.
/// 传输事件通道的容量。
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct ReconnectSlot {
    run: Option<ReconnectRun>,
    generation: u64,
}

struct Inner {
    config: Config,
    transport: Arc<dyn CastTransport>,
    discovery: Arc<dyn RouteDiscovery>,
    store: Arc<dyn SessionStore>,
    consumers: ConsumerRegistry,
    machine: Mutex<MachineState>,
    reconnect: Mutex<ReconnectSlot>,
    visibility: Arc<VisibilityTracker>,
    status_tx: watch::Sender<ConnectionStatus>,
    reconnection_tx: watch::Sender<ReconnectionStatus>,
    event_tx: mpsc::Sender<TransportEvent>,
    network_up: AtomicBool,
    next_handle_id: AtomicU64,
}

/// The single entry point for session lifecycle control.
///
/// Composes the connection state machine, the recovery coordinator, the
/// consumer registry, and the visibility tracker behind one cloneable
/// facade. Construct it with [`SessionManager::new`] and spawn the returned
/// [`EventDriver`] to process transport callbacks.
///
/// 会话生命周期控制的唯一入口。
///
/// 将连接状态机、恢复协调器、消费者注册表和可见性跟踪器组合在一个可克隆的
/// 门面之后。使用 [`SessionManager::new`] 构造，并派生运行返回的
/// [`EventDriver`] 以处理传输回调。
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("application_id", &self.inner.config.application_id)
            .field("status", &self.connection_status())
            .finish()
    }
}

/// Drives transport events into the session manager. Spawn `run()` once;
/// it exits when the transport event channel closes.
///
/// 将传输事件驱动进会话管理器。派生运行一次 `run()`；
/// 当传输事件通道关闭时它会退出。
pub struct EventDriver {
    manager: SessionManager,
    events: mpsc::Receiver<TransportEvent>,
}

impl EventDriver {
    /// Runs the event loop, serializing the handling of every transport
    /// callback.
    /// 运行事件循环，串行化处理每个传输回调。
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            self.manager.handle_transport_event(event).await;
        }
        trace!("Transport event channel closed; event driver exiting");
    }
}

impl SessionManager {
    /// Creates a session manager and its event driver.
    ///
    /// The configured application id and volume step are written to the
    /// persisted store immediately so a later process restart can recover
    /// them alongside the session identifiers.
    ///
    /// 创建会话管理器及其事件驱动器。
    ///
    /// 配置的应用ID和音量步长会立即写入持久化存储，
    /// 以便之后的进程重启能连同会话标识一起恢复它们。
    pub fn new(
        config: Config,
        transport: Arc<dyn CastTransport>,
        discovery: Arc<dyn RouteDiscovery>,
        store: Arc<dyn SessionStore>,
    ) -> (Self, EventDriver) {
        store.put(KEY_APPLICATION_ID, &config.application_id);
        store.put(KEY_VOLUME_INCREMENT, &config.volume.increment.to_string());

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        let (reconnection_tx, _) = watch::channel(ReconnectionStatus::Inactive);
        let visibility = Arc::new(VisibilityTracker::new(
            config.visibility.decrement_debounce,
            discovery.clone(),
        ));

        info!(application_id = %config.application_id, "Session manager created");

        let manager = Self {
            inner: Arc::new(Inner {
                config,
                transport,
                discovery,
                store,
                consumers: ConsumerRegistry::new(),
                machine: Mutex::new(MachineState::new()),
                reconnect: Mutex::new(ReconnectSlot::default()),
                visibility,
                status_tx,
                reconnection_tx,
                event_tx,
                network_up: AtomicBool::new(true),
                next_handle_id: AtomicU64::new(1),
            }),
        };
        let driver = EventDriver {
            manager: manager.clone(),
            events: event_rx,
        };
        (manager, driver)
    }

    /// Selects a device (or clears the selection with `None`) using the
    /// configured stop-on-disconnect policy.
    /// 选择设备（或传入 `None` 清除选择），使用已配置的断开时停止策略。
    pub async fn select_device(&self, device: Option<Device>) {
        let stop_on_exit = self.machine().stop_on_disconnect;
        self.select_device_with_policy(device, stop_on_exit).await;
    }

    /// Selects a device with an explicit stop-on-exit policy.
    ///
    /// Failures on this path are reported to registered consumers, never
    /// returned to the caller.
    ///
    /// 以显式的退出时停止策略选择设备。
    ///
    /// 此路径上的失败会报告给已注册的消费者，绝不返回给调用者。
    pub async fn select_device_with_policy(&self, device: Option<Device>, stop_on_exit: bool) {
        match device {
            Some(device) => self.attach_device(device).await,
            None => self.detach_device(stop_on_exit).await,
        }
    }

    /// Disconnects from the device and stops the remote application.
    /// 断开与设备的连接并停止远端应用。
    pub async fn disconnect(&self) {
        if self.is_connected() {
            self.select_device_with_policy(None, true).await;
        }
    }

    /// Whether a session to a cast device is fully established.
    /// 到投屏设备的会话是否已完全建立。
    pub fn is_connected(&self) -> bool {
        *self.inner.status_tx.borrow() == ConnectionStatus::Connected
    }

    /// The current connection status.
    /// 当前连接状态。
    pub fn connection_status(&self) -> ConnectionStatus {
        *self.inner.status_tx.borrow()
    }

    /// Subscribes to connection status changes.
    /// 订阅连接状态变化。
    pub fn watch_connection_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status_tx.subscribe()
    }

    /// The current recovery progress.
    /// 当前恢复进展。
    pub fn reconnection_status(&self) -> ReconnectionStatus {
        *self.inner.reconnection_tx.borrow()
    }

    /// Subscribes to recovery progress changes. UI surfaces that want a
    /// progress indicator watch this instead of the coordinator taking a
    /// dialog concern.
    /// 订阅恢复进展变化。需要进度指示的UI界面观察此通道，
    /// 而不是让协调器承担对话框职责。
    pub fn watch_reconnection_status(&self) -> watch::Receiver<ReconnectionStatus> {
        self.inner.reconnection_tx.subscribe()
    }

    /// The human-readable name of the selected device, if any.
    /// 当前所选设备的人类可读名称（如果有）。
    pub fn device_name(&self) -> Option<String> {
        self.machine().device.as_ref().map(|d| d.name.clone())
    }

    /// Sets whether a user-initiated disconnect stops the remote
    /// application. Read at disconnect time only.
    /// 设置用户主动断开时是否停止远端应用。仅在断开时读取。
    pub fn set_stop_on_disconnect(&self, stop_on_exit: bool) {
        self.machine().stop_on_disconnect = stop_on_exit;
    }

    /// Registers a lifecycle consumer. Idempotent.
    /// 注册一个生命周期消费者。幂等。
    pub fn register_consumer(&self, consumer: Arc<dyn SessionConsumer>) {
        self.inner.consumers.register(consumer);
    }

    /// Unregisters a lifecycle consumer. Idempotent.
    /// 注销一个生命周期消费者。幂等。
    pub fn unregister_consumer(&self, consumer: &Arc<dyn SessionConsumer>) {
        self.inner.consumers.unregister(consumer);
    }

    /// Reports a feature-level failure to every registered consumer.
    ///
    /// Collaborators surface failures from their own remote calls here so
    /// observers see them through the same fan-out as lifecycle events.
    ///
    /// 将功能级失败报告给每个已注册的消费者。
    ///
    /// 协作者在此呈报其自身远程调用的失败，
    /// 使观察者通过与生命周期事件相同的扇出看到它们。
    pub fn notify_failed(&self, reason: &str, status: StatusCode) {
        warn!(reason, status, "Collaborator reported a failure");
        self.inner
            .consumers
            .notify("on_failed", |c| c.on_failed(reason, status));
    }

    /// Signals that a UI surface became visible.
    /// 通知一个UI界面变为可见。
    pub fn increment_ui_visible(&self) {
        self.inner.visibility.increment();
    }

    /// Signals that a UI surface became invisible (debounced).
    /// 通知一个UI界面变为不可见（带防抖）。
    pub fn decrement_ui_visible(&self) {
        self.inner.visibility.decrement();
    }

    /// Whether enough information is persisted to attempt session recovery:
    /// both a session id and a route id from the last successful launch.
    /// 是否持久化了足以尝试会话恢复的信息：
    /// 上次成功启动留下的会话ID和路由ID都存在。
    pub fn can_consider_recovery(&self) -> bool {
        PersistedSession::load(self.inner.store.as_ref()).is_some()
    }

    /// Fails unless the session is usable: `Ok` when connected,
    /// [`Error::TransientDisconnection`] while suspended (retry later),
    /// [`Error::NoConnection`] otherwise.
    /// 除非会话可用否则失败：已连接时返回 `Ok`，挂起时返回
    /// [`Error::TransientDisconnection`]（稍后重试），其余情况返回
    /// [`Error::NoConnection`]。
    pub fn check_connectivity(&self) -> Result<()> {
        let machine = self.machine();
        match machine.status {
            ConnectionStatus::Connected => Ok(()),
            ConnectionStatus::Suspended => Err(Error::TransientDisconnection),
            _ => Err(Error::NoConnection),
        }
    }

    /// Reads the receiver device volume.
    /// 读取接收设备音量。
    pub async fn volume(&self) -> Result<f64> {
        let handle = self.connected_handle()?;
        self.inner.transport.volume(&handle).await
    }

    /// Sets the receiver device volume, clamped to `0.0..=1.0`.
    /// 设置接收设备音量，截断到 `0.0..=1.0`。
    pub async fn set_volume(&self, level: f64) -> Result<()> {
        let handle = self.connected_handle()?;
        self.inner
            .transport
            .set_volume(&handle, level.clamp(0.0, 1.0))
            .await
    }

    /// Adjusts the receiver device volume by `delta`.
    /// 按 `delta` 调整接收设备音量。
    pub async fn increment_volume(&self, delta: f64) -> Result<()> {
        let current = self.volume().await?;
        self.set_volume(current + delta).await
    }

    /// Reads whether the receiver device is muted.
    /// 读取接收设备是否静音。
    pub async fn is_muted(&self) -> Result<bool> {
        let handle = self.connected_handle()?;
        self.inner.transport.is_muted(&handle).await
    }

    /// Mutes or un-mutes the receiver device.
    /// 将接收设备静音或取消静音。
    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        let handle = self.connected_handle()?;
        self.inner.transport.set_muted(&handle, muted).await
    }

    /// Stops the receiver application. Connectivity errors are returned;
    /// a remote failure is delivered to consumers as
    /// `on_application_stop_failed`, never returned.
    /// 停止接收端应用。连通性错误会返回；远端失败以
    /// `on_application_stop_failed` 投递给消费者，绝不返回。
    pub async fn stop_application(&self) -> Result<()> {
        let handle = self.connected_handle()?;
        if let Err(error) = self.inner.transport.stop_application(&handle).await {
            warn!(%error, "Stopping the receiver application failed");
            let status = error.status_code();
            self.inner
                .consumers
                .notify("on_application_stop_failed", |c| {
                    c.on_application_stop_failed(status)
                });
        }
        Ok(())
    }

    /// Attempts to recover the persisted session, bounded by `timeout`.
    ///
    /// A no-op when already connected or when no complete persisted
    /// session/route pair exists. Starting a new attempt supersedes any
    /// prior outstanding one.
    ///
    /// 尝试恢复持久化的会话，以 `timeout` 为时限。
    ///
    /// 已连接或不存在完整的持久化会话/路由对时为空操作。
    /// 开始新的尝试会取代任何先前未完成的尝试。
    pub async fn reconnect_if_possible(&self, timeout: Duration) {
        if self.is_connected() {
            return;
        }
        let Some(persisted) = PersistedSession::load(self.inner.store.as_ref()) else {
            debug!("No recoverable persisted session; skipping recovery");
            return;
        };
        info!(
            session_id = %persisted.session_id,
            route_id = %persisted.route_id,
            timeout_secs = timeout.as_secs(),
            "Attempting to recover the persisted session"
        );

        // Supersede any outstanding run before starting a new one.
        let generation = {
            let mut slot = self.reconnect_slot();
            if let Some(run) = slot.run.take() {
                run.cancel();
            }
            slot.generation += 1;
            slot.generation
        };

        let target = self
            .inner
            .discovery
            .known_routes()
            .into_iter()
            .find(|route| route.id == persisted.route_id)
            .and_then(|route| route.device);

        match target {
            Some(device) => {
                // The route is already discovered; connect right away.
                self.set_reconnection(ReconnectionStatus::InProgress);
                self.select_device(Some(device)).await;
            }
            None => {
                // Wait for the discovery layer to re-report the route.
                self.set_reconnection(ReconnectionStatus::Started);
            }
        }

        let tick = self.inner.config.reconnection.tick_interval;
        let ticks = Self::countdown_ticks(timeout, tick);
        let (run, cancel_rx) = ReconnectRun::new();
        let status_rx = self.inner.status_tx.subscribe();
        self.reconnect_slot().run = Some(run);

        let manager = self.clone();
        tokio::spawn(async move {
            match run_countdown(ticks, tick, status_rx, cancel_rx).await {
                CountdownOutcome::Expired => manager.finish_expired_recovery(generation).await,
                CountdownOutcome::Connected => {
                    let mut slot = manager.reconnect_slot();
                    if slot.generation == generation {
                        slot.run = None;
                    }
                }
                CountdownOutcome::Cancelled => {}
            }
        });
    }

    /// Attempts to recover the persisted session with the configured
    /// default time budget.
    /// 使用配置的默认时间预算尝试恢复持久化的会话。
    pub async fn reconnect_if_possible_default(&self) {
        let timeout = self.inner.config.reconnection.default_timeout;
        self.reconnect_if_possible(timeout).await;
    }

    /// Cancels an outstanding recovery attempt, forcing the same clean
    /// teardown as timeout exhaustion, immediately. Idempotent.
    /// 取消未完成的恢复尝试，立即执行与超时耗尽相同的干净清理。幂等。
    pub async fn cancel_reconnection(&self) {
        let run = {
            let mut slot = self.reconnect_slot();
            slot.generation += 1;
            slot.run.take()
        };
        if let Some(run) = run {
            run.cancel();
        }
        if self.reconnection_status().is_active() {
            info!("Session recovery cancelled");
            self.set_reconnection(ReconnectionStatus::Inactive);
            self.select_device(None).await;
        }
    }

    /// Notifies the core of an underlying network connectivity change. On
    /// the down→up edge a recovery attempt is scheduled after a short
    /// settle delay.
    /// 通知核心底层网络连通性发生变化。在断开→恢复的边沿上，
    /// 会在短暂的稳定延迟后调度一次恢复尝试。
    pub fn notify_network_connectivity_changed(&self, connected: bool) {
        let was_up = self.inner.network_up.swap(connected, Ordering::SeqCst);
        debug!(connected, "Network connectivity changed");
        if connected && !was_up {
            let manager = self.clone();
            let delay = self.inner.config.reconnection.network_recovery_delay;
            let timeout = self.inner.config.reconnection.network_recovery_timeout;
            tokio::spawn(async move {
                sleep(delay).await;
                manager.reconnect_if_possible(timeout).await;
            });
        }
    }

    /// Called by the discovery collaborator when a route appears. Consumers
    /// are informed; if a recovery run is waiting for this route, the
    /// connection attempt is started.
    /// 由发现协作者在路由出现时调用。消费者会被告知；
    /// 如果有恢复运行正在等待此路由，则启动连接尝试。
    pub async fn on_route_added(&self, route: &RouteInfo) {
        trace!(route_id = %route.id, route_name = %route.name, "Route added");
        self.inner
            .consumers
            .notify("on_cast_device_detected", |c| {
                c.on_cast_device_detected(route)
            });

        if self.reconnection_status() != ReconnectionStatus::Started || self.is_connected() {
            return;
        }
        let Some(persisted) = PersistedSession::load(self.inner.store.as_ref()) else {
            return;
        };
        if route.id != persisted.route_id {
            return;
        }
        let Some(device) = route.device.clone() else {
            return;
        };
        info!(route_id = %route.id, "Persisted route rediscovered; resuming recovery");
        self.set_reconnection(ReconnectionStatus::InProgress);
        self.select_device(Some(device)).await;
    }

    /// Called by the discovery collaborator when a route disappears.
    /// 由发现协作者在路由消失时调用。
    pub fn on_route_removed(&self, route: &RouteInfo) {
        trace!(route_id = %route.id, "Route removed");
    }

    /*************************************************************************/
    /************** Internal transitions *************************************/
    /*************************************************************************/

    async fn attach_device(&self, device: Device) {
        enum Action {
            Noop,
            Retry(TransportHandle),
            Create(TransportHandle),
        }

        // The handle is minted and stored before the transport is asked to
        // connect, so an event the transport emits from inside `connect`
        // already finds its handle registered.
        let action = {
            let mut machine = self.machine();
            match &machine.handle {
                Some(_) if machine.status == ConnectionStatus::Connected => Action::Noop,
                Some(handle) => Action::Retry(handle.clone()),
                None => {
                    let id = self.inner.next_handle_id.fetch_add(1, Ordering::SeqCst);
                    let handle = TransportHandle::new(id, device.clone());
                    machine.device = Some(device.clone());
                    machine.handle = Some(handle.clone());
                    self.apply_status(&mut machine, ConnectionStatus::Connecting);
                    Action::Create(handle)
                }
            }
        };

        match action {
            Action::Noop => {
                debug!(device = %device, "Device already connected; ignoring selection");
            }
            Action::Retry(handle) => {
                debug!(device = %device, "Re-issuing connect on the existing handle");
                if let Err(error) = self.inner.transport.reconnect(&handle).await {
                    warn!(%error, "Re-issuing connect failed");
                }
            }
            Action::Create(handle) => {
                info!(device = %device, handle = handle.id(), "Connecting to cast device");
                let connect = self
                    .inner
                    .transport
                    .connect(
                        &handle,
                        &self.inner.config.application_id,
                        self.inner.event_tx.clone(),
                    )
                    .await;
                if let Err(error) = connect {
                    warn!(%error, "Binding the transport handle failed");
                    self.handle_connect_failed(error.status_code()).await;
                }
            }
        }
    }

    async fn detach_device(&self, stop_on_exit: bool) {
        let (handle, was_suspended, was_connected) = {
            let mut machine = self.machine();
            let was_suspended = machine.is_suspended();
            let was_connected = machine.status == ConnectionStatus::Connected;
            machine.device = None;
            let handle = machine.handle.take();
            self.apply_status(&mut machine, ConnectionStatus::Disconnected);
            (handle, was_suspended, was_connected)
        };

        // A suspension is not a user-intended disconnect: the persisted
        // session must survive it so the session can be rejoined.
        if !was_suspended {
            PersistedSession::clear(self.inner.store.as_ref());
        }

        if let Some(handle) = &handle {
            if was_connected && stop_on_exit {
                debug!("Stopping the receiver application before disconnecting");
                if let Err(error) = self.inner.transport.stop_application(handle).await {
                    warn!(%error, "Failed to stop the application while disconnecting");
                    let status = error.status_code();
                    self.inner
                        .consumers
                        .notify("on_application_stop_failed", |c| {
                            c.on_application_stop_failed(status)
                        });
                }
            }
        }

        self.inner
            .consumers
            .notify("on_disconnected", |c| c.on_disconnected());

        if let Some(handle) = handle {
            info!(handle = handle.id(), "Releasing the transport handle");
            self.inner.transport.disconnect(&handle).await;
            self.inner.discovery.select_default_route();
        }
    }

    async fn handle_transport_event(&self, event: TransportEvent) {
        let handle = {
            let machine = self.machine();
            match &machine.handle {
                Some(handle) if handle.id() == event.handle => Some(handle.clone()),
                _ => None,
            }
        };
        let Some(handle) = handle else {
            trace!(handle = event.handle, "Dropping event for a stale handle");
            return;
        };

        match event.kind {
            TransportEventKind::Connected => self.handle_connected(handle).await,
            TransportEventKind::ConnectFailed { status } => {
                self.handle_connect_failed(status).await
            }
            TransportEventKind::Suspended { cause } => self.handle_suspended(cause),
        }
    }

    async fn handle_connected(&self, handle: TransportHandle) {
        let recovered_from_suspension = {
            let mut machine = self.machine();
            if machine.is_suspended() {
                self.apply_status(&mut machine, ConnectionStatus::Connected);
                true
            } else {
                false
            }
        };
        if recovered_from_suspension {
            // The receiver-side session is still in place; do not relaunch.
            info!("Connectivity recovered after a transient suspension");
            self.inner
                .consumers
                .notify("on_connectivity_recovered", |c| {
                    c.on_connectivity_recovered()
                });
            return;
        }

        if let Err(error) = self.inner.transport.request_status(&handle).await {
            warn!(%error, "Requesting receiver status failed");
        }

        let joining = self.reconnection_status() == ReconnectionStatus::InProgress;
        let persisted_session_id = self.inner.store.get(KEY_SESSION_ID);
        let application_id = self.inner.config.application_id.clone();

        let result = match (joining, persisted_session_id) {
            (true, Some(session_id)) => {
                debug!(%session_id, "Attempting to join the interrupted session");
                self.inner
                    .transport
                    .join_application(&handle, &application_id, &session_id)
                    .await
            }
            _ => {
                debug!("Launching the receiver application");
                self.inner
                    .transport
                    .launch_application(&handle, &application_id)
                    .await
            }
        };

        match result {
            Ok(connection) => self.complete_application_connection(handle, connection).await,
            Err(error) => {
                let still_current = {
                    let machine = self.machine();
                    machine
                        .handle
                        .as_ref()
                        .is_some_and(|current| current.id() == handle.id())
                };
                if !still_current {
                    // The session was already torn down while the launch or
                    // join was in flight; it must not be torn down again.
                    trace!("Discarding application failure for a released handle");
                    return;
                }
                let status = error.status_code();
                warn!(%error, joining, "Attaching to the receiver application failed");
                self.inner
                    .consumers
                    .notify("on_application_connection_failed", |c| {
                        c.on_application_connection_failed(status)
                    });
                self.set_reconnection(ReconnectionStatus::Inactive);
                self.select_device_with_policy(None, false).await;
            }
        }
    }

    async fn complete_application_connection(
        &self,
        handle: TransportHandle,
        connection: ApplicationConnection,
    ) {
        {
            let mut machine = self.machine();
            let still_current = machine
                .handle
                .as_ref()
                .is_some_and(|current| current.id() == handle.id());
            if !still_current {
                trace!("Discarding application connection for a released handle");
                return;
            }
            self.apply_status(&mut machine, ConnectionStatus::Connected);
        }

        // The session id returned by launch/join is the recovery anchor;
        // the route is only (re)persisted when a new instance was launched.
        self.inner
            .store
            .put(KEY_SESSION_ID, &connection.session_id);
        if connection.was_launched {
            self.inner
                .store
                .put(KEY_ROUTE_ID, &handle.device().route_id);
        }
        self.set_reconnection(ReconnectionStatus::Inactive);

        info!(
            session_id = %connection.session_id,
            was_launched = connection.was_launched,
            "Receiver application connected"
        );
        self.inner.consumers.notify("on_connected", |c| c.on_connected());
        self.inner
            .consumers
            .notify("on_application_connected", |c| {
                c.on_application_connected(
                    &connection.metadata,
                    &connection.application_status,
                    &connection.session_id,
                    connection.was_launched,
                )
            });
    }

    async fn handle_connect_failed(&self, status: StatusCode) {
        info!(status, "Connection to the cast device failed");
        let handle = {
            let mut machine = self.machine();
            machine.device = None;
            let handle = machine.handle.take();
            self.apply_status(&mut machine, ConnectionStatus::Disconnected);
            handle
        };
        if let Some(handle) = handle {
            self.inner.transport.disconnect(&handle).await;
        }
        self.inner.discovery.select_default_route();
        self.inner
            .consumers
            .notify("on_connection_failed", |c| c.on_connection_failed(status));
    }

    fn handle_suspended(&self, cause: SuspensionCause) {
        info!(cause, "Connection suspended by the transport");
        {
            let mut machine = self.machine();
            self.apply_status(&mut machine, ConnectionStatus::Suspended);
        }
        self.inner
            .consumers
            .notify("on_connection_suspended", |c| {
                c.on_connection_suspended(cause)
            });
    }

    /// Timed-out recovery must not leave a partially-connecting session
    /// dangling; force a clean disconnect.
    /// 超时的恢复不能留下半连接的会话悬挂着；强制干净地断开。
    async fn finish_expired_recovery(&self, generation: u64) {
        {
            let mut slot = self.reconnect_slot();
            if slot.generation != generation {
                return;
            }
            slot.run = None;
        }
        info!("Session recovery timed out");
        self.set_reconnection(ReconnectionStatus::Inactive);
        self.select_device(None).await;
    }

    fn connected_handle(&self) -> Result<TransportHandle> {
        let machine = self.machine();
        match machine.status {
            ConnectionStatus::Connected => {
                machine.handle.clone().ok_or(Error::NoConnection)
            }
            ConnectionStatus::Suspended => Err(Error::TransientDisconnection),
            _ => Err(Error::NoConnection),
        }
    }

    fn machine(&self) -> MutexGuard<'_, MachineState> {
        self.inner
            .machine
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn reconnect_slot(&self) -> MutexGuard<'_, ReconnectSlot> {
        self.inner
            .reconnect
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn apply_status(&self, machine: &mut MachineState, status: ConnectionStatus) {
        if machine.transition_to(status).is_ok() {
            self.inner.status_tx.send_replace(machine.status);
        }
    }

    fn set_reconnection(&self, status: ReconnectionStatus) {
        let mut machine = self.machine();
        if machine.reconnection != status {
            debug!(from = ?machine.reconnection, to = ?status, "Reconnection status changed");
            machine.reconnection = status;
            self.inner.reconnection_tx.send_replace(status);
        }
    }

    fn countdown_ticks(timeout: Duration, tick: Duration) -> u32 {
        let tick_millis = tick.as_millis().max(1);
        let ticks = timeout.as_millis().div_ceil(tick_millis);
        ticks.clamp(1, u32::MAX as u128) as u32
    }
}
