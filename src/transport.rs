//! 外部协作者接口：发现/传输层通过这里与核心交互。
//! External collaborator seams: the discovery/transport layer talks to the core here.
//!
//! The core never owns radio or protocol details. It drives a
//! [`CastTransport`] through a narrow asynchronous interface and learns
//! about connection progress through [`TransportEvent`]s delivered on a
//! channel supplied at connect time.
//!
//! 核心不持有任何无线或协议细节。它通过一个窄的异步接口驱动
//! [`CastTransport`]，并通过在连接时提供的通道接收 [`TransportEvent`]
//! 来获知连接进展。

use crate::device::{Device, RouteInfo};
use crate::error::{Result, StatusCode};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Identifies one transport handle. Events carry the id so callbacks for a
/// released handle can be recognized and dropped.
///
/// 标识一个传输句柄。事件携带此ID，使得已释放句柄的回调可以被识别并丢弃。
pub type HandleId = u64;

/// The cause code accompanying a transport-reported suspension.
/// 传输层报告挂起时附带的原因码。
pub type SuspensionCause = i32;

/// An exclusive handle to one transport-level device connection.
///
/// The handle is owned by the connection state machine; no other component
/// holds or mutates it directly.
///
/// 指向一个传输层设备连接的独占句柄。
///
/// 句柄由连接状态机独占持有；其他组件不直接持有或修改它。
#[derive(Debug, Clone)]
pub struct TransportHandle {
    id: HandleId,
    device: Device,
}

impl TransportHandle {
    /// Creates a handle bound to `device`.
    /// 创建一个绑定到 `device` 的句柄。
    pub fn new(id: HandleId, device: Device) -> Self {
        Self { id, device }
    }

    /// The handle identifier used to tag transport events.
    /// 用于标记传输事件的句柄标识符。
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// The device this handle is bound to.
    /// 此句柄绑定的设备。
    pub fn device(&self) -> &Device {
        &self.device
    }
}

/// Metadata describing the receiver-side application.
/// 描述接收端应用程序的元数据。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationMetadata {
    /// The receiver application identifier.
    /// 接收端应用标识符。
    pub application_id: String,
    /// Human-readable application name.
    /// 人类可读的应用名称。
    pub name: String,
}

/// The successful result of launching or joining a receiver application.
/// 启动或加入接收端应用成功后的结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationConnection {
    /// Metadata of the connected application.
    /// 已连接应用的元数据。
    pub metadata: ApplicationMetadata,
    /// The receiver-reported application status string.
    /// 接收端报告的应用状态字符串。
    pub application_status: String,
    /// The receiver-side session identifier.
    /// 接收端会话标识符。
    pub session_id: String,
    /// `true` if a new application instance was launched, `false` if an
    /// existing session was joined.
    /// 如果启动了新的应用实例则为 `true`，加入已有会话则为 `false`。
    pub was_launched: bool,
}

/// Connection progress reported asynchronously by the transport.
/// 传输层异步报告的连接进展。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    /// The device-level connection is up.
    /// 设备级连接已建立。
    Connected,
    /// The connection attempt failed.
    /// 连接尝试失败。
    ConnectFailed {
        /// The transport-reported failure status.
        /// 传输层报告的失败状态。
        status: StatusCode,
    },
    /// Connectivity was transiently lost; the transport will try to recover
    /// the same connection. This is not a user-intended disconnect.
    /// 连通性瞬时丢失；传输层会尝试恢复同一连接。这不是用户主动断开。
    Suspended {
        /// The transport-reported suspension cause.
        /// 传输层报告的挂起原因。
        cause: SuspensionCause,
    },
}

/// A transport event tagged with the handle it belongs to.
///
/// Events for a given handle are delivered in the order the transport
/// produces them; the core serializes its own handling.
///
/// 带有所属句柄标记的传输事件。
///
/// 同一句柄的事件按传输层产生的顺序交付；核心对自身的处理进行串行化。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    /// The handle this event belongs to.
    /// 此事件所属的句柄。
    pub handle: HandleId,
    /// What happened.
    /// 发生了什么。
    pub kind: TransportEventKind,
}

/// The network transport to a cast device.
///
/// The caller mints the [`TransportHandle`] and registers it before calling
/// `connect`, which binds the handle and begins the handshake in the
/// background; progress arrives as [`TransportEvent`]s on the supplied
/// channel, tagged with the handle id. The transport may emit events as
/// early as from inside `connect` itself. Application operations resolve
/// asynchronously and report remote failures as
/// [`crate::error::Error::OperationFailed`].
///
/// 到投屏设备的网络传输。
///
/// 调用者铸造 [`TransportHandle`] 并在调用 `connect` 之前登记它；
/// `connect` 绑定该句柄并在后台开始握手，进展以带句柄ID标记的
/// [`TransportEvent`] 的形式到达所提供的通道。传输层最早可以在
/// `connect` 内部就发出事件。应用操作异步完成，远端失败通过
/// [`crate::error::Error::OperationFailed`] 报告。
#[async_trait]
pub trait CastTransport: Send + Sync {
    /// Binds the caller-minted handle to the device it carries and begins
    /// an asynchronous connect for the given application id.
    /// 将调用者铸造的句柄绑定到其承载的设备，并为给定应用ID开始异步连接。
    async fn connect(
        &self,
        handle: &TransportHandle,
        application_id: &str,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<()>;

    /// Re-issues a connect on an existing, not-yet-connected handle.
    /// 在已存在但尚未连接的句柄上重新发起连接。
    async fn reconnect(&self, handle: &TransportHandle) -> Result<()>;

    /// Releases the handle, tearing down any device-level connection.
    /// 释放句柄，拆除所有设备级连接。
    async fn disconnect(&self, handle: &TransportHandle);

    /// Requests a receiver status refresh on a connected handle.
    /// 在已连接的句柄上请求接收器状态刷新。
    async fn request_status(&self, handle: &TransportHandle) -> Result<()>;

    /// Launches a new instance of the receiver application.
    /// 启动接收端应用的新实例。
    async fn launch_application(
        &self,
        handle: &TransportHandle,
        application_id: &str,
    ) -> Result<ApplicationConnection>;

    /// Joins an existing receiver application session.
    /// 加入已存在的接收端应用会话。
    async fn join_application(
        &self,
        handle: &TransportHandle,
        application_id: &str,
        session_id: &str,
    ) -> Result<ApplicationConnection>;

    /// Stops the running receiver application.
    /// 停止正在运行的接收端应用。
    async fn stop_application(&self, handle: &TransportHandle) -> Result<()>;

    /// Reads the receiver device volume, between 0.0 and 1.0.
    /// 读取接收设备音量，范围 0.0 到 1.0。
    async fn volume(&self, handle: &TransportHandle) -> Result<f64>;

    /// Sets the receiver device volume, between 0.0 and 1.0.
    /// 设置接收设备音量，范围 0.0 到 1.0。
    async fn set_volume(&self, handle: &TransportHandle, level: f64) -> Result<()>;

    /// Reads whether the receiver device is muted.
    /// 读取接收设备是否静音。
    async fn is_muted(&self, handle: &TransportHandle) -> Result<bool>;

    /// Mutes or un-mutes the receiver device.
    /// 将接收设备静音或取消静音。
    async fn set_muted(&self, handle: &TransportHandle, muted: bool) -> Result<()>;
}

/// The route discovery collaborator.
///
/// The core only consumes the current route table and toggles active
/// scanning; protocol internals (mDNS, route scanning) stay outside.
///
/// 路由发现协作者。
///
/// 核心只消费当前路由表并开关主动扫描；协议内部（mDNS、路由扫描）留在外部。
pub trait RouteDiscovery: Send + Sync {
    /// The currently known discovered routes.
    /// 当前已知的已发现路由。
    fn known_routes(&self) -> Vec<RouteInfo>;

    /// Falls the active route selection back to the default route.
    /// 将活动路由选择回退到默认路由。
    fn select_default_route(&self);

    /// Enables or disables active discovery scanning.
    /// 启用或禁用主动发现扫描。
    fn set_active_scan(&self, enabled: bool);
}
