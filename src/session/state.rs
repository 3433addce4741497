//! 连接状态机的状态类型与转换验证。
//! State types and transition validation for the connection state machine.

use crate::device::Device;
use crate::error::{Error, Result};
use crate::transport::TransportHandle;
use tracing::{trace, warn};

/// The high-level connection status. Exactly one value at any time, owned
/// exclusively by the connection state machine.
///
/// 高层连接状态。任意时刻恰好一个值，由连接状态机独占所有。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No device is selected and no transport handle exists.
    /// 未选择设备，也不存在传输句柄。
    Disconnected,
    /// A device is selected and the transport handshake is underway.
    /// 已选择设备，传输握手正在进行。
    Connecting,
    /// The device connection is up and the receiver application is attached.
    /// 设备连接已建立且接收端应用已就绪。
    Connected,
    /// Connectivity is transiently lost; the session is expected to resume.
    /// 连通性瞬时丢失；会话预期会恢复。
    Suspended,
}

impl ConnectionStatus {
    /// Gets the string representation of the status (for logging).
    /// 获取状态的字符串表示（用于日志）。
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Connecting => "Connecting",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Suspended => "Suspended",
        }
    }

    /// Checks whether a transition to `new` is legal.
    ///
    /// Re-entering the current status is always allowed; `Connected` and
    /// `Suspended` are only reachable through an existing handshake or
    /// connection.
    ///
    /// 检查到 `new` 的转换是否合法。
    ///
    /// 重新进入当前状态总是允许的；`Connected` 和 `Suspended`
    /// 只能经由已有的握手或连接到达。
    pub fn is_valid_transition(&self, new: &ConnectionStatus) -> bool {
        use ConnectionStatus::*;
        if self == new {
            return true;
        }
        matches!(
            (self, new),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Suspended)
                | (Connecting, Disconnected)
                | (Connected, Suspended)
                | (Connected, Disconnected)
                | (Suspended, Connected)
                | (Suspended, Disconnected)
        )
    }
}

/// The progress of a persisted-session recovery attempt. Owned exclusively
/// by the reconnection coordinator, read by the state machine to decide
/// launch-vs-join semantics.
///
/// 持久化会话恢复尝试的进展。由恢复协调器独占所有，
/// 状态机读取它来决定启动还是加入。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectionStatus {
    /// No recovery activity.
    /// 没有恢复活动。
    Inactive,
    /// Recovery requested but the target route has not been rediscovered yet.
    /// 已请求恢复，但目标路由尚未被重新发现。
    Started,
    /// The route was found; the handshake/join is underway.
    /// 路由已找到；握手/加入正在进行。
    InProgress,
    /// Reserved for post-join bookkeeping.
    /// 保留用于加入后的收尾。
    Finalize,
}

impl ReconnectionStatus {
    /// Whether a recovery run is active in any form.
    /// 是否存在任何形式的活动恢复运行。
    pub fn is_active(&self) -> bool {
        !matches!(self, ReconnectionStatus::Inactive)
    }
}

/// The fields of the connection state machine. Protected by a single mutex
/// in the manager; no two state-mutating operations run concurrently.
///
/// 连接状态机的字段。在管理器中由单个互斥锁保护；
/// 任何两个修改状态的操作都不会并发执行。
#[derive(Debug)]
pub(crate) struct MachineState {
    /// The current connection status.
    /// 当前连接状态。
    pub status: ConnectionStatus,
    /// The currently selected device, if any.
    /// 当前选择的设备（如果有）。
    pub device: Option<Device>,
    /// The exclusively owned transport handle, if any.
    /// 独占持有的传输句柄（如果有）。
    pub handle: Option<TransportHandle>,
    /// The recovery progress, mirrored here so the machine can decide
    /// between launching and joining.
    /// 恢复进展，镜像于此以便状态机在启动与加入之间做出决定。
    pub reconnection: ReconnectionStatus,
    /// Whether a user-initiated disconnect should stop the remote
    /// application. Policy input, read at disconnect time only.
    /// 用户主动断开时是否停止远端应用。策略输入，仅在断开时读取。
    pub stop_on_disconnect: bool,
}

impl MachineState {
    pub(crate) fn new() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            device: None,
            handle: None,
            reconnection: ReconnectionStatus::Inactive,
            stop_on_disconnect: false,
        }
    }

    /// Whether the connection is transiently suspended.
    /// 连接是否处于瞬时挂起状态。
    pub(crate) fn is_suspended(&self) -> bool {
        self.status == ConnectionStatus::Suspended
    }

    /// Attempts to transition to `new`, validating legality.
    /// 尝试转换到 `new`，并验证其合法性。
    pub(crate) fn transition_to(&mut self, new: ConnectionStatus) -> Result<()> {
        if !self.status.is_valid_transition(&new) {
            warn!(
                current_status = self.status.name(),
                attempted_status = new.name(),
                "Invalid connection status transition attempted"
            );
            return Err(Error::NoConnection);
        }
        if self.status != new {
            trace!(
                from = self.status.name(),
                to = new.name(),
                "Connection status transition"
            );
        }
        self.status = new;
        Ok(())
    }
}
