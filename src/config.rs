//! 定义了会话管理器的可配置参数。
//! Defines configurable parameters for the session manager.

use std::time::Duration;

/// A structure containing all configurable parameters for a session manager.
///
/// 包含会话管理器所有可配置参数的结构体。
#[derive(Debug, Clone)]
pub struct Config {
    /// The identifier of the receiver-side application to launch or join.
    /// 要在接收端启动或加入的应用程序标识符。
    pub application_id: String,

    /// Session recovery-related parameters.
    /// 会话恢复相关参数。
    pub reconnection: ReconnectionConfig,

    /// UI visibility tracking parameters.
    /// UI可见性跟踪参数。
    pub visibility: VisibilityConfig,

    /// Receiver volume parameters.
    /// 接收器音量参数。
    pub volume: VolumeConfig,
}

impl Config {
    /// Creates a configuration for the given receiver application id, with
    /// defaults for everything else.
    ///
    /// 为给定的接收端应用ID创建配置，其余参数使用默认值。
    pub fn new(application_id: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            reconnection: ReconnectionConfig::default(),
            visibility: VisibilityConfig::default(),
            volume: VolumeConfig::default(),
        }
    }
}

/// Session recovery-related parameters.
///
/// 会话恢复相关参数。
#[derive(Debug, Clone)]
pub struct ReconnectionConfig {
    /// The default time budget for a best-effort session recovery attempt.
    /// 尽力而为的会话恢复尝试的默认时间预算。
    pub default_timeout: Duration,
    /// The interval between countdown ticks of a recovery attempt. Each tick
    /// re-checks whether a connection has been established.
    /// 恢复尝试倒计时的间隔。每次计时都会重新检查连接是否已建立。
    pub tick_interval: Duration,
    /// The timeout used for the recovery attempt scheduled after network
    /// connectivity returns.
    /// 网络连通性恢复后所调度的恢复尝试使用的超时时间。
    pub network_recovery_timeout: Duration,
    /// How long to wait after network connectivity returns before starting
    /// the scheduled recovery attempt, letting the route table settle.
    /// 网络连通性恢复后等待多久再开始恢复尝试，以便路由表稳定下来。
    pub network_recovery_delay: Duration,
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(5),
            tick_interval: Duration::from_secs(1),
            network_recovery_timeout: Duration::from_secs(10),
            network_recovery_delay: Duration::from_secs(1),
        }
    }
}

/// UI visibility tracking parameters.
///
/// UI可见性跟踪参数。
#[derive(Debug, Clone)]
pub struct VisibilityConfig {
    /// The trailing debounce applied to visibility decrements, so that
    /// tearing down one visible surface immediately followed by creating
    /// another does not toggle discovery scanning off and back on.
    ///
    /// 应用于可见性递减的尾随防抖窗口，使得一个可见界面销毁后紧接着
    /// 创建另一个界面时，不会将发现扫描关掉又重新打开。
    pub decrement_debounce: Duration,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            decrement_debounce: Duration::from_millis(300),
        }
    }
}

/// Receiver volume parameters.
///
/// 接收器音量参数。
#[derive(Debug, Clone)]
pub struct VolumeConfig {
    /// The step applied by a single volume increment or decrement.
    /// 单次音量递增或递减所应用的步长。
    pub increment: f64,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self { increment: 0.05 }
    }
}
