//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use thiserror::Error;

/// A status code reported by the remote receiver or the transport layer.
/// 远端接收器或传输层报告的状态码。
pub type StatusCode = i32;

/// Used when a failure carries no meaningful receiver status code.
/// 当失败没有携带有意义的接收器状态码时使用。
pub const NO_STATUS_CODE: StatusCode = -1;

/// The primary error type for the cast session lifecycle library.
/// 投屏会话生命周期库的主要错误类型。
#[derive(Debug, Error)]
pub enum Error {
    /// There is no transport handle, or the handle is not connected and the
    /// connection is not merely suspended. The caller should select a device
    /// before retrying.
    ///
    /// 没有传输句柄，或句柄未连接且连接并非仅处于挂起状态。
    /// 调用者应在重试前先选择设备。
    #[error("No connection to a cast device")]
    NoConnection,

    /// The connection is suspended due to a transient network loss. The
    /// caller is expected to retry rather than abandon the session.
    ///
    /// 连接因瞬时网络丢失而挂起。调用者应当重试而不是放弃会话。
    #[error("Connectivity is temporarily lost")]
    TransientDisconnection,

    /// A remote operation returned a non-success status.
    /// 远程操作返回了非成功状态。
    #[error("Remote operation failed with status {status}")]
    OperationFailed {
        /// The status code reported by the receiver.
        /// 接收器报告的状态码。
        status: StatusCode,
    },

    /// An internal channel for communication between tasks was closed unexpectedly.
    /// 用于任务间通信的内部通道意外关闭。
    #[error("Internal channel is broken")]
    ChannelClosed,
}

impl Error {
    /// Extracts the receiver status code, or [`NO_STATUS_CODE`] when the
    /// failure did not originate from a remote status.
    ///
    /// 提取接收器状态码；当失败并非来自远端状态时返回 [`NO_STATUS_CODE`]。
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::OperationFailed { status } => *status,
            _ => NO_STATUS_CODE,
        }
    }
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;
        match err {
            Error::NoConnection => ErrorKind::NotConnected.into(),
            Error::TransientDisconnection => ErrorKind::WouldBlock.into(),
            Error::OperationFailed { status } => std::io::Error::other(format!(
                "remote operation failed with status {status}"
            )),
            Error::ChannelClosed => ErrorKind::BrokenPipe.into(),
        }
    }
}
