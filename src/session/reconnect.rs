//! 会话恢复协调器：有时限、可取消的持久化会话找回。
//! Session recovery coordinator: time-bounded, cancellable recovery of a
//! persisted session.
//!
//! The coordinator itself lives in the manager; this module holds the
//! cancellable countdown task that bounds a recovery attempt. The countdown
//! never touches shared state directly — it observes the published
//! connection status and reports an outcome, and the manager performs the
//! teardown on expiry.
//!
//! 协调器本体位于管理器中；本模块持有为恢复尝试设定时限的可取消倒计时任务。
//! 倒计时从不直接触碰共享状态——它观察已发布的连接状态并报告结果，
//! 超时后的清理由管理器执行。

use crate::session::state::ConnectionStatus;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::trace;

/// How a recovery countdown ended.
/// 恢复倒计时如何结束。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CountdownOutcome {
    /// A connection was established before the budget ran out.
    /// 在预算耗尽之前连接已建立。
    Connected,
    /// The run was cancelled or superseded; no side effects are taken.
    /// 运行被取消或被取代；不产生任何副作用。
    Cancelled,
    /// The budget ran out without a connection.
    /// 预算耗尽而连接未建立。
    Expired,
}

/// A handle to one outstanding recovery run. Dropping or cancelling it stops
/// the countdown without side effects; cancelling twice is safe.
///
/// 指向一次未完成恢复运行的句柄。丢弃或取消它会停止倒计时且不产生副作用；
/// 取消两次是安全的。
#[derive(Debug)]
pub(crate) struct ReconnectRun {
    cancel_tx: watch::Sender<bool>,
}

impl ReconnectRun {
    /// Creates a run handle and the cancel receiver for its countdown task.
    /// 创建运行句柄以及供其倒计时任务使用的取消接收端。
    pub(crate) fn new() -> (Self, watch::Receiver<bool>) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        (Self { cancel_tx }, cancel_rx)
    }

    /// Cancels the countdown. Idempotent.
    /// 取消倒计时。幂等。
    pub(crate) fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }
}

/// Runs the bounded countdown for one recovery attempt.
///
/// Counts `ticks` intervals of `tick`. At each tick the published connection
/// status is re-checked; reaching `Connected` ends the run successfully.
/// Cancellation (or the run handle being dropped) ends it silently.
///
/// 为一次恢复尝试运行有界倒计时。
///
/// 以 `tick` 为间隔计数 `ticks` 次。每次计时都会重新检查已发布的连接状态；
/// 达到 `Connected` 即成功结束。取消（或运行句柄被丢弃）则静默结束。
pub(crate) async fn run_countdown(
    ticks: u32,
    tick: Duration,
    status_rx: watch::Receiver<ConnectionStatus>,
    mut cancel_rx: watch::Receiver<bool>,
) -> CountdownOutcome {
    for elapsed in 0..ticks {
        tokio::select! {
            _ = sleep(tick) => {}
            changed = cancel_rx.changed() => {
                if changed.is_err() || *cancel_rx.borrow() {
                    trace!(elapsed, "Recovery countdown cancelled");
                    return CountdownOutcome::Cancelled;
                }
            }
        }
        if *status_rx.borrow() == ConnectionStatus::Connected {
            trace!(elapsed, "Recovery countdown observed an established connection");
            return CountdownOutcome::Connected;
        }
    }
    trace!(ticks, "Recovery countdown exhausted");
    CountdownOutcome::Expired
}
