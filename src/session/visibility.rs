//! UI可见性跟踪器：带防抖的计数器，控制主动发现扫描的开关。
//! UI visibility tracker: a debounced counter gating active discovery scanning.

use crate::transport::RouteDiscovery;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

#[derive(Debug)]
struct VisibilityState {
    counter: u32,
    visible: bool,
}

/// Tracks how many UI surfaces are currently visible and toggles active
/// discovery scanning on the 0↔1 edges.
///
/// Increments apply immediately; decrements are deferred by a trailing
/// debounce window so that tearing down one visible surface immediately
/// followed by creating another does not toggle scanning off and back on.
///
/// 跟踪当前可见的UI界面数量，并在 0↔1 边沿开关主动发现扫描。
///
/// 递增立即生效；递减经过尾随防抖窗口延迟生效，使得一个可见界面销毁后
/// 紧接着创建另一个界面时，不会把扫描关掉又重新打开。
pub struct VisibilityTracker {
    debounce: Duration,
    discovery: Arc<dyn RouteDiscovery>,
    state: Mutex<VisibilityState>,
}

impl std::fmt::Debug for VisibilityTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisibilityTracker")
            .field("debounce", &self.debounce)
            .field("state", &self.state)
            .finish()
    }
}

impl VisibilityTracker {
    /// Creates a tracker that toggles scanning on `discovery`.
    /// 创建一个在 `discovery` 上开关扫描的跟踪器。
    pub fn new(debounce: Duration, discovery: Arc<dyn RouteDiscovery>) -> Self {
        Self {
            debounce,
            discovery,
            state: Mutex::new(VisibilityState {
                counter: 0,
                visible: false,
            }),
        }
    }

    /// Signals that a UI surface became visible. On the 0→1 transition,
    /// active scanning is re-enabled synchronously.
    ///
    /// 通知一个UI界面变为可见。在 0→1 转换时，同步重新启用主动扫描。
    pub fn increment(&self) {
        let became_visible = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            state.counter += 1;
            if !state.visible {
                state.visible = true;
                true
            } else {
                false
            }
        };
        if became_visible {
            debug!("UI became visible; enabling active discovery scan");
            self.discovery.set_active_scan(true);
        }
    }

    /// Signals that a UI surface became invisible. The decrement is applied
    /// after the debounce window; if the counter is then zero, active
    /// scanning is disabled.
    ///
    /// 通知一个UI界面变为不可见。递减在防抖窗口之后生效；
    /// 如果此时计数器为零，则禁用主动扫描。
    pub fn decrement(self: &Arc<Self>) {
        let tracker = self.clone();
        tokio::spawn(async move {
            sleep(tracker.debounce).await;
            tracker.apply_decrement();
        });
    }

    /// Whether at least one UI surface is considered visible.
    /// 是否至少有一个UI界面被视为可见。
    pub fn is_visible(&self) -> bool {
        self.state.lock().map(|state| state.visible).unwrap_or(false)
    }

    fn apply_decrement(&self) {
        let became_invisible = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            state.counter = state.counter.saturating_sub(1);
            if state.counter == 0 && state.visible {
                state.visible = false;
                true
            } else {
                false
            }
        };
        if became_invisible {
            debug!("UI is no longer visible; disabling active discovery scan");
            self.discovery.set_active_scan(false);
        }
    }
}
