//! 会话消费者：生命周期事件的观察者接口与扇出注册表。
//! Session consumers: the observer interface for lifecycle events and the fan-out registry.

use crate::device::RouteInfo;
use crate::error::{Result, StatusCode};
use crate::transport::{ApplicationMetadata, SuspensionCause};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// An observer of session lifecycle events.
///
/// All methods default to a no-op so implementors only override what they
/// care about. A returned error is recorded by the registry and never
/// affects delivery to other consumers or the triggering operation.
///
/// 会话生命周期事件的观察者。
///
/// 所有方法默认是空操作，实现者只需覆盖自己关心的方法。
/// 返回的错误由注册表记录，绝不影响向其他消费者的投递或触发该事件的操作。
#[allow(unused_variables)]
pub trait SessionConsumer: Send + Sync {
    /// A cast-capable route was detected by the discovery layer.
    /// 发现层检测到一个支持投屏的路由。
    fn on_cast_device_detected(&self, route: &RouteInfo) -> Result<()> {
        Ok(())
    }

    /// The device-level connection came up.
    /// 设备级连接已建立。
    fn on_connected(&self) -> Result<()> {
        Ok(())
    }

    /// Connectivity was recovered after a transient suspension; the
    /// existing application session is still in place.
    /// 瞬时挂起后连通性已恢复；已有的应用会话仍然有效。
    fn on_connectivity_recovered(&self) -> Result<()> {
        Ok(())
    }

    /// The transport reported a transient loss of connectivity.
    /// 传输层报告了瞬时的连通性丢失。
    fn on_connection_suspended(&self, cause: SuspensionCause) -> Result<()> {
        Ok(())
    }

    /// The connection attempt failed.
    /// 连接尝试失败。
    fn on_connection_failed(&self, status: StatusCode) -> Result<()> {
        Ok(())
    }

    /// The session was disconnected.
    /// 会话已断开。
    fn on_disconnected(&self) -> Result<()> {
        Ok(())
    }

    /// The receiver application was launched or joined successfully.
    /// 接收端应用已成功启动或加入。
    fn on_application_connected(
        &self,
        metadata: &ApplicationMetadata,
        application_status: &str,
        session_id: &str,
        was_launched: bool,
    ) -> Result<()> {
        Ok(())
    }

    /// Launching or joining the receiver application failed.
    /// 启动或加入接收端应用失败。
    fn on_application_connection_failed(&self, status: StatusCode) -> Result<()> {
        Ok(())
    }

    /// Stopping the receiver application failed.
    /// 停止接收端应用失败。
    fn on_application_stop_failed(&self, status: StatusCode) -> Result<()> {
        Ok(())
    }

    /// A remote operation failed outside the launch/stop paths.
    /// 启动/停止路径之外的远程操作失败。
    fn on_failed(&self, reason: &str, status: StatusCode) -> Result<()> {
        Ok(())
    }
}

/// Holds the set of registered consumers and fans events out to them.
///
/// Membership is an identity-keyed set: registering an already-present
/// consumer or unregistering an absent one is a harmless no-op. Delivery
/// iterates a snapshot, so a consumer failure neither aborts delivery to
/// the rest nor mutates membership.
///
/// 持有已注册消费者的集合并向它们扇出事件。
///
/// 成员关系是以身份为键的集合：重复注册或注销不存在的消费者都是无害的空操作。
/// 投递遍历一份快照，因此单个消费者的失败既不会中止对其余消费者的投递，
/// 也不会改变成员关系。
#[derive(Default)]
pub struct ConsumerRegistry {
    consumers: DashMap<usize, Arc<dyn SessionConsumer>>,
}

impl std::fmt::Debug for ConsumerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerRegistry")
            .field("consumer_count", &self.consumers.len())
            .finish()
    }
}

impl ConsumerRegistry {
    /// Creates an empty registry.
    /// 创建一个空的注册表。
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a consumer. Returns `false` if it was already registered.
    /// 注册一个消费者。如果已注册则返回 `false`。
    pub fn register(&self, consumer: Arc<dyn SessionConsumer>) -> bool {
        let key = Self::identity(&consumer);
        let inserted = self.consumers.insert(key, consumer).is_none();
        if inserted {
            debug!(consumer = key, "Registered session consumer");
        }
        inserted
    }

    /// Unregisters a consumer. Returns `false` if it was not registered.
    /// 注销一个消费者。如果未注册则返回 `false`。
    pub fn unregister(&self, consumer: &Arc<dyn SessionConsumer>) -> bool {
        let key = Self::identity(consumer);
        let removed = self.consumers.remove(&key).is_some();
        if removed {
            debug!(consumer = key, "Unregistered session consumer");
        }
        removed
    }

    /// The number of registered consumers.
    /// 已注册消费者的数量。
    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    /// Whether no consumers are registered.
    /// 是否没有已注册的消费者。
    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }

    /// Delivers one event to every registered consumer via `deliver`.
    ///
    /// Iterates over a snapshot of the current membership; a failing
    /// consumer is logged and skipped.
    ///
    /// 通过 `deliver` 将一个事件投递给每个已注册的消费者。
    ///
    /// 遍历当前成员关系的快照；失败的消费者被记录并跳过。
    pub fn notify<F>(&self, event_name: &'static str, deliver: F)
    where
        F: Fn(&dyn SessionConsumer) -> Result<()>,
    {
        let snapshot: Vec<Arc<dyn SessionConsumer>> = self
            .consumers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for consumer in snapshot {
            if let Err(error) = deliver(consumer.as_ref()) {
                warn!(
                    event = event_name,
                    consumer = Self::identity(&consumer),
                    %error,
                    "Failed to inform session consumer"
                );
            }
        }
    }

    fn identity(consumer: &Arc<dyn SessionConsumer>) -> usize {
        Arc::as_ptr(consumer) as *const () as usize
    }
}
