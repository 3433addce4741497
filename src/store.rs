//! 持久化会话存储：保存上一次成功会话的标识信息。
//! Persisted session store: holds the identifiers of the last successful session.

use dashmap::DashMap;
use std::sync::Arc;

/// Key under which the last known session id is persisted.
/// 持久化最近一次已知会话ID所用的键。
pub const KEY_SESSION_ID: &str = "session-id";
/// Key under which the configured application id is persisted.
/// 持久化所配置应用ID所用的键。
pub const KEY_APPLICATION_ID: &str = "application-id";
/// Key under which the last known route id is persisted.
/// 持久化最近一次已知路由ID所用的键。
pub const KEY_ROUTE_ID: &str = "route-id";
/// Key under which the volume step is persisted.
/// 持久化音量步长所用的键。
pub const KEY_VOLUME_INCREMENT: &str = "volume-increment";

/// Durable string key/value storage for session identifiers.
///
/// Implementations are expected to be cheap to read and safe for concurrent
/// reads; writes for a given key overwrite the previous value.
///
/// 用于会话标识的持久化字符串键值存储。
///
/// 实现应当读取开销低且并发读取安全；对同一键的写入覆盖之前的值。
pub trait SessionStore: Send + Sync {
    /// Reads the value stored under `key`, if any.
    /// 读取存储在 `key` 下的值（如果有）。
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, overwriting any previous value.
    /// 将 `value` 存储在 `key` 下，覆盖之前的值。
    fn put(&self, key: &str, value: &str);

    /// Removes the value stored under `key`, if any.
    /// 移除存储在 `key` 下的值（如果有）。
    fn remove(&self, key: &str);
}

/// A typed view over the persisted session identifiers.
/// 持久化会话标识的类型化视图。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSession {
    /// The receiver-side session id from the last successful launch or join.
    /// 最近一次成功启动或加入得到的接收端会话ID。
    pub session_id: String,
    /// The discovery route id the session was established on.
    /// 会话建立所在的发现路由ID。
    pub route_id: String,
}

impl PersistedSession {
    /// Loads the persisted session, returning `None` unless both the session
    /// id and the route id are present. Only a complete pair is recoverable.
    ///
    /// 加载持久化的会话；只有会话ID和路由ID都存在时才返回 `Some`。
    /// 只有完整的一对标识才可用于恢复。
    pub fn load(store: &dyn SessionStore) -> Option<Self> {
        let session_id = store.get(KEY_SESSION_ID)?;
        let route_id = store.get(KEY_ROUTE_ID)?;
        if session_id.is_empty() || route_id.is_empty() {
            return None;
        }
        Some(Self {
            session_id,
            route_id,
        })
    }

    /// Persists the pair of identifiers.
    /// 持久化这一对标识。
    pub fn save(store: &dyn SessionStore, session_id: &str, route_id: &str) {
        store.put(KEY_SESSION_ID, session_id);
        store.put(KEY_ROUTE_ID, route_id);
    }

    /// Clears the persisted pair. Called on user-initiated disconnects only,
    /// never on transient suspensions.
    ///
    /// 清除持久化的标识对。仅在用户主动断开时调用，瞬时挂起时绝不调用。
    pub fn clear(store: &dyn SessionStore) {
        store.remove(KEY_SESSION_ID);
        store.remove(KEY_ROUTE_ID);
    }
}

/// An in-memory [`SessionStore`] suitable for tests and embedded use.
/// 适用于测试和内嵌使用的内存版 [`SessionStore`]。
#[derive(Debug, Default, Clone)]
pub struct MemorySessionStore {
    entries: Arc<DashMap<String, String>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    /// 创建一个空的存储。
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn put(&self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_session_requires_both_identifiers() {
        let store = MemorySessionStore::new();
        assert!(PersistedSession::load(&store).is_none());

        store.put(KEY_SESSION_ID, "S1");
        assert!(PersistedSession::load(&store).is_none());

        store.put(KEY_ROUTE_ID, "R1");
        let session = PersistedSession::load(&store);
        assert_eq!(
            session,
            Some(PersistedSession {
                session_id: "S1".to_string(),
                route_id: "R1".to_string(),
            })
        );
    }

    #[test]
    fn empty_identifiers_are_not_recoverable() {
        let store = MemorySessionStore::new();
        PersistedSession::save(&store, "", "R1");
        assert!(PersistedSession::load(&store).is_none());
    }

    #[test]
    fn clear_removes_the_pair_but_not_other_keys() {
        let store = MemorySessionStore::new();
        store.put(KEY_APPLICATION_ID, "CC1AD845");
        PersistedSession::save(&store, "S1", "R1");

        PersistedSession::clear(&store);
        assert!(PersistedSession::load(&store).is_none());
        assert_eq!(store.get(KEY_APPLICATION_ID).as_deref(), Some("CC1AD845"));
    }
}
