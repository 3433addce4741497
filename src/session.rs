//! 会话核心：连接状态机、恢复协调器、可见性跟踪与门面。
//! The session core: connection state machine, recovery coordinator,
//! visibility tracking, and the facade.

pub mod manager;
pub(crate) mod reconnect;
pub mod state;
pub mod visibility;

pub use manager::{EventDriver, SessionManager};
pub use state::{ConnectionStatus, ReconnectionStatus};
