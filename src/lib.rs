#![deny(clippy::expect_used, clippy::unwrap_used)]

//! The root of the cast session lifecycle library.
//! 投屏会话生命周期库的根。

pub mod config;
pub mod consumer;
pub mod device;
pub mod error;
pub mod store;
pub mod transport;

pub mod session;
