//! 定义了发现层提供的设备和路由数据类型。
//! Defines the device and route data types supplied by the discovery layer.

/// A cast receiver device reported by the discovery layer.
///
/// A device is immutable once obtained; it is bound to the discovery route
/// it was carried on so that a successful application launch can persist the
/// route for later session recovery.
///
/// 发现层报告的投屏接收设备。
///
/// 设备一旦获得即不可变；它绑定到承载它的发现路由上，
/// 以便应用启动成功后可以持久化路由用于之后的会话恢复。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Opaque device identifier.
    /// 不透明的设备标识符。
    pub id: String,
    /// Human-readable device name.
    /// 人类可读的设备名称。
    pub name: String,
    /// The identifier of the discovery route this device was obtained from.
    /// 获得此设备的发现路由的标识符。
    pub route_id: String,
}

impl Device {
    /// Creates a new device bound to the given discovery route.
    /// 创建一个绑定到给定发现路由的新设备。
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        route_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            route_id: route_id.into(),
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// A discovery-layer handle identifying a reachable receiver endpoint,
/// distinct from the logical device it currently carries.
///
/// 标识可达接收端点的发现层句柄，区别于它当前承载的逻辑设备。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    /// Opaque route identifier.
    /// 不透明的路由标识符。
    pub id: String,
    /// Human-readable route name.
    /// 人类可读的路由名称。
    pub name: String,
    /// The device currently carried on this route, if the discovery layer
    /// has resolved one.
    /// 此路由当前承载的设备（如果发现层已解析出）。
    pub device: Option<Device>,
}

impl RouteInfo {
    /// Creates a route with no resolved device yet.
    /// 创建一个尚未解析出设备的路由。
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            device: None,
        }
    }

    /// Creates a route carrying the given device.
    /// 创建一个承载给定设备的路由。
    pub fn with_device(id: impl Into<String>, name: impl Into<String>, device: Device) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            device: Some(device),
        }
    }
}
