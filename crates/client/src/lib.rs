/// WsRpc Probe - 客户端库
/// 
/// 通过 WebSocket 连接 RPC Server：调用默认服务、查询服务、
/// 注册本地服务并响应 Server 转发过来的调用

pub mod config;
pub mod server;
pub mod service;
mod session;

pub use config::ConnectConfig;
pub use server::{connect_to_server, ServerHandle};
pub use service::{LocalService, ServiceProxy};

// 重新导出常用类型
pub use common::models::{ClientState, Visibility};
pub use common::ws_rpc::{ConnectionInfo, RpcError, RpcErrorCode, ServerInfo, ServiceInfo};
