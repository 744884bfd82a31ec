/// WebSocket RPC 模块
/// 
/// 提供基于 WebSocket 的双向 RPC 通信框架：消息信封、错误码、
/// 方法路由以及请求/响应配对

pub mod message;
pub mod error;
pub mod types;
pub mod router;
pub mod connection;
pub mod codec;

pub use message::{RpcMessage, MessageType, RpcErrorInfo};
pub use error::{RpcError, RpcErrorCode};
pub use router::{RpcRouter, RpcHandler, AsyncRpcHandler, RpcFuture, param};
pub use connection::WsRpcConnection;
pub use types::*;
