/// 客户端连接管理器
///
/// 负责管理所有已握手客户端的 WebSocket 连接

use common::ws_rpc::{RpcError, RpcMessage, WsRpcConnection};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, RwLock};
use tracing::info;

/// 客户端唯一键：`{workspace}/{client_id}`
pub fn client_key(workspace: &str, client_id: &str) -> String {
    format!("{}/{}", workspace, client_id)
}

/// 客户端连接信息
pub struct ClientConnection {
    /// 工作空间
    pub workspace: String,

    /// 客户端 ID
    pub client_id: String,

    /// 请求/响应配对，用于向客户端转发服务调用
    pub conn: WsRpcConnection,

    /// 连接建立时间
    pub connected_at: Instant,
}

impl ClientConnection {
    pub fn key(&self) -> String {
        client_key(&self.workspace, &self.client_id)
    }
}

/// 客户端连接管理器
#[derive(Clone, Default)]
pub struct ClientConnectionManager {
    /// 所有连接的映射：client_key -> ClientConnection
    connections: Arc<RwLock<HashMap<String, Arc<ClientConnection>>>>,
}

impl ClientConnectionManager {
    /// 创建新的连接管理器
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册新的客户端连接，返回的接收端交给发送任务
    ///
    /// 同一工作空间内客户端 ID 不能重复
    pub async fn register(
        &self,
        workspace: &str,
        client_id: &str,
    ) -> Result<(Arc<ClientConnection>, mpsc::UnboundedReceiver<RpcMessage>), RpcError> {
        if workspace.is_empty() || client_id.is_empty() {
            return Err(RpcError::invalid_params("工作空间和客户端 ID 不能为空"));
        }

        let key = client_key(workspace, client_id);
        let mut connections = self.connections.write().await;
        if connections.contains_key(&key) {
            return Err(RpcError::invalid_request(format!("客户端 ID 已被占用: {}", key)));
        }

        let (conn, rx) = WsRpcConnection::new();
        let connection = Arc::new(ClientConnection {
            workspace: workspace.to_string(),
            client_id: client_id.to_string(),
            conn,
            connected_at: Instant::now(),
        });
        connections.insert(key.clone(), connection.clone());

        info!("客户端已注册: {}", key);
        Ok((connection, rx))
    }

    /// 注销客户端连接
    pub async fn unregister(&self, key: &str) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.remove(key) {
            connection.conn.clear_pending().await;
            info!(
                "客户端已注销: {}, 在线时长 {:?}",
                key,
                connection.connected_at.elapsed()
            );
        }
    }

    /// 获取客户端连接
    pub async fn get(&self, key: &str) -> Option<Arc<ClientConnection>> {
        let connections = self.connections.read().await;
        connections.get(key).cloned()
    }

    /// 在线客户端数量
    pub async fn count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }
}
