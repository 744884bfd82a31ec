/// WebSocket RPC 连接：请求/响应配对
///
/// 只负责待响应请求表和出站消息通道，真正的 socket 读写由调用方的
/// 发送/接收任务完成

use super::{MessageType, RpcMessage, RpcError, RpcErrorCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, warn};

/// RPC 响应等待器
type ResponseWaiter = oneshot::Sender<Result<RpcMessage, RpcError>>;

/// WebSocket RPC 连接
pub struct WsRpcConnection {
    /// 待响应的请求映射（request_id -> response_sender）
    pending_requests: Arc<RwLock<HashMap<String, ResponseWaiter>>>,

    /// 发送消息的通道
    sender: mpsc::UnboundedSender<RpcMessage>,
}

impl WsRpcConnection {
    /// 创建新的 RPC 连接，返回的接收端交给发送任务
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RpcMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let connection = Self {
            pending_requests: Arc::new(RwLock::new(HashMap::new())),
            sender: tx,
        };

        (connection, rx)
    }

    /// 发送请求并等待响应
    pub async fn call(
        &self,
        method: impl Into<String>,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> Result<RpcMessage, RpcError> {
        let msg = RpcMessage::request(method, payload);
        self.send_request(msg, timeout).await
    }

    /// 发送已构造的请求并等待响应
    pub async fn send_request(
        &self,
        msg: RpcMessage,
        timeout: Duration,
    ) -> Result<RpcMessage, RpcError> {
        let request_id = msg.id.clone();

        // 创建响应接收器
        let (tx, rx) = oneshot::channel();

        // 注册等待响应
        {
            let mut pending = self.pending_requests.write().await;
            pending.insert(request_id.clone(), tx);
        }

        // 发送请求
        if self.sender.send(msg).is_err() {
            let mut pending = self.pending_requests.write().await;
            pending.remove(&request_id);
            return Err(RpcError::connection_closed());
        }

        // 等待响应（带超时）
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RpcError::new(
                RpcErrorCode::InternalError,
                "响应通道被关闭"
            )),
            Err(_) => {
                // 超时，清理等待器
                let mut pending = self.pending_requests.write().await;
                pending.remove(&request_id);
                Err(RpcError::timeout(format!("请求超时: {}", request_id)))
            }
        }
    }

    /// 发送通知（不等待响应）
    pub fn notify(
        &self,
        method: impl Into<String>,
        payload: serde_json::Value,
    ) -> Result<(), RpcError> {
        let msg = RpcMessage::notification(method, payload);
        self.sender.send(msg).map_err(|_| RpcError::connection_closed())?;
        Ok(())
    }

    /// 发送响应消息
    pub fn send_response(&self, msg: RpcMessage) -> Result<(), RpcError> {
        self.sender.send(msg).map_err(|_| RpcError::connection_closed())?;
        Ok(())
    }

    /// 处理收到的响应消息，唤醒对应的等待器
    ///
    /// 非响应消息原样返回，由调用方继续处理
    pub async fn handle_message(&self, msg: RpcMessage) -> Option<RpcMessage> {
        if msg.message_type != MessageType::Response {
            return Some(msg);
        }

        let waiter = {
            let mut pending = self.pending_requests.write().await;
            pending.remove(&msg.id)
        };

        match waiter {
            Some(waiter) => {
                let result = match msg.rpc_error() {
                    Some(err) => Err(err),
                    None => Ok(msg),
                };
                let _ = waiter.send(result);
            }
            None => {
                warn!("收到未预期的响应消息: {}", msg.id);
            }
        }
        None
    }

    /// 获取待处理请求数量
    pub async fn pending_count(&self) -> usize {
        let pending = self.pending_requests.read().await;
        pending.len()
    }

    /// 清理所有待处理的请求
    pub async fn clear_pending(&self) {
        let mut pending = self.pending_requests.write().await;
        for (id, waiter) in pending.drain() {
            debug!("清理待处理请求: {}", id);
            let _ = waiter.send(Err(RpcError::connection_closed()));
        }
    }

    /// 出站通道是否已关闭
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl Clone for WsRpcConnection {
    fn clone(&self) -> Self {
        Self {
            pending_requests: self.pending_requests.clone(),
            sender: self.sender.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_call_receives_response() {
        let (conn, mut rx) = WsRpcConnection::new();

        let peer = conn.clone();
        let responder = tokio::spawn(async move {
            let req = rx.recv().await.unwrap();
            assert_eq!(req.method.as_deref(), Some("echo"));
            let payload = req.payload.clone().unwrap();
            peer.handle_message(RpcMessage::response(req.id, payload[0].clone())).await;
        });

        let resp = conn.call("echo", json!(["ping"]), Duration::from_secs(1)).await.unwrap();
        assert_eq!(resp.into_result().unwrap(), json!("ping"));
        responder.await.unwrap();
        assert_eq!(conn.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_error_code_survives() {
        let (conn, mut rx) = WsRpcConnection::new();

        let peer = conn.clone();
        tokio::spawn(async move {
            let req = rx.recv().await.unwrap();
            peer.handle_message(RpcMessage::from_error(
                req.id,
                RpcError::service_not_found("hello-world"),
            )).await;
        });

        let err = conn.call("get_service", json!(["hello-world"]), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.code, RpcErrorCode::ServiceNotFound);
    }

    #[tokio::test]
    async fn test_timeout_clears_waiter() {
        let (conn, _rx) = WsRpcConnection::new();
        let err = conn.call("slow", json!([]), Duration::from_millis(20)).await.unwrap_err();
        assert_eq!(err.code, RpcErrorCode::Timeout);
        assert_eq!(conn.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_clear_pending_fails_waiters() {
        let (conn, _rx) = WsRpcConnection::new();

        let caller = conn.clone();
        let call = tokio::spawn(async move {
            caller.call("never", json!([]), Duration::from_secs(5)).await
        });

        while conn.pending_count().await == 0 {
            tokio::task::yield_now().await;
        }
        conn.clear_pending().await;

        let err = call.await.unwrap().unwrap_err();
        assert_eq!(err.code, RpcErrorCode::ConnectionClosed);
    }

    #[tokio::test]
    async fn test_closed_channel() {
        let (conn, rx) = WsRpcConnection::new();
        drop(rx);
        assert!(conn.is_closed());
        let err = conn.call("echo", json!([]), Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err.code, RpcErrorCode::ConnectionClosed);
        assert!(conn.notify("ping", json!([])).is_err());
    }

    #[tokio::test]
    async fn test_non_response_passthrough() {
        let (conn, _rx) = WsRpcConnection::new();
        let req = RpcMessage::request("svc.compute_square", json!([7]));
        let passed = conn.handle_message(req).await;
        assert!(passed.is_some());
    }
}
