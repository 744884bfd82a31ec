/// WebSocket 会话
///
/// 建立连接、完成握手，然后启动发送/接收两个后台任务

use common::models::constants::HANDSHAKE_TIMEOUT_SECS;
use common::models::ClientState;
use common::utils::ws_endpoint;
use common::ws_rpc::{
    codec, ConnectRequest, ConnectionInfo, MessageType, RpcError, RpcMessage, RpcRouter,
    WsRpcConnection,
};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::RwLock;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ConnectConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 已建立的会话
pub(crate) struct Session {
    pub info: ConnectionInfo,
    pub conn: WsRpcConnection,
    pub router: RpcRouter,
    pub state: Arc<RwLock<ClientState>>,
    pub cancel: CancellationToken,
}

/// 连接并完成握手
pub(crate) async fn open(config: &ConnectConfig) -> Result<Session, RpcError> {
    let state = Arc::new(RwLock::new(ClientState::Connecting));

    let endpoint = ws_endpoint(&config.server_url)
        .map_err(|e| RpcError::connection_failed(e.to_string()))?;
    info!("🔌 连接到 Server: {}", endpoint);

    let (ws_stream, _) = connect_async(endpoint.as_str())
        .await
        .map_err(|e| RpcError::connection_failed(format!("无法连接到 {}: {}", endpoint, e)))?;
    debug!("WebSocket 连接成功，开始握手");

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // 发送握手请求
    let connect_req = ConnectRequest {
        workspace: config.workspace.clone(),
        client_id: config.client_id.clone(),
        token: config.token.clone(),
    };
    let connect_msg = RpcMessage::request(
        "connect",
        serde_json::Value::Array(vec![serde_json::to_value(&connect_req)?]),
    );
    let request_id = connect_msg.id.clone();

    ws_sender
        .send(codec::encode(&connect_msg)?)
        .await
        .map_err(|e| RpcError::connection_failed(format!("发送握手请求失败: {}", e)))?;

    let info = match tokio::time::timeout(
        Duration::from_secs(HANDSHAKE_TIMEOUT_SECS),
        wait_for_handshake(&mut ws_receiver, &request_id),
    )
    .await
    {
        Ok(result) => result?,
        Err(_) => return Err(RpcError::handshake_failed("等待握手响应超时")),
    };

    info!("✅ 握手成功: workspace={}, client_id={}", info.workspace, info.client_id);
    *state.write().await = ClientState::Connected;

    let (conn, mut rx) = WsRpcConnection::new();
    let router = RpcRouter::new();
    let cancel = CancellationToken::new();

    // 启动发送任务
    let send_cancel = cancel.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = send_cancel.cancelled() => break,
                maybe_msg = rx.recv() => {
                    let Some(msg) = maybe_msg else { break };
                    let frame = match codec::encode(&msg) {
                        Ok(frame) => frame,
                        Err(e) => {
                            error!("序列化消息失败: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = ws_sender.send(frame).await {
                        error!("发送消息失败: {}", e);
                        break;
                    }
                }
            }
        }
        let _ = ws_sender.close().await;
        send_cancel.cancel();
        debug!("发送任务结束");
    });

    // 启动接收任务
    let recv_conn = conn.clone();
    let recv_router = router.clone();
    let recv_state = state.clone();
    let recv_cancel = cancel.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = recv_cancel.cancelled() => break,
                frame = ws_receiver.next() => {
                    match frame {
                        Some(Ok(frame)) => {
                            match codec::decode(frame) {
                                Ok(Some(msg)) => dispatch(msg, &recv_conn, &recv_router).await,
                                Ok(None) => {}
                                Err(e) if e.code == common::RpcErrorCode::ConnectionClosed => {
                                    info!("Server 关闭了连接");
                                    break;
                                }
                                Err(e) => warn!("解析消息失败: {}", e),
                            }
                        }
                        Some(Err(e)) => {
                            error!("接收消息错误: {}", e);
                            break;
                        }
                        None => break,
                    }
                }
            }
        }

        recv_cancel.cancel();
        recv_conn.clear_pending().await;
        *recv_state.write().await = ClientState::Disconnected;
        debug!("接收任务结束");
    });

    Ok(Session {
        info,
        conn,
        router,
        state,
        cancel,
    })
}

/// 等待与握手请求匹配的响应
async fn wait_for_handshake(
    receiver: &mut SplitStream<WsStream>,
    request_id: &str,
) -> Result<ConnectionInfo, RpcError> {
    while let Some(frame) = receiver.next().await {
        let frame = frame
            .map_err(|e| RpcError::handshake_failed(format!("接收握手响应错误: {}", e)))?;

        let msg = match codec::decode(frame) {
            Ok(Some(msg)) => msg,
            Ok(None) => continue,
            Err(e) => return Err(RpcError::handshake_failed(e.message)),
        };

        if msg.message_type != MessageType::Response || msg.id != request_id {
            debug!("握手完成前收到其他消息，忽略: id={}", msg.id);
            continue;
        }

        let payload = msg
            .into_result()
            .map_err(|e| RpcError::handshake_failed(format!("Server 拒绝连接: {}", e)))?;
        return serde_json::from_value(payload)
            .map_err(|e| RpcError::handshake_failed(format!("解析连接信息失败: {}", e)));
    }

    Err(RpcError::handshake_failed("握手完成前连接已关闭"))
}

/// 分发一条入站消息
async fn dispatch(msg: RpcMessage, conn: &WsRpcConnection, router: &RpcRouter) {
    // 响应消息由连接唤醒对应的等待器
    let Some(msg) = conn.handle_message(msg).await else {
        return;
    };

    match msg.message_type {
        MessageType::Request => {
            // Server 转发的服务调用，独立任务处理，避免阻塞接收循环
            let conn = conn.clone();
            let router = router.clone();
            tokio::spawn(async move {
                let response = router.handle_request(msg).await;
                if let Err(e) = conn.send_response(response) {
                    error!("发送响应失败: {}", e);
                }
            });
        }
        MessageType::Notification => {
            debug!("收到通知: method={:?}", msg.method);
        }
        MessageType::Response => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_dispatch_answers_server_request() {
        let (conn, mut rx) = WsRpcConnection::new();
        let router = RpcRouter::new();
        router.register("svc.compute_square", |payload| {
            let n: i64 = common::ws_rpc::param(&payload, 0)?;
            Ok(json!(n * n))
        }).await;

        let req = RpcMessage::request("svc.compute_square", json!([7]));
        let req_id = req.id.clone();
        dispatch(req, &conn, &router).await;

        let resp = rx.recv().await.unwrap();
        assert_eq!(resp.id, req_id);
        assert_eq!(resp.into_result().unwrap(), json!(49));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_method() {
        let (conn, mut rx) = WsRpcConnection::new();
        let router = RpcRouter::new();

        dispatch(RpcMessage::request("svc.missing", json!([])), &conn, &router).await;

        let resp = rx.recv().await.unwrap();
        assert_eq!(resp.error.unwrap().code, "METHOD_NOT_FOUND");
    }
}
