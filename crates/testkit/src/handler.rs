/// WebSocket 连接处理器
///
/// 处理客户端握手、默认方法、服务注册与服务调用转发

use axum::extract::ws::{Message as AxumWsMessage, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use common::models::constants::HANDSHAKE_TIMEOUT_SECS;
use common::utils::split_service_method;
use common::ws_rpc::{
    param, ConnectRequest, ConnectionInfo, MessageType, RpcError, RpcMessage, ServerInfo,
    ServiceRegistration,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::manager::ClientConnection;
use crate::state::ServerState;

/// WebSocket 升级处理器
pub async fn handle_websocket(
    ws: WebSocketUpgrade,
    State(state): State<ServerState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

/// 处理客户端 WebSocket 连接
async fn handle_connection(socket: WebSocket, state: ServerState) {
    debug!("新的 WebSocket 连接");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // 等待握手消息
    let (request_id, connect_req) = match wait_for_connect(&mut ws_receiver).await {
        Ok(handshake) => handshake,
        Err(e) => {
            error!("客户端握手失败: {}", e);
            let _ = ws_sender.close().await;
            return;
        }
    };

    if let Some(expected) = &state.options.token {
        if connect_req.token.as_deref() != Some(expected.as_str()) {
            warn!("客户端令牌无效: client_id={}", connect_req.client_id);
            reject(&mut ws_sender, request_id, RpcError::permission_denied("令牌无效")).await;
            return;
        }
    }

    // 注册到管理器
    let (connection, mut rx) = match state
        .clients
        .register(&connect_req.workspace, &connect_req.client_id)
        .await
    {
        Ok(registered) => registered,
        Err(e) => {
            warn!("客户端注册失败: {}", e);
            reject(&mut ws_sender, request_id, e).await;
            return;
        }
    };
    let key = connection.key();

    // 发送握手响应
    let info = ConnectionInfo {
        workspace: connection.workspace.clone(),
        client_id: connection.client_id.clone(),
        server_version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let response = match serde_json::to_value(&info) {
        Ok(payload) => RpcMessage::response(request_id, payload),
        Err(e) => RpcMessage::from_error(request_id, e.into()),
    };
    if let Err(e) = send_message(&mut ws_sender, response).await {
        error!("发送握手响应失败: {}", e);
        state.clients.unregister(&key).await;
        return;
    }

    info!("✅ 客户端已连接: {}", key);

    // 创建消息发送任务
    let send_shutdown = state.shutdown.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = send_shutdown.cancelled() => break,
                maybe_msg = rx.recv() => {
                    let Some(msg) = maybe_msg else { break };
                    if let Err(e) = send_message(&mut ws_sender, msg).await {
                        error!("发送消息失败: {}", e);
                        break;
                    }
                }
            }
        }
        let _ = ws_sender.close().await;
        debug!("消息发送任务结束");
    });

    // 创建消息接收任务
    let recv_state = state.clone();
    let recv_connection = connection.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(AxumWsMessage::Close(_)) => break,
                Ok(msg) => match parse_websocket_message(msg) {
                    Ok(Some(rpc_msg)) => {
                        handle_incoming_message(rpc_msg, &recv_connection, &recv_state).await
                    }
                    Ok(None) => {}
                    Err(e) => warn!("处理消息失败: {}", e),
                },
                Err(e) => {
                    error!("接收消息错误: {}", e);
                    break;
                }
            }
        }
        debug!("消息接收任务结束");
    });

    // 等待任一任务完成
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    // 清理：注销连接并移除其服务
    state.clients.unregister(&key).await;
    state.registry.remove_owner(&key).await;
    info!("客户端连接已关闭: {}", key);
}

/// 等待并解析握手请求
async fn wait_for_connect(
    receiver: &mut SplitStream<WebSocket>,
) -> Result<(String, ConnectRequest), String> {
    let first = tokio::time::timeout(
        Duration::from_secs(HANDSHAKE_TIMEOUT_SECS),
        receiver.next(),
    ).await;

    match first {
        Ok(Some(Ok(msg))) => {
            let rpc_msg = parse_websocket_message(msg)?
                .ok_or("期望收到握手请求")?;

            if rpc_msg.message_type != MessageType::Request {
                return Err("期望收到握手请求".to_string());
            }
            if rpc_msg.method.as_deref() != Some("connect") {
                return Err(format!("期望 connect 方法，收到: {:?}", rpc_msg.method));
            }

            let payload = rpc_msg.payload.unwrap_or(serde_json::Value::Null);
            let connect_req: ConnectRequest = param(&payload, 0)
                .map_err(|e| format!("解析握手信息失败: {}", e))?;
            Ok((rpc_msg.id, connect_req))
        }
        Ok(Some(Err(e))) => Err(format!("接收握手消息错误: {}", e)),
        Ok(None) => Err("连接已关闭".to_string()),
        Err(_) => Err("等待握手消息超时".to_string()),
    }
}

/// 拒绝握手并关闭连接
async fn reject(
    sender: &mut SplitSink<WebSocket, AxumWsMessage>,
    request_id: String,
    err: RpcError,
) {
    if let Err(e) = send_message(sender, RpcMessage::from_error(request_id, err)).await {
        debug!("发送拒绝响应失败: {}", e);
    }
    let _ = sender.close().await;
}

/// 处理收到的消息
async fn handle_incoming_message(
    rpc_msg: RpcMessage,
    connection: &Arc<ClientConnection>,
    state: &ServerState,
) {
    debug!("收到消息: type={:?}, method={:?}, id={}",
           rpc_msg.message_type, rpc_msg.method, rpc_msg.id);

    match rpc_msg.message_type {
        MessageType::Request => {
            // 每个请求独立处理：转发调用可能等待同一连接上的响应
            let connection = connection.clone();
            let state = state.clone();
            tokio::spawn(async move {
                let response = handle_request(rpc_msg, &connection, &state).await;
                if let Err(e) = connection.conn.send_response(response) {
                    error!("发送响应失败: {}", e);
                }
            });
        }
        MessageType::Response => {
            // 对转发请求的响应 - 唤醒等待的调用
            connection.conn.handle_message(rpc_msg).await;
        }
        MessageType::Notification => {
            debug!("收到通知: client={}, method={:?}", connection.key(), rpc_msg.method);
        }
    }
}

/// 处理客户端发起的请求
async fn handle_request(
    msg: RpcMessage,
    connection: &ClientConnection,
    state: &ServerState,
) -> RpcMessage {
    let Some(method) = msg.method.clone() else {
        return RpcMessage::from_error(msg.id, RpcError::invalid_request("请求消息缺少方法名"));
    };
    let payload = msg.payload.clone().unwrap_or(serde_json::Value::Null);

    let result = match method.as_str() {
        "connect" => Err(RpcError::invalid_request("连接已建立，不能重复握手")),
        "get_server_info" => server_info(connection, state).await,
        "register_service" => register_service(&payload, connection, state).await,
        "unregister_service" => unregister_service(&payload, connection, state).await,
        "get_service" => get_service(&payload, connection, state).await,
        "list_services" => {
            serde_json::to_value(state.registry.list(&connection.workspace).await)
                .map_err(RpcError::from)
        }
        _ => match split_service_method(&method) {
            Some((service_id, function)) => {
                call_service(service_id, function, payload, connection, state).await
            }
            // 其余根方法交给内置路由
            None => return state.router.handle_request(msg).await,
        },
    };

    match result {
        Ok(value) => RpcMessage::response(msg.id, value),
        Err(err) => {
            warn!("❌ 请求失败: client={}, method={}, error={}", connection.key(), method, err);
            RpcMessage::from_error(msg.id, err)
        }
    }
}

async fn server_info(
    connection: &ClientConnection,
    state: &ServerState,
) -> Result<serde_json::Value, RpcError> {
    let services = state
        .registry
        .list(&connection.workspace)
        .await
        .into_iter()
        .map(|s| s.id)
        .collect();

    let info = ServerInfo {
        name: "wsrpc-testkit".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        workspace: connection.workspace.clone(),
        services,
        connected_clients: state.clients.count().await,
        server_time: chrono::Utc::now().to_rfc3339(),
    };
    Ok(serde_json::to_value(info)?)
}

async fn register_service(
    payload: &serde_json::Value,
    connection: &ClientConnection,
    state: &ServerState,
) -> Result<serde_json::Value, RpcError> {
    let registration: ServiceRegistration = param(payload, 0)?;
    let info = state
        .registry
        .register(
            &connection.workspace,
            &connection.client_id,
            registration,
            state.options.require_built_in,
        )
        .await?;

    let delay = state.options.register_ack_delay;
    if !delay.is_zero() {
        debug!("延迟 {:?} 后应答服务注册: id={}", delay, info.id);
        tokio::time::sleep(delay).await;
    }
    Ok(serde_json::to_value(info)?)
}

async fn unregister_service(
    payload: &serde_json::Value,
    connection: &ClientConnection,
    state: &ServerState,
) -> Result<serde_json::Value, RpcError> {
    let service_id: String = param(payload, 0)?;
    state
        .registry
        .unregister(&connection.workspace, &connection.client_id, &service_id)
        .await?;
    Ok(serde_json::Value::Null)
}

async fn get_service(
    payload: &serde_json::Value,
    connection: &ClientConnection,
    state: &ServerState,
) -> Result<serde_json::Value, RpcError> {
    let service_id: String = param(payload, 0)?;
    let service = state.registry.resolve(&connection.workspace, &service_id).await?;
    Ok(serde_json::to_value(service.info)?)
}

/// 调用服务函数：Server 自身的服务本地处理，客户端的服务转发给所属连接
async fn call_service(
    service_id: &str,
    function: &str,
    payload: serde_json::Value,
    connection: &ClientConnection,
    state: &ServerState,
) -> Result<serde_json::Value, RpcError> {
    let service = state.registry.resolve(&connection.workspace, service_id).await?;
    if !service.info.has_function(function) {
        return Err(RpcError::method_not_found(format!("{}.{}", service.info.id, function)));
    }

    match &service.owner {
        None => {
            let request = RpcMessage::request(format!("{}.{}", service.info.id, function), payload);
            state.router.handle_request(request).await.into_result()
        }
        Some(owner) => {
            let target = state
                .clients
                .get(owner)
                .await
                .ok_or_else(|| RpcError::service_not_found(service.info.id.clone()))?;

            info!("🔁 转发服务调用: {} -> {}.{}", connection.key(), service.info.id, function);
            let response = target
                .conn
                .call(
                    format!("{}.{}", service.local_id, function),
                    payload,
                    state.options.method_timeout,
                )
                .await?;
            response.into_result()
        }
    }
}

/// 解析 WebSocket 消息为 RPC 消息，控制帧返回 None
fn parse_websocket_message(ws_msg: AxumWsMessage) -> Result<Option<RpcMessage>, String> {
    match ws_msg {
        AxumWsMessage::Text(text) => {
            RpcMessage::from_json(&text)
                .map(Some)
                .map_err(|e| format!("解析 JSON 失败: {}", e))
        }
        AxumWsMessage::Binary(data) => {
            let text = String::from_utf8(data)
                .map_err(|e| format!("二进制转字符串失败: {}", e))?;
            RpcMessage::from_json(&text)
                .map(Some)
                .map_err(|e| format!("解析 JSON 失败: {}", e))
        }
        AxumWsMessage::Close(_) => Err("连接关闭".to_string()),
        _ => Ok(None),
    }
}

/// 发送 RPC 消息
async fn send_message(
    sender: &mut SplitSink<WebSocket, AxumWsMessage>,
    msg: RpcMessage,
) -> Result<(), String> {
    let json = msg.to_json()
        .map_err(|e| format!("序列化消息失败: {}", e))?;

    sender.send(AxumWsMessage::Text(json))
        .await
        .map_err(|e| format!("发送 WebSocket 消息失败: {}", e))?;

    Ok(())
}
