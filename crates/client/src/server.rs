/// Server 连接句柄
///
/// 对应一次成功握手后的会话，提供默认服务调用和服务注册

use common::models::ClientState;
use common::ws_rpc::{
    ConnectionInfo, RpcError, RpcErrorCode, RpcRouter, ServerInfo, ServiceInfo, WsRpcConnection,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ConnectConfig;
use crate::service::{LocalFunction, LocalService, ServiceProxy};
use crate::session;

/// 连接到 Server
///
/// 失败时返回 `CONNECTION_FAILED` 或 `HANDSHAKE_FAILED`
pub async fn connect_to_server(config: ConnectConfig) -> Result<ServerHandle, RpcError> {
    let session = session::open(&config).await?;

    if session.info.workspace != config.workspace || session.info.client_id != config.client_id {
        warn!(
            "Server 返回的连接信息与请求不一致: workspace={}, client_id={}",
            session.info.workspace, session.info.client_id
        );
    }

    Ok(ServerHandle {
        info: session.info,
        conn: session.conn,
        router: session.router,
        state: session.state,
        cancel: session.cancel,
        timeout: config.method_timeout,
    })
}

/// Server 连接句柄
pub struct ServerHandle {
    info: ConnectionInfo,
    conn: WsRpcConnection,
    router: RpcRouter,
    state: Arc<RwLock<ClientState>>,
    cancel: CancellationToken,
    timeout: Duration,
}

impl ServerHandle {
    /// Server 返回的连接信息
    pub fn config(&self) -> &ConnectionInfo {
        &self.info
    }

    /// 获取当前状态
    pub async fn state(&self) -> ClientState {
        *self.state.read().await
    }

    /// 调用 Server 上的方法
    pub async fn call(
        &self,
        method: &str,
        args: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, RpcError> {
        if self.state().await != ClientState::Connected {
            return Err(RpcError::connection_closed());
        }

        debug!("📤 调用远程方法: method={}", method);
        let response = self
            .conn
            .call(method, serde_json::Value::Array(args), self.timeout)
            .await?;
        response.into_result()
    }

    /// 调用 Server 上的方法并反序列化结果
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        method: &str,
        args: Vec<serde_json::Value>,
    ) -> Result<T, RpcError> {
        let value = self.call(method, args).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// 回显
    pub async fn echo<T>(&self, value: T) -> Result<T, RpcError>
    where
        T: Serialize + DeserializeOwned,
    {
        self.call_as("echo", vec![serde_json::to_value(value)?]).await
    }

    /// 获取 Server 信息
    pub async fn get_server_info(&self) -> Result<ServerInfo, RpcError> {
        self.call_as("get_server_info", vec![]).await
    }

    /// 问候
    pub async fn hello(&self, name: &str) -> Result<String, RpcError> {
        self.call_as("hello", vec![serde_json::Value::from(name)]).await
    }

    /// 获取 Server 时间
    pub async fn get_time(&self) -> Result<String, RpcError> {
        self.call_as("get_time", vec![]).await
    }

    /// 按 ID 获取服务
    pub async fn get_service(&self, service_id: &str) -> Result<ServiceProxy, RpcError> {
        let info: ServiceInfo = self
            .call_as("get_service", vec![serde_json::Value::from(service_id)])
            .await?;
        debug!("获取服务成功: id={}, functions={:?}", info.id, info.functions);
        Ok(ServiceProxy::new(info, self.conn.clone(), self.timeout))
    }

    /// 列出可见的服务
    pub async fn list_services(&self) -> Result<Vec<ServiceInfo>, RpcError> {
        self.call_as("list_services", vec![]).await
    }

    /// 注册本地服务
    ///
    /// 本地处理器先挂到路由上，Server 拒绝注册时再撤下
    pub async fn register_service(&self, service: LocalService) -> Result<ServiceProxy, RpcError> {
        let registration = service.registration();
        if registration.id.is_empty() {
            return Err(RpcError::invalid_params("服务 ID 不能为空"));
        }

        let prefix = format!("{}.", registration.id);
        if self
            .router
            .list_methods()
            .await
            .iter()
            .any(|method| method.starts_with(&prefix))
        {
            return Err(RpcError::service_already_exists(&registration.id));
        }

        for (name, function) in service.into_functions() {
            let method = format!("{}{}", prefix, name);
            match function {
                LocalFunction::Sync(handler) => self.router.register_handler(method, handler).await,
                LocalFunction::Async(handler) => {
                    self.router.register_async_handler(method, handler).await
                }
            }
        }

        let result: Result<ServiceInfo, RpcError> = self
            .call_as("register_service", vec![serde_json::to_value(&registration)?])
            .await;

        match result {
            Ok(info) => {
                info!("✅ 服务注册成功: id={}", info.id);
                Ok(ServiceProxy::new(info, self.conn.clone(), self.timeout))
            }
            Err(e) if is_rejection(&e) => {
                self.router.unregister_prefix(&prefix).await;
                Err(e)
            }
            Err(e) => {
                // 超时或连接异常时 Server 可能已完成注册，先撤销再撤下本地处理器
                warn!("服务注册结果未知: id={}, error={}", registration.id, e);
                let withdrawn = self
                    .call("unregister_service", vec![serde_json::Value::from(registration.id.as_str())])
                    .await;
                match withdrawn {
                    Ok(_) | Err(RpcError { code: RpcErrorCode::ServiceNotFound, .. }) => {
                        self.router.unregister_prefix(&prefix).await;
                    }
                    Err(cleanup) => {
                        warn!("撤销注册失败，保留本地处理器: id={}, error={}", registration.id, cleanup);
                    }
                }
                Err(e)
            }
        }
    }

    /// 注销服务，接受注册时的 ID 或完整 ID
    pub async fn unregister_service(&self, service_id: &str) -> Result<(), RpcError> {
        self.call("unregister_service", vec![serde_json::Value::from(service_id)])
            .await?;

        let own_prefix = format!("{}/{}:", self.info.workspace, self.info.client_id);
        let local_id = service_id.strip_prefix(&own_prefix).unwrap_or(service_id);
        self.router.unregister_prefix(&format!("{}.", local_id)).await;
        info!("服务已注销: id={}", service_id);
        Ok(())
    }

    /// 待响应的请求数量
    pub async fn pending_count(&self) -> usize {
        self.conn.pending_count().await
    }

    /// 断开连接
    pub async fn disconnect(&self) {
        let pending = self.pending_count().await;
        if pending > 0 {
            warn!("断开连接时仍有 {} 个请求未完成", pending);
        }
        self.cancel.cancel();
        self.conn.clear_pending().await;
        *self.state.write().await = ClientState::Disconnected;
        info!("已断开连接: client_id={}", self.info.client_id);
    }
}

/// Server 明确拒绝的注册，可以直接撤下本地处理器
fn is_rejection(err: &RpcError) -> bool {
    matches!(
        err.code,
        RpcErrorCode::PermissionDenied
            | RpcErrorCode::ServiceAlreadyExists
            | RpcErrorCode::InvalidParams
            | RpcErrorCode::InvalidRequest
            | RpcErrorCode::MethodNotFound
    )
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
