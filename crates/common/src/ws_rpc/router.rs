/// RPC 方法路由
///
/// Client 用它分发 Server 转发过来的服务调用，Testkit 用它承载内置方法

use super::{RpcMessage, RpcError, RpcErrorCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// RPC 方法处理器类型
pub type RpcHandler = Arc<
    dyn Fn(serde_json::Value) -> Result<serde_json::Value, RpcError> + Send + Sync
>;

/// 异步处理器返回的 Future
pub type RpcFuture = Pin<Box<dyn Future<Output = Result<serde_json::Value, RpcError>> + Send>>;

/// 异步 RPC 方法处理器类型
pub type AsyncRpcHandler = Arc<dyn Fn(serde_json::Value) -> RpcFuture + Send + Sync>;

/// 取出第 index 个位置参数
pub fn param<T: DeserializeOwned>(payload: &serde_json::Value, index: usize) -> Result<T, RpcError> {
    let value = match payload {
        serde_json::Value::Array(args) => args.get(index).cloned(),
        // 单个非数组负载视为唯一参数
        other if index == 0 && !other.is_null() => Some(other.clone()),
        _ => None,
    }
    .ok_or_else(|| RpcError::invalid_params(format!("缺少第 {} 个参数", index + 1)))?;

    serde_json::from_value(value)
        .map_err(|e| RpcError::invalid_params(format!("第 {} 个参数无效: {}", index + 1, e)))
}

/// RPC 方法路由器
pub struct RpcRouter {
    /// 同步方法处理器
    handlers: Arc<RwLock<HashMap<String, RpcHandler>>>,

    /// 异步方法处理器
    async_handlers: Arc<RwLock<HashMap<String, AsyncRpcHandler>>>,
}

impl RpcRouter {
    /// 创建新的路由器
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            async_handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 注册同步方法处理器
    pub async fn register<F>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(serde_json::Value) -> Result<serde_json::Value, RpcError> + Send + Sync + 'static,
    {
        self.register_handler(method, Arc::new(handler)).await;
    }

    /// 注册已装箱的同步处理器
    pub async fn register_handler(&self, method: impl Into<String>, handler: RpcHandler) {
        let mut handlers = self.handlers.write().await;
        handlers.insert(method.into(), handler);
    }

    /// 注册异步方法处理器
    pub async fn register_async<F, Fut>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, RpcError>> + Send + 'static,
    {
        let handler = Arc::new(move |payload: serde_json::Value| {
            Box::pin(handler(payload)) as RpcFuture
        });
        self.register_async_handler(method, handler).await;
    }

    /// 注册已装箱的异步处理器
    pub async fn register_async_handler(&self, method: impl Into<String>, handler: AsyncRpcHandler) {
        let mut handlers = self.async_handlers.write().await;
        handlers.insert(method.into(), handler);
    }

    /// 注销以 prefix 开头的全部方法，返回注销数量
    pub async fn unregister_prefix(&self, prefix: &str) -> usize {
        let mut removed = 0;

        let mut handlers = self.handlers.write().await;
        let before = handlers.len();
        handlers.retain(|method, _| !method.starts_with(prefix));
        removed += before - handlers.len();

        let mut async_handlers = self.async_handlers.write().await;
        let before = async_handlers.len();
        async_handlers.retain(|method, _| !method.starts_with(prefix));
        removed += before - async_handlers.len();

        debug!("注销方法: prefix={}, count={}", prefix, removed);
        removed
    }

    /// 是否已注册指定方法
    pub async fn contains(&self, method: &str) -> bool {
        self.handlers.read().await.contains_key(method)
            || self.async_handlers.read().await.contains_key(method)
    }

    /// 处理 RPC 请求
    pub async fn handle_request(&self, msg: RpcMessage) -> RpcMessage {
        let method = match &msg.method {
            Some(m) => m.clone(),
            None => {
                return RpcMessage::error_response(
                    msg.id,
                    RpcErrorCode::InvalidRequest.as_str(),
                    "缺少方法名",
                    None,
                );
            }
        };

        let payload = msg.payload.clone().unwrap_or(serde_json::Value::Null);

        info!("📨 [收到RPC请求] method={}, id={}", method, msg.id);
        debug!("📨 请求内容: {}", payload);

        match self.dispatch(&method, payload).await {
            Some(Ok(result)) => {
                info!("✅ [RPC处理成功] method={}, id={}", method, msg.id);
                debug!("✅ 响应内容: {}", result);
                RpcMessage::response(msg.id, result)
            }
            Some(Err(err)) => {
                warn!("❌ [RPC处理失败] method={}, id={}, code={}, error={}",
                      method, msg.id, err.code.as_str(), err.message);
                RpcMessage::from_error(msg.id, err)
            }
            None => RpcMessage::from_error(msg.id, RpcError::method_not_found(method)),
        }
    }

    /// 查找并执行处理器，方法不存在时返回 None
    async fn dispatch(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> Option<Result<serde_json::Value, RpcError>> {
        // 先尝试异步处理器；克隆出 Arc 后释放读锁，避免处理期间阻塞注册
        let async_handler = {
            let async_handlers = self.async_handlers.read().await;
            async_handlers.get(method).cloned()
        };
        if let Some(handler) = async_handler {
            return Some(handler(payload).await);
        }

        let handler = {
            let handlers = self.handlers.read().await;
            handlers.get(method).cloned()
        };
        handler.map(|handler| handler(payload))
    }

    /// 获取已注册的方法列表
    pub async fn list_methods(&self) -> Vec<String> {
        let mut methods = Vec::new();

        let handlers = self.handlers.read().await;
        methods.extend(handlers.keys().cloned());

        let async_handlers = self.async_handlers.read().await;
        methods.extend(async_handlers.keys().cloned());

        methods.sort();
        methods
    }
}

impl Default for RpcRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for RpcRouter {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
            async_handlers: self.async_handlers.clone(),
        }
    }
}
