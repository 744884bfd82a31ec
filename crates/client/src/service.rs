/// 服务：本地定义的服务与远端服务代理

use common::models::Visibility;
use common::ws_rpc::{
    AsyncRpcHandler, RpcError, RpcFuture, RpcHandler, ServiceConfig, ServiceInfo,
    ServiceRegistration, WsRpcConnection,
};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// 本地服务函数
#[derive(Clone)]
pub(crate) enum LocalFunction {
    Sync(RpcHandler),
    Async(AsyncRpcHandler),
}

/// 本地定义、等待注册到 Server 的服务
pub struct LocalService {
    id: String,
    name: String,
    description: String,
    visibility: Visibility,
    functions: Vec<(String, LocalFunction)>,
}

impl LocalService {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            visibility: Visibility::default(),
            functions: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// 添加同步函数，同名函数后者覆盖前者
    pub fn function<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(serde_json::Value) -> Result<serde_json::Value, RpcError> + Send + Sync + 'static,
    {
        self.insert(name.into(), LocalFunction::Sync(Arc::new(handler)));
        self
    }

    /// 添加异步函数
    pub fn async_function<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, RpcError>> + Send + 'static,
    {
        let handler: AsyncRpcHandler = Arc::new(move |payload: serde_json::Value| {
            Box::pin(handler(payload)) as RpcFuture
        });
        self.insert(name.into(), LocalFunction::Async(handler));
        self
    }

    fn insert(&mut self, name: String, function: LocalFunction) {
        self.functions.retain(|(existing, _)| *existing != name);
        self.functions.push((name, function));
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 发送给 Server 的注册信息
    pub fn registration(&self) -> ServiceRegistration {
        ServiceRegistration {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            config: ServiceConfig {
                visibility: self.visibility,
            },
            functions: self.functions.iter().map(|(name, _)| name.clone()).collect(),
        }
    }

    pub(crate) fn into_functions(self) -> Vec<(String, LocalFunction)> {
        self.functions
    }
}

/// 远端服务代理
#[derive(Clone)]
pub struct ServiceProxy {
    info: ServiceInfo,
    conn: WsRpcConnection,
    timeout: Duration,
}

impl ServiceProxy {
    pub(crate) fn new(info: ServiceInfo, conn: WsRpcConnection, timeout: Duration) -> Self {
        Self { info, conn, timeout }
    }

    pub fn info(&self) -> &ServiceInfo {
        &self.info
    }

    /// 完整服务 ID
    pub fn id(&self) -> &str {
        &self.info.id
    }

    /// 调用服务函数
    pub async fn call(
        &self,
        function: &str,
        args: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, RpcError> {
        if !self.info.functions.is_empty() && !self.info.has_function(function) {
            return Err(RpcError::method_not_found(format!("{}.{}", self.info.id, function)));
        }

        let method = format!("{}.{}", self.info.id, function);
        debug!("调用服务函数: method={}", method);
        let response = self
            .conn
            .call(method, serde_json::Value::Array(args), self.timeout)
            .await?;
        response.into_result()
    }

    /// 调用服务函数并反序列化结果
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        function: &str,
        args: Vec<serde_json::Value>,
    ) -> Result<T, RpcError> {
        let value = self.call(function, args).await?;
        Ok(serde_json::from_value(value)?)
    }
}

impl std::fmt::Debug for ServiceProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProxy")
            .field("id", &self.info.id)
            .field("functions", &self.info.functions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registration() {
        let service = LocalService::new("calc:built-in")
            .name("Calculator")
            .description("test")
            .visibility(Visibility::Protected)
            .function("square", |_| Ok(json!(0)))
            .async_function("slow", |_| async { Ok::<_, RpcError>(json!(1)) })
            .function("square", |_| Ok(json!(1)));

        let reg = service.registration();
        assert_eq!(reg.id, "calc:built-in");
        assert_eq!(reg.name, "Calculator");
        assert_eq!(reg.config.visibility, Visibility::Protected);
        assert_eq!(reg.functions, vec!["slow".to_string(), "square".to_string()]);
    }

    #[tokio::test]
    async fn test_proxy_rejects_unknown_function() {
        let (conn, _rx) = WsRpcConnection::new();
        let proxy = ServiceProxy::new(
            ServiceInfo {
                id: "default/root:hello-world".to_string(),
                name: "Hello World".to_string(),
                description: String::new(),
                config: ServiceConfig::default(),
                functions: vec!["hello".to_string()],
            },
            conn,
            Duration::from_millis(50),
        );

        let err = proxy.call("goodbye", vec![]).await.unwrap_err();
        assert_eq!(err.code, common::RpcErrorCode::MethodNotFound);
    }
}
