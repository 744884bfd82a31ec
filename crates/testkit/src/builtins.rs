/// Server 内置方法与内置服务

use common::models::Visibility;
use common::ws_rpc::{param, RpcError, RpcRouter, ServiceConfig, ServiceRegistration};
use serde_json::json;

use crate::registry::ServiceRegistry;
use crate::TestServerOptions;

/// 内置 hello-world 服务的 ID
pub const HELLO_WORLD_SERVICE: &str = "hello-world";

fn hello(payload: serde_json::Value) -> Result<serde_json::Value, RpcError> {
    let name: String = param(&payload, 0)?;
    Ok(json!(format!("Hello, {}!", name)))
}

fn get_time(_payload: serde_json::Value) -> Result<serde_json::Value, RpcError> {
    Ok(json!(chrono::Utc::now().to_rfc3339()))
}

/// 构建根方法路由，并注册 Server 自身提供的服务
pub async fn install(
    options: &TestServerOptions,
    registry: &ServiceRegistry,
) -> Result<RpcRouter, RpcError> {
    let router = RpcRouter::new();

    router.register("echo", |payload| param::<serde_json::Value>(&payload, 0)).await;

    if options.root_hello {
        router.register("hello", hello).await;
        router.register("get_time", get_time).await;
    }

    if options.hello_world_service {
        let info = registry
            .register_server_service(ServiceRegistration {
                id: HELLO_WORLD_SERVICE.to_string(),
                name: "Hello World Service".to_string(),
                description: "A simple hello world service".to_string(),
                config: ServiceConfig {
                    visibility: Visibility::Public,
                },
                functions: vec!["hello".to_string(), "get_time".to_string()],
            })
            .await?;
        router.register(format!("{}.hello", info.id), hello).await;
        router.register(format!("{}.get_time", info.id), get_time).await;
    }

    Ok(router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::RpcMessage;

    #[tokio::test]
    async fn test_install_defaults() {
        let registry = ServiceRegistry::new();
        let router = install(&TestServerOptions::default(), &registry).await.unwrap();

        let methods = router.list_methods().await;
        assert!(methods.contains(&"echo".to_string()));
        assert!(methods.contains(&"hello".to_string()));
        assert!(methods.contains(&"default/root:hello-world.hello".to_string()));

        let resp = router
            .handle_request(RpcMessage::request("hello", json!(["Rust Client"])))
            .await;
        assert_eq!(resp.into_result().unwrap(), json!("Hello, Rust Client!"));
    }

    #[tokio::test]
    async fn test_install_without_root_hello() {
        let registry = ServiceRegistry::new();
        let options = TestServerOptions {
            root_hello: false,
            hello_world_service: false,
            ..TestServerOptions::default()
        };
        let router = install(&options, &registry).await.unwrap();

        assert_eq!(router.list_methods().await, vec!["echo".to_string()]);
        assert!(registry.list("default").await.is_empty());
    }
}
