/// 测试 Server 共享状态

use common::ws_rpc::{RpcError, RpcRouter};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::builtins;
use crate::manager::ClientConnectionManager;
use crate::registry::ServiceRegistry;
use crate::TestServerOptions;

#[derive(Clone)]
pub struct ServerState {
    pub options: Arc<TestServerOptions>,
    pub router: RpcRouter,
    pub registry: ServiceRegistry,
    pub clients: ClientConnectionManager,
    /// Server 关闭时通知所有连接任务退出
    pub shutdown: CancellationToken,
}

impl ServerState {
    pub async fn new(
        options: TestServerOptions,
        shutdown: CancellationToken,
    ) -> Result<Self, RpcError> {
        let registry = ServiceRegistry::new();
        let router = builtins::install(&options, &registry).await?;

        Ok(Self {
            options: Arc::new(options),
            router,
            registry,
            clients: ClientConnectionManager::new(),
            shutdown,
        })
    }
}
