/// WsRpc Probe - 测试 Server
///
/// 进程内启动的参考 Server，实现默认方法、服务注册与调用转发，
/// 供 client 与 probe 的测试使用

pub mod builtins;
pub mod handler;
pub mod manager;
pub mod registry;
pub mod state;

use axum::{routing::get, Router};
use common::Result;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::state::ServerState;

/// 测试 Server 选项
#[derive(Debug, Clone)]
pub struct TestServerOptions {
    /// 是否提供根方法 hello / get_time
    pub root_hello: bool,
    /// 是否提供内置 hello-world 服务
    pub hello_world_service: bool,
    /// 注册的服务 ID 是否必须以 :built-in 结尾
    pub require_built_in: bool,
    /// 握手所需令牌，None 表示不校验
    pub token: Option<String>,
    /// 转发服务调用的超时
    pub method_timeout: Duration,
    /// 完成服务注册后延迟多久才应答，模拟响应缓慢的 Server
    pub register_ack_delay: Duration,
}

impl Default for TestServerOptions {
    fn default() -> Self {
        Self {
            root_hello: true,
            hello_world_service: true,
            require_built_in: true,
            token: None,
            method_timeout: Duration::from_secs(10),
            register_ack_delay: Duration::ZERO,
        }
    }
}

/// 进程内测试 Server
pub struct TestServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TestServer {
    /// 在 127.0.0.1 的随机端口启动
    pub async fn start(options: TestServerOptions) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let shutdown = CancellationToken::new();
        let state = ServerState::new(options, shutdown.clone()).await?;

        let app = Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/ws", get(handler::handle_websocket))
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let graceful = shutdown.clone();
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { graceful.cancelled().await })
                .await;
            if let Err(e) = result {
                error!("测试 Server 异常退出: {}", e);
            }
        });

        info!("🎯 测试 Server 监听在 http://{}", addr);
        Ok(Self {
            addr,
            shutdown,
            task: Mutex::new(Some(task)),
        })
    }

    /// 监听地址
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// HTTP 形式的 Server 地址
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// WebSocket 端点
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// 关闭 Server 并断开所有连接
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }
        info!("测试 Server 已关闭: {}", self.addr);
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn root_handler() -> &'static str {
    "WsRpc Probe Test Server"
}

async fn health_handler() -> &'static str {
    "OK"
}
