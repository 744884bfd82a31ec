/// 测试驱动
///
/// 依次执行连接、回显、查询、问候与服务注册，
/// 除连接外每一步失败都只记录并继续

use client::{connect_to_server, ConnectConfig, RpcError, ServerHandle};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use crate::client_service;
use crate::config::Config;
use crate::report::{Outcome, Report, Step};

pub const ECHO_MESSAGE: &str = "Hello from Rust client!";
pub const HELLO_NAME: &str = "Rust Client";
pub const HELLO_WORLD_SERVICE: &str = "hello-world";

pub async fn run(cfg: &Config) -> Report {
    let mut report = Report::default();

    println!("🔌 正在连接 RPC Server: {}", cfg.server_url);
    let connect_config = ConnectConfig::new(&cfg.server_url)
        .with_workspace(&cfg.workspace)
        .with_client_id(&cfg.client_id)
        .with_method_timeout(Duration::from_secs(cfg.method_timeout_secs));

    let server = match connect_to_server(connect_config).await {
        Ok(server) => server,
        Err(e) => {
            println!("❌ 连接失败: {}", e);
            report.record(Step::Connect, Err(e.to_string()));
            return report;
        }
    };

    let info = server.config();
    println!("✅ 已成功连接到 Server!");
    println!("📍 工作空间: {}", info.workspace);
    println!("🆔 客户端 ID: {}", info.client_id);
    report.connected = true;
    report.record(
        Step::Connect,
        Ok(format!("workspace={}, client_id={}", info.workspace, info.client_id)),
    );

    echo_step(&server, &mut report).await;
    server_info_step(&server, &mut report).await;
    hello_step(&server, &mut report).await;
    register_step(&server, &mut report).await;

    println!("\n🎉 全部测试步骤已执行完毕! 失败步骤数: {}", report.failures());
    for record in &report.steps {
        if let Outcome::Failed(error) = &record.outcome {
            println!("  ⚠️ {}: {}", record.step, error);
        }
    }
    server.disconnect().await;
    report
}

async fn echo_step(server: &ServerHandle, report: &mut Report) {
    println!("\n📡 测试 echo...");
    match server.echo(ECHO_MESSAGE.to_string()).await {
        Ok(echoed) => {
            println!("Echo 响应: {}", echoed);
            report.record(Step::Echo, Ok(echoed));
        }
        Err(e) => {
            println!("Echo 错误: {}", e);
            report.record(Step::Echo, Err(e.to_string()));
        }
    }
}

async fn server_info_step(server: &ServerHandle, report: &mut Report) {
    println!("\n📊 获取 Server 信息...");
    match server.get_server_info().await {
        Ok(info) => {
            let rendered = serde_json::to_string_pretty(&info)
                .unwrap_or_else(|_| format!("{:?}", info));
            println!("Server 信息: {}", rendered);
            report.record(
                Step::ServerInfo,
                Ok(format!("{} {}", info.name, info.version)),
            );
        }
        Err(e) => {
            println!("Server 信息错误: {}", e);
            report.record(Step::ServerInfo, Err(e.to_string()));
        }
    }
}

async fn hello_step(server: &ServerHandle, report: &mut Report) {
    println!("\n🌍 测试 hello 服务...");

    let failure = match server.hello(HELLO_NAME).await {
        Ok(greeting) => {
            println!("Hello 响应: {}", greeting);
            report.record(Step::Hello, Ok(greeting));

            match server.get_time().await {
                Ok(time) => {
                    println!("Server 时间: {}", time);
                    report.record(Step::GetTime, Ok(time));
                    None
                }
                Err(e) => {
                    report.record(Step::GetTime, Err(e.to_string()));
                    Some(e)
                }
            }
        }
        Err(e) => {
            report.record(Step::Hello, Err(e.to_string()));
            Some(e)
        }
    };

    let Some(e) = failure else {
        return;
    };

    println!("Hello 服务错误: {}", e);
    warn!("根方法不可用，尝试通过 {} 服务调用", HELLO_WORLD_SERVICE);

    match hello_via_service(server).await {
        Ok(greeting) => {
            println!("Hello 响应 (通过服务): {}", greeting);
            report.record(Step::HelloFallback, Ok(greeting));
        }
        Err(e) => {
            println!("Hello 服务 (通过 get_service) 错误: {}", e);
            report.record(Step::HelloFallback, Err(e.to_string()));
        }
    }
}

async fn hello_via_service(server: &ServerHandle) -> Result<String, RpcError> {
    let service = server.get_service(HELLO_WORLD_SERVICE).await?;
    debug!("已获取服务: {:?}", service);
    service.call_as("hello", vec![json!(HELLO_NAME)]).await
}

async fn register_step(server: &ServerHandle, report: &mut Report) {
    println!("\n📝 注册 Rust 客户端服务...");

    let service = match server.register_service(client_service::build()).await {
        Ok(service) => {
            println!("✅ 服务注册成功, ID: {}", service.id());
            report.record(Step::RegisterService, Ok(service.id().to_string()));
            service
        }
        Err(e) => {
            println!("服务注册错误: {}", e);
            report.record(Step::RegisterService, Err(e.to_string()));
            return;
        }
    };

    // 调用经由 Server 转发回本客户端
    match service.call("compute_square", vec![json!(7)]).await {
        Ok(result) => {
            println!("Square(7) = {}", result);
            report.record(Step::ComputeSquare, Ok(result.to_string()));
        }
        Err(e) => {
            println!("compute_square 错误: {}", e);
            report.record(Step::ComputeSquare, Err(e.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testkit::{TestServer, TestServerOptions};

    fn driver_config(server_url: String) -> Config {
        Config {
            server_url,
            workspace: "default".to_string(),
            client_id: format!("driver-test-{}", common::utils::short_id()),
            method_timeout_secs: 5,
            log_level: "info".to_string(),
        }
    }

    fn passed(report: &Report, step: Step) -> bool {
        matches!(report.outcome(step), Some(Outcome::Passed(_)))
    }

    #[tokio::test]
    async fn test_full_run() {
        let server = TestServer::start(TestServerOptions::default()).await.unwrap();
        let report = run(&driver_config(server.url())).await;

        assert!(report.success());
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.failures(), 0);
        assert_eq!(
            report.outcome(Step::Echo),
            Some(&Outcome::Passed(ECHO_MESSAGE.to_string()))
        );
        assert!(passed(&report, Step::ServerInfo));
        assert_eq!(
            report.outcome(Step::Hello),
            Some(&Outcome::Passed("Hello, Rust Client!".to_string()))
        );
        assert!(passed(&report, Step::GetTime));
        assert!(!report.attempted(Step::HelloFallback));
        assert!(passed(&report, Step::RegisterService));
        assert_eq!(
            report.outcome(Step::ComputeSquare),
            Some(&Outcome::Passed("49".to_string()))
        );

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_hello_falls_back_to_service() {
        let options = TestServerOptions {
            root_hello: false,
            ..TestServerOptions::default()
        };
        let server = TestServer::start(options).await.unwrap();
        let report = run(&driver_config(server.url())).await;

        assert!(report.success());
        assert!(matches!(report.outcome(Step::Hello), Some(Outcome::Failed(_))));
        assert!(!report.attempted(Step::GetTime));
        assert_eq!(
            report.outcome(Step::HelloFallback),
            Some(&Outcome::Passed("Hello, Rust Client!".to_string()))
        );
        // 后续步骤照常执行
        assert!(passed(&report, Step::ComputeSquare));

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_optional_failures_keep_success() {
        let options = TestServerOptions {
            root_hello: false,
            hello_world_service: false,
            ..TestServerOptions::default()
        };
        let server = TestServer::start(options).await.unwrap();
        let report = run(&driver_config(server.url())).await;

        assert!(matches!(
            report.outcome(Step::HelloFallback),
            Some(Outcome::Failed(_))
        ));
        assert!(report.failures() >= 2);
        assert!(report.success());
        assert_eq!(report.exit_code(), 0);

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_rejected_handshake() {
        let options = TestServerOptions {
            token: Some("secret".into()),
            ..TestServerOptions::default()
        };
        let server = TestServer::start(options).await.unwrap();
        let report = run(&driver_config(server.url())).await;

        assert!(!report.connected);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.steps.len(), 1);
        match report.outcome(Step::Connect) {
            Some(Outcome::Failed(error)) => assert!(error.contains("HANDSHAKE_FAILED")),
            other => panic!("unexpected connect outcome: {:?}", other),
        }

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let server = TestServer::start(TestServerOptions::default()).await.unwrap();
        let url = server.url();
        server.shutdown().await;
        drop(server);

        let report = run(&driver_config(url)).await;

        assert!(!report.connected);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.steps.len(), 1);
        assert!(matches!(report.outcome(Step::Connect), Some(Outcome::Failed(_))));
    }
}
