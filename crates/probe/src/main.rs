/// WsRpc Probe
///
/// 连接 RPC Server，执行一组脚本化调用并报告结果。
/// 仅在连接成功时以 0 退出

mod client_service;
mod config;
mod driver;
mod report;

use std::process::ExitCode;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // 加载 .env 文件
    dotenvy::dotenv().ok();

    let cfg = config::Config::from_env()?;

    // 日志写到 stderr，stdout 留给报告输出
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.log_level)),
        )
        .init();

    info!("🚀 启动 WsRpc Probe...");
    info!(
        "📋 配置: server_url={}, workspace={}, client_id={}, timeout={}s",
        cfg.server_url, cfg.workspace, cfg.client_id, cfg.method_timeout_secs
    );

    let report = driver::run(&cfg).await;

    if report.success() {
        println!("\n✅ 测试通过");
    } else {
        println!("\n❌ 测试失败: 无法连接到 Server");
    }

    Ok(ExitCode::from(report.exit_code()))
}
