//! # Gemini Key Proxy 主程序
//!
//! 加载配置、初始化日志并启动代理服务器

use clap::Parser;
use std::path::PathBuf;

use gemini_key_proxy::{
    Result,
    config::ConfigManager,
    error::Context,
    lerror, linfo,
    logging::{self, LogComponent, LogStage},
    proxy::{ProxyServer, shutdown_signal},
};

/// 命令行参数
#[derive(Debug, Parser)]
#[command(name = "gemini-key-proxy", version, about)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, env = "GEMINI_PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// 覆盖监听地址
    #[arg(long)]
    host: Option<String>,

    /// 覆盖监听端口
    #[arg(short, long)]
    port: Option<u16>,

    /// 日志级别（RUST_LOG 优先）
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(Some(&cli.log_level));

    if let Err(e) = run(cli).await {
        lerror!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "service_start_failed",
            &format!("服务启动失败: {e:?}")
        );
        std::process::exit(1);
    }

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::Main,
        "service_shutdown",
        "服务正常关闭"
    );
}

async fn run(cli: Cli) -> Result<()> {
    let manager = ConfigManager::load(cli.config.as_deref()).context("加载配置失败")?;
    let mut config = (*manager.config()).clone();
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    let manager = ConfigManager::from_config(config)?;

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Main,
        "service_starting",
        "服务启动",
        bind = %manager.config().server.bind_address()
    );

    let server = ProxyServer::from_config(manager.config()).await?;
    server.serve(shutdown_signal()).await
}
