//! UDM 房间状态 HTTP 服务：`/roomstatus` 读取与期望补丁、本地上报接入。

mod handlers;
mod middleware;
mod routes;
mod utils;

use std::sync::Arc;
use tracing::info;
use udm_config::{AppConfig, UdmCwsConfiguration};
use udm_mapping::MappingResolver;
use udm_router::{
    ActionRouter, LoggingActuationSink, RouterHandle, RouterOptions, spawn_actuation_listener,
};
use udm_telemetry::init_tracing;

/// Handler 共享状态。
#[derive(Clone)]
pub struct AppState {
    pub router: RouterHandle,
    pub configuration: Arc<UdmCwsConfiguration>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    // 映射配置：读取、叠加环境变量覆盖、校验；失败即退出
    let configuration = Arc::new(config.load_configuration()?);
    let resolver = MappingResolver::new(Arc::clone(&configuration))?;

    let options = RouterOptions {
        input_capacity: config.input_capacity,
        event_capacity: config.event_capacity,
        ..RouterOptions::from_configuration(&configuration)
    };
    let router = ActionRouter::start(resolver, options);
    let handle = router.handle();

    // 执行信号先落日志，接入房间控制器时替换为实际执行端
    let actuation = spawn_actuation_listener(handle.subscribe(), Arc::new(LoggingActuationSink));

    let state = AppState {
        router: handle,
        configuration: Arc::clone(&configuration),
    };
    let app = routes::create_app(&config.base_path(), state);

    info!(
        target: "udm.api",
        http_addr = %config.http_addr,
        base_path = %config.base_path(),
        route_prefix = %configuration.route_prefix,
        feedback_mode = %configuration.feedback_mode,
        psk_required = configuration.psk_required(),
        "http_server_starting"
    );
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    router.shutdown().await;
    actuation.abort();
    info!(target: "udm.api", "http_server_stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(target: "udm.api", error = %err, "shutdown_signal_failed");
    }
}
