use std::{net::SocketAddr, sync::Arc};

use em_blog::{config::Config, create_router, services::Database, state::AppState};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // 初始化日志
    let filter = EnvFilter::new(&config.log_level);
    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting EM Blog service ({})...", config.environment);

    if config.is_production() && !config.database_requires_signin() {
        warn!("Running production on an in-memory database, data will not survive a restart");
    }

    // 初始化数据库连接
    let db = Database::new(&config).await?;
    db.verify_connection().await?;
    db.migrate().await?;
    info!("Database connection established successfully");

    // 创建应用状态
    let app_state = Arc::new(AppState::new(config.clone(), Arc::new(db)).await?);
    app_state.user_service.seed_admin(&config).await?;

    let app = create_router(app_state);

    // 启动主服务器
    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    Ok(())
}
