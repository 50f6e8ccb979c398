mod app;
mod config;
mod lobby;

use anyhow::Context;
use pico_args::Arguments;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app::AppState;
use crate::config::{HELP, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 有 .env 就加载
    let _ = dotenvy::dotenv();

    let mut args = Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = ServerConfig::from_sources(args, |key| std::env::var(key).ok())?;
    info!(
        small_blind = config.game.small_blind,
        big_blind = config.game.big_blind,
        min_raise = config.game.min_raise,
        policy = ?config.game.contribution_policy,
        turn_timeout = ?config.turn_timeout,
        "服务器配置已加载"
    );

    let state = AppState::new(&config)?;
    let app = app::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("无法监听 {}", config.bind))?;
    info!("服务器正在监听 {}", config.bind);
    axum::serve(listener, app).await?;
    Ok(())
}
