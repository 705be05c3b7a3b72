mod admin;
mod api;
mod auth;
mod callbacks;
mod certificates;
mod cohorts;
mod db;
mod enrollment;
mod error;
mod grades;
mod html_view;
mod lookup;
mod metrics;
mod profiles;
mod progress;
mod queue;
mod rate_limit;
mod settings_cache;
mod state;
mod transaction;
mod xqueue_client;

#[cfg(test)]
mod test_support;

use crate::db::init_db;
use crate::state::AppState;
use crate::xqueue_client::XQueueClient;
use anyhow::Result;
use clap::{Parser, Subcommand};
use coursehub_common::AppConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "CourseHub LMS service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 启动 HTTP 服务（默认）
    Serve,
    /// 把同一课程内属于多个分组的用户移出该课程的全部分组
    RemoveUsersFromMultipleCohorts,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let db = init_db(&config.database_url).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(db, config).await,
        Command::RemoveUsersFromMultipleCohorts => {
            let removed = cohorts::remove_users_from_multiple_cohorts(&db).await?;
            println!("Removed {removed} users from multiple cohorts");
            Ok(())
        }
    }
}

async fn serve(db: sea_orm::DatabaseConnection, config: AppConfig) -> Result<()> {
    let queue = Arc::new(XQueueClient::new(&config)?);
    let addr = config.lms_addr.clone();
    let state = AppState::new(db, config, queue);
    let app = api::router(state).into_make_service_with_connect_info::<SocketAddr>();

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("lms listening on {}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(err) = result {
                warn!("lms server exited: {}", err);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }
    Ok(())
}
