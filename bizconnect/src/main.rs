use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use datasvc::SqliteService;

use bizconnect::config::{Cli, Config};
use bizconnect::{reconcile, App};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load(&cli)?;
    let level = if cfg.logging_enabled {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    std::fs::create_dir_all(&cfg.data_dir)?;
    let svc = Arc::new(SqliteService::open(&cfg.db_path)?);
    let app = Arc::new(App::new(svc, cfg.session_path()));

    app.initial_load().await?;
    {
        let state = app.snapshot();
        tracing::info!(
            users = state.users.len(),
            posts = state.posts.len(),
            challenges = state.problems.len(),
            ideas = state.ideas.len(),
            signed_in = state.session.is_some(),
            "initial load complete"
        );
    }

    let reconciler = tokio::spawn(reconcile::run(app.clone()));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    reconciler.abort();
    Ok(())
}
