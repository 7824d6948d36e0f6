use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gradebookd::config::{Cli, Config};
use gradebookd::db;
use gradebookd::web::{self, AppState};

#[tokio::main]
async fn main() {
    // GRADEBOOK_LOG_FORMAT=json switches to one JSON object per event.
    let log_format = std::env::var("GRADEBOOK_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "gradebookd=info,tower_http=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_env(cli.data_dir)?;

    let conn = db::open_db(&config.data_dir)?;
    let summary = db::bootstrap(&conn, &config.admin_email, &config.admin_password)?;
    tracing::info!(
        data_dir = %config.data_dir.display(),
        admin_created = summary.admin_created,
        subjects_seeded = summary.subjects_seeded,
        "database ready"
    );

    let addr = format!("{}:{}", cli.host, cli.port);
    web::run_server(&addr, AppState::new(conn, config)).await
}
