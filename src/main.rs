use clap::Parser;
use tracing_subscriber::EnvFilter;

use muro::config::{Cli, Command, Config};
use muro::{db, export};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `export` output stays clean JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let config = Config::load(&cli)?;
    let db_path = config.db_path();
    tracing::info!("Database: {}", db_path.display());

    // Initialize database
    let pool = db::create_pool(&db_path, config.database.pool_size)?;
    db::run_migrations(&pool)?;

    match cli.command.unwrap_or(Command::Migrate) {
        Command::Migrate => {
            for (table, count) in db::table_counts(&pool)? {
                tracing::info!(table, rows = count, "Table ready");
            }
        }
        Command::Export => {
            let snapshot = export::snapshot(&pool).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }

    Ok(())
}
