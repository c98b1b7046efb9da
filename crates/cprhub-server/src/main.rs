//! CPRHub server entry point.

use clap::Parser;
use cprhub_db::{run_migrations, DbConfig, DbManager};
use cprhub_server::config::{Cli, Command};
use cprhub_server::server::BoxError;
use cprhub_server::{run_server, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cprhub=info")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let db = DbManager::connect(&DbConfig::from(cli.db)).await?;
    run_migrations(db.client()).await?;

    match cli.command {
        Command::Migrate => {
            tracing::info!("migrations applied");
        }
        Command::Serve { auth, api } => {
            let auth = auth.load()?;
            let state = AppState::new(db.client().clone(), auth);
            tracing::info!(version = %state.version, "starting CPRHub server");
            run_server(api.into(), state).await?;
        }
        Command::CreateUser(args) => {
            let user = args.provision(db.client()).await?;
            tracing::info!(user_id = %user.id, role = %user.role, "user created");
        }
    }

    Ok(())
}
