use clap::Subcommand;
use serde_json::json;
use std::path::PathBuf;

use crate::cli::OutputFormat;
use crate::config::{AppConfig, StoreBackend};
use crate::services::bootstrap;
use crate::state::AppState;

#[derive(Subcommand)]
pub enum SeedCommands {
    #[command(about = "Load visa types when the catalog is empty")]
    Catalog {
        #[arg(long, help = "YAML catalog file (defaults to the built-in sample catalog)")]
        file: Option<PathBuf>,
    },

    #[command(about = "Create an admin account, or promote an existing one")]
    Admin {
        #[arg(long, help = "Login email")]
        email: String,
        #[arg(long, help = "Password for a newly created account")]
        password: String,
        #[arg(long, default_value = "Administrator", help = "Display name")]
        name: String,
    },
}

async fn open_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();
    config.validate()?;
    if config.database.backend == StoreBackend::Memory {
        tracing::warn!("VISA_STORE is memory; seeded data will not outlive this command");
    }
    AppState::init(config).await
}

pub async fn handle(cmd: SeedCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let state = open_state().await?;

    let result = match cmd {
        SeedCommands::Catalog { file } => {
            let entries = match &file {
                Some(path) => {
                    let yaml = tokio::fs::read_to_string(path).await?;
                    bootstrap::parse_catalog(&yaml)?
                }
                None => bootstrap::builtin_catalog()?,
            };
            let added = bootstrap::seed_catalog(&state, entries)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;

            let message = if added == 0 {
                "Catalog already populated; nothing added".to_string()
            } else {
                format!("Added {} visa types", added)
            };
            output_format.success(&message, Some(json!({ "added": added })))
        }
        SeedCommands::Admin { email, password, name } => {
            if password.len() < 6 {
                anyhow::bail!("password must contain at least 6 characters");
            }
            let user = bootstrap::ensure_admin(&state, &email, &password, &name)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            output_format.success(
                &format!("Admin account ready: {}", user.email),
                Some(json!({ "id": user.id, "email": user.email })),
            )
        }
    };

    state.store.close().await;
    result
}
