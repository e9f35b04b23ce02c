use clap::Subcommand;

use crate::cli::OutputFormat;
use crate::config::AppConfig;

#[derive(Subcommand)]
pub enum ConfigCommands {
    #[command(about = "Print the effective configuration (secrets omitted)")]
    Show,

    #[command(about = "Check the configuration the way the server does at startup")]
    Check,
}

pub async fn handle(cmd: ConfigCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = AppConfig::from_env();

    match cmd {
        ConfigCommands::Show => output_format.value(&serde_json::to_value(&config)?),
        ConfigCommands::Check => {
            config.validate()?;
            output_format.success("Configuration is valid", None)
        }
    }
}
