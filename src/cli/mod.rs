pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};

pub use utils::OutputFormat;

/// Operator tooling for the visa portal
#[derive(Parser)]
#[command(name = "visa", version, about = "Visa portal CLI - catalog seeding, admin provisioning and config inspection")]
pub struct Cli {
    /// Emit machine-readable JSON
    #[arg(long, global = true, conflicts_with = "text")]
    pub json: bool,

    /// Emit human-readable text (the default)
    #[arg(long, global = true)]
    pub text: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load the visa catalog or provision an admin account
    Seed {
        #[command(subcommand)]
        cmd: commands::seed::SeedCommands,
    },

    /// Inspect the configuration the server would start with
    Config {
        #[command(subcommand)]
        cmd: commands::config::ConfigCommands,
    },
}

impl Cli {
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = cli.output_format();
    match cli.command {
        Commands::Seed { cmd } => commands::seed::handle(cmd, format).await,
        Commands::Config { cmd } => commands::config::handle(cmd, format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_is_global() {
        let cli = Cli::try_parse_from(["visa", "config", "show", "--json"]).unwrap();
        assert_eq!(cli.output_format(), OutputFormat::Json);
    }

    #[test]
    fn text_and_json_conflict() {
        assert!(Cli::try_parse_from(["visa", "--json", "--text", "config", "check"]).is_err());
    }

    #[test]
    fn seed_admin_requires_credentials() {
        assert!(Cli::try_parse_from(["visa", "seed", "admin", "--email", "a@b.io"]).is_err());
        let cli = Cli::try_parse_from(["visa", "seed", "admin", "--email", "a@b.io", "--password", "secret1"]).unwrap();
        match cli.command {
            Commands::Seed {
                cmd: commands::seed::SeedCommands::Admin { name, .. },
            } => assert_eq!(name, "Administrator"),
            _ => panic!("wrong command"),
        }
    }
}
