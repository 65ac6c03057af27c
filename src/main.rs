use anyhow::{Context, Result};
use clap::Parser;

use offboarding::cli::commands::{Command, PipelineCommand, RunCommand};
use offboarding::cli::{Cli, Commands};
use offboarding::config::OffboardingConfig;
use offboarding::telemetry;

fn main() -> Result<()> {
    OffboardingConfig::load_env_file()?;
    let cli = Cli::parse();

    let config = OffboardingConfig::load(cli.config.as_deref())
        .context("Failed to load offboarding configuration")?;
    telemetry::init_telemetry(&config.observability)?;

    match cli.command {
        Commands::Run(args) => {
            let command = RunCommand::new(args, config);
            tokio::runtime::Runtime::new()?.block_on(async { command.execute().await })
        }
        Commands::Pipeline {
            format,
            owner,
            email,
        } => {
            let command = PipelineCommand::new(format, owner, email);
            tokio::runtime::Runtime::new()?.block_on(async { command.execute().await })
        }
    }
}
