use anyhow::{Context, Result};

use super::Command;
use crate::cli::OutputFormat;
use crate::pipeline::PipelineDefinition;

pub struct PipelineCommand {
    pub format: OutputFormat,
    pub owner: String,
    pub email: String,
}

impl PipelineCommand {
    pub fn new(format: OutputFormat, owner: String, email: String) -> Self {
        Self {
            format,
            owner,
            email,
        }
    }

    pub fn render(&self) -> Result<String> {
        let pipeline = PipelineDefinition::cauldron_offboarding(&self.owner, &self.email);
        pipeline
            .validate()
            .context("Pipeline declaration is invalid")?;

        let rendered = match self.format {
            OutputFormat::Toml => toml::to_string_pretty(&pipeline)?,
            OutputFormat::Json => serde_json::to_string_pretty(&pipeline)?,
        };
        Ok(rendered)
    }
}

impl Command for PipelineCommand {
    async fn execute(&self) -> Result<()> {
        println!("{}", self.render()?);
        Ok(())
    }
}
