use anyhow::Result;

pub mod pipeline;
pub mod run;

pub use pipeline::PipelineCommand;
pub use run::RunCommand;

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}
