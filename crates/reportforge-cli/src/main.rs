use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use reportforge_core::{ConfigLoader, ReportPipeline, SessionOptions, remove_run_logs};
use std::path::PathBuf;
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "reportforge-cli",
    version,
    about = "Research report generation pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a full report for a topic.
    Run(RunArgs),
    /// Run only the research stage and print the aggregate as JSON.
    Research(ResearchArgs),
    /// Remove a session from the local run logs.
    Forget(ForgetArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Topic to research and report on.
    #[arg(long)]
    topic: String,

    /// Writing style for the report body.
    #[arg(long, default_value = "professional")]
    style: String,

    /// Path to the configuration file (defaults to reportforge.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured output directory.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Optional session ID.
    #[arg(long)]
    session: Option<String>,
}

#[derive(Args, Debug)]
struct ResearchArgs {
    /// Topic to research.
    #[arg(long)]
    topic: String,

    /// Path to the configuration file (defaults to reportforge.toml).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ForgetArgs {
    /// Session ID to remove from the run logs.
    #[arg(long)]
    session: String,
}

fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reportforge_core=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let rt = Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Command::Run(args) => run_command(args).await?,
            Command::Research(args) => research_command(args).await?,
            Command::Forget(args) => forget_command(args)?,
        }
        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}

async fn run_command(args: RunArgs) -> Result<()> {
    info!(topic = %args.topic, "starting report session");

    let config = ConfigLoader::load(args.config)?;
    let mut pipeline = ReportPipeline::from_config(&config)?.with_style(args.style);
    if let Some(output) = args.output {
        pipeline = pipeline.with_output_base(output);
    }

    let mut options = SessionOptions::new(&args.topic);
    if let Some(session_id) = args.session {
        options = options.with_session_id(session_id);
    }

    let outcome = pipeline.run(options).await?;
    println!("{}", outcome.summary);
    Ok(())
}

async fn research_command(args: ResearchArgs) -> Result<()> {
    info!(topic = %args.topic, "running research stage");

    let config = ConfigLoader::load(args.config)?;
    let pipeline = ReportPipeline::from_config(&config)?;

    let aggregate = pipeline.research(&args.topic).await?;
    println!("{}", serde_json::to_string_pretty(&aggregate)?);
    Ok(())
}

fn forget_command(args: ForgetArgs) -> Result<()> {
    remove_run_logs(&args.session)?;
    info!(session = %args.session, "run logs removed");
    Ok(())
}
