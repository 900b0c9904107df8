mod commands;
mod console;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Cli, Commands, ContainerAction};
use console::ConsoleEventSink;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tesslaflow::config::ToolchainConfig;
use tesslaflow::container;
use tesslaflow::diagnostics::extract_spec_error;
use tesslaflow::observability::init_tracing;
use tesslaflow::pipeline::{Orchestrator, PipelineSession, StageResult};
use tesslaflow::project::{DirectoryWorkspace, SetupOutcome};
use tracing::debug;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_tracing(cli.json_logs) {
        eprintln!("Failed to set up logging: {err}");
    }

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<ToolchainConfig> {
    let config = match cli.config {
        Some(ref path) => ToolchainConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ToolchainConfig::default(),
    };
    Ok(if cli.docker {
        config.with_docker(true)
    } else {
        config
    })
}

fn project_root(cli: &Cli) -> Result<PathBuf> {
    let dir = match cli.project {
        Some(ref dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to read the current directory")?,
    };
    dir.canonicalize()
        .with_context(|| format!("Project directory {} does not exist", dir.display()))
}

fn exit_code<T>(result: &StageResult<T>) -> ExitCode {
    if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Cancels the running process on Ctrl-C; a second Ctrl-C with nothing
/// running exits.
fn cancel_on_ctrl_c(orchestrator: Arc<Orchestrator>) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !orchestrator.cancel() {
                std::process::exit(130);
            }
        }
    });
}

fn read_input(file: &Path) -> Result<String> {
    if file == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::LocateError { ref file } => {
            let text = read_input(file)?;
            return Ok(match extract_spec_error(&text) {
                Some(error) => {
                    println!(
                        "{}: {} - {}: {}",
                        error.kind, error.start, error.end, error.message
                    );
                    ExitCode::SUCCESS
                }
                None => {
                    eprintln!("No error location found");
                    ExitCode::FAILURE
                }
            });
        }
        Commands::Container { action } => {
            let status = match action {
                ContainerAction::Start => container::start_container(&config.container).await,
                ContainerAction::Stop => container::remove_container(&config.container).await,
            }
            .with_context(|| format!("Failed to run {}", config.container.docker.display()))?;
            if !status.success {
                eprintln!("{}", status.stderr);
                return Ok(ExitCode::FAILURE);
            }
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    let root = project_root(&cli)?;
    debug!(root = %root.display(), mode = %config.mode(), "Using project");
    let session = Arc::new(PipelineSession::new(config, Arc::new(ConsoleEventSink)));
    let orchestrator = Arc::new(Orchestrator::new(
        session,
        Arc::new(DirectoryWorkspace::new(&root)),
    ));
    orchestrator.open_project(&root).await;
    cancel_on_ctrl_c(Arc::clone(&orchestrator));

    let code = match cli.command {
        Commands::RunC => exit_code(&orchestrator.compile_and_run_c().await?),
        Commands::RunProject => exit_code(&orchestrator.compile_and_run_project().await?),
        Commands::BuildC { emit_llvm } => exit_code(&orchestrator.build_c(emit_llvm).await?),
        Commands::RunBinary => exit_code(&orchestrator.run_binary().await?),
        Commands::Unused => {
            for occurrence in orchestrator.highlight_unused_functions().await? {
                println!(
                    "{}:{}: {} is never called",
                    occurrence.line + 1,
                    occurrence.start_column + 1,
                    occurrence.function
                );
            }
            ExitCode::SUCCESS
        }
        Commands::Setup => match orchestrator.set_up_project_structure().await? {
            SetupOutcome::Written(path) => {
                println!("Wrote {}", path.display());
                ExitCode::SUCCESS
            }
            SetupOutcome::AlreadyPresent => {
                println!("Linter configuration already present");
                ExitCode::SUCCESS
            }
            SetupOutcome::CompilerMissing => ExitCode::FAILURE,
        },
        Commands::LocateError { .. } | Commands::Container { .. } => ExitCode::SUCCESS,
    };
    Ok(code)
}
