use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(
    name = "tesslaflow",
    about = "Build, instrument and verify C projects against TeSSLa specifications",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Cli {
    /// Toolchain configuration file (JSON)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Project directory, defaults to the current directory
    #[clap(long, short, global = true)]
    pub project: Option<PathBuf>,

    /// Run the toolchain inside the docker image
    #[clap(long, global = true)]
    pub docker: bool,

    /// Emit logs as JSON lines
    #[clap(long, global = true)]
    pub json_logs: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Compile the C sources and run the binary
    RunC,

    /// Compile, instrument and run the project, then verify the trace
    RunProject,

    /// Compile the C sources only
    BuildC {
        /// Emit LLVM intermediate form instead of a native binary
        #[clap(long)]
        emit_llvm: bool,
    },

    /// Run the binary of an earlier build
    RunBinary,

    /// List tracked functions that no C source calls
    Unused,

    /// Write the linter configuration into the project
    Setup,

    /// Locate a specification compiler error in a file, or stdin with "-"
    LocateError { file: PathBuf },

    /// Manage the persistent toolchain container
    Container {
        #[clap(subcommand)]
        action: ContainerAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerAction {
    /// Start the named container
    Start,
    /// Remove the named container
    Stop,
}
