pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "topoprobe")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Topology probe bundle for network introspection agents", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Agent configuration file (YAML)")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Host node name (defaults to the hostname)")]
    pub host: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "List built-in probes and platform defaults")]
    Probes,
    #[command(about = "Assemble the probe bundle without starting it")]
    Check,
    #[command(about = "Assemble and run the probe bundle until interrupted")]
    Run {
        #[arg(long, help = "Print the topology graph as JSON on shutdown")]
        dump_graph: bool,
    },
}
