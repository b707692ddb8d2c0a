use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "momentum", about = "Weekly habit and goal tracking API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Serve,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Doctor,
    Seed,
    Dashboard {
        #[arg(long)]
        week: Option<String>,
    },
    CarryForward {
        #[arg(long)]
        week: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}
