use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tasklog")]
#[command(about = "Desktop activity tracker with batched LLM classification")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to <config dir>/tasklog/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Where records, raw logs and runtime.log are written
    #[arg(long, global = true, value_name = "PATH")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Track the foreground window until interrupted (default)
    Run,

    /// Write a default settings file if none exists
    InitConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            tasklog::run(tasklog::RunOptions {
                config_path: cli.config,
                data_dir: cli.data_dir,
            })
            .await
        }
        Commands::InitConfig => {
            let (path, created) = tasklog::init_config(cli.config)?;
            if created {
                println!("Wrote default settings to {}", path.display());
            } else {
                println!("Settings already exist at {}", path.display());
            }
            Ok(())
        }
    }
}
