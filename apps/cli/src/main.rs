//! # Ranger CLI
//!
//! Command-line monitor for serial ranging sensors.
//!
//! ```bash
//! # store the default port
//! ranger-cli config set --port /dev/ttyUSB0
//!
//! # print readings until Ctrl+C
//! ranger-cli monitor
//!
//! # 100 readings from another port, rejecting corrupt frames
//! ranger-cli monitor --port /dev/ttyUSB1 --baud 115200 --strict --count 100
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

mod commands;

use commands::{ConfigCommand, MonitorCommand};

#[derive(Parser, Debug)]
#[command(name = "ranger-cli")]
#[command(about = "Command-line monitor for serial ranging sensors", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Config file management
    #[command(subcommand)]
    Config(ConfigCommand),

    /// List available serial ports
    Ports,

    /// Stream distance readings
    Monitor {
        #[command(flatten)]
        args: MonitorCommand,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ranger_cli=info".parse()?)
                .add_directive("ranger_driver=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config(cmd) => cmd.execute(),
        Commands::Ports => commands::ports::execute(),
        Commands::Monitor { args } => {
            let running = Arc::new(AtomicBool::new(true));
            let r = running.clone();
            ctrlc::set_handler(move || {
                r.store(false, Ordering::SeqCst);
                eprintln!("\nReceived interrupt signal. Closing port...");
            })?;
            args.execute(running)
        },
    }
}
