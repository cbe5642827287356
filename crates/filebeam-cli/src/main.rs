//! # filebeam
//!
//! Console front end for the filebeam transfer core: send a file to a
//! listening receiver, or listen and save incoming files.
//!
//! ```text
//! filebeam send <file> <host> <port> [--chunk-size N]
//! filebeam recv <host> <port> [--save-dir DIR]
//! ```
//!
//! All transfer activity is printed through a console observer; the
//! process exits non-zero when a send or the listener setup fails.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use clap::{Parser, Subcommand};

use filebeam_transfer::events::TransferObserver;
use filebeam_transfer::receiver::{ReceiverConfig, run_receiver};
use filebeam_transfer::sender::{SenderConfig, run_sender};

/// Checksummed file transfer over TCP.
#[derive(Parser)]
#[command(name = "filebeam", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a file to a listening receiver.
    Send {
        /// File to transmit.
        file: PathBuf,
        /// Receiver host name or IP address.
        host: String,
        /// Receiver port.
        port: u16,
        /// Bytes per chunk.
        #[arg(long, default_value_t = filebeam_transfer::DEFAULT_CHUNK_SIZE)]
        chunk_size: u32,
    },
    /// Listen for incoming file transfers until terminated.
    Recv {
        /// Address to bind.
        host: String,
        /// Port to listen on.
        port: u16,
        /// Directory where received files are saved.
        #[arg(long, default_value = ".")]
        save_dir: PathBuf,
    },
}

/// Prints status lines and a same-line progress ticker.
struct ConsoleObserver;

impl TransferObserver for ConsoleObserver {
    fn on_progress(&self, _percentage: f64, message: &str) {
        print!("\r{message}");
        let _ = std::io::stdout().flush();
    }

    fn on_status(&self, message: &str) {
        println!("{message}");
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "filebeam=info,filebeam_transfer=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let observer = Arc::new(ConsoleObserver);

    // Failures are already narrated by the observer; only the exit
    // code is left to signal here.
    let result = match cli.command {
        Commands::Send {
            file,
            host,
            port,
            chunk_size,
        } => {
            let mut config = SenderConfig::new(file, host, port);
            config.chunk_size = chunk_size;
            config.observer = Some(observer);
            run_sender(&config).map(|_| ())
        }
        Commands::Recv {
            host,
            port,
            save_dir,
        } => {
            let mut config = ReceiverConfig::new(host, port);
            config.save_dir = save_dir;
            config.observer = Some(observer);
            let stop = Arc::new(AtomicBool::new(false));
            run_receiver(config, stop)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
