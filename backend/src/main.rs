//! csvql CLI - serve a CSV dataset through read/uploadCSV
//!
//! ```bash
//! csvql serve                          # Start HTTP server (port 8080)
//! csvql read                           # Print the normalized dataset
//! csvql upload input.csv               # Normalize a CSV file through uploadCSV
//! ```
//!
//! Settings come from `CSVQL_*` environment variables (and `.env`);
//! flags override them.

use clap::{Args, Parser, Subcommand};
use csvql::{Argument, Config, Dispatcher, OperationRequest, UploadMode};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "csvql")]
#[command(about = "Serve a CSV dataset through read/uploadCSV operations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        #[command(flatten)]
        source: SourceArgs,

        /// How uploadCSV receives content: inline | multipart
        #[arg(long)]
        upload_mode: Option<UploadMode>,
    },

    /// Run `read` once and print the result
    Read {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Run `uploadCSV` over a local file and print the result
    Upload {
        /// CSV file to submit
        input: PathBuf,

        /// Submit as a file part instead of an inline string
        #[arg(long)]
        multipart: bool,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Local dataset file
    #[arg(long, conflicts_with = "remote_url")]
    csv_path: Option<PathBuf>,

    /// Remote dataset URL
    #[arg(long)]
    remote_url: Option<String>,
}

impl SourceArgs {
    fn apply(self, mut config: Config) -> Result<Config, Box<dyn std::error::Error>> {
        if let Some(path) = self.csv_path {
            config = config.with_csv_path(path);
        }
        if let Some(url) = self.remote_url {
            config = config.with_remote_url(url)?;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match Config::from_env() {
        Ok(config) => run(cli.command, config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Serve {
            port,
            source,
            upload_mode,
        } => {
            let mut config = source.apply(config)?;
            if let Some(port) = port {
                config = config.with_port(port);
            }
            if let Some(mode) = upload_mode {
                config = config.with_upload_mode(mode);
            }
            cmd_serve(config).await
        }
        Commands::Read { source } => cmd_read(source.apply(config)?).await,
        Commands::Upload { input, multipart } => cmd_upload(config, &input, multipart).await,
    }
}

async fn cmd_serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    csvql::server::start_server(config).await?;
    Ok(())
}

async fn cmd_read(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Reading {}", config.read_source);
    let dispatcher = Dispatcher::new(Arc::new(config));
    let text = dispatcher.dispatch(OperationRequest::read()).await?;
    println!("{}", text);
    Ok(())
}

async fn cmd_upload(
    config: Config,
    input: &Path,
    multipart: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📤 Uploading {}", input.display());

    let mode = if multipart {
        UploadMode::Multipart
    } else {
        UploadMode::Inline
    };
    let bytes = tokio::fs::read(input).await?;
    let argument = Argument::from_file_bytes(bytes, mode);

    let dispatcher = Dispatcher::new(Arc::new(config.with_upload_mode(mode)));
    let text = dispatcher.dispatch(OperationRequest::upload(argument)).await?;
    println!("{}", text);
    Ok(())
}
