//! Docling Worker CLI
//!
//! Runs the conversion job worker against a configured Camunda 8 cluster.
//! Also offers one-shot document download and local file conversion for
//! debugging the two external endpoints.

use anyhow::Result;
use clap::{Parser, Subcommand};
use docling_worker::worker::{setup_signal_handler, JobProcessor, JobRunner, WorkerConfig};
use docling_worker::{
    ConnectionConfig, DoclingConverter, DocumentConverter, DocumentFetcher, DocumentMetadata,
    DocumentRef, GatewaySession,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "docling-worker")]
#[command(about = "Claim document conversion jobs from a Camunda 8 cluster and complete them with docling renderings")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as worker, claiming conversion jobs from the configured cluster
    Worker {
        /// Job type to claim
        #[arg(short, long, default_value = "converter.docling")]
        job_type: String,

        /// Long-poll window per activation request, in seconds
        #[arg(short, long, default_value = "60")]
        poll_timeout: u64,

        /// Directory downloaded documents are written to
        #[arg(short, long, default_value = "./docs")]
        docs_dir: PathBuf,

        /// Verify downloaded payloads against the declared content hash
        #[arg(long)]
        verify_hash: bool,

        /// Keep downloaded files after each job
        #[arg(long)]
        keep_downloads: bool,

        /// Claim at most one job, then exit (for testing)
        #[arg(long)]
        once: bool,
    },

    /// Download a single stored document (debugging aid)
    Download {
        /// Document id in the cluster's document store
        #[arg(long)]
        document_id: String,

        /// Declared content hash of the document
        #[arg(long)]
        content_hash: String,

        /// File name to store the download under
        #[arg(long)]
        file_name: String,

        /// Directory the document is written to
        #[arg(short, long, default_value = "./docs")]
        docs_dir: PathBuf,
    },

    /// Convert a local file and print the renderings
    Convert {
        /// Path of the file to convert
        #[arg(short, long)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load .env file if present
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Worker {
            job_type,
            poll_timeout,
            docs_dir,
            verify_hash,
            keep_downloads,
            once,
        } => {
            info!("Initializing worker...");

            let connection = ConnectionConfig::from_env()?;
            let config = WorkerConfig::builder()
                .job_type(&job_type)
                .poll_timeout_secs(poll_timeout)
                .docs_dir(docs_dir)
                .verify_content_hash(verify_hash)
                .cleanup_downloads(!keep_downloads)
                .build();

            // An unreachable gateway at startup is fatal; recovery only
            // kicks in once the first session existed.
            let mut session = GatewaySession::open(&connection).await?;
            session.set_activate_timeout(config.poll_timeout);

            let converter = Arc::new(DoclingConverter::from_env());
            let processor = JobProcessor::new(config.clone(), converter)?;
            let mut runner = JobRunner::new(connection, config, processor, session);

            if once {
                info!("Running in single-job mode...");
                match runner.run_once().await {
                    Ok(true) => {
                        println!("Job processed");
                    }
                    Ok(false) => {
                        println!("No job available within the poll window");
                    }
                    Err(e) => {
                        eprintln!("Error processing job: {e}");
                        return Err(e.into());
                    }
                }
            } else {
                let shutdown = runner.shutdown_handle();
                setup_signal_handler(shutdown);

                runner.run().await?;
            }
        }

        Commands::Download {
            document_id,
            content_hash,
            file_name,
            docs_dir,
        } => {
            let connection = ConnectionConfig::from_env()?;
            let session = GatewaySession::open(&connection).await?;

            let fetcher = DocumentFetcher::new(docs_dir)?;
            let doc = DocumentRef {
                document_id,
                content_hash,
                metadata: DocumentMetadata { file_name },
            };

            let path = fetcher.fetch(&session, &doc).await?;
            println!("Downloaded to {}", path.display());
        }

        Commands::Convert { file, json } => {
            info!("Converting: {}", file.display());

            let converter = DoclingConverter::from_env();
            let converted = converter.convert(&file).await?;

            if json {
                let output = serde_json::json!({
                    "markdown": converted.markdown,
                    "html": converted.html,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("=== Markdown ===\n");
                println!("{}", converted.markdown);
                println!("\n=== HTML ===\n");
                println!("{}", converted.html);
            }
        }
    }

    Ok(())
}
