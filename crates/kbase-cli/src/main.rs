//! kbase: document ingestion for retrieval (identify, chunk, redact, embed).

use std::path::PathBuf;

use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;

fn print_help() {
    println!("kbase: document ingestion pipeline");
    println!();
    println!("Usage: kbase <command> [args]");
    println!();
    println!("Commands:");
    println!("  identify <file>                  Print the content-addressed document id");
    println!("  chunk <file>                     Convert and chunk a file, print chunks");
    println!("  redact <file>                    Convert a file and print it with PII redacted");
    println!("  ingest <file>...                 Run the full pipeline into an in-memory store");
    println!("  search <text> <file>...          Ingest files, then print the closest chunks");
    println!("  help                             Show this help message");
    println!();
    println!("Configuration is read from the environment (CHUNK_SIZE, VECTOR_NAMESPACE, PII_CATEGORIES, ...).");
}

fn single_path(args: &[String], command: &str) -> PathBuf {
    match args.get(2) {
        Some(p) => PathBuf::from(p),
        None => {
            eprintln!("Usage: kbase {} <file>", command);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        print_help();
        std::process::exit(1);
    };

    let config = kbase_core::PipelineConfig::from_env();
    debug!(
        "chunk_size={}, overlap={}, model={}, pii={}",
        config.chunk_size, config.chunk_overlap, config.embedding_model, config.pii_detection_enabled
    );

    match command.as_str() {
        "identify" => commands::identify_file(&single_path(&args, "identify")).await,
        "chunk" => commands::chunk_file(&single_path(&args, "chunk"), &config).await,
        "redact" => commands::redact_file(&single_path(&args, "redact"), &config).await,
        "ingest" => {
            let files = commands::file_args(&args[2..], "ingest")?;
            commands::ingest_files(&files, None, config).await
        }
        "search" => {
            let (query, files) = commands::search_args(&args[2..])?;
            commands::ingest_files(&files, Some(&query), config).await
        }
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}. Use 'kbase help' for usage.", other);
            std::process::exit(1);
        }
    }
}
