#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI for browsing and auditing persisted conversation threads.
//!
//! ```text
//! space_agent_checkpoints list [--limit 20]
//! space_agent_checkpoints show <thread_id> [--raw]
//! space_agent_checkpoints export <thread_id>
//! space_agent_checkpoints delete <thread_id>
//! ```
//!
//! Running with no subcommand enters interactive mode.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use space_agent_checkpoint::{
    CheckpointStore as _, DEFAULT_DB_PATH, SqliteCheckpointStore, format_transcript,
};

#[derive(Parser)]
#[command(
    name = "space_agent_checkpoints",
    about = "Browse and audit space agent conversation threads"
)]
struct Cli {
    /// Path to the checkpoints database
    #[arg(long, env = "CHECKPOINT_DB_PATH", default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List recent threads
    List {
        /// Maximum number of threads to show
        #[arg(long, default_value = "20")]
        limit: u32,
    },
    /// Show a thread's transcript and status
    Show {
        /// Thread ID (or unique prefix)
        id: String,
        /// Also print the raw message rows as stored
        #[arg(long)]
        raw: bool,
    },
    /// Export a thread's full state as JSON
    Export {
        /// Thread ID (or unique prefix)
        id: String,
    },
    /// Delete a thread
    Delete {
        /// Thread ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let store = SqliteCheckpointStore::open(&cli.db).await?;

    let Some(command) = cli.command else {
        return space_agent_checkpoint::interactive::run(&store).await;
    };

    match command {
        Commands::List { limit } => {
            let threads = store.list(limit, 0).await?;

            if threads.is_empty() {
                println!("No threads found.");
                return Ok(());
            }

            print!("{}", space_agent_checkpoint::interactive::format_table(&threads));
            println!("\n{} thread(s)", threads.len());
        }
        Commands::Show { id, raw } => {
            let resolved = store.resolve_id(&id).await?;
            if let Some(state) = store.load(&resolved).await? {
                println!("Thread: {resolved}");
                println!("Status: {:?}\n", state.status);
                print!("{}", format_transcript(&state.messages));

                if raw {
                    println!("\nStored rows:");
                    for row in store.stored_messages(&resolved).await?.unwrap_or_default() {
                        println!(
                            "{:>4}  {}  {:<9} {}",
                            row.sequence, row.created_at, row.role, row.content
                        );
                    }
                }
            } else {
                eprintln!("Thread not found: {id}");
                std::process::exit(1);
            }
        }
        Commands::Export { id } => {
            let resolved = store.resolve_id(&id).await?;
            if let Some(state) = store.load(&resolved).await? {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                eprintln!("Thread not found: {id}");
                std::process::exit(1);
            }
        }
        Commands::Delete { id } => {
            if store.delete(&id).await? {
                println!("Deleted thread: {id}");
            } else {
                eprintln!("Thread not found: {id}");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
