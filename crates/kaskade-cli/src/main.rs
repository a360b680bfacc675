//! Headless CLI for the kaskade load-test workbench.
//!
//! Drives the same core as the desktop shell: sessions live in a local JSON
//! document, runs are dispatched to the external worker binary, and results
//! are submitted to the result backend.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use kaskade_core::backend::BackendClient;
use kaskade_core::history;
use kaskade_core::run::{execute_run, RunOutcome, SkipReason, WorkerLauncher};
use kaskade_core::session::store::{RunConfigDraft, SigninForm};
use kaskade_core::session::{DataFile, SessionStore};
use kaskade_core::KaskadeError;

#[derive(Parser)]
#[command(name = "kaskade")]
#[command(version, about = "Session-based load testing from the terminal")]
struct Cli {
    /// Path to the session document
    #[arg(long, global = true, default_value = "./datafile.json")]
    datafile: PathBuf,

    /// Base URL of the result backend
    #[arg(long, global = true, default_value = "http://localhost:8080")]
    backend: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all sessions in the document
    Sessions,

    /// Create a new empty session
    Create,

    /// Duplicate an existing session
    Duplicate {
        /// Id of the session to copy
        session: i64,
    },

    /// Rename a session
    Rename {
        session: i64,
        name: String,
    },

    /// Delete a session
    Delete {
        session: i64,
    },

    /// Run a load test against a session's requests
    Run {
        /// Id of the session to run
        #[arg(long)]
        session: i64,

        /// Path to the load-generation worker binary
        #[arg(long)]
        worker: PathBuf,

        /// Target URL for the run
        #[arg(long)]
        url: String,

        /// Test duration in seconds
        #[arg(long)]
        duration: String,

        /// Number of concurrent users
        #[arg(long)]
        concurrency: String,

        /// Total number of requests
        #[arg(long)]
        requests: String,

        /// Worker timeout in seconds
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,

        /// Backend account name
        #[arg(long, env = "KASKADE_USERNAME")]
        username: Option<String>,

        /// Backend account password
        #[arg(long, env = "KASKADE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// List stored results for a session
    History {
        #[arg(long)]
        session: i64,

        /// Maximum number of rows to fetch
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Fetch one stored result in full
    Show {
        /// Backend id of the result
        result: i64,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> Result<(), KaskadeError> {
    let datafile = DataFile::new(&cli.datafile);
    let backend = BackendClient::new(&cli.backend);

    match cli.command {
        Commands::Sessions => {
            let store = SessionStore::open(datafile).await?;
            for session in store.sessions() {
                let modified = chrono::DateTime::from_timestamp_millis(session.last_modified)
                    .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string());
                println!(
                    "{}  {} ({} requests, {} runs, modified {})",
                    session.session_id,
                    session.session_name,
                    session.requests.len(),
                    session.history.len(),
                    modified
                );
            }
        }
        Commands::Create => {
            let mut store = SessionStore::open(datafile).await?;
            let session = store.create_session().await?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        Commands::Duplicate { session } => {
            let mut store = SessionStore::open(datafile).await?;
            let copy = store.duplicate_session(session).await?;
            println!("{}", serde_json::to_string_pretty(&copy)?);
        }
        Commands::Rename { session, name } => {
            let mut store = SessionStore::open(datafile).await?;
            store.rename_session(session, name).await?;
        }
        Commands::Delete { session } => {
            let mut store = SessionStore::open(datafile).await?;
            store.delete_session(session).await?;
        }
        Commands::Run {
            session,
            worker,
            url,
            duration,
            concurrency,
            requests,
            timeout_secs,
            username,
            password,
        } => {
            let mut store = SessionStore::open(datafile).await?;

            if let (Some(username), Some(password)) = (username, password) {
                let user = backend
                    .login(&SigninForm { username, password })
                    .await?;
                store.set_user(Some(user));
            }

            store.set_active_session(Some(session))?;
            store.set_run_config(RunConfigDraft {
                target_url: url,
                test_duration: duration,
                concurrency,
                total_requests: requests,
            });

            let store = Mutex::new(store);
            let launcher =
                WorkerLauncher::new(worker).with_timeout(Duration::from_secs(timeout_secs));

            let cancel = CancellationToken::new();
            let canceller = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    canceller.cancel();
                }
            });

            match execute_run(&store, session, &launcher, &backend, &cancel).await? {
                RunOutcome::Completed { result, metadata } => {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                    if let Some(metadata) = metadata {
                        println!("{}", serde_json::to_string_pretty(&metadata)?);
                    } else {
                        eprintln!("result was not stored on the backend");
                    }
                }
                RunOutcome::Skipped(SkipReason::Invalid) => {
                    let store = store.lock().await;
                    let message = store
                        .validation()
                        .error
                        .as_deref()
                        .unwrap_or("run configuration is invalid");
                    return Err(KaskadeError::Validation(message.to_string()));
                }
                RunOutcome::Skipped(reason) => {
                    eprintln!("run skipped: {reason:?}");
                }
            }
        }
        Commands::History { session, limit } => {
            let rows = history::list_history(&backend, session, limit).await?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Commands::Show { result } => {
            let store = Mutex::new(SessionStore::open(datafile).await?);
            let (result, metadata) =
                history::load_history_detail(&backend, &store, result).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
    }

    Ok(())
}
