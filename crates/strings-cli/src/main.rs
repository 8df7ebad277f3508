use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::fs;
use strings_db::PgRepository;
use strings_engine::StringsService;
use strings_schemas::ClientThread;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "strings")]
#[command(about = "Versioned thread/string store CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Thread commands
    Threads {
        #[command(subcommand)]
        cmd: ThreadsCmd,
    },

    /// String lifecycle and flag commands
    Strings {
        #[command(subcommand)]
        cmd: StringsCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,

    /// Print version row counts per table.
    Counts,
}

#[derive(Subcommand)]
enum ThreadsCmd {
    /// Latest version of every thread
    List {
        /// Print thread ids only
        #[arg(long, default_value_t = false)]
        ids: bool,
    },

    /// Latest version of one thread with its strings
    Show {
        #[arg(long)]
        thread_id: String,
    },

    /// Submit a client snapshot (create or reconcile)
    Post {
        /// Path to a JSON thread payload
        #[arg(long = "file")]
        file: String,
    },

    Archive {
        #[arg(long)]
        thread_id: String,
    },

    Restore {
        #[arg(long)]
        thread_id: String,
    },

    Delete {
        #[arg(long)]
        thread_id: String,
    },
}

#[derive(Subcommand)]
enum StringsCmd {
    Archive {
        #[arg(long)]
        string_id: String,
    },
    Restore {
        #[arg(long)]
        string_id: String,
    },
    Delete {
        #[arg(long)]
        string_id: String,
    },
    Activate {
        #[arg(long)]
        string_id: String,
    },
    Deactivate {
        #[arg(long)]
        string_id: String,
    },
    Private {
        #[arg(long)]
        string_id: String,
    },
    Public {
        #[arg(long)]
        string_id: String,
    },
}

#[derive(Clone, Copy)]
enum StringAction {
    Archive,
    Restore,
    Delete,
    Activate,
    Deactivate,
    Private,
    Public,
}

impl StringAction {
    fn label(self) -> &'static str {
        match self {
            StringAction::Archive => "archived",
            StringAction::Restore => "restored",
            StringAction::Delete => "deleted",
            StringAction::Activate => "activated",
            StringAction::Deactivate => "deactivated",
            StringAction::Private => "private",
            StringAction::Public => "public",
        }
    }
}

impl StringsCmd {
    /// Split into the action and the raw `--string-id`.
    fn into_parts(self) -> (StringAction, String) {
        match self {
            StringsCmd::Archive { string_id } => (StringAction::Archive, string_id),
            StringsCmd::Restore { string_id } => (StringAction::Restore, string_id),
            StringsCmd::Delete { string_id } => (StringAction::Delete, string_id),
            StringsCmd::Activate { string_id } => (StringAction::Activate, string_id),
            StringsCmd::Deactivate { string_id } => (StringAction::Deactivate, string_id),
            StringsCmd::Private { string_id } => (StringAction::Private, string_id),
            StringsCmd::Public { string_id } => (StringAction::Public, string_id),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = strings_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = strings_db::status(&pool).await?;
                    println!(
                        "db_ok={} has_version_tables={}",
                        s.ok, s.has_version_tables
                    );
                }
                DbCmd::Migrate => {
                    strings_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
                DbCmd::Counts => {
                    let (threads, strings) = strings_db::version_row_counts(&pool).await?;
                    println!("versioned_thread={} versioned_string={}", threads, strings);
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = strings_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Threads { cmd } => match cmd {
            ThreadsCmd::List { ids } => {
                let svc = service_from_env().await?;
                if ids {
                    for id in svc.get_thread_ids().await? {
                        println!("{}", id);
                    }
                } else {
                    print_json(&svc.get_threads().await?)?;
                }
            }
            ThreadsCmd::Show { thread_id } => {
                let id = parse_id(&thread_id, "thread_id")?;
                let svc = service_from_env().await?;
                print_json(&svc.get_thread_by_id(id).await?)?;
            }
            ThreadsCmd::Post { file } => {
                let client = load_client_thread(&file)?;
                let svc = service_from_env().await?;
                let t = svc.post_thread(client).await?;
                println!("thread_id={} version={}", t.thread_id, t.version);
                print_json(&t)?;
            }
            ThreadsCmd::Archive { thread_id } => {
                let id = parse_id(&thread_id, "thread_id")?;
                let t = service_from_env().await?.archive_thread(id).await?;
                println!("archived=true thread_id={} version={}", t.thread_id, t.version);
            }
            ThreadsCmd::Restore { thread_id } => {
                let id = parse_id(&thread_id, "thread_id")?;
                let t = service_from_env().await?.restore_thread(id).await?;
                println!("restored=true thread_id={} version={}", t.thread_id, t.version);
            }
            ThreadsCmd::Delete { thread_id } => {
                let id = parse_id(&thread_id, "thread_id")?;
                let t = service_from_env().await?.delete_thread(id).await?;
                println!("deleted=true thread_id={} version={}", t.thread_id, t.version);
            }
        },

        Commands::Strings { cmd } => {
            let (action, raw_id) = cmd.into_parts();
            let id = parse_id(&raw_id, "string_id")?;
            let svc = service_from_env().await?;
            let s = match action {
                StringAction::Archive => svc.archive_string(id).await?,
                StringAction::Restore => svc.restore_string(id).await?,
                StringAction::Delete => svc.delete_string(id).await?,
                StringAction::Activate => svc.activate_string(id).await?,
                StringAction::Deactivate => svc.deactivate_string(id).await?,
                StringAction::Private => svc.make_private(id).await?,
                StringAction::Public => svc.make_public(id).await?,
            };
            println!(
                "{}=true string_id={} version={} order={}",
                action.label(),
                s.string_id,
                s.version,
                s.order
            );
        }
    }

    Ok(())
}

async fn service_from_env() -> Result<StringsService<PgRepository>> {
    let pool = strings_db::connect_from_env().await?;
    Ok(StringsService::new(PgRepository::new(pool)))
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid {} uuid", what))
}

fn load_client_thread(path: &str) -> Result<ClientThread> {
    // Read raw bytes to handle UTF-8 BOM cleanly on Windows.
    let bytes = fs::read(path).with_context(|| format!("read thread file failed: {}", path))?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);

    let raw = std::str::from_utf8(bytes).context("thread file must be UTF-8 text")?;
    let v: Value = serde_json::from_str(raw.trim()).context("thread file must contain valid JSON")?;
    serde_json::from_value(v).context("thread file is not a thread payload")
}

fn print_json<T: serde::Serialize>(v: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(v)?);
    Ok(())
}

/// Logs go to stderr so stdout stays parseable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
