//! archivist CLI entry point

use archivist::{
    chat::ChatSearchRequest,
    commands::{
        cmd_add_dir, cmd_add_domain, cmd_add_file, cmd_add_rule, cmd_changes, cmd_chat_search,
        cmd_history, cmd_index, cmd_init, cmd_list_domains, cmd_list_rules, cmd_query,
        cmd_remove_domain, cmd_remove_rule, cmd_status, cmd_test_route, print_changes,
        print_chat_response, print_domains, print_history, print_index_report,
        print_query_results, print_route, print_rules, print_status, DomainSpec, QueryOptions,
        RuleSpec,
    },
    config::Config,
    error::Result,
    progress::LogWriterFactory,
    store::Store,
};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "archivist")]
#[command(version, about = "Hybrid multi-domain retrieval for RAG backends", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize archivist configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Add a file or directory of documents to a domain
    Add {
        /// File or directory to add
        path: PathBuf,

        /// Target domain namespace
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },

    /// Index changed documents (chunk + embed)
    Index {
        /// Only index this domain
        #[arg(short, long)]
        namespace: Option<String>,

        /// Only index this document id
        #[arg(long)]
        doc: Option<String>,

        /// Re-index everything regardless of content hashes
        #[arg(long)]
        force: bool,
    },

    /// Show pending changes without indexing
    Changes {
        /// Only check this domain
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Show a document's change history
    History {
        /// Document id
        doc_id: String,

        /// Maximum entries to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Run a one-shot query against a single domain
    Query {
        /// The search query
        query: String,

        /// Domain to search
        #[arg(short, long)]
        namespace: Option<String>,

        /// Maximum number of results
        #[arg(short = 'k', long)]
        limit: Option<usize>,

        /// Vector weight in hybrid fusion (0.0-1.0)
        #[arg(long)]
        alpha: Option<f32>,

        /// Retrieval mode: hybrid, vector, or bm25
        #[arg(short, long)]
        mode: Option<String>,

        /// Skip reranking even when a rerank backend is configured
        #[arg(long)]
        no_rerank: bool,

        /// Only search chunks whose filename contains this substring
        #[arg(long)]
        filename: Option<String>,
    },

    /// Run a chat search through the full pipeline (classify + retrieve)
    Chat {
        /// The conversational query
        query: String,

        /// Explicit domain (skips classification)
        #[arg(short, long)]
        namespace: Option<String>,

        /// Domain the previous turn was routed to
        #[arg(long)]
        previous_domain: Option<String>,

        /// Session id for telemetry
        #[arg(long)]
        session: Option<String>,

        /// Maximum number of results
        #[arg(short = 'k', long)]
        limit: Option<usize>,
    },

    /// Manage knowledge domains
    Domains {
        #[command(subcommand)]
        action: DomainAction,
    },

    /// Manage classification routing rules
    Rules {
        #[command(subcommand)]
        action: RuleAction,
    },

    /// Show system status
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum DomainAction {
    /// Register a knowledge domain
    Add {
        /// Domain namespace (e.g. billing)
        namespace: String,

        /// Human-readable display name
        #[arg(short, long)]
        name: Option<String>,

        /// Comma-separated domain keywords
        #[arg(short, long)]
        keywords: Option<String>,

        /// Domain description
        #[arg(long)]
        description: Option<String>,

        /// Priority (higher wins ties)
        #[arg(short, long, default_value = "0")]
        priority: i32,
    },

    /// List domains
    List {
        /// Include inactive domains
        #[arg(long)]
        all: bool,
    },

    /// Remove a domain
    Remove {
        /// Domain namespace
        namespace: String,
    },
}

#[derive(Subcommand)]
enum RuleAction {
    /// Register a routing rule
    Add {
        /// Rule name
        name: String,

        /// Rule type: keyword, regex, or wildcard
        #[arg(short = 't', long = "type")]
        rule_type: String,

        /// Rule pattern (keywords separated by '|', or a regex/wildcard)
        #[arg(short, long)]
        pattern: String,

        /// Target domain namespace
        #[arg(long)]
        target: String,

        /// Priority (higher rules are checked first)
        #[arg(long, default_value = "0")]
        priority: i32,

        /// Per-rule confidence threshold (0.0-1.0)
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// List routing rules
    List {
        /// Include inactive rules
        #[arg(long)]
        all: bool,
    },

    /// Remove a routing rule
    Remove {
        /// Rule id
        id: String,
    },

    /// Dry-run a query against the routing rules
    Test {
        /// The query to route
        query: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    // Init doesn't need an existing config
    if let Commands::Init { force } = cli.command {
        let base_dir = cli.config.as_deref().and_then(|p| {
            if p.extension().map_or(false, |e| e == "toml") {
                p.parent().map(PathBuf::from)
            } else {
                Some(p.to_path_buf())
            }
        });
        return cmd_init(base_dir, force).await;
    }

    // Completions don't need config/db
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "archivist", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    let store = Store::new(&config.paths.db_file).await?;
    store.ensure_default_domain().await?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Add { path, namespace } => {
            let stats = if path.is_dir() {
                cmd_add_dir(&store, &path, &namespace).await?
            } else {
                cmd_add_file(&store, &path, &namespace).await?
            };

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("\n✓ Add complete");
                println!("  Added: {}", stats.added);
                println!("  Updated: {}", stats.updated);
                println!("  Unchanged: {}", stats.unchanged);
                println!("  Skipped: {}", stats.skipped);
                for error in &stats.errors {
                    println!("  ✗ {}", error);
                }
            }
        }

        Commands::Index {
            namespace,
            doc,
            force,
        } => {
            let report =
                cmd_index(&config, &store, namespace.as_deref(), doc.as_deref(), force).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_index_report(&report);
            }
        }

        Commands::Changes { namespace } => {
            let summary = cmd_changes(&store, namespace.as_deref()).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_changes(&summary);
            }
        }

        Commands::History { doc_id, limit } => {
            let entries = cmd_history(&store, &doc_id, limit).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print_history(&entries);
            }
        }

        Commands::Query {
            query,
            namespace,
            limit,
            alpha,
            mode,
            no_rerank,
            filename,
        } => {
            let options = QueryOptions {
                namespace,
                top_k: limit,
                alpha,
                mode,
                rerank: !no_rerank,
                filename,
            };
            let report = cmd_query(&config, &store, &query, options).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_query_results(&report);
            }
        }

        Commands::Chat {
            query,
            namespace,
            previous_domain,
            session,
            limit,
        } => {
            let request = ChatSearchRequest {
                query,
                namespace,
                chat_history: Vec::new(),
                previous_domain,
                session_id: session,
                top_k: limit,
            };
            let response = cmd_chat_search(&config, &store, request).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_chat_response(&response);
            }
        }

        Commands::Domains { action } => match action {
            DomainAction::Add {
                namespace,
                name,
                keywords,
                description,
                priority,
            } => {
                let spec = DomainSpec {
                    display_name: name.unwrap_or_else(|| namespace.clone()),
                    namespace,
                    keywords: keywords
                        .map(|k| k.split(',').map(|s| s.trim().to_string()).collect())
                        .unwrap_or_default(),
                    description,
                    priority,
                };
                cmd_add_domain(&store, spec).await?;
            }
            DomainAction::List { all } => {
                let domains = cmd_list_domains(&store, all).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&domains)?);
                } else {
                    print_domains(&domains);
                }
            }
            DomainAction::Remove { namespace } => {
                cmd_remove_domain(&store, &namespace).await?;
            }
        },

        Commands::Rules { action } => match action {
            RuleAction::Add {
                name,
                rule_type,
                pattern,
                target,
                priority,
                threshold,
            } => {
                let spec = RuleSpec {
                    rule_name: name,
                    rule_type,
                    pattern,
                    target_namespace: target,
                    priority,
                    confidence_threshold: threshold,
                };
                cmd_add_rule(&store, spec).await?;
            }
            RuleAction::List { all } => {
                let rules = cmd_list_rules(&store, all).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&rules)?);
                } else {
                    print_rules(&rules);
                }
            }
            RuleAction::Remove { id } => {
                cmd_remove_rule(&store, &id).await?;
            }
            RuleAction::Test { query } => {
                let matched = cmd_test_route(&store, &config, &query).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&matched)?);
                } else {
                    print_route(&query, &matched);
                }
            }
        },

        Commands::Status => {
            let status = cmd_status(&config, &store).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_config_path);

    if !config_path.exists() {
        eprintln!(
            "Config file not found: {}\nRun 'archivist init' first.",
            config_path.display()
        );
        std::process::exit(1);
    }

    Config::load(&config_path)
}
