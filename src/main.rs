//! # AutoDoc CLI (`autodoc`)
//!
//! The `autodoc` binary reads generated documentation from an AutoDoc backend,
//! renders it, edits it, and serves the HTML viewer.
//!
//! ## Usage
//!
//! ```bash
//! autodoc --config ./config/autodoc.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `autodoc list` | List documents (newest version, or most recent N) |
//! | `autodoc get <id>` | Print one document with its metadata |
//! | `autodoc render <id>` | Render a document to HTML |
//! | `autodoc render --file <path>` | Render a local file to HTML |
//! | `autodoc edit <id> --file <path>` | Replace a document's content |
//! | `autodoc stats` | Document count and versions |
//! | `autodoc changelog [chunk…]` | Versions, and documents per version |
//! | `autodoc run <id>` | Documents of one generation run |
//! | `autodoc health` | Probe the backend |
//! | `autodoc register` / `signin` | Obtain an API key |
//! | `autodoc serve` | Start the HTML viewer |
//!
//! Without a config file at the default path, built-in defaults are used
//! (backend `http://localhost:3005`).

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use autodoc_viewer::auth::{RegisterForm, SigninForm};
use autodoc_viewer::{commands, config, logging, server};

const DEFAULT_CONFIG: &str = "./config/autodoc.toml";

/// AutoDoc CLI: browse, render and edit generated documentation.
#[derive(Parser)]
#[command(
    name = "autodoc",
    about = "AutoDoc viewer: browse, render and edit generated documentation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Backend base URL, overriding `[api].base_url`.
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Debug logging (ignored when `RUST_LOG` is set).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List documents.
    ///
    /// Shows the documents of the newest version, or the most recent
    /// `[listing].limit` documents when `[listing].mode = "recent"`.
    List,

    /// Print a document and its metadata.
    Get {
        /// Document id.
        id: String,
    },

    /// Render document content to HTML on stdout.
    Render {
        /// Document id to fetch and render.
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        id: Option<String>,

        /// Render a local file instead of fetching a document.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Replace a document's content with a file's.
    Edit {
        /// Document id.
        id: String,

        /// File holding the new content.
        #[arg(long)]
        file: PathBuf,
    },

    /// Show document count and available versions.
    Stats,

    /// List versions, and the documents of each chunk time given.
    Changelog {
        /// Chunk times to expand.
        chunk_times: Vec<String>,
    },

    /// List the documents of one generation run.
    Run {
        /// Run id.
        id: String,
    },

    /// Check that the backend is reachable.
    Health,

    /// Register an account and print its API key.
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        project_name: String,
        #[arg(long)]
        password: String,
        /// Defaults to `--password`.
        #[arg(long)]
        confirm_password: Option<String>,
    },

    /// Sign in with email and password, or an existing API key.
    Signin {
        #[arg(long, conflicts_with = "api_key")]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Start the HTML viewer.
    ///
    /// Binds to the address configured in `[server].bind`.
    Serve,
}

/// Load the config file; a missing file at the default path means defaults.
fn load(path: &Path, api_url: Option<String>) -> anyhow::Result<config::Config> {
    let mut cfg = if path == Path::new(DEFAULT_CONFIG) && !path.exists() {
        tracing::debug!("no config at {}, using defaults", DEFAULT_CONFIG);
        config::Config::minimal()
    } else {
        config::load_config(path)?
    };
    if let Some(url) = api_url {
        cfg.api.base_url = url;
        config::validate(&cfg)?;
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    // Rendering a local file needs no backend or config
    if let Commands::Render {
        file: Some(ref path),
        ..
    } = cli.command
    {
        let cfg = config::Config::minimal();
        commands::run_render(&cfg, None, Some(path.as_path())).await?;
        return Ok(());
    }

    let cfg = load(&cli.config, cli.api_url)?;

    match cli.command {
        Commands::List => commands::run_list(&cfg).await?,
        Commands::Get { id } => commands::run_get(&cfg, &id).await?,
        Commands::Render { id, file } => {
            commands::run_render(&cfg, id.as_deref(), file.as_deref()).await?
        }
        Commands::Edit { id, file } => commands::run_edit(&cfg, &id, &file).await?,
        Commands::Stats => commands::run_stats(&cfg).await?,
        Commands::Changelog { chunk_times } => commands::run_changelog(&cfg, &chunk_times).await?,
        Commands::Run { id } => commands::run_run(&cfg, &id).await?,
        Commands::Health => commands::run_health(&cfg).await?,
        Commands::Register {
            email,
            project_name,
            password,
            confirm_password,
        } => {
            let form = RegisterForm {
                email,
                confirm_password: confirm_password.unwrap_or_else(|| password.clone()),
                password,
                project_name,
            };
            commands::run_register(&cfg, form).await?
        }
        Commands::Signin {
            email,
            password,
            api_key,
        } => {
            let form = SigninForm {
                email: email.unwrap_or_default(),
                password: password.unwrap_or_default(),
                api_key: api_key.unwrap_or_default(),
            };
            commands::run_signin(&cfg, form).await?
        }
        Commands::Serve => server::run_server(&cfg).await?,
    }

    Ok(())
}
