//! Command-line entry point for dialogue graph projects.
//!
//! # Responsibility
//! - Open the configured graph store and route one request to `dialobild_core::api`.
//! - Print the JSON response body and exit non-zero on any failure status.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::info;
use serde_json::{json, Value};

use dialobild_core::api::{self, ApiResponse};
use dialobild_core::db::{open_db, open_db_in_memory};
use dialobild_core::{init_from_config, CoreConfig, OwnerId};

#[derive(Parser)]
#[command(name = "dialobild", version, about = "Dialogue graph project store")]
struct Cli {
    /// TOML config file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite database path; overrides `[database] path` from config.
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Owner the request acts on behalf of.
    #[arg(long, value_name = "ID")]
    owner: OwnerId,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a project with a full node list (`{project_id|project_name, nodes}`).
    Save(BodyArgs),
    /// Expand raw text below a node (`{project_id|project_name, active_node, text}`).
    Ingest(BodyArgs),
    /// Print one project with nodes and catalogs.
    Show(ShowArgs),
    /// List the owner's projects.
    Projects,
}

#[derive(Parser)]
struct BodyArgs {
    /// JSON request body; `-` reads stdin.
    #[arg(value_name = "FILE")]
    body: PathBuf,
}

#[derive(Parser)]
struct ShowArgs {
    #[arg(long, conflicts_with = "project_name", required_unless_present = "project_name")]
    project_id: Option<i64>,

    #[arg(long)]
    project_name: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    let response = match run(cli) {
        Ok(response) => response,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };

    match serde_json::to_string_pretty(&response.body) {
        Ok(body) => println!("{body}"),
        Err(err) => {
            eprintln!("failed to render response: {}", err);
            std::process::exit(1);
        }
    }
    if !response.is_success() {
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<ApiResponse, String> {
    let config = match cli.config.as_deref() {
        Some(path) => CoreConfig::load(path).map_err(|err| err.to_string())?,
        None => CoreConfig::default(),
    };
    init_from_config(&config.logging)?;

    let db_path = cli.db.or(config.database.path);
    let conn = match db_path.as_deref() {
        Some(path) => open_db(path),
        None => open_db_in_memory(),
    }
    .map_err(|err| format!("failed to open graph store: {err}"))?;

    info!(
        "event=cli_command module=cli status=start owner_id={} in_memory={}",
        cli.owner,
        db_path.is_none()
    );

    let response = match cli.command {
        Commands::Save(args) => api::save_project(&conn, cli.owner, &read_body(&args.body)?),
        Commands::Ingest(args) => {
            api::add_raw_nodes(&conn, cli.owner, &config.layout, &read_body(&args.body)?)
        }
        Commands::Show(args) => {
            let body = match args.project_id {
                Some(project_id) => json!({ "project_id": project_id }),
                None => json!({ "project_name": args.project_name }),
            };
            api::get_project(&conn, cli.owner, &body)
        }
        Commands::Projects => api::list_projects(&conn, cli.owner),
    };
    Ok(response)
}

fn read_body(path: &Path) -> Result<Value, String> {
    let raw = if path == Path::new("-") {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .map_err(|err| format!("failed to read stdin: {err}"))?;
        raw
    } else {
        std::fs::read_to_string(path)
            .map_err(|err| format!("failed to read `{}`: {err}", path.display()))?
    };
    serde_json::from_str(&raw).map_err(|err| format!("request body is not JSON: {err}"))
}
