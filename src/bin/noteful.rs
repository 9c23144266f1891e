use clap::{Parser, Subcommand};
use noteful::cli as prog_cli;
use noteful::config::{self, AppConfig};
use noteful::connection::with_connection;
use noteful::errors::DbError;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "noteful", version, about = "Query notes in a noteful document store", long_about = None)]
struct Cli {
    #[arg(long, help = "Path to a config file (TOML). If omitted, the usual locations are searched.")]
    config: Option<PathBuf>,
    #[arg(long, help = "Store URI (memory://name or file://path). Takes precedence over config/env.")]
    uri: Option<String>,
    #[arg(long, help = "Collection to query; defaults to notes")]
    collection: Option<String>,
    #[arg(long, help = "Directory for rolling log files")]
    log_dir: Option<PathBuf>,
    #[arg(long, help = "Log level: error|warn|info|debug|trace")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run the scripted query scenario and print every step")]
    Scratch {
        #[arg(long, help = "Replace the collection with the 20-note fixture first")]
        seed: bool,
    },
    #[command(about = "Replace the collection with the 20-note fixture")]
    Seed,
    #[command(about = "Find matching notes")]
    Find {
        #[arg(help = "Filter JSON, e.g. '{\"_id\": {\"$gt\": \"000000000000000000000007\"}}'")]
        filter: String,
        #[arg(long, help = "Projection, e.g. 'title -_id'")]
        project: Option<String>,
        #[arg(long, help = "Sort fields, e.g. 'title,-_id'")]
        sort: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        skip: Option<usize>,
    },
    #[command(name = "find-one", about = "Find the first matching note")]
    FindOne {
        #[arg(help = "Filter JSON")]
        filter: String,
        #[arg(long, help = "Projection, e.g. 'title'")]
        project: Option<String>,
    },
    #[command(about = "Count matching notes")]
    Count {
        #[arg(help = "Filter JSON; all notes when omitted")]
        filter: Option<String>,
    },
    #[command(about = "Insert one or more notes given as JSON objects")]
    Insert {
        #[arg(required = true, help = "Note JSON, e.g. '{\"title\": \"t\", \"content\": \"c\"}'")]
        docs: Vec<String>,
    },
    #[command(name = "update-by-id", about = "Patch one note by id")]
    UpdateById {
        id: String,
        #[arg(help = "Patch JSON: {\"$set\": {...}}, {\"$unset\": {...}} or a plain object")]
        patch: String,
        #[arg(long = "new", help = "Print the updated note instead of an acknowledgement")]
        return_updated: bool,
    },
    #[command(name = "update-many", about = "Patch every matching note")]
    UpdateMany { filter: String, patch: String },
    #[command(name = "delete-many", about = "Delete every matching note")]
    DeleteMany { filter: String },
}

impl From<Commands> for prog_cli::Command {
    fn from(cmd: Commands) -> Self {
        match cmd {
            Commands::Scratch { seed } => Self::Scratch { seed },
            Commands::Seed => Self::Seed,
            Commands::Find { filter, project, sort, limit, skip } => {
                Self::Find { filter_json: filter, project, sort, limit, skip }
            }
            Commands::FindOne { filter, project } => Self::FindOne { filter_json: filter, project },
            Commands::Count { filter } => Self::Count { filter_json: filter },
            Commands::Insert { docs } => Self::Insert { docs_json: docs },
            Commands::UpdateById { id, patch, return_updated } => {
                Self::UpdateById { id, patch_json: patch, return_updated }
            }
            Commands::UpdateMany { filter, patch } => Self::UpdateMany { filter_json: filter, patch_json: patch },
            Commands::DeleteMany { filter } => Self::DeleteMany { filter_json: filter },
        }
    }
}

fn init_logging(cfg: &AppConfig) -> Result<(), DbError> {
    match &cfg.log_config {
        Some(path) => noteful::logger::init_from_file(path),
        None => noteful::logger::configure_logging(cfg.log_dir.as_deref(), Some(cfg.log_level()), None),
    }
}

fn run(cli: Cli) -> Result<(), DbError> {
    let overrides = AppConfig {
        uri: cli.uri,
        log_dir: cli.log_dir,
        log_level: cli.log_level,
        log_config: None,
        collection: cli.collection,
    };
    let cfg = config::load(cli.config.as_deref(), overrides)?;
    if let Err(e) = init_logging(&cfg) {
        eprintln!("warning: {e}");
    }
    let cmd = prog_cli::Command::from(cli.command);
    with_connection(cfg.uri(), |conn| {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        prog_cli::run(conn, cfg.collection(), cmd, &mut out)
    })
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e}");
            eprintln!("{e:?}");
            ExitCode::FAILURE
        }
    }
}
