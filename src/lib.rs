//! Fibermap: fiber network hierarchy & topology engine.
//!
//! Fibermap keeps a physical fiber inventory (Headend → FDH → Splitter →
//! Customer/Asset) consistent under port-capacity and referential rules, and
//! reconstructs the connected subgraph around any customer, FDH or asset
//! serial on demand.
//!
//! # Architecture
//!
//! - **Entity Store** (`network::store`): typed access to the SQLite tables.
//! - **Capacity & Integrity Enforcer** (`network::integrity`): every mutation,
//!   one IMMEDIATE transaction each, serialized per database by `DbBroker`.
//! - **Hierarchy Assembler** (`network::hierarchy`): the nested tree view.
//! - **Query Resolver** (`network::resolver`) and **Topology Graph Builder**
//!   (`network::topology`): anchored, bounded graph walks over one snapshot.
//! - **API** (`api`): REST-shaped request envelope with structured errors.
//!
//! # Examples
//!
//! ```bash
//! fibermap init
//! fibermap seed
//! fibermap hierarchy
//! fibermap call POST /customers/1/attach --body '{"splitter_id": 1}'
//! fibermap topology --serial NK123456
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: error taxonomy, config, logging and storage plumbing
//! - [`network`]: the inventory model and its operations
//! - [`api`]: the request boundary

pub mod api;
mod cli;
pub mod core;
pub mod network;

use crate::cli::{Cli, Command, OutputFormat, TopologyCli};
use crate::core::config::Config;
use crate::core::error::FibermapError;
use crate::core::store::Store;
use crate::network::resolver::TopologyQuery;
use crate::network::{hierarchy, seed, topology};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Parse the command line, install logging and run one command.
pub fn run() -> Result<(), FibermapError> {
    let cli = Cli::parse();
    let config = Config::load(&cli.root)?;
    crate::core::logging::init(&config.log.filter);

    let store = Store::with_config(prepare_root(&cli.root)?, config)?;

    match cli.command {
        Command::Init => {
            println!("Initialized fibermap store at {}", store.db_path().display());
        }
        Command::Seed => {
            let report = seed::seed(&store)?;
            if report.seeded {
                println!(
                    "Seeded {} headend, {} FDH, {} splitters, {} assets, {} customer.",
                    report.headends, report.fdhs, report.splitters, report.assets, report.customers
                );
            } else {
                println!("Store already holds data; nothing seeded.");
            }
        }
        Command::Call { method, path, body } => {
            let body = match body {
                Some(raw) => serde_json::from_str(&raw)?,
                None => serde_json::Value::Null,
            };
            let request = api::ApiRequest::new(&method, &path).with_body(body);
            let response = api::dispatch(&store, &request);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Serve => serve(&store)?,
        Command::Hierarchy { format } => {
            let trees = hierarchy::headend_tree(&store)?;
            match format {
                OutputFormat::Text => println!("{}", hierarchy::render_text(&trees)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&trees)?),
            }
        }
        Command::Topology(TopologyCli {
            customer,
            fdh,
            serial,
        }) => {
            let query = TopologyQuery {
                customer_id: customer,
                fdh_id: fdh,
                asset_serial: serial,
            };
            let graph = topology::topology_for(&store, &query)?;
            println!("{}", serde_json::to_string_pretty(&graph)?);
        }
    }
    Ok(())
}

fn prepare_root(root: &Path) -> Result<std::path::PathBuf, FibermapError> {
    std::fs::create_dir_all(root)?;
    Ok(root.canonicalize()?)
}

/// One JSON request per input line, one JSON response per output line.
/// A line that is not a request gets a `Validation` response, not a shutdown.
fn serve(store: &Store) -> Result<(), FibermapError> {
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    tracing::info!(db = %store.db_path().display(), "serving requests on stdin");

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<api::ApiRequest>(&line) {
            Ok(request) => api::dispatch(store, &request),
            Err(err) => {
                let err = FibermapError::from(err);
                api::ApiResponse {
                    id: api::default_request_id(),
                    status: err.kind().http_status(),
                    success: false,
                    result: None,
                    error: Some(api::ApiError {
                        kind: err.kind(),
                        detail: err.detail(),
                    }),
                }
            }
        };
        writeln!(stdout, "{}", serde_json::to_string(&response)?)?;
        stdout.flush()?;
    }
    Ok(())
}
