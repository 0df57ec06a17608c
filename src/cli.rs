//! CLI struct definitions for the fibermap command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `lib.rs`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "fibermap",
    version = env!("CARGO_PKG_VERSION"),
    about = "Fiber network inventory: headends, FDHs, splitters, customers and assets, with capacity enforcement and on-demand topology."
)]
pub(crate) struct Cli {
    /// Data root holding fibermap.toml and the inventory database.
    #[clap(long, global = true, default_value = ".fibermap")]
    pub root: PathBuf,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Create the data root and database schema.
    Init,
    /// Load the demo network into an empty store.
    Seed,
    /// Send one request through the API and print the JSON response.
    Call {
        /// HTTP method: GET, POST, PUT or DELETE.
        method: String,
        /// Request path, e.g. /hierarchy/headends or /topology/search?serial=NK123456
        path: String,
        /// JSON request body.
        #[clap(long)]
        body: Option<String>,
    },
    /// Serve requests line by line: one request JSON per stdin line, one response JSON per stdout line.
    Serve,
    /// Print the Headend → FDH → Splitter tree.
    Hierarchy {
        #[clap(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Print the topology graph around one anchor as JSON.
    Topology(TopologyCli),
}

#[derive(clap::Args, Debug)]
#[clap(group(clap::ArgGroup::new("anchor").required(true).args(["customer", "fdh", "serial"])))]
pub(crate) struct TopologyCli {
    /// Anchor on a customer id.
    #[clap(long)]
    pub customer: Option<i64>,
    /// Anchor on an FDH id.
    #[clap(long)]
    pub fdh: Option<i64>,
    /// Anchor on an asset serial number.
    #[clap(long)]
    pub serial: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}
