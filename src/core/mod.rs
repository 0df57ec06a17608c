//! Shared infrastructure: errors, configuration, logging and the SQLite
//! access path every network operation goes through.

pub mod broker;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod output;
pub mod schemas;
pub mod store;
pub mod time;
