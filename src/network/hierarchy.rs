//! Hierarchy Assembler: the nested Headend → FDH → Splitter view.
//!
//! Built as a join over three flat, id-ordered queries. No validation, no
//! writes; the only failure is the store itself.

use crate::core::error::FibermapError;
use crate::core::output;
use crate::core::store::Store;
use crate::network::model::{EntityId, Fdh, Headend, ListFilter, Splitter};
use crate::network::store;
use rusqlite::Connection;
use rustc_hash::FxHashMap;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct FdhTree {
    #[serde(flatten)]
    pub fdh: Fdh,
    pub splitters: Vec<Splitter>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeadendTree {
    #[serde(flatten)]
    pub headend: Headend,
    pub fdhs: Vec<FdhTree>,
}

/// Assemble the full tree in ascending creation order at every level.
pub fn assemble(conn: &Connection) -> Result<Vec<HeadendTree>, FibermapError> {
    let all = ListFilter::default();
    let headends = store::list::<Headend>(conn, &all)?;
    let fdhs = store::list::<Fdh>(conn, &all)?;
    let splitters = store::list::<Splitter>(conn, &all)?;

    let mut splitters_by_fdh: FxHashMap<EntityId, Vec<Splitter>> = FxHashMap::default();
    for splitter in splitters {
        splitters_by_fdh
            .entry(splitter.fdh_id)
            .or_default()
            .push(splitter);
    }

    let mut fdhs_by_headend: FxHashMap<EntityId, Vec<FdhTree>> = FxHashMap::default();
    for fdh in fdhs {
        let splitters = splitters_by_fdh.remove(&fdh.id).unwrap_or_default();
        fdhs_by_headend
            .entry(fdh.headend_id)
            .or_default()
            .push(FdhTree { fdh, splitters });
    }

    Ok(headends
        .into_iter()
        .map(|headend| {
            let fdhs = fdhs_by_headend.remove(&headend.id).unwrap_or_default();
            HeadendTree { headend, fdhs }
        })
        .collect())
}

pub fn headend_tree(store: &Store) -> Result<Vec<HeadendTree>, FibermapError> {
    store.broker().with_read("hierarchy.headends", assemble)
}

pub fn list_fdhs(store: &Store) -> Result<Vec<Fdh>, FibermapError> {
    store.broker().with_read("hierarchy.fdhs", |conn| {
        store::list::<Fdh>(conn, &ListFilter::default())
    })
}

pub fn list_splitters(store: &Store) -> Result<Vec<Splitter>, FibermapError> {
    store.broker().with_read("hierarchy.splitters", |conn| {
        store::list::<Splitter>(conn, &ListFilter::default())
    })
}

/// Coloured terminal rendering used by `fibermap hierarchy`.
pub fn render_text(trees: &[HeadendTree]) -> String {
    use colored::Colorize;

    if trees.is_empty() {
        return "No headends found.".to_string();
    }

    let mut out = Vec::new();
    for tree in trees {
        out.push(format!(
            "{} {} {}",
            "Headend".bold(),
            tree.headend.name.bold(),
            format!("({})", output::compact_line(&tree.headend.location, 48)).dimmed()
        ));
        for (fi, fdh_tree) in tree.fdhs.iter().enumerate() {
            let last_fdh = fi + 1 == tree.fdhs.len();
            let allocated: u32 = fdh_tree.splitters.iter().map(|s| s.port_capacity).sum();
            out.push(format!(
                "{} FDH {} [{}/{} ports allocated] {}",
                if last_fdh { "└─" } else { "├─" },
                fdh_tree.fdh.name.cyan(),
                allocated,
                fdh_tree.fdh.max_ports,
                fdh_tree.fdh.region.as_deref().unwrap_or("").dimmed()
            ));
            let stem = if last_fdh { "   " } else { "│  " };
            for (si, splitter) in fdh_tree.splitters.iter().enumerate() {
                let last = si + 1 == fdh_tree.splitters.len();
                let usage = format!("{}/{}", splitter.used_ports, splitter.port_capacity);
                let usage = if splitter.is_full() {
                    usage.red()
                } else {
                    usage.green()
                };
                out.push(format!(
                    "{}{} Splitter {} {} ({}) {}",
                    stem,
                    if last { "└─" } else { "├─" },
                    splitter.id,
                    splitter.model,
                    output::compact_line(&splitter.location, 32),
                    usage
                ));
            }
        }
    }
    out.join("\n")
}
