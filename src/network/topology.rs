//! Topology Graph Builder.
//!
//! Reconstructs, on demand, the connected subgraph around an anchor:
//!
//! 1. Walk **up** through parent references (Customer → Splitter → FDH →
//!    Headend). A dangling reference anywhere on this walk is a
//!    `BrokenReference` error; a half-built path is never returned.
//! 2. Walk **down** breadth-first through child collections (FDH → Splitters
//!    → Customers → Assets), bounded by `max_depth` levels below the anchor
//!    and `max_nodes` in total. Anything cut off by either bound sets
//!    `truncated`.
//! 3. Nodes are deduplicated by `(kind, id)`; edges by `(source, target)`,
//!    always directed parent → child.
//!
//! The whole build runs against one read snapshot.

use crate::core::config::TopologyConfig;
use crate::core::error::FibermapError;
use crate::core::store::Store;
use crate::network::model::{Asset, Customer, EntityId, Fdh, Headend, Splitter};
use crate::network::resolver::{self, Anchor, TopologyQuery};
use crate::network::store::{self, EntityKind};
use rusqlite::Connection;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Statuses rendered as faulty.
const FAULTY_STATUSES: &[&str] = &["Faulty", "Retired", "Inactive"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopologyLimits {
    pub max_nodes: usize,
    pub max_depth: usize,
}

impl Default for TopologyLimits {
    fn default() -> Self {
        TopologyLimits::from(&TopologyConfig::default())
    }
}

impl From<&TopologyConfig> for TopologyLimits {
    fn from(config: &TopologyConfig) -> Self {
        Self {
            max_nodes: config.max_nodes.max(1),
            max_depth: config.max_depth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub label: String,
    pub status: String,
    #[serde(rename = "isFaulty")]
    pub is_faulty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyGraph {
    /// Node id of the anchor.
    pub anchor: String,
    pub nodes: Vec<TopologyNode>,
    pub edges: Vec<TopologyEdge>,
    pub truncated: bool,
}

impl TopologyGraph {
    pub fn node(&self, id: &str) -> Option<&TopologyNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        self.edges
            .iter()
            .any(|e| e.source == source && e.target == target)
    }
}

pub fn headend_node_id(id: EntityId) -> String {
    format!("headend-{}", id)
}

pub fn fdh_node_id(id: EntityId) -> String {
    format!("fdh-{}", id)
}

pub fn splitter_node_id(id: EntityId) -> String {
    format!("split-{}", id)
}

pub fn customer_node_id(id: EntityId) -> String {
    format!("cust-{}", id)
}

pub fn asset_node_id(id: EntityId) -> String {
    format!("asset-{}", id)
}

fn node(id: String, node_type: &str, label: String, status: &str) -> TopologyNode {
    TopologyNode {
        id,
        node_type: node_type.to_string(),
        label,
        status: status.to_string(),
        is_faulty: FAULTY_STATUSES.contains(&status),
    }
}

fn headend_node(headend: &Headend) -> TopologyNode {
    node(
        headend_node_id(headend.id),
        "headend",
        format!("Headend {}", headend.name),
        "Online",
    )
}

fn fdh_node(fdh: &Fdh) -> TopologyNode {
    node(fdh_node_id(fdh.id), "fdh", format!("FDH {}", fdh.name), "Online")
}

fn splitter_node(splitter: &Splitter) -> TopologyNode {
    let status = if splitter.is_full() { "Full" } else { "Online" };
    node(
        splitter_node_id(splitter.id),
        "splitter",
        format!("Splitter {} ({})", splitter.model, splitter.location),
        status,
    )
}

fn customer_node(customer: &Customer) -> TopologyNode {
    node(
        customer_node_id(customer.id),
        "customer",
        customer.name.clone(),
        customer.status.as_str(),
    )
}

fn asset_node(asset: &Asset) -> TopologyNode {
    node(
        asset_node_id(asset.id),
        &asset.asset_type.as_str().to_ascii_lowercase(),
        format!(
            "{} {} [{}]",
            asset.asset_type, asset.model, asset.serial_number
        ),
        asset.status.as_str(),
    )
}

fn broken(child: EntityKind, child_id: EntityId, parent: EntityKind, parent_id: EntityId) -> FibermapError {
    FibermapError::BrokenReference(format!(
        "{} {} references missing {} {}",
        child, child_id, parent, parent_id
    ))
}

enum Added {
    New(String),
    Existing(String),
    Dropped,
}

/// Work item for the downward walk.
enum Expand {
    Fdh(EntityId),
    Splitter(EntityId),
    Customer(EntityId),
}

struct GraphBuilder<'c> {
    conn: &'c Connection,
    limits: TopologyLimits,
    nodes: Vec<TopologyNode>,
    edges: Vec<TopologyEdge>,
    seen_nodes: FxHashSet<(EntityKind, EntityId)>,
    seen_edges: FxHashSet<(String, String)>,
    truncated: bool,
}

impl<'c> GraphBuilder<'c> {
    fn new(conn: &'c Connection, limits: TopologyLimits) -> Self {
        Self {
            conn,
            limits,
            nodes: Vec::new(),
            edges: Vec::new(),
            seen_nodes: FxHashSet::default(),
            seen_edges: FxHashSet::default(),
            truncated: false,
        }
    }

    fn add(&mut self, kind: EntityKind, id: EntityId, make: impl FnOnce() -> TopologyNode) -> Added {
        if self.seen_nodes.contains(&(kind, id)) {
            let existing = match kind {
                EntityKind::Headend => headend_node_id(id),
                EntityKind::Fdh => fdh_node_id(id),
                EntityKind::Splitter => splitter_node_id(id),
                EntityKind::Customer => customer_node_id(id),
                EntityKind::Asset => asset_node_id(id),
            };
            return Added::Existing(existing);
        }
        if self.nodes.len() >= self.limits.max_nodes {
            self.truncated = true;
            return Added::Dropped;
        }
        let node = make();
        let id_str = node.id.clone();
        self.seen_nodes.insert((kind, id));
        self.nodes.push(node);
        Added::New(id_str)
    }

    fn link(&mut self, source: &str, target: &str) {
        if self
            .seen_edges
            .insert((source.to_string(), target.to_string()))
        {
            self.edges.push(TopologyEdge {
                id: format!("e-{}-to-{}", source, target),
                source: source.to_string(),
                target: target.to_string(),
            });
        }
    }

    /// Add `parent` and link it above `child_node`, if both made it into the graph.
    fn link_parent(&mut self, parent: Added, child_node: &Option<String>) -> Option<String> {
        let parent_id = match parent {
            Added::New(id) | Added::Existing(id) => id,
            Added::Dropped => return None,
        };
        if let Some(child) = child_node {
            self.link(&parent_id, child);
        }
        Some(parent_id)
    }

    fn node_id(added: Added) -> Option<String> {
        match added {
            Added::New(id) | Added::Existing(id) => Some(id),
            Added::Dropped => None,
        }
    }

    // --- upward ---

    fn walk_up_from_customer(&mut self, customer: &Customer, below: Option<String>) -> Result<(), FibermapError> {
        let Some(splitter_id) = customer.splitter_id else {
            return Ok(());
        };
        let splitter = store::find::<Splitter>(self.conn, splitter_id)?.ok_or_else(|| {
            broken(EntityKind::Customer, customer.id, EntityKind::Splitter, splitter_id)
        })?;
        let added = self.add(EntityKind::Splitter, splitter.id, || splitter_node(&splitter));
        let linked = self.link_parent(added, &below);
        self.walk_up_from_splitter(&splitter, linked)
    }

    fn walk_up_from_splitter(&mut self, splitter: &Splitter, below: Option<String>) -> Result<(), FibermapError> {
        let fdh = store::find::<Fdh>(self.conn, splitter.fdh_id)?.ok_or_else(|| {
            broken(EntityKind::Splitter, splitter.id, EntityKind::Fdh, splitter.fdh_id)
        })?;
        let added = self.add(EntityKind::Fdh, fdh.id, || fdh_node(&fdh));
        let linked = self.link_parent(added, &below);
        self.walk_up_from_fdh(&fdh, linked)
    }

    fn walk_up_from_fdh(&mut self, fdh: &Fdh, below: Option<String>) -> Result<(), FibermapError> {
        let headend = store::find::<Headend>(self.conn, fdh.headend_id)?.ok_or_else(|| {
            broken(EntityKind::Fdh, fdh.id, EntityKind::Headend, fdh.headend_id)
        })?;
        let added = self.add(EntityKind::Headend, headend.id, || headend_node(&headend));
        self.link_parent(added, &below);
        Ok(())
    }

    // --- downward ---

    fn walk_down(&mut self, start: Expand, start_node: String) -> Result<(), FibermapError> {
        let mut queue: VecDeque<(Expand, String, usize)> = VecDeque::new();
        queue.push_back((start, start_node, 0));

        while let Some((item, parent_node, depth)) = queue.pop_front() {
            if depth >= self.limits.max_depth {
                if self.has_children(&item)? {
                    self.truncated = true;
                }
                continue;
            }
            match item {
                Expand::Fdh(fdh_id) => {
                    for splitter in store::splitters_of(self.conn, fdh_id)? {
                        let added = self.add(EntityKind::Splitter, splitter.id, || splitter_node(&splitter));
                        self.descend(added, &parent_node, Expand::Splitter(splitter.id), depth, &mut queue);
                    }
                }
                Expand::Splitter(splitter_id) => {
                    for customer in store::customers_of(self.conn, splitter_id)? {
                        let added = self.add(EntityKind::Customer, customer.id, || customer_node(&customer));
                        self.descend(added, &parent_node, Expand::Customer(customer.id), depth, &mut queue);
                    }
                }
                Expand::Customer(customer_id) => {
                    for asset in store::assets_of(self.conn, customer_id)? {
                        let added = self.add(EntityKind::Asset, asset.id, || asset_node(&asset));
                        if let Some(child) = Self::node_id(added) {
                            self.link(&parent_node, &child);
                        }
                    }
                }
            }
            if self.truncated && self.nodes.len() >= self.limits.max_nodes {
                break;
            }
        }
        Ok(())
    }

    fn descend(
        &mut self,
        added: Added,
        parent_node: &str,
        next: Expand,
        depth: usize,
        queue: &mut VecDeque<(Expand, String, usize)>,
    ) {
        match added {
            Added::New(child) => {
                self.link(parent_node, &child);
                queue.push_back((next, child, depth + 1));
            }
            // Already expanded (or queued) from its first visit.
            Added::Existing(child) => self.link(parent_node, &child),
            Added::Dropped => {}
        }
    }

    fn has_children(&self, item: &Expand) -> Result<bool, FibermapError> {
        match item {
            Expand::Fdh(id) => store::has_children::<Fdh>(self.conn, *id),
            Expand::Splitter(id) => store::has_children::<Splitter>(self.conn, *id),
            Expand::Customer(id) => store::has_children::<Customer>(self.conn, *id),
        }
    }

    fn customer_graph(&mut self, customer: &Customer, node: Option<String>) -> Result<(), FibermapError> {
        self.walk_up_from_customer(customer, node.clone())?;
        if let Some(node) = node {
            self.walk_down(Expand::Customer(customer.id), node)?;
        }
        Ok(())
    }

    fn finish(self, anchor: String) -> TopologyGraph {
        TopologyGraph {
            anchor,
            nodes: self.nodes,
            edges: self.edges,
            truncated: self.truncated,
        }
    }
}

/// Build the topology graph around an already-resolved anchor.
pub fn build(conn: &Connection, anchor: &Anchor, limits: &TopologyLimits) -> Result<TopologyGraph, FibermapError> {
    let mut builder = GraphBuilder::new(conn, *limits);

    let anchor_id = match anchor {
        Anchor::Customer(customer) => {
            let added = builder.add(EntityKind::Customer, customer.id, || customer_node(customer));
            let node = GraphBuilder::node_id(added);
            builder.customer_graph(customer, node)?;
            customer_node_id(customer.id)
        }
        Anchor::Fdh(fdh) => {
            let added = builder.add(EntityKind::Fdh, fdh.id, || fdh_node(fdh));
            let node = GraphBuilder::node_id(added);
            builder.walk_up_from_fdh(fdh, node.clone())?;
            if let Some(node) = node {
                builder.walk_down(Expand::Fdh(fdh.id), node)?;
            }
            fdh_node_id(fdh.id)
        }
        Anchor::Asset(asset) => {
            let added = builder.add(EntityKind::Asset, asset.id, || asset_node(asset));
            let linked_asset = GraphBuilder::node_id(added);
            if let Some(customer_id) = asset.assigned_customer_id {
                let customer = store::find::<Customer>(conn, customer_id)?.ok_or_else(|| {
                    broken(EntityKind::Asset, asset.id, EntityKind::Customer, customer_id)
                })?;
                let added = builder.add(EntityKind::Customer, customer.id, || customer_node(&customer));
                let owner = builder.link_parent(added, &linked_asset);
                builder.customer_graph(&customer, owner)?;
            }
            asset_node_id(asset.id)
        }
    };

    let graph = builder.finish(anchor_id);
    tracing::debug!(
        anchor = %graph.anchor,
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        truncated = graph.truncated,
        "topology built"
    );
    Ok(graph)
}

/// Resolve `query` and build its graph in one read snapshot.
pub fn topology_for(store: &Store, query: &TopologyQuery) -> Result<TopologyGraph, FibermapError> {
    let limits = TopologyLimits::from(&store.config.topology);
    store.broker().with_read("topology.build", |conn| {
        let anchor = resolver::resolve(conn, query)?;
        build(conn, &anchor, &limits)
    })
}
