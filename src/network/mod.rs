//! The fiber network: inventory records, the rules that guard them, and the
//! read projections built over them.
//!
//! Layering, leaves first: `model` → `store` → `integrity` / `hierarchy` /
//! `resolver` → `topology`.

pub mod hierarchy;
pub mod integrity;
pub mod model;
pub mod resolver;
pub mod seed;
pub mod store;
pub mod topology;
