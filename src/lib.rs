//! variant-sync - color/size variant editing and reconciliation
//!
//! Product variants are edited as a local [`draft::VariantDraft`], checked
//! by [`validate`], and pushed to an [`service::InventoryService`] by the
//! [`reconcile`] engine. [`db::Database`] is the SQLite-backed service and
//! [`api`] serves everything over HTTP.

pub mod allocator;
pub mod api;
pub mod color;
pub mod config;
pub mod db;
pub mod draft;
pub mod models;
pub mod reconcile;
pub mod service;
pub mod validate;

#[cfg(test)]
mod testing;
