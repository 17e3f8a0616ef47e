// src/lib.rs

//! reprepro-bundle
//!
//! Maintains the editable configuration of reprepro bundles: the sources
//! control list deciding which variant of each source package a bundle
//! ships, and the blacklist of binary packages to purge from it.
//!
//! # Architecture
//!
//! - Suites: package indices queried through the `SuiteQuery` trait
//! - Reconciliation: every suite variant is classified against the bundle's
//!   reference and at most one variant per source is activated
//! - Files: plain text, hand editable, always rewritten atomically

pub mod blacklist;
pub mod bundle;
pub mod config;
pub mod control;
mod error;
pub mod fsutil;
pub mod repository;
pub mod version;

pub use error::{Error, Result};
