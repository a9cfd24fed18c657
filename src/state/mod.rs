/// State management module
///
/// This module handles all persistent state, including:
/// - Per-library SQLite frame catalogs (catalog.rs)
/// - Shared data structures (data.rs)
/// - The library registry file (registry.rs)

pub mod catalog;
pub mod data;
pub mod registry;
