//! Dark-O-Mat: a catalog of dark calibration frames and a master dark builder.
//!
//! Frames are indexed by the acquisition metadata in their FITS headers,
//! narrowed with cascading criteria, and stacked into a master dark by Siril.

pub mod config;
pub mod error;
pub mod filter;
pub mod fits;
pub mod indexer;
pub mod master;
pub mod state;

pub use error::{DarkError, Result};
