//! charmcraft-pack - Build Charms in CI
//!
//! Provisions snapd, LXD and charmcraft, runs `charmcraft pack` in the
//! project directory and reports the packed Charm. A keyed package cache
//! can be restored before and saved after the build.

pub mod build;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod orchestration;
pub mod platform;

pub use error::{PackError, PackResult};
