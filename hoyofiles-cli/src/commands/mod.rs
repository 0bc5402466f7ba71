//! CLI subcommands.

pub mod common;
pub mod config;
pub mod download;
pub mod links;
pub mod packages;
pub mod tree;
pub mod versions;
