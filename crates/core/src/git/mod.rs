//! Git backend for forksync.

pub mod client;

pub use client::GitClient;
