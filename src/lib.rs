//! Sync shared configuration files from a reference repository checkout into
//! a target repository checkout, committing each changed file separately.

pub mod commands;
pub mod config;
pub mod domain;
pub mod infrastructure;
