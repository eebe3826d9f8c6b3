//! I/O: child processes, shell executors and configuration files.

pub mod config;
pub mod process;
pub mod sandbox;
