//! easy-ssh - personal SSH launcher
//!
//! This crate provides an SSH launcher that:
//! - Stores one password per host, encrypted under a per-installation key
//! - Lists stored hosts by index and connects to the one picked
//! - Runs an interactive remote shell that follows local terminal resizes

pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ssh;

pub use error::{EasySshError, Result};
