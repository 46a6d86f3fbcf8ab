//! notion-relay — forwards messages into a Notion database, with
//! optional master-code routing through a Guide lookup table.

pub mod cli;
pub mod config;
pub mod error;
pub mod notion;
pub mod server;
pub mod submission;
