//! One module per top-level subcommand.

pub mod artifact;
pub mod backup;
pub mod config;
pub mod init;
pub mod quality;
pub mod report;
pub mod run;
pub mod unlock;
pub mod validate;
