pub mod artifact;
pub mod backup;
pub mod command;
pub mod config;
pub mod dataset;
pub mod decision;
pub mod deploy;
pub mod error;
pub mod io;
pub mod lock;
pub mod paths;
pub mod pipeline;
pub mod quality;
pub mod report;
pub mod types;
pub mod validator;

pub use error::{Result, RetrainError};
