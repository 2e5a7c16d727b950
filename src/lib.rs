pub mod branch_service;
pub mod cli;
pub mod config;
pub mod detector;
pub mod domain;
pub mod error;
pub mod git;
pub mod lockfile;
pub mod logging;
pub mod metadata;
pub mod pipeline;
pub mod profile;
pub mod project;
pub mod propagator;
pub mod resolver;
pub mod sanitizer;
pub mod tagger;
pub mod ui;
pub mod variables;

pub use error::{AutoDeployError, Result};
