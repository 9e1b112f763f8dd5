//! tabpredict: compare tabular classifiers resolved from in-memory fits,
//! local artifacts and remote artifacts.

pub mod artifact;
pub mod commands;
pub mod config;
pub mod data;
pub mod estimator;
pub mod registry;
pub mod server;
pub mod session;
