#![forbid(unsafe_code)]

pub mod catch_log;
pub mod config;
pub mod dashboard;
pub mod leaderboard;
pub mod models;
pub mod session;
pub mod web;

pub use catch_log::{CatchLog, ValidationError};
pub use config::Config;
pub use models::{CatchRecord, Submission, Variant};
