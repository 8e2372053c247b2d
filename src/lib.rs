pub mod api;
pub mod cli;
pub mod config;
pub mod downloader;
pub mod errors;
pub mod metadata;
pub mod notify;
pub mod processing;
pub mod saver;
pub mod utils;
pub mod validation;

pub use errors::{AppError, Result};
