pub mod config;
pub mod error;
pub mod io;
pub mod manifest;
pub mod paths;
pub mod plan;
pub mod progress;
pub mod store;
pub mod types;
pub mod vote;

pub use error::{MakerError, Result};
