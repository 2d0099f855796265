pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod time;

pub use error::{PromdashError, Result};
