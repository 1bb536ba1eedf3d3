pub mod api;
pub mod db;
pub mod error;
pub mod live;
pub mod mcp;
pub mod models;
pub mod render;
pub mod seed;
pub mod stats;
pub mod tracker;

pub use error::{Error, Result};
