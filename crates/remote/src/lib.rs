mod client;
mod config;
mod error;
mod pipeline;

pub use crate::client::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::pipeline::*;
