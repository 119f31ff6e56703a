mod error;
mod export;
mod import;

pub use crate::error::*;
pub use crate::export::*;
pub use crate::import::*;
