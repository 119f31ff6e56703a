mod controls;
mod core;
mod keys;
mod ops;
mod plugin;
mod raw;

pub use crate::controls::*;
pub use crate::core::*;
pub use crate::keys::*;
pub use crate::ops::*;
pub use crate::plugin::*;
pub use crate::raw::*;
