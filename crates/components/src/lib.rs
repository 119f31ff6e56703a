mod controls;
mod style_button;

pub use crate::controls::*;
pub use crate::style_button::*;
