//! Background images and the caption font.

pub mod font;
pub mod image;
