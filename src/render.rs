//! Caption frame rendering.

pub mod caption;
