//! Binary primitives shared by every on-disk parser.

pub mod header;
pub mod vint;
