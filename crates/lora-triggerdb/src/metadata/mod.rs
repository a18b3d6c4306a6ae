//! Trigger-word discovery from adapter file metadata.
//!
//! `reader` pulls the embedded metadata table out of an adapter container;
//! `extract` turns that loosely-shaped table into cleaned trigger words.

pub mod extract;
pub mod reader;

pub use extract::*;
pub use reader::*;
