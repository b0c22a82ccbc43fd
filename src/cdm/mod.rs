//! The Canonical Document Model (C3): the in-memory TTML-shaped document
//! tree, its inline styles, timing, and animation steps. See sec. 3, 4.1.

mod document;
mod node;
mod region;

pub use document::Document;
pub use node::{AnimationStep, ElementKind, Node};
pub use region::Region;
