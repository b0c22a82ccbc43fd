//! The SCC (CEA-608) reader (C5): sec. 4.3, 6.3, 8 scenarios 1-2.

pub(crate) mod codes;
mod reader;
pub(crate) mod timecode;

pub use reader::read;

/// `scc_reader.text_align` (sec. 6.2): when set, overrides the document's
/// initial `textAlign` value instead of leaving it at the property default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Auto,
    Left,
    Center,
    Right,
}

#[derive(Clone, Debug, Default)]
pub struct SccReaderConfig {
    pub text_align: TextAlign,
}
