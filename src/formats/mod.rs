//! Non-SCC readers/writers (C9, sec. 10.5): spec-driven mappers between the
//! canonical document model and IMSC/SRT/VTT/STL on-disk forms. SCC has its
//! own stateful reader in `crate::scc`; its writer lives in `formats::scc`.

mod scc_writer;
mod srt;
mod stl;
mod ttml;
mod vtt;

use crate::cdm::Document;
use crate::config::Config;
use crate::error::{Error, Result};

/// The on-disk timed-text formats `tt convert` knows about (sec. 6.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Ttml,
    Scc,
    Stl,
    Srt,
    Vtt,
}

impl Format {
    /// Infers a format from a file extension (sec. 10.7's table), case
    /// insensitively and without the leading dot.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_ascii_lowercase().as_str() {
            "ttml" | "xml" => Some(Format::Ttml),
            "scc" => Some(Format::Scc),
            "stl" => Some(Format::Stl),
            "srt" => Some(Format::Srt),
            "vtt" => Some(Format::Vtt),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Format> {
        match name.to_ascii_uppercase().as_str() {
            "TTML" => Some(Format::Ttml),
            "SCC" => Some(Format::Scc),
            "STL" => Some(Format::Stl),
            "SRT" => Some(Format::Srt),
            "VTT" => Some(Format::Vtt),
            _ => None,
        }
    }
}

/// A synchronous progress callback invoked after each significant time is
/// processed (sec. 5, 10.7): `(step, total)`.
pub type ProgressFn<'a> = dyn FnMut(usize, usize) + 'a;

pub trait Reader {
    fn read(&self, input: &str, config: &Config) -> Result<Document>;
}

pub trait Writer {
    fn write(&self, doc: &Document, config: &Config, on_progress: &mut ProgressFn) -> Result<String>;
}

pub fn reader_for(format: Format) -> Box<dyn Reader> {
    match format {
        Format::Ttml => Box::new(ttml::TtmlReader),
        Format::Scc => Box::new(SccReaderAdapter),
        Format::Stl => Box::new(stl::StlReader),
        Format::Srt => Box::new(srt::SrtReader),
        Format::Vtt => Box::new(vtt::VttReader),
    }
}

pub fn writer_for(format: Format) -> Result<Box<dyn Writer>> {
    match format {
        Format::Ttml => Ok(Box::new(ttml::TtmlWriter)),
        Format::Scc => Ok(Box::new(scc_writer::SccWriter)),
        Format::Srt => Ok(Box::new(srt::SrtWriter)),
        Format::Vtt => Ok(Box::new(vtt::VttWriter)),
        Format::Stl => Err(Error::UnsupportedFeature("STL has no writer".to_string())),
    }
}

struct SccReaderAdapter;

impl Reader for SccReaderAdapter {
    fn read(&self, input: &str, config: &Config) -> Result<Document> {
        crate::scc::read(input, &config.scc_reader.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_map_to_formats() {
        assert_eq!(Format::from_extension("scc"), Some(Format::Scc));
        assert_eq!(Format::from_extension("XML"), Some(Format::Ttml));
        assert_eq!(Format::from_extension("unknown"), None);
    }

    #[test]
    fn stl_has_no_writer() {
        assert!(writer_for(Format::Stl).is_err());
    }
}
