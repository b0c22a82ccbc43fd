//! CLI-facing conversion wiring (C7, sec. 10.7): reader → filters → writer,
//! plus extension-based format inference. The binary in `src/bin/tt` is a
//! thin argument-parsing shell around this module.

use std::path::Path;

use crate::cdm::Document;
use crate::config::Config;
use crate::error::Result;
use crate::filter::FilterRegistry;
use crate::formats::{self, Format, ProgressFn};

/// Infers a format from a file path's extension (sec. 10.7's table).
pub fn infer_format(path: &Path) -> Option<Format> {
    path.extension().and_then(|e| e.to_str()).and_then(Format::from_extension)
}

/// Parses `input` with `itype`'s reader, applies the named filters in order,
/// and serializes with `otype`'s writer. `on_progress` is forwarded
/// unchanged to the writer (sec. 5's significant-time callback).
pub fn convert(input: &str, itype: Format, otype: Format, config: &Config, filter_names: &[String], on_progress: &mut ProgressFn) -> Result<String> {
    let mut doc = read(input, itype, config)?;
    apply_filters(&mut doc, filter_names, config)?;
    let writer = formats::writer_for(otype)?;
    writer.write(&doc, config, on_progress)
}

fn read(input: &str, itype: Format, config: &Config) -> Result<Document> {
    formats::reader_for(itype).read(input, config)
}

fn apply_filters(doc: &mut Document, filter_names: &[String], config: &Config) -> Result<()> {
    if filter_names.is_empty() {
        return Ok(());
    }
    FilterRegistry::with_defaults().apply_all(filter_names, config, doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_format_from_extension() {
        assert_eq!(infer_format(Path::new("in.scc")), Some(Format::Scc));
        assert_eq!(infer_format(Path::new("out.VTT")), Some(Format::Vtt));
        assert_eq!(infer_format(Path::new("no_extension")), None);
    }

    #[test]
    fn srt_to_vtt_round_trip() {
        let input = "1\n00:00:01,000 --> 00:00:02,000\nHello\n";
        let out = convert(input, Format::Srt, Format::Vtt, &Config::default(), &[], &mut |_, _| {}).unwrap();
        assert!(out.starts_with("WEBVTT"));
        assert!(out.contains("Hello"));
        assert!(out.contains("00:00:01.000 --> 00:00:02.000"));
    }

    #[test]
    fn unknown_filter_name_surfaces_as_an_error() {
        let input = "1\n00:00:01,000 --> 00:00:02,000\nHello\n";
        let err = convert(input, Format::Srt, Format::Srt, &Config::default(), &["not-a-filter".to_string()], &mut |_, _| {}).unwrap_err();
        assert!(matches!(err, crate::error::Error::Usage(_)));
    }

    #[test]
    fn writing_stl_is_an_unsupported_feature_error() {
        let input = "1\n00:00:01,000 --> 00:00:02,000\nHello\n";
        let err = convert(input, Format::Srt, Format::Stl, &Config::default(), &[], &mut |_, _| {}).unwrap_err();
        assert!(matches!(err, crate::error::Error::UnsupportedFeature(_)));
    }
}
