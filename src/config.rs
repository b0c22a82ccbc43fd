//! Configuration (sec. 6.2, 10.4): built-in defaults merged with an optional
//! JSON file and an optional inline JSON override.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value as Json;

use crate::error::Result;
use crate::scc::TextAlign as SccTextAlign;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub progress_bar: Option<bool>,
    pub log_level: Option<LogLevel>,
    pub document_lang: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFormat {
    Frames,
    ClockTime,
    ClockTimeWithFrames,
}

impl Default for TimeFormat {
    fn default() -> Self {
        TimeFormat::ClockTime
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSignaling {
    None,
    ContentProfiles,
}

impl Default for ProfileSignaling {
    fn default() -> Self {
        ProfileSignaling::None
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ImscWriterConfig {
    pub time_format: TimeFormat,
    pub fps: (i64, i64),
    pub profile_signaling: ProfileSignaling,
}

impl Default for ImscWriterConfig {
    fn default() -> Self {
        Self { time_format: TimeFormat::default(), fps: (30, 1), profile_signaling: ProfileSignaling::default() }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct StlReaderConfig {
    pub disable_fill_line_gap: bool,
    pub disable_line_padding: bool,
    pub program_start_tc: Option<String>,
    pub font_stack: Vec<String>,
    pub max_row_count: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SrtWriterConfig {
    pub text_formatting: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct VttWriterConfig {
    pub line_position: bool,
    pub text_align: bool,
    pub cue_id: bool,
}

impl Default for VttWriterConfig {
    fn default() -> Self {
        Self { line_position: true, text_align: true, cue_id: false }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum SccFrameRate {
    #[serde(rename = "30NDF")]
    Ndf30,
    #[serde(rename = "29.97NDF")]
    Ndf2997,
    #[serde(rename = "29.97DF")]
    Df2997,
}

impl Default for SccFrameRate {
    fn default() -> Self {
        SccFrameRate::Ndf2997
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SccWriterConfig {
    pub allow_reflow: bool,
    pub force_popon: bool,
    pub rollup_lines: Option<u8>,
    pub frame_rate: SccFrameRate,
    pub start_tc: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LcdConfig {
    pub safe_area: u8,
    pub color: Option<String>,
    pub bg_color: Option<String>,
    pub preserve_text_align: bool,
}

impl Default for LcdConfig {
    fn default() -> Self {
        Self { safe_area: 10, color: None, bg_color: None, preserve_text_align: true }
    }
}

/// The fully assembled configuration consumed by readers, writers, and
/// filters (sec. 10.4): built-in defaults, then an optional config file,
/// then an optional inline JSON blob layered on top.
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub general: GeneralConfig,
    pub imsc_writer: ImscWriterConfig,
    pub stl_reader: StlReaderConfig,
    pub srt_writer: SrtWriterConfig,
    pub vtt_writer: VttWriterConfig,
    pub scc_reader: SccReaderConfigField,
    pub scc_writer: SccWriterConfig,
    pub lcd: LcdConfig,
}

/// A thin wrapper so `Config` can derive its field without creating a
/// circular `Deserialize` dependency on `scc::SccReaderConfig` (which has no
/// serde support of its own — it is constructed from parsed JSON here).
#[derive(Clone, Debug, Default)]
pub struct SccReaderConfigField(pub crate::scc::SccReaderConfig);

const RECOGNIZED_TOP_LEVEL_KEYS: &[&str] =
    &["general", "imsc_writer", "stl_reader", "srt_writer", "vtt_writer", "scc_reader", "scc_writer", "lcd"];

impl Config {
    /// Builds a `Config` from defaults, an optional config file, and an
    /// optional inline JSON blob (the inline blob wins on conflicting
    /// keys). Unknown top-level keys are logged at WARN and ignored.
    pub fn load(config_file: Option<&Path>, inline: Option<&str>) -> Result<Self> {
        let mut merged = Json::Object(Default::default());
        if let Some(path) = config_file {
            let text = fs::read_to_string(path)?;
            let file_value: Json = serde_json::from_str(&text)?;
            merge_json(&mut merged, file_value);
        }
        if let Some(text) = inline {
            let inline_value: Json = serde_json::from_str(text)?;
            merge_json(&mut merged, inline_value);
        }
        warn_unknown_keys(&merged);
        Self::from_json(merged)
    }

    fn from_json(value: Json) -> Result<Self> {
        let mut config = Config::default();
        if let Json::Object(map) = &value {
            if let Some(v) = map.get("general") {
                config.general = serde_json::from_value(v.clone())?;
            }
            if let Some(v) = map.get("imsc_writer") {
                config.imsc_writer = serde_json::from_value(v.clone())?;
            }
            if let Some(v) = map.get("stl_reader") {
                config.stl_reader = serde_json::from_value(v.clone())?;
            }
            if let Some(v) = map.get("srt_writer") {
                config.srt_writer = serde_json::from_value(v.clone())?;
            }
            if let Some(v) = map.get("vtt_writer") {
                config.vtt_writer = serde_json::from_value(v.clone())?;
            }
            if let Some(v) = map.get("scc_reader") {
                config.scc_reader.0.text_align = parse_scc_text_align(v);
            }
            if let Some(v) = map.get("scc_writer") {
                config.scc_writer = serde_json::from_value(v.clone())?;
            }
            if let Some(v) = map.get("lcd") {
                config.lcd = serde_json::from_value(v.clone())?;
            }
        }
        Ok(config)
    }
}

fn parse_scc_text_align(v: &Json) -> SccTextAlign {
    match v.get("text_align").and_then(Json::as_str) {
        Some("left") => SccTextAlign::Left,
        Some("center") => SccTextAlign::Center,
        Some("right") => SccTextAlign::Right,
        _ => SccTextAlign::Auto,
    }
}

fn merge_json(base: &mut Json, overlay: Json) {
    match (base, overlay) {
        (Json::Object(base_map), Json::Object(overlay_map)) => {
            for (k, v) in overlay_map {
                merge_json(base_map.entry(k).or_insert(Json::Null), v);
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn warn_unknown_keys(value: &Json) {
    if let Json::Object(map) = value {
        for key in map.keys() {
            if !RECOGNIZED_TOP_LEVEL_KEYS.contains(&key.as_str()) {
                log::warn!("config: unrecognized key {:?} ignored", key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_top_level_key_is_ignored_not_fatal() {
        let config = Config::load(None, Some(r#"{"not_a_real_section": {"x": 1}}"#)).unwrap();
        assert_eq!(config.general.log_level, None);
    }

    #[test]
    fn inline_overrides_recognized_key() {
        let config = Config::load(None, Some(r#"{"lcd": {"safe_area": 15, "preserve_text_align": false}}"#)).unwrap();
        assert_eq!(config.lcd.safe_area, 15);
        assert!(!config.lcd.preserve_text_align);
    }

    #[test]
    fn scc_reader_text_align_parses_from_inline_json() {
        let config = Config::load(None, Some(r#"{"scc_reader": {"text_align": "center"}}"#)).unwrap();
        assert_eq!(config.scc_reader.0.text_align, SccTextAlign::Center);
    }
}
