//! WebVTT reader/writer (sec. 10.5): `WEBVTT` header required, cue header
//! `HH:MM:SS.mmm --> HH:MM:SS.mmm` (or `MM:SS.mmm`).

use std::sync::OnceLock;

use regex::Regex;

use crate::cdm::{Document, ElementKind, Node, Region};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::formats::{ProgressFn, Reader, Writer};
use crate::isd::{generate as generate_isd, sig, IsdNode};
use crate::style::{StyleProperty, Value};
use crate::time::Time;

pub struct VttReader;
pub struct VttWriter;

const REGION_ID: &str = "captions";

fn cue_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:(\d{2,}):)?(\d{2}):(\d{2})\.(\d{3})\s*-->\s*(?:(\d{2,}):)?(\d{2}):(\d{2})\.(\d{3})").unwrap())
}

fn parse_vtt_time(h: Option<&str>, m: &str, s: &str, ms: &str) -> Result<Time> {
    let h: i64 = h.map(|h| h.parse().unwrap_or(0)).unwrap_or(0);
    let m: i64 = m.parse().map_err(|_| Error::Parse("bad VTT timestamp".into()))?;
    let s: i64 = s.parse().map_err(|_| Error::Parse("bad VTT timestamp".into()))?;
    let ms: i64 = ms.parse().map_err(|_| Error::Parse("bad VTT timestamp".into()))?;
    Time::from_ratio(h * 3_600_000 + m * 60_000 + s * 1000 + ms, 1000)
}

impl Reader for VttReader {
    fn read(&self, input: &str, _config: &Config) -> Result<Document> {
        let mut doc = Document::new();
        let mut region = Region::new(REGION_ID);
        region.set_style(StyleProperty::ShowBackground, Value::Keyword("whenActive"))?;
        doc.add_region(region)?;
        let body = Node::new(ElementKind::Body);

        let mut lines = input.lines();
        match lines.next() {
            Some(first) if first.trim_start().starts_with("WEBVTT") => {}
            _ => return Err(Error::Parse("WebVTT input must start with WEBVTT".into())),
        }

        let mut lines = lines.peekable();
        while lines.peek().is_some() {
            while matches!(lines.peek(), Some(l) if l.trim().is_empty()) {
                lines.next();
            }
            let Some(mut line) = lines.next() else { break };
            if line.trim().is_empty() {
                continue;
            }
            if !cue_header_re().is_match(line) {
                // a cue identifier line; the header follows.
                line = match lines.next() {
                    Some(l) => l,
                    None => break,
                };
            }
            let caps = match cue_header_re().captures(line) {
                Some(c) => c,
                None => {
                    log::warn!("vtt: expected a cue timing line, got {:?}, skipping block", line);
                    while matches!(lines.peek(), Some(l) if !l.trim().is_empty()) {
                        lines.next();
                    }
                    continue;
                }
            };
            let begin = parse_vtt_time(caps.get(1).map(|m| m.as_str()), &caps[2], &caps[3], &caps[4])?;
            let end = parse_vtt_time(caps.get(5).map(|m| m.as_str()), &caps[6], &caps[7], &caps[8])?;

            let mut text_lines = Vec::new();
            while matches!(lines.peek(), Some(l) if !l.trim().is_empty()) {
                text_lines.push(lines.next().unwrap());
            }

            let div = Node::new(ElementKind::Div);
            let p = Node::new(ElementKind::P);
            p.borrow_mut().set_region_ref(Some(REGION_ID.to_string()))?;
            p.borrow_mut().set_timing(Some(begin), Some(end))?;
            for (i, text_line) in text_lines.iter().enumerate() {
                if i > 0 {
                    Node::append_child(&p, Node::new(ElementKind::Br))?;
                }
                let span = Node::new(ElementKind::Span);
                Node::append_child(&span, Node::new_text(strip_vtt_tags(text_line)))?;
                Node::append_child(&p, span)?;
            }
            Node::append_child(&div, p)?;
            Node::append_child(&body, div)?;
        }

        doc.set_body(body)?;
        Ok(doc)
    }
}

/// Strips `<c>`/`<v>`/ruby-ish voice/class tags, keeping plain text only;
/// WebVTT's cue-span vocabulary is out of this subset's scope.
fn strip_vtt_tags(line: &str) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    for ch in line.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn format_vtt_time(t: &Time) -> String {
    let total_ms = (t.to_f64() * 1000.0).round() as i64;
    let (hh, rem) = (total_ms / 3_600_000, total_ms % 3_600_000);
    let (mm, rem) = (rem / 60_000, rem % 60_000);
    let (ss, ms) = (rem / 1000, rem % 1000);
    format!("{:02}:{:02}:{:02}.{:03}", hh, mm, ss, ms)
}

impl Writer for VttWriter {
    fn write(&self, doc: &Document, config: &Config, on_progress: &mut ProgressFn) -> Result<String> {
        let mut out = String::from("WEBVTT\n\n");
        let times = sig(doc);
        let total = times.len();
        let mut index = 1;
        for (i, window) in times.windows(2).enumerate() {
            let start = &window[0];
            let end = &window[1];
            let isd = generate_isd(doc, start)?;
            let mut text = String::new();
            let mut text_align = None;
            for region in &isd.regions {
                if text_align.is_none() {
                    text_align = region.styles.get(&StyleProperty::TextAlign).cloned();
                }
                for child in &region.children {
                    render_text(child, &mut text);
                }
            }
            let text = text.trim();
            if !text.is_empty() {
                if config.vtt_writer.cue_id {
                    out.push_str(&index.to_string());
                    out.push('\n');
                }
                out.push_str(&format_vtt_time(start));
                out.push_str(" --> ");
                out.push_str(&format_vtt_time(end));
                if config.vtt_writer.text_align {
                    if let Some(Value::Keyword(k)) = text_align {
                        out.push_str(&format!(" align:{}", vtt_align(k)));
                    }
                }
                if config.vtt_writer.line_position {
                    out.push_str(" line:90%");
                }
                out.push('\n');
                out.push_str(text);
                out.push_str("\n\n");
                index += 1;
            }
            on_progress(i + 1, total.saturating_sub(1).max(1));
        }
        Ok(out)
    }
}

fn vtt_align(textalign: &str) -> &'static str {
    match textalign {
        "left" => "left",
        "right" => "right",
        "center" => "center",
        "start" => "start",
        "end" => "end",
        _ => "center",
    }
}

fn render_text(node: &IsdNode, out: &mut String) {
    match node {
        IsdNode::Text(t) => out.push_str(t),
        IsdNode::Break => out.push('\n'),
        IsdNode::Element { children, .. } => {
            for child in children {
                render_text(child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_webvtt_header() {
        assert!(VttReader.read("00:00:01.000 --> 00:00:02.000\nHi\n", &Config::default()).is_err());
    }

    #[test]
    fn parses_cue_with_hours_omitted() {
        let input = "WEBVTT\n\n00:01.000 --> 00:02.000\nHi\n";
        let doc = VttReader.read(input, &Config::default()).unwrap();
        let body = doc.body().unwrap();
        let div = body.borrow().child_at(0).unwrap();
        let p = div.borrow().child_at(0).unwrap();
        assert_eq!(p.borrow().begin(), Some(&Time::from_ratio(1, 1).unwrap()));
    }

    #[test]
    fn strips_voice_tags() {
        assert_eq!(strip_vtt_tags("<v Roger>Hi there</v>"), "Hi there");
    }

    #[test]
    fn writer_emits_webvtt_header() {
        let input = "WEBVTT\n\n00:00:00.000 --> 00:00:01.000\nHi\n";
        let doc = VttReader.read(input, &Config::default()).unwrap();
        let out = VttWriter.write(&doc, &Config::default(), &mut |_, _| {}).unwrap();
        assert!(out.starts_with("WEBVTT"));
        assert!(out.contains("Hi"));
    }
}
