//! SubRip (SRT) reader/writer (sec. 10.5): line-oriented, one CDM `P` per
//! cue. Regex-matched cue header, grounded on the teacher's `regex` use in
//! `css/selector.rs` for line-shape matching.

use std::sync::OnceLock;

use regex::Regex;

use crate::cdm::{Document, ElementKind, Node, Region};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::formats::{ProgressFn, Reader, Writer};
use crate::isd::{generate as generate_isd, sig, IsdNode};
use crate::style::{StyleProperty, Value};
use crate::time::Time;

pub struct SrtReader;
pub struct SrtWriter;

const REGION_ID: &str = "captions";

fn cue_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{2}):(\d{2}):(\d{2}),(\d{3})\s*-->\s*(\d{2}):(\d{2}):(\d{2}),(\d{3})").unwrap())
}

fn parse_srt_time(h: &str, m: &str, s: &str, ms: &str) -> Result<Time> {
    let (h, m, s, ms): (i64, i64, i64, i64) = (
        h.parse().map_err(|_| Error::Parse("bad SRT timestamp".into()))?,
        m.parse().map_err(|_| Error::Parse("bad SRT timestamp".into()))?,
        s.parse().map_err(|_| Error::Parse("bad SRT timestamp".into()))?,
        ms.parse().map_err(|_| Error::Parse("bad SRT timestamp".into()))?,
    );
    Time::from_ratio(h * 3_600_000 + m * 60_000 + s * 1000 + ms, 1000)
}

impl Reader for SrtReader {
    fn read(&self, input: &str, _config: &Config) -> Result<Document> {
        let mut doc = Document::new();
        let mut region = Region::new(REGION_ID);
        region.set_style(StyleProperty::ShowBackground, Value::Keyword("whenActive"))?;
        doc.add_region(region)?;

        let body = Node::new(ElementKind::Body);
        let mut lines = input.lines().peekable();

        while lines.peek().is_some() {
            while matches!(lines.peek(), Some(l) if l.trim().is_empty()) {
                lines.next();
            }
            let Some(first) = lines.next() else { break };

            let header_line = if cue_header_re().is_match(first) {
                first
            } else {
                match lines.next() {
                    Some(l) => l,
                    None => break,
                }
            };
            let caps = match cue_header_re().captures(header_line) {
                Some(c) => c,
                None => {
                    log::warn!("srt: expected a cue timing line, got {:?}, skipping block", header_line);
                    while matches!(lines.peek(), Some(l) if !l.trim().is_empty()) {
                        lines.next();
                    }
                    continue;
                }
            };
            let begin = parse_srt_time(&caps[1], &caps[2], &caps[3], &caps[4])?;
            let end = parse_srt_time(&caps[5], &caps[6], &caps[7], &caps[8])?;

            let mut text_lines = Vec::new();
            while matches!(lines.peek(), Some(l) if !l.trim().is_empty()) {
                text_lines.push(lines.next().unwrap());
            }

            let div = Node::new(ElementKind::Div);
            let p = Node::new(ElementKind::P);
            p.borrow_mut().set_region_ref(Some(REGION_ID.to_string()))?;
            p.borrow_mut().set_timing(Some(begin), Some(end))?;
            for (i, line) in text_lines.iter().enumerate() {
                if i > 0 {
                    Node::append_child(&p, Node::new(ElementKind::Br))?;
                }
                build_inline_spans(&p, line)?;
            }
            Node::append_child(&div, p)?;
            Node::append_child(&body, div)?;
        }

        doc.set_body(body)?;
        Ok(doc)
    }
}

/// Parses a very small subset of `<b>`/`<i>`/`<u>` lookalikes into styled
/// `Span`s; unrecognized tags are treated as literal text.
fn build_inline_spans(parent: &std::rc::Rc<std::cell::RefCell<crate::cdm::Node>>, line: &str) -> Result<()> {
    let mut bold = false;
    let mut italic = false;
    let mut underline = false;
    let mut rest = line;
    loop {
        match rest.find('<') {
            None => {
                if !rest.is_empty() {
                    push_span(parent, rest, bold, italic, underline)?;
                }
                break;
            }
            Some(idx) => {
                if idx > 0 {
                    push_span(parent, &rest[..idx], bold, italic, underline)?;
                }
                let after = &rest[idx..];
                let close = after.find('>').map(|i| i + 1).unwrap_or(after.len());
                let tag = &after[..close];
                match tag {
                    "<b>" => bold = true,
                    "</b>" => bold = false,
                    "<i>" => italic = true,
                    "</i>" => italic = false,
                    "<u>" => underline = true,
                    "</u>" => underline = false,
                    _ => {}
                }
                rest = &after[close..];
            }
        }
    }
    Ok(())
}

fn push_span(parent: &std::rc::Rc<std::cell::RefCell<crate::cdm::Node>>, text: &str, bold: bool, italic: bool, underline: bool) -> Result<()> {
    let span = Node::new(ElementKind::Span);
    if bold {
        span.borrow_mut().set_style(StyleProperty::FontWeight, Value::Keyword("bold"))?;
    }
    if italic {
        span.borrow_mut().set_style(StyleProperty::FontStyle, Value::Keyword("italic"))?;
    }
    if underline {
        span.borrow_mut().set_style(StyleProperty::TextDecoration, Value::Keyword("underline"))?;
    }
    Node::append_child(&span, Node::new_text(text))?;
    Node::append_child(parent, span)?;
    Ok(())
}

fn format_srt_time(t: &Time) -> String {
    let total_ms = (t.to_f64() * 1000.0).round() as i64;
    let (hh, rem) = (total_ms / 3_600_000, total_ms % 3_600_000);
    let (mm, rem) = (rem / 60_000, rem % 60_000);
    let (ss, ms) = (rem / 1000, rem % 1000);
    format!("{:02}:{:02}:{:02},{:03}", hh, mm, ss, ms)
}

impl Writer for SrtWriter {
    fn write(&self, doc: &Document, config: &Config, on_progress: &mut ProgressFn) -> Result<String> {
        let mut out = String::new();
        let times = sig(doc);
        let total = times.len();
        let mut index = 1;
        for (i, window) in times.windows(2).enumerate() {
            let start = &window[0];
            let end = &window[1];
            let isd = generate_isd(doc, start)?;
            let mut text = String::new();
            for region in &isd.regions {
                for child in &region.children {
                    render_text(child, &mut text, config.srt_writer.text_formatting);
                }
            }
            let text = text.trim();
            if !text.is_empty() {
                out.push_str(&index.to_string());
                out.push('\n');
                out.push_str(&format_srt_time(start));
                out.push_str(" --> ");
                out.push_str(&format_srt_time(end));
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

fn render_text(node: &IsdNode, out: &mut String, formatting: bool) {
    match node {
        IsdNode::Text(t) => out.push_str(t),
        IsdNode::Break => out.push('\n'),
        IsdNode::Element { styles, children, .. } => {
            let bold = matches!(styles.get(&StyleProperty::FontWeight), Some(Value::Keyword("bold")));
            let italic = matches!(styles.get(&StyleProperty::FontStyle), Some(Value::Keyword("italic")));
            let underline = matches!(styles.get(&StyleProperty::TextDecoration), Some(Value::Keyword("underline")));
            if formatting && underline {
                out.push_str("<u>");
            }
            if formatting && italic {
                out.push_str("<i>");
            }
            if formatting && bold {
                out.push_str("<b>");
            }
            for child in children {
                render_text(child, out, formatting);
            }
            if formatting && bold {
                out.push_str("</b>");
            }
            if formatting && italic {
                out.push_str("</i>");
            }
            if formatting && underline {
                out.push_str("</u>");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_one_cue_with_bold_text() {
        let input = "1\n00:00:01,000 --> 00:00:02,500\n<b>Hello</b> world\n";
        let doc = SrtReader.read(input, &Config::default()).unwrap();
        let body = doc.body().unwrap();
        let div = body.borrow().child_at(0).unwrap();
        let p = div.borrow().child_at(0).unwrap();
        assert_eq!(p.borrow().begin(), Some(&Time::from_ratio(1, 1).unwrap()));
        assert_eq!(p.borrow().end(), Some(&Time::from_ratio(5, 2).unwrap()));
        let span0 = p.borrow().child_at(0).unwrap();
        assert_eq!(span0.borrow().inline_style(StyleProperty::FontWeight), Some(&Value::Keyword("bold")));
    }

    #[test]
    fn missing_index_line_is_tolerated() {
        let input = "00:00:00,000 --> 00:00:01,000\nHi\n";
        let doc = SrtReader.read(input, &Config::default()).unwrap();
        assert_eq!(doc.body().unwrap().borrow().children().len(), 1);
    }

    #[test]
    fn writer_round_trips_plain_text() {
        let input = "1\n00:00:00,000 --> 00:00:01,000\nHi\n";
        let doc = SrtReader.read(input, &Config::default()).unwrap();
        let out = SrtWriter.write(&doc, &Config::default(), &mut |_, _| {}).unwrap();
        assert!(out.contains("Hi"));
        assert!(out.contains("00:00:00,000 --> 00:00:01,000"));
    }
}
