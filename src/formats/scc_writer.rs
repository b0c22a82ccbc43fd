//! SCC (CEA-608) writer (sec. 6.2, 10.5): the inverse of `crate::scc`'s
//! reader, emitting pop-on (default) or roll-up captions depending on
//! `scc_writer.rollup_lines`/`force_popon`.
//!
//! Grounded on `crate::scc::codes`/`crate::scc::timecode` for the byte and
//! timecode shapes the reader expects back.

use crate::cdm::Document;
use crate::config::{Config, SccFrameRate, SccWriterConfig};
use crate::error::Result;
use crate::formats::{ProgressFn, Writer};
use crate::isd::{generate as generate_isd, sig, IsdNode};
use crate::scc::timecode::parse_timecode;
use crate::time::Time;

pub struct SccWriter;

const MAX_COLS: usize = 32;
const MAX_ROWS: u8 = 15;

/// CEA-608's two-byte control/PAC prefix, keyed by row (sec. 4.3's
/// `pac_rows` table read in reverse): `(first_byte, is_high_half)`.
fn pac_prefix(row: u8) -> (u8, bool) {
    match row {
        1 => (0x11, false),
        2 => (0x11, true),
        3 => (0x12, false),
        4 => (0x12, true),
        5 => (0x15, false),
        6 => (0x15, true),
        7 => (0x16, false),
        8 => (0x16, true),
        9 => (0x10, false),
        10 => (0x10, true),
        11 => (0x13, false),
        12 => (0x13, true),
        13 => (0x17, false),
        14 => (0x17, true),
        _ => (0x14, true), // row 15
    }
}

/// A white, non-italic, non-underlined PAC at `row`, column 0.
fn pac_word(row: u8) -> u16 {
    let (first, high) = pac_prefix(row);
    let second = if high { 0x60 } else { 0x40 };
    word(first, second)
}

fn control_word(first: u8, second: u8) -> u16 {
    word(first, second)
}

fn char_word(c0: char, c1: Option<char>) -> u16 {
    let b0 = from_char(c0);
    let b1 = c1.map(from_char).unwrap_or(0);
    ((add_parity(b0) as u16) << 8) | add_parity(b1) as u16
}

fn word(b0: u8, b1: u8) -> u16 {
    ((add_parity(b0) as u16) << 8) | add_parity(b1) as u16
}

fn add_parity(v: u8) -> u8 {
    let v = v & 0x7f;
    if v.count_ones() % 2 == 0 {
        v | 0x80
    } else {
        v
    }
}

fn from_char(c: char) -> u8 {
    match c {
        '\u{2019}' => 0x27,
        '\u{00e1}' => 0x2a,
        '\u{00e9}' => 0x5c,
        '\u{00ed}' => 0x5e,
        '\u{00f3}' => 0x5f,
        '\u{00fa}' => 0x60,
        c if (c as u32) < 0x80 => c as u8,
        _ => b'?',
    }
}

struct Cue {
    start: Time,
    end: Time,
    lines: Vec<String>,
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

fn collect_cues(doc: &Document) -> Result<Vec<Cue>> {
    let times = sig(doc);
    let mut cues = Vec::new();
    for window in times.windows(2) {
        let start = window[0].clone();
        let end = window[1].clone();
        let isd = generate_isd(doc, &start)?;
        let mut text = String::new();
        for region in &isd.regions {
            for child in &region.children {
                render_text(child, &mut text);
            }
        }
        let lines: Vec<String> = text.lines().map(str::to_string).filter(|l| !l.trim().is_empty()).collect();
        if !lines.is_empty() {
            cues.push(Cue { start, end, lines });
        }
    }
    Ok(cues)
}

/// Greedy word wrap to `MAX_COLS` when `allow_reflow` is set; otherwise logs
/// and truncates an overlong line.
fn wrap_line(line: &str, allow_reflow: bool) -> Vec<String> {
    if line.chars().count() <= MAX_COLS {
        return vec![line.to_string()];
    }
    if !allow_reflow {
        log::warn!("scc writer: line exceeds {} columns, truncating: {:?}", MAX_COLS, line);
        return vec![line.chars().take(MAX_COLS).collect()];
    }
    let mut out = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
        } else if current.chars().count() + 1 + word.chars().count() <= MAX_COLS {
            current.push(' ');
            current.push_str(word);
        } else {
            out.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn fps_for(rate: SccFrameRate) -> (i64, i64, bool) {
    match rate {
        SccFrameRate::Ndf30 => (30, 1, false),
        SccFrameRate::Ndf2997 => (30000, 1001, false),
        SccFrameRate::Df2997 => (30000, 1001, true),
    }
}

/// Formats `t` as an `HH:MM:SS:FF`/`HH;MM;SS;FF` timecode for `rate`,
/// applying the drop-frame skip rule (inverse of `timecode::parse_timecode`)
/// when `rate` is drop-frame.
fn format_timecode(t: &Time, rate: SccFrameRate) -> String {
    let (fps_num, fps_den, drop_frame) = fps_for(rate);
    let real_frame = t.to_frames(fps_num, fps_den);

    let nominal = if drop_frame { drop_frame_encode(real_frame) } else { real_frame };

    let ff = nominal % 30;
    let total_seconds = nominal / 30;
    let ss = total_seconds % 60;
    let total_minutes = total_seconds / 60;
    let mm = total_minutes % 60;
    let hh = total_minutes / 60;
    let sep = if drop_frame { ';' } else { ':' };
    format!("{:02}{sep}{:02}{sep}{:02}{sep}{:02}", hh, mm, ss, ff, sep = sep)
}

/// Standard SMPTE 29.97 drop-frame encode: maps a real (non-dropped) frame
/// count to the nominal frame count a drop-frame timecode display shows.
fn drop_frame_encode(real_frame: i64) -> i64 {
    const DROP_FRAMES: i64 = 2;
    const FRAMES_PER_10_MIN: i64 = 30 * 60 * 10;
    const FRAMES_PER_MIN: i64 = 30 * 60 - DROP_FRAMES;
    const FRAMES_PER_24H: i64 = 30 * 60 * 60 * 24;

    let real_frame = real_frame.rem_euclid(FRAMES_PER_24H);
    let d = real_frame / FRAMES_PER_10_MIN;
    let m = real_frame % FRAMES_PER_10_MIN;
    if m > DROP_FRAMES {
        real_frame + DROP_FRAMES * 9 * d + DROP_FRAMES * ((m - DROP_FRAMES) / FRAMES_PER_MIN)
    } else {
        real_frame + DROP_FRAMES * 9 * d
    }
}

fn offset(t: &Time, start_tc: &Option<Time>) -> Time {
    match start_tc {
        Some(base) => base + t,
        None => t.clone(),
    }
}

fn hex_words(words: &[u16]) -> String {
    words.iter().map(|w| format!("{:04x}", w)).collect::<Vec<_>>().join(" ")
}

fn write_popon(cues: &[Cue], config: &SccWriterConfig) -> Result<String> {
    let start_tc = config.start_tc.as_deref().map(parse_timecode).transpose()?.map(|tc| tc.time);
    let mut out = String::from("Scenarist_SCC V1.0\n\n");

    for cue in cues {
        let wrapped: Vec<String> = cue.lines.iter().flat_map(|l| wrap_line(l, config.allow_reflow)).collect();
        let n = wrapped.len().min(MAX_ROWS as usize) as u8;
        let first_row = MAX_ROWS - n + 1;

        let mut load_words = vec![control_word(0x14, 0x20), control_word(0x14, 0x20)]; // RCL RCL
        for (i, line) in wrapped.iter().take(n as usize).enumerate() {
            let row = first_row + i as u8;
            let pac = pac_word(row);
            load_words.push(pac);
            load_words.push(pac);
            load_words.extend(chars_to_words(line));
        }
        load_words.push(control_word(0x14, 0x2f)); // EOC
        load_words.push(control_word(0x14, 0x2f));

        let start_line = format!("{}\t{}\n", format_timecode(&offset(&cue.start, &start_tc), config.frame_rate), hex_words(&load_words));
        out.push_str(&start_line);

        let edm = [control_word(0x14, 0x2c), control_word(0x14, 0x2c)];
        let end_line = format!("{}\t{}\n\n", format_timecode(&offset(&cue.end, &start_tc), config.frame_rate), hex_words(&edm));
        out.push_str(&end_line);
    }
    Ok(out)
}

fn write_rollup(cues: &[Cue], config: &SccWriterConfig, lines: u8) -> Result<String> {
    let start_tc = config.start_tc.as_deref().map(parse_timecode).transpose()?.map(|tc| tc.time);
    let mut out = String::from("Scenarist_SCC V1.0\n\n");

    let ru_control = match lines {
        2 => (0x14, 0x25),
        4 => (0x14, 0x27),
        _ => (0x14, 0x26), // 3 lines, the common default
    };

    for (i, cue) in cues.iter().enumerate() {
        let text = cue.lines.join(" ");
        let wrapped = wrap_line(&text, config.allow_reflow);
        let line = wrapped.first().cloned().unwrap_or_default();

        let mut words = Vec::new();
        if i == 0 {
            words.push(control_word(ru_control.0, ru_control.1));
            words.push(control_word(ru_control.0, ru_control.1));
        }
        let pac = pac_word(MAX_ROWS);
        words.push(pac);
        words.push(pac);
        words.extend(chars_to_words(&line));
        let start_line = format!("{}\t{}\n", format_timecode(&offset(&cue.start, &start_tc), config.frame_rate), hex_words(&words));
        out.push_str(&start_line);

        let cr = [control_word(0x14, 0x2d), control_word(0x14, 0x2d)];
        let cr_line = format!("{}\t{}\n\n", format_timecode(&offset(&cue.end, &start_tc), config.frame_rate), hex_words(&cr));
        out.push_str(&cr_line);
    }
    Ok(out)
}

fn chars_to_words(line: &str) -> Vec<u16> {
    let chars: Vec<char> = line.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c0 = chars[i];
        let c1 = chars.get(i + 1).copied();
        out.push(char_word(c0, c1));
        i += if c1.is_some() { 2 } else { 1 };
    }
    out
}

impl Writer for SccWriter {
    fn write(&self, doc: &Document, config: &Config, on_progress: &mut ProgressFn) -> Result<String> {
        let cues = collect_cues(doc)?;
        let scc_config = &config.scc_writer;

        let result = if !scc_config.force_popon {
            if let Some(n) = scc_config.rollup_lines {
                write_rollup(&cues, scc_config, n)
            } else {
                write_popon(&cues, scc_config)
            }
        } else {
            write_popon(&cues, scc_config)
        };

        let total = cues.len().max(1);
        for i in 0..cues.len() {
            on_progress(i + 1, total);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdm::{Document as Doc, ElementKind, Node, Region};
    use crate::style::{StyleProperty, Value};

    fn doc_with_one_cue() -> Doc {
        let mut doc = Doc::new();
        let mut region = Region::new("captions");
        region.set_style(StyleProperty::ShowBackground, Value::Keyword("whenActive")).unwrap();
        doc.add_region(region).unwrap();
        let body = Node::new(ElementKind::Body);
        let div = Node::new(ElementKind::Div);
        let p = Node::new(ElementKind::P);
        p.borrow_mut().set_region_ref(Some("captions".to_string())).unwrap();
        p.borrow_mut().set_timing(Some(Time::from_ratio(1, 1).unwrap()), Some(Time::from_ratio(2, 1).unwrap())).unwrap();
        let span = Node::new(ElementKind::Span);
        Node::append_child(&span, Node::new_text("Hello")).unwrap();
        Node::append_child(&p, span).unwrap();
        Node::append_child(&div, p).unwrap();
        Node::append_child(&body, div).unwrap();
        doc.set_body(body).unwrap();
        doc
    }

    #[test]
    fn pac_prefix_round_trips_through_classify() {
        use crate::scc::codes::{classify, split_word};
        let w = pac_word(15);
        let (hi, lo) = split_word(w);
        match classify(hi, lo) {
            crate::scc::codes::Code::Pac { row, indent, .. } => {
                assert_eq!(row, 15);
                assert_eq!(indent, 0);
            }
            other => panic!("expected Pac, got {:?}", other),
        }
    }

    #[test]
    fn popon_writer_emits_rcl_and_eoc() {
        let doc = doc_with_one_cue();
        let out = SccWriter.write(&doc, &Config::default(), &mut |_, _| {}).unwrap();
        assert!(out.starts_with("Scenarist_SCC V1.0"));
        assert!(out.contains("9420 9420"));
        assert!(out.contains("942f 942f"));
    }

    #[test]
    fn ndf_timecode_formats_with_colon_separators() {
        let t = Time::from_ratio(22, 30).unwrap();
        assert_eq!(format_timecode(&t, SccFrameRate::Ndf30), "00:00:00:22");
    }

    #[test]
    fn wrap_line_splits_on_word_boundaries() {
        let long = "a".repeat(20) + " " + &"b".repeat(20);
        let wrapped = wrap_line(&long, true);
        assert_eq!(wrapped.len(), 2);
    }
}
