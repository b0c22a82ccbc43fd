//! EBU 3264 (STL) reader (sec. 10.5): General Subtitle Information (GSI,
//! 1024 bytes) followed by fixed 128-byte Text and Timing Information (TTI)
//! blocks. STL has no writer (sec. 6.1's `--otype` list omits it).
//!
//! STL is binary; `convert` feeds this reader a string built by mapping each
//! input byte to the `char` of the same codepoint (a lossless byte<->char
//! round trip for the 0..=255 range), so the original bytes are recovered
//! here via `ch as u32 as u8`. See `DESIGN.md`.

use crate::cdm::{Document, ElementKind, Node, Region};
use crate::config::{Config, StlReaderConfig};
use crate::error::{Error, Result};
use crate::formats::Reader;
use crate::style::{StyleProperty, Value};
use crate::time::Time;

pub struct StlReader;

const GSI_LEN: usize = 1024;
const TTI_LEN: usize = 128;
const REGION_ID: &str = "safeArea";

/// A decoded text-field row-break marker (EBU 3264 §7.3.1).
const ROW_BREAK: u8 = 0x8a;
/// Unused space padding filling the remainder of the 112-byte text field.
const PADDING: u8 = 0x8f;

struct Tti {
    subtitle_number: u16,
    cumulative_status: u8,
    tci: Time,
    tco: Time,
    text: Vec<Vec<char>>,
}

impl Reader for StlReader {
    fn read(&self, input: &str, config: &Config) -> Result<Document> {
        let bytes: Vec<u8> = input.chars().map(|c| c as u32 as u8).collect();
        if bytes.len() < GSI_LEN {
            return Err(Error::Parse("STL input shorter than the GSI block".into()));
        }
        let gsi = &bytes[..GSI_LEN];
        let fps = detect_fps(gsi);

        let mut doc = Document::new();
        let mut region = Region::new(REGION_ID);
        region.set_style(StyleProperty::ShowBackground, Value::Keyword("whenActive"))?;
        doc.add_region(region)?;

        let max_rows = config.stl_reader.max_row_count.unwrap_or_else(|| max_row_count_from_gsi(gsi).unwrap_or(23));

        let mut records = Vec::new();
        let mut offset = GSI_LEN;
        while offset + TTI_LEN <= bytes.len() {
            let block = &bytes[offset..offset + TTI_LEN];
            match parse_tti(block, fps, &config.stl_reader) {
                Ok(tti) => records.push(tti),
                Err(e) => log::warn!("stl: skipping malformed TTI block at offset {}: {}", offset, e),
            }
            offset += TTI_LEN;
        }

        let body = Node::new(ElementKind::Body);
        let mut i = 0;
        while i < records.len() {
            let start = i;
            let sn = records[i].subtitle_number;
            let mut rows: Vec<Vec<char>> = records[i].text.clone();
            let tci = records[i].tci.clone();
            let mut tco = records[i].tco.clone();
            i += 1;
            while i < records.len() && records[i].subtitle_number == sn && records[i].cumulative_status != 0 && records[start].cumulative_status != 0 {
                rows.extend(records[i].text.clone());
                tco = records[i].tco.clone();
                i += 1;
            }
            if rows.len() > max_rows as usize {
                log::warn!("stl: subtitle {} has {} rows, exceeding max_row_count {}", sn, rows.len(), max_rows);
            }

            let div = Node::new(ElementKind::Div);
            let p = Node::new(ElementKind::P);
            p.borrow_mut().set_region_ref(Some(REGION_ID.to_string()))?;
            p.borrow_mut().set_timing(Some(tci), Some(tco))?;
            for (row_index, row) in rows.iter().enumerate() {
                if row_index > 0 {
                    Node::append_child(&p, Node::new(ElementKind::Br))?;
                }
                let line: String = row.iter().collect();
                let line = if config.stl_reader.disable_line_padding { line.trim().to_string() } else { line };
                let span = Node::new(ElementKind::Span);
                Node::append_child(&span, Node::new_text(line))?;
                Node::append_child(&p, span)?;
            }
            Node::append_child(&div, p)?;
            Node::append_child(&body, div)?;
        }

        if !config.stl_reader.disable_fill_line_gap {
            fill_small_gaps(&body)?;
        }

        doc.set_body(body)?;
        Ok(doc)
    }
}

/// Extends each cue's `end` to the next cue's `begin` when the gap is under
/// half a second, closing the flicker a display would otherwise show.
fn fill_small_gaps(body: &std::rc::Rc<std::cell::RefCell<crate::cdm::Node>>) -> Result<()> {
    let divs = body.borrow().children().to_vec();
    let threshold = Time::from_ratio(1, 2)?;
    for pair in divs.windows(2) {
        let p0 = pair[0].borrow().child_at(0);
        let p1 = pair[1].borrow().child_at(0);
        if let (Some(p0), Some(p1)) = (p0, p1) {
            let end0 = p0.borrow().end().cloned();
            let begin1 = p1.borrow().begin().cloned();
            if let (Some(end0), Some(begin1)) = (end0, begin1) {
                if begin1 > end0 && &begin1 - &end0 < threshold {
                    let begin0 = p0.borrow().begin().cloned();
                    p0.borrow_mut().set_timing(begin0, Some(begin1))?;
                }
            }
        }
    }
    Ok(())
}

/// `DFC` field (offset 3, 8 bytes): `"STL25.01"`/`"STL30.01"` name the frame
/// rate; anything else falls back to 25fps.
fn detect_fps(gsi: &[u8]) -> (i64, i64) {
    let dfc = String::from_utf8_lossy(&gsi[3..11]);
    if dfc.starts_with("STL30") {
        (30, 1)
    } else {
        (25, 1)
    }
}

/// `MNR` field (offset 212, 2 ASCII digits).
fn max_row_count_from_gsi(gsi: &[u8]) -> Option<u32> {
    std::str::from_utf8(&gsi[212..214]).ok()?.trim().parse().ok()
}

fn parse_tti(block: &[u8], fps: (i64, i64), _config: &StlReaderConfig) -> Result<Tti> {
    if block.len() < 16 {
        return Err(Error::Parse("TTI block too short".into()));
    }
    let subtitle_number = u16::from_le_bytes([block[1], block[2]]);
    let cumulative_status = block[3];
    let tci = tc_to_time(&block[5..9], fps)?;
    let tco = tc_to_time(&block[9..13], fps)?;

    let text_field = &block[16..TTI_LEN];
    let mut rows = Vec::new();
    let mut current = Vec::new();
    for &b in text_field {
        match b {
            PADDING => break,
            ROW_BREAK => {
                rows.push(std::mem::take(&mut current));
            }
            0x80..=0x8f => {} // unsupported control codes (box/colour/italics): dropped, not fatal.
            _ => current.push(decode_byte(b)),
        }
    }
    if !current.is_empty() {
        rows.push(current);
    }

    Ok(Tti { subtitle_number, cumulative_status, tci, tco, text: rows })
}

fn tc_to_time(bytes: &[u8], fps: (i64, i64)) -> Result<Time> {
    let (hh, mm, ss, ff) = (bytes[0] as i64, bytes[1] as i64, bytes[2] as i64, bytes[3] as i64);
    let frame = ((hh * 3600 + mm * 60 + ss) * fps.0) / fps.1 + ff;
    Time::from_frames(frame, fps.0, fps.1)
}

/// ISO 6937/Latin subset pass-through for the printable range; non-ASCII
/// high bytes are not remapped (no code-page table is bundled).
fn decode_byte(b: u8) -> char {
    if (0x20..=0x7e).contains(&b) {
        b as char
    } else {
        char::from_u32(b as u32).unwrap_or(' ')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gsi_block(dfc: &str) -> Vec<u8> {
        let mut gsi = vec![0x20u8; GSI_LEN];
        let dfc_bytes = dfc.as_bytes();
        gsi[3..3 + dfc_bytes.len()].copy_from_slice(dfc_bytes);
        gsi
    }

    fn tti_block(sn: u16, cs: u8, tci: [u8; 4], tco: [u8; 4], text: &[u8]) -> Vec<u8> {
        let mut block = vec![0u8; TTI_LEN];
        block[0] = 0;
        block[1..3].copy_from_slice(&sn.to_le_bytes());
        block[3] = cs;
        block[5..9].copy_from_slice(&tci);
        block[9..13].copy_from_slice(&tco);
        let text_field = &mut block[16..TTI_LEN];
        for b in text_field.iter_mut() {
            *b = PADDING;
        }
        text_field[..text.len()].copy_from_slice(text);
        block
    }

    fn bytes_to_input(bytes: &[u8]) -> String {
        bytes.iter().map(|&b| b as char).collect()
    }

    #[test]
    fn parses_one_subtitle_with_two_rows() {
        let mut bytes = gsi_block("STL25.01");
        let mut text = b"HELLO".to_vec();
        text.push(ROW_BREAK);
        text.extend_from_slice(b"WORLD");
        bytes.extend(tti_block(0, 0, [0, 0, 1, 0], [0, 0, 2, 0], &text));

        let doc = StlReader.read(&bytes_to_input(&bytes), &Config::default()).unwrap();
        let body = doc.body().unwrap();
        let div = body.borrow().child_at(0).unwrap();
        let p = div.borrow().child_at(0).unwrap();
        assert_eq!(p.borrow().children().len(), 3); // span, br, span
        assert_eq!(p.borrow().begin(), Some(&Time::from_ratio(1, 25).unwrap()));
    }

    #[test]
    fn too_short_input_is_a_parse_error() {
        assert!(StlReader.read("short", &Config::default()).is_err());
    }

    #[test]
    fn thirty_fps_dfc_is_detected() {
        let gsi = gsi_block("STL30.01");
        assert_eq!(detect_fps(&gsi), (30, 1));
    }
}
