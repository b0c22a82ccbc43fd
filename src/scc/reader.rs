//! The SCC dual-buffer state machine (sec. 4.3).

use crate::cdm::{Document, ElementKind, Node, Region};
use crate::error::Result;
use crate::scc::codes::{classify, parity_ok, split_word, Code, Control, PenStyle};
use crate::scc::timecode::parse_timecode;
use crate::scc::{SccReaderConfig, TextAlign};
use crate::style::{StyleProperty, Value};
use crate::time::{Color, Length, Time, Unit};

const ROWS: usize = 15;
const COLS: usize = 32;

#[derive(Clone, Copy, Debug)]
struct Cell {
    ch: char,
    style: PenStyle,
}

type Row = [Option<Cell>; COLS];
type Grid = [Row; ROWS];

fn empty_grid() -> Grid {
    [[None; COLS]; ROWS]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    PopOn,
    PaintOn,
    RollUp(u8),
}

struct RawParagraph {
    begin: Time,
    end: Option<Time>,
    rows: Vec<Vec<(String, PenStyle)>>,
}

struct Machine {
    mode: Mode,
    display: Grid,
    non_display: Grid,
    cursor: (usize, usize),
    pen_style: PenStyle,
    display_begin: Option<Time>,
    /// When a pop-on caption is being loaded into `non_display` but the
    /// stream ends before an EOC ever flips it onscreen, this is the time
    /// that load began; flushed as an open-ended paragraph at end of
    /// stream (sec. 8 scenario 1: a caption with no closing code is still
    /// reported, open-ended).
    pending_begin: Option<Time>,
    paragraphs: Vec<RawParagraph>,
    last_raw: Option<(u8, u8)>,
}

impl Machine {
    fn new() -> Self {
        Self {
            mode: Mode::PopOn,
            display: empty_grid(),
            non_display: empty_grid(),
            cursor: (ROWS - 1, 0),
            pen_style: PenStyle::white(),
            display_begin: None,
            pending_begin: None,
            paragraphs: Vec::new(),
            last_raw: None,
        }
    }

    fn active_grid(&mut self) -> &mut Grid {
        match self.mode {
            Mode::PopOn => &mut self.non_display,
            Mode::PaintOn | Mode::RollUp(_) => &mut self.display,
        }
    }

    fn write_char(&mut self, c: char) {
        let (row, col) = self.cursor;
        let style = self.pen_style;
        let grid = self.active_grid();
        if row < ROWS && col < COLS {
            grid[row][col] = Some(Cell { ch: c, style });
        }
        self.cursor.1 = (self.cursor.1 + 1).min(COLS - 1);
    }

    fn bottom_row(&self) -> usize {
        ROWS - 1
    }

    fn close_display(&mut self, t: &Time) {
        if let Some(begin) = self.display_begin.take() {
            if let Some(p) = make_paragraph(&self.display, begin, Some(t.clone())) {
                self.paragraphs.push(p);
            }
        }
    }

    /// End-of-stream variant of `close_display`: the still-open content is
    /// reported with an open end rather than clipped to the last seen time.
    fn close_display_open(&mut self) {
        if let Some(begin) = self.display_begin.take() {
            if let Some(p) = make_paragraph(&self.display, begin, None) {
                self.paragraphs.push(p);
            }
        }
        if let Some(begin) = self.pending_begin.take() {
            if let Some(p) = make_paragraph(&self.non_display, begin, None) {
                self.paragraphs.push(p);
            }
        }
    }

    fn handle(&mut self, code: Code, t: &Time) {
        if self.mode == Mode::PopOn && self.pending_begin.is_none() && matches!(code, Code::Pac { .. } | Code::MidRow(_) | Code::Chars(_, _)) {
            self.pending_begin = Some(t.clone());
        }
        match code {
            Code::Control(Control::Rcl) => {
                self.mode = Mode::PopOn;
                self.non_display = empty_grid();
                self.pending_begin = None;
            }
            Code::Control(Control::Rdc) => {
                let was_buffered = matches!(self.mode, Mode::PopOn | Mode::RollUp(_));
                self.mode = Mode::PaintOn;
                if was_buffered && self.display_begin.is_none() {
                    self.display_begin = Some(t.clone());
                }
            }
            Code::Control(Control::Ru(n)) => {
                let was_popon_or_paint = !matches!(self.mode, Mode::RollUp(_));
                self.mode = Mode::RollUp(n);
                if was_popon_or_paint {
                    self.close_display(t);
                    self.display = empty_grid();
                }
                self.cursor = (self.bottom_row(), 0);
            }
            Code::Control(Control::Enm) => {
                self.non_display = empty_grid();
            }
            Code::Control(Control::Edm) => {
                self.close_display(t);
                self.display = empty_grid();
            }
            Code::Control(Control::Eoc) => {
                self.close_display(t);
                std::mem::swap(&mut self.display, &mut self.non_display);
                self.pending_begin = None;
                if self.display.iter().any(|r| r.iter().any(Option::is_some)) {
                    self.display_begin = Some(t.clone());
                }
            }
            Code::Control(Control::Cr) => {
                self.close_display(t);
                let lines = match self.mode {
                    Mode::RollUp(n) => n as usize,
                    _ => 1,
                };
                let top = ROWS.saturating_sub(lines);
                for row in top..ROWS - 1 {
                    self.display[row] = self.display[row + 1];
                }
                self.display[ROWS - 1] = [None; COLS];
                if self.display.iter().any(|r| r.iter().any(Option::is_some)) {
                    self.display_begin = Some(t.clone());
                }
                self.cursor = (self.bottom_row(), 0);
            }
            Code::Control(Control::Bs) => {
                let (row, col) = self.cursor;
                if col > 0 {
                    let grid = self.active_grid();
                    grid[row][col - 1] = None;
                    self.cursor.1 -= 1;
                }
            }
            Code::Control(Control::Der) => {
                let (row, col) = self.cursor;
                let grid = self.active_grid();
                for c in col..COLS {
                    grid[row][c] = None;
                }
            }
            Code::Control(Control::To(n)) => {
                self.cursor.1 = (self.cursor.1 + n as usize).min(COLS - 1);
            }
            Code::Pac { row, style, indent } => {
                self.pen_style = style;
                let row0 = (row as usize).saturating_sub(1).min(ROWS - 1);
                match self.mode {
                    Mode::RollUp(_) => self.cursor = (self.bottom_row(), 0),
                    _ => self.cursor = (row0, (indent as usize).min(COLS - 1)),
                }
            }
            Code::MidRow(style) => {
                self.pen_style = style;
                self.write_char(' ');
            }
            Code::Chars(c0, c1) => {
                self.write_char(c0);
                if let Some(c1) = c1 {
                    self.write_char(c1);
                }
            }
            Code::Ignored => {}
        }
    }
}

fn make_paragraph(grid: &Grid, begin: Time, end: Option<Time>) -> Option<RawParagraph> {
    if let Some(e) = &end {
        if *e == begin {
            return None;
        }
    }
    let rows = trim_and_runs(grid);
    if rows.is_empty() {
        return None;
    }
    Some(RawParagraph { begin, end, rows })
}

fn trim_and_runs(grid: &Grid) -> Vec<Vec<(String, PenStyle)>> {
    let mut out = Vec::new();
    for row in grid.iter() {
        let first = row.iter().position(Option::is_some);
        let last = row.iter().rposition(Option::is_some);
        let (first, last) = match (first, last) {
            (Some(f), Some(l)) => (f, l),
            _ => continue,
        };
        let mut runs: Vec<(String, PenStyle)> = Vec::new();
        for cell in &row[first..=last] {
            let (ch, style) = match cell {
                Some(c) => (c.ch, c.style),
                None => (' ', runs.last().map(|r| r.1).unwrap_or_else(PenStyle::white)),
            };
            match runs.last_mut() {
                Some(last_run) if last_run.1 == style => last_run.0.push(ch),
                _ => runs.push((ch.to_string(), style)),
            }
        }
        out.push(runs);
    }
    out
}

/// Reads a whole SCC file (sec. 4.3) into a canonical document: one safe-area
/// region, one `Div`/`P` per caption paragraph.
pub fn read(text: &str, config: &SccReaderConfig) -> Result<Document> {
    let mut doc = Document::new();

    let region_id = "safeArea";
    let mut region = Region::new(region_id);
    region.set_style(StyleProperty::Origin, Value::LengthPair(Length::new(10.0, Unit::Percent), Length::new(10.0, Unit::Percent)))?;
    region.set_style(StyleProperty::Extent, Value::LengthPair(Length::new(80.0, Unit::Percent), Length::new(80.0, Unit::Percent)))?;
    region.set_style(StyleProperty::ShowBackground, Value::Keyword("whenActive"))?;
    doc.add_region(region)?;

    match config.text_align {
        TextAlign::Auto => {}
        TextAlign::Left => doc.set_initial_value(StyleProperty::TextAlign, Value::Keyword("left"))?,
        TextAlign::Center => doc.set_initial_value(StyleProperty::TextAlign, Value::Keyword("center"))?,
        TextAlign::Right => doc.set_initial_value(StyleProperty::TextAlign, Value::Keyword("right"))?,
    }

    let mut machine = Machine::new();

    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim_end();
        if line.is_empty() || line == "Scenarist_SCC V1.0" {
            continue;
        }
        let mut fields = line.splitn(2, '\t');
        let tc_field = fields.next().unwrap_or_default();
        let words_field = fields.next();
        let words_field = match words_field {
            Some(w) => w,
            None => {
                log::warn!("scc: line {} has no word field, skipped", lineno + 1);
                continue;
            }
        };

        let tc = match parse_timecode(tc_field) {
            Ok(tc) => tc,
            Err(_) => {
                log::warn!("scc: line {} has a malformed timecode, skipped", lineno + 1);
                continue;
            }
        };
        let t = tc.time;

        for word in words_field.split_whitespace() {
            let raw = match u16::from_str_radix(word, 16) {
                Ok(w) => w,
                Err(_) => {
                    log::warn!("scc: line {} has a malformed word {:?}, skipped", lineno + 1, word);
                    continue;
                }
            };
            let (hi, lo) = split_word(raw);
            if !parity_ok((raw >> 8) as u8) || !parity_ok((raw & 0xff) as u8) {
                log::warn!("scc: line {} word {:?} failed parity, decoding anyway", lineno + 1, word);
            }

            // The CEA-608 spec mandates duplicate transmission of control
            // pairs; the second copy of an identical pair is a no-op.
            if machine.last_raw == Some((hi, lo)) && is_control_pair(hi, lo) {
                machine.last_raw = None;
                continue;
            }
            machine.last_raw = Some((hi, lo));

            let code = classify(hi, lo);
            machine.handle(code, &t);
        }
    }

    machine.close_display_open();

    let body = Node::new(ElementKind::Body);
    for paragraph in machine.paragraphs {
        if paragraph.rows.is_empty() {
            continue;
        }
        let div = Node::new(ElementKind::Div);
        let p = Node::new(ElementKind::P);
        p.borrow_mut().set_region_ref(Some(region_id.to_string()))?;
        p.borrow_mut().set_timing(Some(paragraph.begin), paragraph.end)?;

        for (i, row) in paragraph.rows.iter().enumerate() {
            if i > 0 {
                let br = Node::new(ElementKind::Br);
                Node::append_child(&p, br)?;
            }
            for (run_text, style) in row {
                let span = Node::new(ElementKind::Span);
                if style.color != Color::WHITE {
                    span.borrow_mut().set_style(StyleProperty::Color, Value::Color(style.color))?;
                }
                if style.italic {
                    span.borrow_mut().set_style(StyleProperty::FontStyle, Value::Keyword("italic"))?;
                }
                if style.underline {
                    span.borrow_mut().set_style(StyleProperty::TextDecoration, Value::Keyword("underline"))?;
                }
                let text_node = Node::new_text(run_text.clone());
                Node::append_child(&span, text_node)?;
                Node::append_child(&p, span)?;
            }
        }

        Node::append_child(&div, p)?;
        Node::append_child(&body, div)?;
    }
    doc.set_body(body)?;

    Ok(doc)
}

/// True for any code pair transmitted doubled on the wire (control codes,
/// PACs, mid-row codes); plain character pairs are not doubled.
fn is_control_pair(hi: u8, lo: u8) -> bool {
    !matches!(classify(hi, lo), Code::Chars(_, _) | Code::Ignored)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scenario 1 (sec. 8): pop-on minimum.
    #[test]
    fn scc_pop_on_minimum() {
        let input = "00:00:00:22\t9420 9420 9470 9470 4c6f 7265 6d80";
        let doc = read(input, &SccReaderConfig::default()).unwrap();

        let body = doc.body().unwrap();
        let div = body.borrow().child_at(0).expect("one div");
        let p = div.borrow().child_at(0).expect("one p");
        let p = p.borrow();
        assert_eq!(p.begin(), Some(&Time::from_ratio(22, 30).unwrap()));
        assert_eq!(p.end(), None);

        let mut text = String::new();
        collect_text(&p.children().to_vec(), &mut text);
        assert_eq!(text, "Lorem");
    }

    /// Scenario 2 (sec. 8): an EOC flip closes one paragraph and opens the
    /// next at the flip time.
    #[test]
    fn scc_eoc_flip_produces_two_paragraphs() {
        let input = "\
00:00:01:00\t9420 9420 9470 9470 4869 8080
00:00:02:00\t942f 942f
00:00:02:01\t9420 9420 9470 9470 4279 6580 8080
00:00:03:00\t942f 942f";
        let doc = read(input, &SccReaderConfig::default()).unwrap();
        let body = doc.body().unwrap();
        assert_eq!(body.borrow().children().len(), 2);

        let p0 = body.borrow().child_at(0).unwrap().borrow().child_at(0).unwrap();
        let p0 = p0.borrow();
        assert_eq!(p0.begin(), Some(&Time::from_ratio(2, 1).unwrap()));
        assert_eq!(p0.end(), Some(&Time::from_ratio(3, 1).unwrap()));
        let mut text0 = String::new();
        collect_text(&p0.children().to_vec(), &mut text0);
        assert_eq!(text0, "Hi");

        let p1 = body.borrow().child_at(1).unwrap().borrow().child_at(0).unwrap();
        let p1 = p1.borrow();
        assert_eq!(p1.begin(), Some(&Time::from_ratio(3, 1).unwrap()));
        assert_eq!(p1.end(), None);
        let mut text1 = String::new();
        collect_text(&p1.children().to_vec(), &mut text1);
        assert_eq!(text1, "Bye");
    }

    #[test]
    fn zero_length_paragraph_is_dropped() {
        let p = make_paragraph(&empty_grid(), Time::zero(), Some(Time::zero()));
        assert!(p.is_none());
    }

    #[test]
    fn backspace_at_column_zero_is_clamped() {
        let mut m = Machine::new();
        m.cursor = (0, 0);
        m.handle(Code::Control(Control::Bs), &Time::zero());
        assert_eq!(m.cursor, (0, 0));
    }

    #[test]
    fn tab_offset_clamps_at_last_column() {
        let mut m = Machine::new();
        m.cursor = (0, 30);
        m.handle(Code::Control(Control::To(3)), &Time::zero());
        assert_eq!(m.cursor, (0, COLS - 1));
    }

    fn collect_text(nodes: &[std::rc::Rc<std::cell::RefCell<Node>>], out: &mut String) {
        for n in nodes {
            let n = n.borrow();
            match n.kind() {
                ElementKind::Text => out.push_str(n.text().unwrap_or_default()),
                ElementKind::Br => out.push('\n'),
                _ => collect_text(n.children(), out),
            }
        }
    }
}
