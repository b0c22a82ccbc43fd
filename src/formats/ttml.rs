//! IMSC 1.1 Text Profile (TTML) reader/writer (sec. 10.5), built on
//! `quick-xml` the way the pack's markup-format crates (dash-mpd-rs,
//! spreadsheet-ods) stream a subset of a markup format into a typed tree.
//! Referential/chained styling is flattened to inline at parse time per
//! sec. 1's non-goals; unsupported constructs (tickRate, zIndex, metadata)
//! are logged at WARN and skipped (sec. 7 unsupported-feature).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::reader::Reader as XmlReader;
use quick_xml::writer::Writer as XmlWriter;

use crate::cdm::{Document, ElementKind, Node, Region};
use crate::config::{Config, ProfileSignaling, TimeFormat};
use crate::error::{Error, Result};
use crate::formats::{ProgressFn, Reader, Writer};
use crate::isd::{generate as generate_isd, sig, IsdNode};
use crate::style::{self, Domain, StyleProperty, Value};
use crate::time::{Color, Length, Time, Unit};

pub struct TtmlReader;
pub struct TtmlWriter;

impl Reader for TtmlReader {
    fn read(&self, input: &str, _config: &Config) -> Result<Document> {
        parse(input)
    }
}

impl Writer for TtmlWriter {
    fn write(&self, doc: &Document, config: &Config, on_progress: &mut ProgressFn) -> Result<String> {
        serialize(doc, config, on_progress)
    }
}

fn local_name(qname: &[u8]) -> &str {
    let s = std::str::from_utf8(qname).unwrap_or("");
    s.rsplit(':').next().unwrap_or(s)
}

fn attr_local_name(key: &[u8]) -> &str {
    local_name(key)
}

fn style_property_for(name: &str) -> Option<StyleProperty> {
    use StyleProperty::*;
    Some(match name {
        "color" => Color,
        "backgroundColor" => BackgroundColor,
        "fontFamily" => FontFamily,
        "fontSize" => FontSize,
        "fontStyle" => FontStyle,
        "fontWeight" => FontWeight,
        "lineHeight" => LineHeight,
        "opacity" => Opacity,
        "textAlign" => TextAlign,
        "textDecoration" => TextDecoration,
        "direction" => Direction,
        "writingMode" => WritingMode,
        "display" => Display,
        "displayAlign" => DisplayAlign,
        "extent" => Extent,
        "origin" => Origin,
        "padding" => Padding,
        "showBackground" => ShowBackground,
        "overflow" => Overflow,
        "wrapOption" => WrapOption,
        "unicodeBidi" => UnicodeBidi,
        "visibility" => Visibility,
        "ruby" => Ruby,
        "rubyPosition" => RubyPosition,
        "rubyAlign" => RubyAlign,
        _ => return None,
    })
}

fn kind_for(tag: &str) -> Option<ElementKind> {
    use ElementKind::*;
    Some(match tag {
        "body" => Body,
        "div" => Div,
        "p" => P,
        "span" => Span,
        "ruby" => Ruby,
        "rb" => Rb,
        "rt" => Rt,
        "rbc" => Rbc,
        "rtc" => Rtc,
        "rp" => Rp,
        "br" => Br,
        _ => return None,
    })
}

fn parse_length(raw: &str) -> Result<Length> {
    let raw = raw.trim();
    let (value_part, unit) = if let Some(v) = raw.strip_suffix("px") {
        (v, Unit::Pixel)
    } else if let Some(v) = raw.strip_suffix('%') {
        (v, Unit::Percent)
    } else if let Some(v) = raw.strip_suffix("em") {
        (v, Unit::Em)
    } else if let Some(v) = raw.strip_suffix("rh") {
        (v, Unit::RootHeight)
    } else if let Some(v) = raw.strip_suffix("rw") {
        (v, Unit::RootWidth)
    } else if let Some(v) = raw.strip_suffix('c') {
        (v, Unit::Cell)
    } else {
        (raw, Unit::Pixel)
    };
    let value: f64 = value_part.trim().parse().map_err(|_| Error::Parse(format!("bad length: {}", raw)))?;
    Ok(Length::new(value, unit))
}

fn named_color(name: &str) -> Option<Color> {
    Some(match name {
        "white" => Color::WHITE,
        "black" => Color::BLACK,
        "transparent" => Color::TRANSPARENT,
        "red" => Color::rgb(255, 0, 0),
        "green" => Color::rgb(0, 128, 0),
        "lime" => Color::rgb(0, 255, 0),
        "blue" => Color::rgb(0, 0, 255),
        "yellow" => Color::rgb(255, 255, 0),
        "cyan" | "aqua" => Color::rgb(0, 255, 255),
        "magenta" | "fuchsia" => Color::rgb(255, 0, 255),
        "silver" => Color::rgb(192, 192, 192),
        "gray" | "grey" => Color::rgb(128, 128, 128),
        "maroon" => Color::rgb(128, 0, 0),
        "purple" => Color::rgb(128, 0, 128),
        "olive" => Color::rgb(128, 128, 0),
        "navy" => Color::rgb(0, 0, 128),
        "teal" => Color::rgb(0, 128, 128),
        "orange" => Color::rgb(255, 165, 0),
        _ => return None,
    })
}

fn parse_color(raw: &str) -> Result<Color> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix('#') {
        let byte = |i: usize| -> Result<u8> {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| Error::Parse(format!("bad color: {}", raw)))
        };
        return match hex.len() {
            6 => Ok(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Ok(Color::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => Err(Error::Parse(format!("bad color: {}", raw))),
        };
    }
    named_color(raw).ok_or_else(|| Error::Parse(format!("unknown color: {}", raw)))
}

/// Parses a raw TTML style-attribute value into a `Value` matching `prop`'s
/// declared domain (sec. 4.4).
fn parse_style_value(prop: StyleProperty, raw: &str) -> Result<Value> {
    let meta = style::meta(prop);
    match meta.domain {
        Domain::Enum(allowed) => {
            let token = raw.trim();
            allowed
                .iter()
                .find(|a| **a == token)
                .map(|a| Value::Keyword(a))
                .ok_or_else(|| Error::Parse(format!("{:?}: unrecognized keyword {:?}", prop, raw)))
        }
        Domain::Length => {
            if raw.trim() == "normal" && prop == StyleProperty::LineHeight {
                return Ok(Value::Keyword("normal"));
            }
            Ok(Value::Length(parse_length(raw)?))
        }
        Domain::LengthPair => {
            let parts: Vec<&str> = raw.split_whitespace().collect();
            if parts.len() != 2 {
                return Err(Error::Parse(format!("{:?}: expected two lengths, got {:?}", prop, raw)));
            }
            Ok(Value::LengthPair(parse_length(parts[0])?, parse_length(parts[1])?))
        }
        Domain::Padding => {
            let parts: Vec<&str> = raw.split_whitespace().collect();
            let lengths = match parts.len() {
                1 => [parts[0]; 4],
                4 => [parts[0], parts[1], parts[2], parts[3]],
                _ => return Err(Error::Parse(format!("padding: expected 1 or 4 lengths, got {:?}", raw))),
            };
            Ok(Value::Padding([
                parse_length(lengths[0])?,
                parse_length(lengths[1])?,
                parse_length(lengths[2])?,
                parse_length(lengths[3])?,
            ]))
        }
        Domain::Color => Ok(Value::Color(parse_color(raw)?)),
        Domain::Fraction(_, _) => Ok(Value::Number(raw.trim().parse().map_err(|_| Error::Parse(format!("bad fraction: {}", raw)))?)),
        Domain::FontFamilyList => Ok(Value::FontFamily(raw.split(',').map(|s| s.trim().to_string()).collect())),
    }
}

/// Clock-time (`HH:MM:SS(.mmm)?`) or a bare frame count (`NNNf`) at 30fps.
/// Ticks (`Nt`) are an unsupported-feature: logged, element left untimed.
fn parse_time(raw: &str) -> Option<Time> {
    let raw = raw.trim();
    if let Some(frames) = raw.strip_suffix('f') {
        return frames.parse::<i64>().ok().and_then(|f| Time::from_frames(f, 30, 1).ok());
    }
    if raw.ends_with('t') {
        log::warn!("ttml: tick-based timing {:?} is unsupported, element left untimed", raw);
        return None;
    }
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hh: i64 = parts[0].parse().ok()?;
    let mm: i64 = parts[1].parse().ok()?;
    let sec_parts: Vec<&str> = parts[2].split('.').collect();
    let ss: i64 = sec_parts.first()?.parse().ok()?;
    let millis: i64 = match sec_parts.get(1) {
        Some(m) => format!("{:0<3}", &m[..m.len().min(3)]).parse().ok()?,
        None => 0,
    };
    Time::from_ratio(hh * 3_600_000 + mm * 60_000 + ss * 1_000 + millis, 1000).ok()
}

struct ParseState {
    doc: Document,
    style_defs: HashMap<String, Vec<(StyleProperty, Value)>>,
    stack: Vec<Rc<RefCell<Node>>>,
    in_head: bool,
    current_region_id: Option<String>,
}

fn collect_styles(attrs: &[(String, String)], style_defs: &HashMap<String, Vec<(StyleProperty, Value)>>) -> Vec<(StyleProperty, Value)> {
    let mut out = Vec::new();
    for (name, value) in attrs {
        if name == "style" {
            for id in value.split_whitespace() {
                if let Some(defs) = style_defs.get(id) {
                    out.extend(defs.iter().cloned());
                }
            }
        }
    }
    for (name, value) in attrs {
        if let Some(prop) = style_property_for(name) {
            match parse_style_value(prop, value) {
                Ok(v) => {
                    out.retain(|(p, _)| *p != prop);
                    out.push((prop, v));
                }
                Err(e) => log::warn!("ttml: {}", e),
            }
        }
    }
    out
}

fn parse(input: &str) -> Result<Document> {
    let mut xml = XmlReader::from_str(input);
    xml.config_mut().trim_text(true);

    let mut state = ParseState {
        doc: Document::new(),
        style_defs: HashMap::new(),
        stack: Vec::new(),
        in_head: false,
        current_region_id: None,
    };
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => handle_start(&mut state, &e, false)?,
            Ok(Event::Empty(e)) => handle_start(&mut state, &e, true)?,
            Ok(Event::End(e)) => handle_end(&mut state, local_name(e.name().as_ref()))?,
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| Error::Parse(e.to_string()))?.into_owned();
                if !text.is_empty() {
                    if let Some(parent) = state.stack.last() {
                        let node = Node::new_text(text);
                        Node::append_child(parent, node)?;
                    }
                }
            }
            Ok(_) => {}
            Err(e) => return Err(Error::Parse(e.to_string())),
        }
        buf.clear();
    }

    Ok(state.doc)
}

fn read_attrs(e: &BytesStart) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for a in e.attributes() {
        let a = a.map_err(|e| Error::Parse(e.to_string()))?;
        let name = attr_local_name(a.key.as_ref()).to_string();
        let value = a.unescape_value().map_err(|e| Error::Parse(e.to_string()))?.into_owned();
        out.push((name, value));
    }
    Ok(out)
}

fn handle_start(state: &mut ParseState, e: &BytesStart, self_closing: bool) -> Result<()> {
    let tag = local_name(e.name().as_ref()).to_string();
    let attrs = read_attrs(e)?;

    match tag.as_str() {
        "tt" => {
            for (name, value) in &attrs {
                match name.as_str() {
                    "lang" => state.doc.set_lang(Some(value.clone())),
                    "cellResolution" => {
                        let parts: Vec<&str> = value.split_whitespace().collect();
                        if parts.len() == 2 {
                            if let (Ok(c), Ok(r)) = (parts[0].parse(), parts[1].parse()) {
                                state.doc.set_cell_resolution(crate::time::Resolution { columns: c, rows: r });
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        "head" => state.in_head = true,
        "style" if state.in_head => {
            if let Some((_, id)) = attrs.iter().find(|(n, _)| n == "id") {
                let styles = collect_styles(&attrs, &state.style_defs);
                state.style_defs.insert(id.clone(), styles);
            }
        }
        "region" if state.in_head => {
            let id = attrs.iter().find(|(n, _)| n == "id").map(|(_, v)| v.clone()).unwrap_or_else(|| "region".to_string());
            let mut region = Region::new(id);
            for (prop, value) in collect_styles(&attrs, &state.style_defs) {
                region.set_style(prop, value)?;
            }
            state.doc.add_region(region)?;
        }
        "tickRate" | "zIndex" | "metadata" => {
            log::warn!("ttml: unsupported construct <{}> skipped", tag);
        }
        _ => {
            if let Some(kind) = kind_for(&tag) {
                let node = Node::new(kind);
                for (prop, value) in collect_styles(&attrs, &state.style_defs) {
                    node.borrow_mut().set_style(prop, value)?;
                }
                let begin = attrs.iter().find(|(n, _)| n == "begin").and_then(|(_, v)| parse_time(v));
                let end = attrs.iter().find(|(n, _)| n == "end").and_then(|(_, v)| parse_time(v));
                if begin.is_some() || end.is_some() {
                    node.borrow_mut().set_timing(begin, end)?;
                }
                if let Some((_, region)) = attrs.iter().find(|(n, _)| n == "region") {
                    node.borrow_mut().set_region_ref(Some(region.clone()))?;
                }
                if let Some((_, lang)) = attrs.iter().find(|(n, _)| n == "lang") {
                    node.borrow_mut().set_lang(Some(lang.clone()));
                }

                if kind == ElementKind::Body && state.doc.body().is_none() {
                    state.doc.set_body(Rc::clone(&node))?;
                } else if let Some(parent) = state.stack.last() {
                    Node::append_child(parent, Rc::clone(&node))?;
                }
                if !self_closing {
                    state.stack.push(node);
                }
            }
        }
    }
    Ok(())
}

fn handle_end(state: &mut ParseState, tag: &str) -> Result<()> {
    match tag {
        "head" => state.in_head = false,
        _ => {
            if kind_for(tag).is_some() {
                state.stack.pop();
            }
        }
    }
    Ok(())
}

fn format_time(t: &Time, config: &Config) -> String {
    let (num, den) = config.imsc_writer.fps;
    match config.imsc_writer.time_format {
        TimeFormat::Frames => format!("{}f", t.to_frames(num, den)),
        TimeFormat::ClockTime => {
            let total_ms = (t.to_f64() * 1000.0).round() as i64;
            let (hh, rem) = (total_ms / 3_600_000, total_ms % 3_600_000);
            let (mm, rem) = (rem / 60_000, rem % 60_000);
            let (ss, ms) = (rem / 1000, rem % 1000);
            format!("{:02}:{:02}:{:02}.{:03}", hh, mm, ss, ms)
        }
        TimeFormat::ClockTimeWithFrames => {
            let frames = t.to_frames(num, den);
            let whole_secs = (frames as f64 * den as f64 / num as f64).floor() as i64;
            let (hh, rem) = (whole_secs / 3600, whole_secs % 3600);
            let (mm, ss) = (rem / 60, rem % 60);
            let frame_in_sec = frames - (whole_secs * num / den);
            format!("{:02}:{:02}:{:02}:{:02}", hh, mm, ss, frame_in_sec.max(0))
        }
    }
}

fn style_attr_name(p: StyleProperty) -> &'static str {
    use StyleProperty::*;
    match p {
        Color => "tts:color",
        BackgroundColor => "tts:backgroundColor",
        FontFamily => "tts:fontFamily",
        FontSize => "tts:fontSize",
        FontStyle => "tts:fontStyle",
        FontWeight => "tts:fontWeight",
        LineHeight => "tts:lineHeight",
        Opacity => "tts:opacity",
        TextAlign => "tts:textAlign",
        TextDecoration => "tts:textDecoration",
        Direction => "tts:direction",
        WritingMode => "tts:writingMode",
        Display => "tts:display",
        DisplayAlign => "tts:displayAlign",
        Extent => "tts:extent",
        Origin => "tts:origin",
        Padding => "tts:padding",
        ShowBackground => "tts:showBackground",
        Overflow => "tts:overflow",
        WrapOption => "tts:wrapOption",
        UnicodeBidi => "tts:unicodeBidi",
        Visibility => "tts:visibility",
        Ruby => "tts:ruby",
        RubyPosition => "tts:rubyPosition",
        RubyAlign => "tts:rubyAlign",
    }
}

fn tag_for(kind: ElementKind) -> &'static str {
    use ElementKind::*;
    match kind {
        Body => "body",
        Div => "div",
        P => "p",
        Span => "span",
        Ruby => "ruby",
        Rb => "rb",
        Rt => "rt",
        Rbc => "rbc",
        Rtc => "rtc",
        Rp => "rp",
        Br => "br",
        Text => unreachable!("Text is never written as a tag"),
    }
}

fn serialize(doc: &Document, config: &Config, on_progress: &mut ProgressFn) -> Result<String> {
    let mut out = Vec::new();
    {
        let mut w = XmlWriter::new_with_indent(&mut out, b' ', 2);
        let mut tt = BytesStart::new("tt");
        tt.push_attribute(("xmlns", "http://www.w3.org/ns/ttml"));
        tt.push_attribute(("xmlns:tts", "http://www.w3.org/ns/ttml#styling"));
        if let Some(lang) = doc.lang() {
            tt.push_attribute(("xml:lang", lang));
        }
        if config.imsc_writer.profile_signaling == ProfileSignaling::ContentProfiles {
            for p in doc.profiles() {
                tt.push_attribute(("ttp:contentProfiles", p));
            }
        }
        w.write_event(Event::Start(tt.clone())).map_err(xml_err)?;

        w.write_event(Event::Start(BytesStart::new("head"))).map_err(xml_err)?;
        w.write_event(Event::Start(BytesStart::new("layout"))).map_err(xml_err)?;
        for region in doc.regions() {
            let mut r = BytesStart::new("region");
            r.push_attribute(("xml:id", region.id()));
            for (prop, value) in region.inline_styles() {
                r.push_attribute((style_attr_name(prop), value.to_string().as_str()));
            }
            w.write_event(Event::Empty(r)).map_err(xml_err)?;
        }
        w.write_event(Event::End(quick_xml::events::BytesEnd::new("layout"))).map_err(xml_err)?;
        w.write_event(Event::End(quick_xml::events::BytesEnd::new("head"))).map_err(xml_err)?;

        w.write_event(Event::Start(BytesStart::new("body"))).map_err(xml_err)?;

        let times = sig(doc);
        let total = times.len();
        for (i, window) in times.windows(2).enumerate() {
            let start = &window[0];
            let end = &window[1];
            let isd = generate_isd(doc, start)?;
            for region in &isd.regions {
                if region.children.is_empty() {
                    continue;
                }
                let mut div = BytesStart::new("div");
                div.push_attribute(("region", region.id.as_str()));
                w.write_event(Event::Start(div)).map_err(xml_err)?;
                for child in &region.children {
                    write_isd_node(&mut w, child, Some((start, end)), config)?;
                }
                w.write_event(Event::End(quick_xml::events::BytesEnd::new("div"))).map_err(xml_err)?;
            }
            on_progress(i + 1, total.saturating_sub(1).max(1));
        }

        w.write_event(Event::End(quick_xml::events::BytesEnd::new("body"))).map_err(xml_err)?;
        w.write_event(Event::End(quick_xml::events::BytesEnd::new("tt"))).map_err(xml_err)?;
    }
    String::from_utf8(out).map_err(|e| Error::Other(e.to_string()))
}

fn xml_err(e: impl std::fmt::Display) -> Error {
    Error::Other(format!("xml write error: {}", e))
}

fn write_isd_node(w: &mut XmlWriter<&mut Vec<u8>>, node: &IsdNode, timing: Option<(&Time, &Time)>, config: &Config) -> Result<()> {
    match node {
        IsdNode::Text(text) => {
            w.write_event(Event::Text(BytesText::new(text))).map_err(xml_err)?;
        }
        IsdNode::Break => {
            w.write_event(Event::Empty(BytesStart::new("br"))).map_err(xml_err)?;
        }
        IsdNode::Element { kind, styles, children, .. } => {
            let tag = tag_for(*kind);
            let mut start = BytesStart::new(tag);
            if *kind == ElementKind::P {
                if let Some((begin, end)) = timing {
                    start.push_attribute(("begin", format_time(begin, config).as_str()));
                    start.push_attribute(("end", format_time(end, config).as_str()));
                }
            }
            for (prop, value) in styles {
                start.push_attribute((style_attr_name(*prop), value.to_string().as_str()));
            }
            w.write_event(Event::Start(start.clone())).map_err(xml_err)?;
            for child in children {
                write_isd_node(w, child, timing, config)?;
            }
            w.write_event(Event::End(quick_xml::events::BytesEnd::new(tag))).map_err(xml_err)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdm::{ElementKind, Node};

    #[test]
    fn parses_basic_body_div_p_span() {
        let xml = r#"<tt xmlns="http://www.w3.org/ns/ttml">
            <head><layout><region xml:id="r1"/></layout></head>
            <body><div><p region="r1" begin="00:00:01.000" end="00:00:02.000">
                <span tts:color="red">Hi</span>
            </p></div></body>
        </tt>"#;
        let doc = TtmlReader.read(xml, &Config::default()).unwrap();
        let body = doc.body().unwrap();
        assert_eq!(body.borrow().kind(), ElementKind::Body);
        let div = body.borrow().child_at(0).unwrap();
        let p = div.borrow().child_at(0).unwrap();
        assert_eq!(p.borrow().region_ref(), Some("r1"));
        assert_eq!(p.borrow().begin(), Some(&Time::from_ratio(1, 1).unwrap()));
    }

    #[test]
    fn style_element_is_flattened_into_referrer() {
        let xml = r#"<tt xmlns="http://www.w3.org/ns/ttml">
            <head><styling><style xml:id="s1" tts:color="blue"/></styling>
            <layout><region xml:id="r1"/></layout></head>
            <body><div><p region="r1"><span style="s1">Hi</span></p></div></body>
        </tt>"#;
        let doc = TtmlReader.read(xml, &Config::default()).unwrap();
        let body = doc.body().unwrap();
        let div = body.borrow().child_at(0).unwrap();
        let p = div.borrow().child_at(0).unwrap();
        let span = p.borrow().child_at(0).unwrap();
        assert_eq!(span.borrow().inline_style(StyleProperty::Color), Some(&Value::Color(Color::rgb(0, 0, 255))));
    }

    #[test]
    fn writer_emits_region_and_p_for_active_interval() {
        let mut doc = Document::new();
        doc.add_region(Region::new("r1")).unwrap();
        let body = Node::new(ElementKind::Body);
        let div = Node::new(ElementKind::Div);
        div.borrow_mut().set_region_ref(Some("r1".to_string())).unwrap();
        let p = Node::new(ElementKind::P);
        p.borrow_mut().set_timing(Some(Time::zero()), Some(Time::from_ratio(1, 1).unwrap())).unwrap();
        let span = Node::new(ElementKind::Span);
        Node::append_child(&span, Node::new_text("hi")).unwrap();
        Node::append_child(&p, span).unwrap();
        Node::append_child(&div, p).unwrap();
        Node::append_child(&body, div).unwrap();
        doc.set_body(body).unwrap();

        let out = TtmlWriter.write(&doc, &Config::default(), &mut |_, _| {}).unwrap();
        assert!(out.contains("<p"));
        assert!(out.contains("region=\"r1\""));
    }
}
