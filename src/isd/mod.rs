//! The ISD generator (C4): turns a canonical document and a point in time
//! into a flat, timing-free, fully style-resolved snapshot (sec. 4.2).

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use num_bigint::BigInt;
use num_rational::BigRational;

use crate::cdm::{Document, ElementKind, Node};
use crate::error::{Error, Result};
use crate::style::{self, StyleProperty, Value};
use crate::time::{Interval, Length, PixelResolution, Resolution, Time, Unit};
use crate::utils::PrintableTree;

/// A single materialized region and its resolved content subtree.
#[derive(Clone, Debug, PartialEq)]
pub struct IsdRegion {
    pub id: String,
    pub styles: IndexMap<StyleProperty, Value>,
    pub children: Vec<IsdNode>,
}

/// A node in an ISD subtree. There is no timing, animation, or region-ref
/// left to resolve: `styles` is already a total function over the
/// vocabulary (sec. 8, "style resolution total function").
#[derive(Clone, Debug, PartialEq)]
pub enum IsdNode {
    Element {
        kind: ElementKind,
        lang: Option<String>,
        styles: IndexMap<StyleProperty, Value>,
        children: Vec<IsdNode>,
    },
    Text(String),
    Break,
}

/// The full snapshot at one instant: the materialized regions, in the
/// document's declaration order (sec. 8, invariant 3).
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Isd {
    pub regions: Vec<IsdRegion>,
}

/// A one-line-per-node indented dump, for debug inspection (not part of
/// conversion correctness).
impl fmt::Display for Isd {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for region in &self.regions {
            writeln!(f, "region {}", region.id)?;
            for child in &region.children {
                write_isd_node(f, child, 1)?;
            }
        }
        Ok(())
    }
}

fn write_isd_node(f: &mut fmt::Formatter, node: &IsdNode, depth: usize) -> fmt::Result {
    let indent = "  ".repeat(depth);
    match node {
        IsdNode::Element { kind, children, .. } => {
            writeln!(f, "{}{:?}", indent, kind)?;
            for child in children {
                write_isd_node(f, child, depth + 1)?;
            }
        }
        IsdNode::Text(t) => writeln!(f, "{}Text(\"{}\")", indent, t)?,
        IsdNode::Break => writeln!(f, "{}Br", indent)?,
    }
    Ok(())
}

impl PrintableTree for Isd {}

/// The set of instants at which `generate` can return a different ISD
/// (sec. 4.2 step 1). Walks the whole document unconditionally: even an
/// inactive element's boundary times are significant, since activating it
/// is itself a change.
pub fn sig(doc: &Document) -> Vec<Time> {
    let mut times = vec![Time::zero()];
    if let Some(body) = doc.body() {
        collect_times(body, &Time::zero(), None, &mut times);
    }
    times.sort();
    times.dedup();
    times
}

fn collect_times(node: &Rc<RefCell<Node>>, parent_start: &Time, ancestor_clip: Option<&Time>, times: &mut Vec<Time>) {
    let n = node.borrow();
    let interval = own_interval(&n, parent_start, ancestor_clip);
    times.push(interval.start.clone());
    if let Some(e) = &interval.end {
        times.push(e.clone());
    }
    for step in n.animation_steps() {
        times.push(&interval.start + &step.begin);
        times.push(&interval.start + &step.end);
    }
    for child in n.children() {
        collect_times(child, &interval.start, interval.end.as_ref(), times);
    }
}

/// Generates the ISD of `doc` at `t` (sec. 4.2).
pub fn generate(doc: &Document, t: &Time) -> Result<Isd> {
    let body = match doc.body() {
        Some(b) => b,
        None => return Ok(Isd::default()),
    };
    let default_region = doc.first_region_id().map(String::from);

    let mut used_regions = HashSet::new();
    collect_used_regions(body, t, &Time::zero(), None, default_region.as_deref(), doc, &mut used_regions)?;

    let mut regions = Vec::new();
    for region in doc.regions() {
        let show_background = resolve_region_style(region, StyleProperty::ShowBackground, doc);
        let always_shown = matches!(show_background, Value::Keyword("always"));
        if !used_regions.contains(region.id()) && !always_shown {
            continue;
        }

        let mut children = Vec::new();
        collect(body, t, &Time::zero(), None, &IndexMap::new(), default_region.as_deref(), region.id(), doc, &mut children)?;
        merge_adjacent_text(&mut children);
        prune_empty(&mut children);

        let mut styles = IndexMap::new();
        for &p in style::ALL.iter() {
            let v = resolve_region_style(region, p, doc);
            styles.insert(p, normalize_value(p, v, doc));
        }

        regions.push(IsdRegion { id: region.id().to_string(), styles, children });
    }

    Ok(Isd { regions })
}

/// An element's absolute active interval given its ancestors' contribution
/// to its start and clip (sec. 3.5).
fn own_interval(n: &Node, parent_start: &Time, ancestor_clip: Option<&Time>) -> Interval {
    let own_begin = n.begin().cloned().unwrap_or_else(Time::zero);
    let start = parent_start + &own_begin;
    let own_end = match (n.begin(), n.end()) {
        (Some(b), Some(e)) => Some(&start + &(e - b)),
        _ => None,
    };
    Interval::new(start, own_end).clip(ancestor_clip)
}

/// First pass: which regions does any active element bind to, directly or
/// through an ancestor (sec. 4.2 step 2). Also the only place a dangling
/// region-ref surfaces as an error, since the CDM itself allows it
/// (sec. 4.1 errors: missing-region is an ISD-time error).
fn collect_used_regions(
    node: &Rc<RefCell<Node>>,
    t: &Time,
    parent_start: &Time,
    ancestor_clip: Option<&Time>,
    parent_region: Option<&str>,
    doc: &Document,
    used: &mut HashSet<String>,
) -> Result<()> {
    let n = node.borrow();
    let interval = own_interval(&n, parent_start, ancestor_clip);
    if !interval.contains(t) {
        return Ok(());
    }
    if let Some(r) = n.region_ref() {
        if doc.region(r).is_none() {
            return Err(Error::MissingRegion(r.to_string()));
        }
    }
    let effective_region = n.region_ref().map(String::from).or_else(|| parent_region.map(String::from));
    if let Some(r) = &effective_region {
        used.insert(r.clone());
    }
    for child in n.children() {
        collect_used_regions(child, t, &interval.start, interval.end.as_ref(), effective_region.as_deref(), doc, used)?;
    }
    Ok(())
}

/// Second pass, run once per materialized region: builds that region's
/// subtree (sec. 4.2 step 3). An element whose effective region is not
/// `target_region` contributes nothing of its own, but its active
/// descendants still attach at the nearest point that does bind to it
/// (the "skip-level attach" rule) — modeled by flattening `child_out` into
/// `out` instead of wrapping it.
fn collect(
    node: &Rc<RefCell<Node>>,
    t: &Time,
    parent_start: &Time,
    ancestor_clip: Option<&Time>,
    parent_styles: &IndexMap<StyleProperty, Value>,
    parent_region: Option<&str>,
    target_region: &str,
    doc: &Document,
    out: &mut Vec<IsdNode>,
) -> Result<()> {
    let n = node.borrow();
    let interval = own_interval(&n, parent_start, ancestor_clip);
    if !interval.contains(t) {
        return Ok(());
    }
    if let Some(r) = n.region_ref() {
        if doc.region(r).is_none() {
            return Err(Error::MissingRegion(r.to_string()));
        }
    }
    let effective_region = n.region_ref().map(String::from).or_else(|| parent_region.map(String::from));
    // `Body` is the document's structural root, not a content element in
    // its own right: it never appears as a node in the output, regardless
    // of which region its fallback effective-region resolves to.
    let binds_here = n.kind() != ElementKind::Body && effective_region.as_deref() == Some(target_region);

    match n.kind() {
        ElementKind::Text => {
            if binds_here {
                out.push(IsdNode::Text(n.text().unwrap_or_default().to_string()));
            }
            return Ok(());
        }
        ElementKind::Br => {
            if binds_here {
                out.push(IsdNode::Break);
            }
            return Ok(());
        }
        _ => {}
    }

    let mut own_styles = IndexMap::new();
    for &p in style::ALL.iter().filter(|p| !style::meta(**p).inherited_from_region) {
        let anim = n
            .animation_steps()
            .iter()
            .rev()
            .find(|s| s.property == p && s.is_active_at(t, &interval.start))
            .map(|s| &s.value);
        let inline = n.inline_style(p);
        let value = resolve_property(p, inline, anim, Some(parent_styles), doc);
        own_styles.insert(p, normalize_value(p, value, doc));
    }

    let mut child_out = Vec::new();
    for child in n.children() {
        collect(child, t, &interval.start, interval.end.as_ref(), &own_styles, effective_region.as_deref(), target_region, doc, &mut child_out)?;
    }

    if binds_here {
        out.push(IsdNode::Element {
            kind: n.kind(),
            lang: n.lang().map(String::from),
            styles: own_styles,
            children: child_out,
        });
    } else {
        out.extend(child_out);
    }
    Ok(())
}

/// The cascade from sec. 3.4: animation, then inline, then (if inheritable)
/// the parent's already-resolved value, then the document initial value,
/// then the property default. Region-only properties never reach the
/// inherit step since the table marks them non-inheritable; they are
/// resolved directly against the region they belong to instead.
fn resolve_property(
    p: StyleProperty,
    inline: Option<&Value>,
    animated: Option<&Value>,
    parent: Option<&IndexMap<StyleProperty, Value>>,
    doc: &Document,
) -> Value {
    if let Some(v) = animated {
        return v.clone();
    }
    if let Some(v) = inline {
        return v.clone();
    }
    if style::meta(p).inheritable {
        if let Some(v) = parent.and_then(|m| m.get(&p)) {
            return v.clone();
        }
    }
    if let Some(v) = doc.initial_value(p) {
        return v.clone();
    }
    style::meta(p).default
}

fn resolve_region_style(region: &crate::cdm::Region, p: StyleProperty, doc: &Document) -> Value {
    resolve_property(p, region.inline_style(p), None, None, doc)
}

/// Length normalization (sec. 4.2 step 5): every length in the output is
/// expressed in root-relative units. `position` does not exist as a
/// property in this vocabulary (sec. 4.4); its role is already folded into
/// `origin`.
fn normalize_value(p: StyleProperty, v: Value, doc: &Document) -> Value {
    let cell = doc.cell_resolution();
    let px = doc.px_resolution();
    match (p, v) {
        (StyleProperty::Origin, Value::LengthPair(x, y)) | (StyleProperty::Extent, Value::LengthPair(x, y)) => {
            Value::LengthPair(normalize_length(&x, true, cell, px), normalize_length(&y, false, cell, px))
        }
        (StyleProperty::Padding, Value::Padding([top, right, bottom, left])) => Value::Padding([
            normalize_length(&top, false, cell, px),
            normalize_length(&right, true, cell, px),
            normalize_length(&bottom, false, cell, px),
            normalize_length(&left, true, cell, px),
        ]),
        (StyleProperty::FontSize, Value::Length(l)) | (StyleProperty::LineHeight, Value::Length(l)) => {
            Value::Length(normalize_length(&l, false, cell, px))
        }
        (_, other) => other,
    }
}

fn normalize_length(l: &Length, horizontal: bool, cell: Resolution, px: PixelResolution) -> Length {
    let unit = if horizontal { Unit::RootWidth } else { Unit::RootHeight };
    let value = match l.unit {
        Unit::Percent | Unit::RootWidth | Unit::RootHeight => l.value.clone(),
        Unit::Cell | Unit::Em => {
            let divisor = if horizontal { cell.columns } else { cell.rows };
            scale_to_percent(&l.value, divisor)
        }
        Unit::Pixel => {
            let divisor = if horizontal { px.width } else { px.height };
            scale_to_percent(&l.value, divisor)
        }
    };
    Length::from_rational(value, unit)
}

fn scale_to_percent(value: &BigRational, divisor: u32) -> BigRational {
    let divisor = BigRational::from_integer(BigInt::from(divisor));
    let hundred = BigRational::from_integer(BigInt::from(100));
    (value.clone() / divisor) * hundred
}

/// Merges adjacent `Text` siblings (sec. 4.2 step 6), recursively.
fn merge_adjacent_text(nodes: &mut Vec<IsdNode>) {
    let mut merged: Vec<IsdNode> = Vec::with_capacity(nodes.len());
    for n in nodes.drain(..) {
        match (merged.last_mut(), &n) {
            (Some(IsdNode::Text(prev)), IsdNode::Text(cur)) => prev.push_str(cur),
            _ => merged.push(n),
        }
    }
    for n in merged.iter_mut() {
        if let IsdNode::Element { children, .. } = n {
            merge_adjacent_text(children);
        }
    }
    *nodes = merged;
}

/// Drops `Span`/`P` subtrees with no active descendants, unless they carry
/// a visible background (sec. 4.2 step 6).
fn prune_empty(nodes: &mut Vec<IsdNode>) {
    for n in nodes.iter_mut() {
        if let IsdNode::Element { children, .. } = n {
            prune_empty(children);
        }
    }
    nodes.retain(|n| match n {
        IsdNode::Element { kind, children, styles, .. } if matches!(kind, ElementKind::P | ElementKind::Span) => {
            !children.is_empty() || has_visible_background(styles)
        }
        _ => true,
    });
}

fn has_visible_background(styles: &IndexMap<StyleProperty, Value>) -> bool {
    matches!(styles.get(&StyleProperty::BackgroundColor), Some(Value::Color(c)) if c.a > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdm::{AnimationStep, Region};
    use crate::time::Color;

    fn sec(n: i64) -> Time {
        Time::from_ratio(n, 1).unwrap()
    }

    #[test]
    fn sig_is_sorted_deduped_and_starts_at_zero() {
        let mut doc = Document::new();
        let body = Node::new(ElementKind::Body);
        let div = Node::new(ElementKind::Div);
        div.borrow_mut().set_timing(Some(sec(1)), Some(sec(3))).unwrap();
        Node::append_child(&body, div).unwrap();
        doc.set_body(body).unwrap();

        let times = sig(&doc);
        assert_eq!(times[0], Time::zero());
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
        let mut deduped = times.clone();
        deduped.dedup();
        assert_eq!(times, deduped);
    }

    /// End-to-end scenario 3 (sec. 8): an ISD at a region boundary.
    #[test]
    fn isd_at_boundary_drops_whenactive_region_past_its_end() {
        let mut doc = Document::new();
        doc.add_region(Region::new("r1")).unwrap();

        let body = Node::new(ElementKind::Body);
        let div = Node::new(ElementKind::Div);
        div.borrow_mut().set_timing(Some(sec(1)), Some(sec(3))).unwrap();
        div.borrow_mut().set_region_ref(Some("r1".to_string())).unwrap();
        let p = Node::new(ElementKind::P);
        let span = Node::new(ElementKind::Span);
        let text = Node::new_text("X");
        Node::append_child(&span, text).unwrap();
        Node::append_child(&p, span).unwrap();
        Node::append_child(&div, p).unwrap();
        Node::append_child(&body, div).unwrap();
        doc.set_body(body).unwrap();

        let isd_at_1 = generate(&doc, &sec(1)).unwrap();
        assert_eq!(isd_at_1.regions.len(), 1);
        assert_eq!(isd_at_1.regions[0].id, "r1");

        let isd_at_3 = generate(&doc, &sec(3)).unwrap();
        assert!(isd_at_3.regions.is_empty());
    }

    /// End-to-end scenario 4 (sec. 8): an active animation step overrides
    /// the inline value, then reverts once it ends.
    #[test]
    fn animation_step_overrides_then_reverts() {
        let mut doc = Document::new();
        doc.add_region(Region::new("r1")).unwrap();
        let body = Node::new(ElementKind::Body);
        let div = Node::new(ElementKind::Div);
        div.borrow_mut().set_region_ref(Some("r1".to_string())).unwrap();
        let p = Node::new(ElementKind::P);
        let span = Node::new(ElementKind::Span);
        span.borrow_mut().set_style(StyleProperty::Color, Value::Color(Color::rgb(255, 0, 0))).unwrap();
        span.borrow_mut()
            .add_animation_step(AnimationStep::new(sec(1), sec(2), StyleProperty::Color, Value::Color(Color::rgb(0, 255, 0))).unwrap())
            .unwrap();
        let text = Node::new_text("t");
        Node::append_child(&span, text).unwrap();
        Node::append_child(&p, span).unwrap();
        Node::append_child(&div, p).unwrap();
        Node::append_child(&body, div).unwrap();
        doc.set_body(body).unwrap();

        let color_at = |isd: &Isd| -> Value {
            fn find(nodes: &[IsdNode]) -> Option<Value> {
                for n in nodes {
                    if let IsdNode::Element { kind, styles, children, .. } = n {
                        if *kind == ElementKind::Span {
                            return styles.get(&StyleProperty::Color).cloned();
                        }
                        if let Some(v) = find(children) {
                            return Some(v);
                        }
                    }
                }
                None
            }
            find(&isd.regions[0].children).unwrap()
        };

        assert_eq!(color_at(&generate(&doc, &Time::from_ratio(1, 2).unwrap()).unwrap()), Value::Color(Color::rgb(255, 0, 0)));
        assert_eq!(color_at(&generate(&doc, &Time::from_ratio(3, 2).unwrap()).unwrap()), Value::Color(Color::rgb(0, 255, 0)));
        assert_eq!(color_at(&generate(&doc, &sec(2)).unwrap()), Value::Color(Color::rgb(255, 0, 0)));
    }

    /// End-to-end scenario 5 (sec. 8): inheritance down an unstyled chain.
    #[test]
    fn style_cascade_inherits_through_unstyled_ancestors() {
        let mut doc = Document::new();
        doc.add_region(Region::new("r1")).unwrap();
        let body = Node::new(ElementKind::Body);
        body.borrow_mut().set_style(StyleProperty::Color, Value::Color(Color::rgb(0, 0, 255))).unwrap();
        let div = Node::new(ElementKind::Div);
        div.borrow_mut().set_region_ref(Some("r1".to_string())).unwrap();
        let p = Node::new(ElementKind::P);
        let span = Node::new(ElementKind::Span);
        let text = Node::new_text("t");
        Node::append_child(&span, text).unwrap();
        Node::append_child(&p, span).unwrap();
        Node::append_child(&div, p).unwrap();
        Node::append_child(&body, div).unwrap();
        doc.set_body(body).unwrap();

        let isd = generate(&doc, &Time::zero()).unwrap();
        fn span_color(nodes: &[IsdNode]) -> Option<Value> {
            for n in nodes {
                if let IsdNode::Element { kind, styles, children, .. } = n {
                    if *kind == ElementKind::Span {
                        return styles.get(&StyleProperty::Color).cloned();
                    }
                    if let Some(v) = span_color(children) {
                        return Some(v);
                    }
                }
            }
            None
        }
        assert_eq!(span_color(&isd.regions[0].children), Some(Value::Color(Color::rgb(0, 0, 255))));
    }

    /// End-to-end scenario 6 (sec. 8): percentage lengths are preserved
    /// when relabeled as root-relative units.
    #[test]
    fn length_normalization_preserves_percentage_values() {
        let mut doc = Document::new();
        let mut r1 = Region::new("r1");
        r1.set_style(
            StyleProperty::Origin,
            Value::LengthPair(Length::new(10.0, Unit::Percent), Length::new(20.0, Unit::Percent)),
        )
        .unwrap();
        r1.set_style(StyleProperty::ShowBackground, Value::Keyword("always")).unwrap();
        doc.add_region(r1).unwrap();
        let body = Node::new(ElementKind::Body);
        doc.set_body(body).unwrap();

        let isd = generate(&doc, &Time::zero()).unwrap();
        let origin = isd.regions[0].styles.get(&StyleProperty::Origin).unwrap();
        assert_eq!(origin, &Value::LengthPair(Length::new(10.0, Unit::RootWidth), Length::new(20.0, Unit::RootHeight)));
    }

    #[test]
    fn zero_length_element_is_never_active() {
        let mut doc = Document::new();
        doc.add_region(Region::new("r1")).unwrap();
        let body = Node::new(ElementKind::Body);
        let div = Node::new(ElementKind::Div);
        div.borrow_mut().set_timing(Some(sec(5)), Some(sec(5))).unwrap();
        div.borrow_mut().set_region_ref(Some("r1".to_string())).unwrap();
        Node::append_child(&body, div).unwrap();
        doc.set_body(body).unwrap();

        assert!(generate(&doc, &sec(5)).unwrap().regions.is_empty());
    }

    #[test]
    fn dangling_region_ref_is_a_missing_region_error_only_at_generation() {
        let mut doc = Document::new();
        let body = Node::new(ElementKind::Body);
        let div = Node::new(ElementKind::Div);
        div.borrow_mut().set_region_ref(Some("ghost".to_string())).unwrap();
        Node::append_child(&body, div).unwrap();
        doc.set_body(body).unwrap();

        let err = generate(&doc, &Time::zero()).unwrap_err();
        assert!(matches!(err, Error::MissingRegion(_)));
    }

    #[test]
    fn always_shown_region_materializes_with_no_active_content() {
        let mut doc = Document::new();
        let mut r1 = Region::new("r1");
        r1.set_style(StyleProperty::ShowBackground, Value::Keyword("always")).unwrap();
        doc.add_region(r1).unwrap();
        let body = Node::new(ElementKind::Body);
        doc.set_body(body).unwrap();

        let isd = generate(&doc, &Time::zero()).unwrap();
        assert_eq!(isd.regions.len(), 1);
        assert!(isd.regions[0].children.is_empty());
    }
}
