//! Content elements and the tree mutation API (sec. 3.3, 3.6, 4.1).

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::style::{self, StyleProperty, Value};
use crate::time::Time;

/// The closed variant set of element kinds (sec. 3.3). `Region` is not a
/// member of this tree: it is never a child and never has a parent. It is
/// held in `Document`'s region table and referenced by id (sec. 3.2, 9).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Body,
    Div,
    P,
    Span,
    Ruby,
    Rb,
    Rt,
    Rbc,
    Rtc,
    Rp,
    Br,
    Text,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The grammar table from sec. 3.3: the allowed child kinds per parent
/// kind, enforced on every `append_child`.
fn allowed_children(kind: ElementKind) -> &'static [ElementKind] {
    use ElementKind::*;
    match kind {
        Body => &[Div],
        Div => &[Div, P],
        P => &[Span, Ruby, Br, Text],
        Span => &[Span, Ruby, Br, Text],
        Ruby => &[Rb, Rt, Rbc, Rtc, Rp],
        Rbc => &[Rb],
        Rtc => &[Rt],
        Rb | Rt | Rp => &[Span, Br, Text],
        Br | Text => &[],
    }
}

/// The region-only properties (sec. 4.4's "inherited from region" list)
/// that a content element must never carry inline; they only make sense on
/// a `Region`.
fn region_only(prop: StyleProperty) -> bool {
    style::meta(prop).inherited_from_region
}

/// One step of a parallel animation: a temporary override of a single
/// style property over an interval relative to its element's own timing
/// (sec. 3.3, 3.5).
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationStep {
    pub begin: Time,
    pub end: Time,
    pub property: StyleProperty,
    pub value: Value,
}

impl AnimationStep {
    pub fn new(begin: Time, end: Time, property: StyleProperty, value: Value) -> Result<Self> {
        if end < begin {
            return Err(Error::Domain("animation step end precedes begin".into()));
        }
        style::validate(property, &value)?;
        Ok(Self { begin, end, property, value })
    }

    /// `t` is absolute document time; `interval_start` is the owning
    /// element's own active-interval start, since `begin`/`end` are offsets
    /// relative to that start, not absolute document time (sec. 3.3, 3.5).
    pub fn is_active_at(&self, t: &Time, interval_start: &Time) -> bool {
        let begin = interval_start + &self.begin;
        let end = interval_start + &self.end;
        t >= &begin && t < &end
    }
}

/// A content element. `Text`/`Br` never carry styles, timing, animation
/// steps, or children (sec. 3.3); this is enforced by every mutator, not
/// merely documented.
pub struct Node {
    kind: ElementKind,
    text: Option<String>,
    styles: IndexMap<StyleProperty, Value>,
    begin: Option<Time>,
    end: Option<Time>,
    animation_steps: Vec<AnimationStep>,
    region_ref: Option<String>,
    lang: Option<String>,
    children: Vec<Rc<RefCell<Node>>>,
    parent: Option<Weak<RefCell<Node>>>,
}

impl Node {
    pub fn new(kind: ElementKind) -> Rc<RefCell<Node>> {
        assert!(kind != ElementKind::Text, "use Node::new_text for Text nodes");
        Rc::new(RefCell::new(Node {
            kind,
            text: None,
            styles: IndexMap::new(),
            begin: None,
            end: None,
            animation_steps: Vec::new(),
            region_ref: None,
            lang: None,
            children: Vec::new(),
            parent: None,
        }))
    }

    pub fn new_text(text: impl Into<String>) -> Rc<RefCell<Node>> {
        Rc::new(RefCell::new(Node {
            kind: ElementKind::Text,
            text: Some(text.into()),
            styles: IndexMap::new(),
            begin: None,
            end: None,
            animation_steps: Vec::new(),
            region_ref: None,
            lang: None,
            children: Vec::new(),
            parent: None,
        }))
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn set_text(&mut self, text: impl Into<String>) -> Result<()> {
        if self.kind != ElementKind::Text {
            return Err(Error::Structure(format!("{} cannot carry a text payload", self.kind)));
        }
        self.text = Some(text.into());
        Ok(())
    }

    /// `Text` is the only kind barred from carrying styles/timing/animation
    /// (sec. 3.3: "Text elements carry a character payload and no
    /// styles/timing/children"). `Br` is only barred from text/children.
    fn assert_can_carry_styles_and_timing(&self) -> Result<()> {
        if self.kind == ElementKind::Text {
            return Err(Error::Structure(format!("{} cannot carry styles or timing", self.kind)));
        }
        Ok(())
    }

    pub fn set_style(&mut self, property: StyleProperty, value: Value) -> Result<()> {
        self.assert_can_carry_styles_and_timing()?;
        if region_only(property) {
            return Err(Error::Structure(format!(
                "{:?} is a region-only property and cannot be set on {}",
                property, self.kind
            )));
        }
        style::validate(property, &value)?;
        self.styles.insert(property, value);
        Ok(())
    }

    pub fn remove_style(&mut self, property: StyleProperty) {
        self.styles.shift_remove(&property);
    }

    pub fn inline_style(&self, property: StyleProperty) -> Option<&Value> {
        self.styles.get(&property)
    }

    pub fn inline_styles(&self) -> impl Iterator<Item = (StyleProperty, &Value)> {
        self.styles.iter().map(|(k, v)| (*k, v))
    }

    pub fn set_timing(&mut self, begin: Option<Time>, end: Option<Time>) -> Result<()> {
        self.assert_can_carry_styles_and_timing()?;
        self.begin = begin;
        self.end = end;
        Ok(())
    }

    pub fn begin(&self) -> Option<&Time> {
        self.begin.as_ref()
    }

    pub fn end(&self) -> Option<&Time> {
        self.end.as_ref()
    }

    pub fn add_animation_step(&mut self, step: AnimationStep) -> Result<()> {
        self.assert_can_carry_styles_and_timing()?;
        if region_only(step.property) {
            return Err(Error::Structure(format!(
                "{:?} is a region-only property and cannot be animated on {}",
                step.property, self.kind
            )));
        }
        self.animation_steps.push(step);
        Ok(())
    }

    pub fn remove_animation_step(&mut self, index: usize) -> Result<AnimationStep> {
        if index >= self.animation_steps.len() {
            return Err(Error::Other(format!("no animation step at index {}", index)));
        }
        Ok(self.animation_steps.remove(index))
    }

    pub fn animation_steps(&self) -> &[AnimationStep] {
        &self.animation_steps
    }

    pub fn set_region_ref(&mut self, id: Option<String>) -> Result<()> {
        self.assert_can_carry_styles_and_timing()?;
        self.region_ref = id;
        Ok(())
    }

    pub fn region_ref(&self) -> Option<&str> {
        self.region_ref.as_deref()
    }

    pub fn set_lang(&mut self, lang: Option<String>) {
        self.lang = lang;
    }

    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }

    pub fn children(&self) -> &[Rc<RefCell<Node>>] {
        &self.children
    }

    pub fn child_at(&self, index: usize) -> Option<Rc<RefCell<Node>>> {
        self.children.get(index).cloned()
    }

    pub fn parent(&self) -> Option<Rc<RefCell<Node>>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Appends `child` as the last child of `parent_ref`. Fails with a
    /// *structure* error if `child`'s kind is not allowed under `parent`'s
    /// kind, or if `child` is already attached elsewhere (sec. 3.6: an
    /// element is created detached and inserted once; re-parenting is an
    /// explicit `remove_child` followed by `append_child`).
    pub fn append_child(parent_ref: &Rc<RefCell<Node>>, child: Rc<RefCell<Node>>) -> Result<()> {
        let parent_kind = parent_ref.borrow().kind;
        let child_kind = child.borrow().kind;
        if !allowed_children(parent_kind).contains(&child_kind) {
            return Err(Error::Structure(format!("{} cannot have a {} child", parent_kind, child_kind)));
        }
        if child.borrow().parent.is_some() {
            return Err(Error::Structure("child is already attached to a parent".into()));
        }
        child.borrow_mut().parent = Some(Rc::downgrade(parent_ref));
        parent_ref.borrow_mut().children.push(child);
        Ok(())
    }

    /// Inserts `child` at `index` among `parent_ref`'s children, the same
    /// validation as `append_child`.
    pub fn insert_child(parent_ref: &Rc<RefCell<Node>>, index: usize, child: Rc<RefCell<Node>>) -> Result<()> {
        let parent_kind = parent_ref.borrow().kind;
        let child_kind = child.borrow().kind;
        if !allowed_children(parent_kind).contains(&child_kind) {
            return Err(Error::Structure(format!("{} cannot have a {} child", parent_kind, child_kind)));
        }
        if child.borrow().parent.is_some() {
            return Err(Error::Structure("child is already attached to a parent".into()));
        }
        let len = parent_ref.borrow().children.len();
        if index > len {
            return Err(Error::Other(format!("index {} out of bounds (len {})", index, len)));
        }
        child.borrow_mut().parent = Some(Rc::downgrade(parent_ref));
        parent_ref.borrow_mut().children.insert(index, child);
        Ok(())
    }

    /// Detaches and returns the child at `index`. The returned node (and
    /// its subtree) has no parent and can be freely re-inserted.
    pub fn remove_child(parent_ref: &Rc<RefCell<Node>>, index: usize) -> Result<Rc<RefCell<Node>>> {
        let mut parent = parent_ref.borrow_mut();
        if index >= parent.children.len() {
            return Err(Error::Other(format!("no child at index {}", index)));
        }
        let child = parent.children.remove(index);
        child.borrow_mut().parent = None;
        Ok(child)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind)
            .field("text", &self.text)
            .field("begin", &self.begin)
            .field("end", &self.end)
            .field("region_ref", &self.region_ref)
            .field("children", &self.children.len())
            .finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.text {
            Some(t) => write!(f, "Text(\"{}\")", t),
            None => write!(f, "{}", self.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grammar_rejects_illegal_child() {
        let body = Node::new(ElementKind::Body);
        let span = Node::new(ElementKind::Span);
        assert!(Node::append_child(&body, span).is_err());
    }

    #[test]
    fn grammar_accepts_legal_child() {
        let body = Node::new(ElementKind::Body);
        let div = Node::new(ElementKind::Div);
        assert!(Node::append_child(&body, div).is_ok());
        assert_eq!(body.borrow().children().len(), 1);
    }

    #[test]
    fn text_rejects_styles_and_timing() {
        let text = Node::new_text("hi");
        assert!(text.borrow_mut().set_style(StyleProperty::Color, Value::Color(crate::time::Color::WHITE)).is_err());
        assert!(text.borrow_mut().set_timing(Some(Time::zero()), None).is_err());
    }

    #[test]
    fn region_only_property_rejected_on_content() {
        let span = Node::new(ElementKind::Span);
        let err = span
            .borrow_mut()
            .set_style(StyleProperty::Extent, Value::LengthPair(
                crate::time::Length::new(1.0, crate::time::Unit::Percent),
                crate::time::Length::new(1.0, crate::time::Unit::Percent),
            ))
            .unwrap_err();
        assert!(matches!(err, Error::Structure(_)));
    }

    #[test]
    fn reattaching_without_detach_fails() {
        let body = Node::new(ElementKind::Body);
        let body2 = Node::new(ElementKind::Body);
        let div = Node::new(ElementKind::Div);
        Node::append_child(&body, Rc::clone(&div)).unwrap();
        assert!(Node::append_child(&body2, div).is_err());
    }

    #[test]
    fn detach_then_reattach_succeeds() {
        let body = Node::new(ElementKind::Body);
        let body2 = Node::new(ElementKind::Body);
        let div = Node::new(ElementKind::Div);
        Node::append_child(&body, Rc::clone(&div)).unwrap();
        let removed = Node::remove_child(&body, 0).unwrap();
        assert!(Node::append_child(&body2, removed).is_ok());
    }

    #[test]
    fn parent_lookup_round_trips() {
        let body = Node::new(ElementKind::Body);
        let div = Node::new(ElementKind::Div);
        Node::append_child(&body, Rc::clone(&div)).unwrap();
        let parent = div.borrow().parent().unwrap();
        assert_eq!(parent.borrow().kind(), ElementKind::Body);
    }
}
