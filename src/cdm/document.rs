//! The document (sec. 3.2, 4.1): the root body, the region table, the
//! initial-values table, and the root-container resolution.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::cdm::node::{ElementKind, Node};
use crate::cdm::region::Region;
use crate::error::{Error, Result};
use crate::style::{self, StyleProperty, Value};
use crate::time::{PixelResolution, Resolution};
use crate::utils::PrintableTree;

pub struct Document {
    body: Option<Rc<RefCell<Node>>>,
    /// Declaration order is significant: it is the fallback "first declared
    /// region" (sec. 9) and the order ISD region lists must preserve
    /// (sec. 8, invariant 3).
    regions: IndexMap<String, Region>,
    initial_values: IndexMap<StyleProperty, Value>,
    cell_resolution: Resolution,
    px_resolution: PixelResolution,
    lang: Option<String>,
    profiles: IndexSet<String>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            body: None,
            regions: IndexMap::new(),
            initial_values: IndexMap::new(),
            cell_resolution: Resolution::default(),
            px_resolution: PixelResolution::default(),
            lang: None,
            profiles: IndexSet::new(),
        }
    }

    pub fn set_body(&mut self, body: Rc<RefCell<Node>>) -> Result<()> {
        if body.borrow().kind() != ElementKind::Body {
            return Err(Error::Structure("document root must be a Body element".into()));
        }
        self.body = Some(body);
        Ok(())
    }

    pub fn body(&self) -> Option<&Rc<RefCell<Node>>> {
        self.body.as_ref()
    }

    pub fn add_region(&mut self, region: Region) -> Result<()> {
        if self.regions.contains_key(region.id()) {
            return Err(Error::DuplicateId(region.id().to_string()));
        }
        self.regions.insert(region.id().to_string(), region);
        Ok(())
    }

    /// Removes and returns the region with `id`. Fails with a *structure*
    /// error if any content element still references it: callers must
    /// clear the reference first (sec. 4.1's referential-integrity
    /// guarantee, sec. 9).
    pub fn remove_region(&mut self, id: &str) -> Result<Region> {
        if self.region_in_use(id) {
            return Err(Error::Structure(format!(
                "region {} is still referenced by content; clear region-refs before removing it",
                id
            )));
        }
        self.regions
            .shift_remove(id)
            .ok_or_else(|| Error::MissingRegion(id.to_string()))
    }

    fn region_in_use(&self, id: &str) -> bool {
        fn walk(node: &Rc<RefCell<Node>>, id: &str) -> bool {
            let n = node.borrow();
            if n.region_ref() == Some(id) {
                return true;
            }
            n.children().iter().any(|c| walk(c, id))
        }
        self.body.as_ref().is_some_and(|b| walk(b, id))
    }

    pub fn region(&self, id: &str) -> Option<&Region> {
        self.regions.get(id)
    }

    pub fn region_mut(&mut self, id: &str) -> Option<&mut Region> {
        self.regions.get_mut(id)
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    /// The first-declared region, used as the default effective region for
    /// content with no region ancestor (sec. 4.2 step 3, the open question
    /// in sec. 9).
    pub fn first_region_id(&self) -> Option<&str> {
        self.regions.keys().next().map(String::as_str)
    }

    pub fn set_initial_value(&mut self, property: StyleProperty, value: Value) -> Result<()> {
        style::validate(property, &value)?;
        self.initial_values.insert(property, value);
        Ok(())
    }

    pub fn initial_value(&self, property: StyleProperty) -> Option<&Value> {
        self.initial_values.get(&property)
    }

    pub fn set_cell_resolution(&mut self, r: Resolution) {
        self.cell_resolution = r;
    }

    pub fn cell_resolution(&self) -> Resolution {
        self.cell_resolution
    }

    pub fn set_px_resolution(&mut self, r: PixelResolution) {
        self.px_resolution = r;
    }

    pub fn px_resolution(&self) -> PixelResolution {
        self.px_resolution
    }

    pub fn set_lang(&mut self, lang: Option<String>) {
        self.lang = lang;
    }

    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }

    pub fn add_profile(&mut self, uri: impl Into<String>) {
        self.profiles.insert(uri.into());
    }

    pub fn profiles(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(String::as_str)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// A one-line-per-node indented dump of the body tree, for `--itype`/
/// `--otype` debug inspection (not part of conversion correctness).
impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Document (regions: {})", self.regions.keys().cloned().collect::<Vec<_>>().join(", "))?;
        if let Some(body) = &self.body {
            write_node(f, body, 0)?;
        }
        Ok(())
    }
}

fn write_node(f: &mut fmt::Formatter, node: &Rc<RefCell<Node>>, depth: usize) -> fmt::Result {
    let n = node.borrow();
    writeln!(f, "{}{}", "  ".repeat(depth), n)?;
    for child in n.children() {
        write_node(f, child, depth + 1)?;
    }
    Ok(())
}

impl PrintableTree for Document {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_ids_are_unique() {
        let mut doc = Document::new();
        doc.add_region(Region::new("r1")).unwrap();
        let err = doc.add_region(Region::new("r1")).unwrap_err();
        assert!(matches!(err, Error::DuplicateId(_)));
    }

    #[test]
    fn removing_a_referenced_region_fails() {
        let mut doc = Document::new();
        doc.add_region(Region::new("r1")).unwrap();
        let body = Node::new(ElementKind::Body);
        let div = Node::new(ElementKind::Div);
        div.borrow_mut().set_region_ref(Some("r1".to_string())).unwrap();
        Node::append_child(&body, div).unwrap();
        doc.set_body(body).unwrap();
        assert!(doc.remove_region("r1").is_err());
    }

    #[test]
    fn clearing_the_reference_then_removing_succeeds() {
        let mut doc = Document::new();
        doc.add_region(Region::new("r1")).unwrap();
        let body = Node::new(ElementKind::Body);
        let div = Node::new(ElementKind::Div);
        div.borrow_mut().set_region_ref(Some("r1".to_string())).unwrap();
        Node::append_child(&body, Rc::clone(&div)).unwrap();
        doc.set_body(body).unwrap();
        div.borrow_mut().set_region_ref(None).unwrap();
        assert!(doc.remove_region("r1").is_ok());
    }

    #[test]
    fn first_region_id_tracks_declaration_order() {
        let mut doc = Document::new();
        doc.add_region(Region::new("b")).unwrap();
        doc.add_region(Region::new("a")).unwrap();
        assert_eq!(doc.first_region_id(), Some("b"));
    }

    #[test]
    fn default_resolutions_match_spec() {
        let doc = Document::new();
        assert_eq!(doc.cell_resolution().columns, 32);
        assert_eq!(doc.cell_resolution().rows, 15);
        assert_eq!(doc.px_resolution().width, 1920);
        assert_eq!(doc.px_resolution().height, 1080);
    }
}
