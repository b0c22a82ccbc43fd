//! The *lcd* filter (sec. 4.5, 10.6): merges every region into one safe-area
//! region and strips all styling but color and text alignment.

use std::cell::RefCell;
use std::rc::Rc;

use crate::cdm::{Node, Region};
use crate::config::LcdConfig;
use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::style::{StyleProperty, Value};
use crate::time::{Color, Length, Unit};

const MERGED_REGION_ID: &str = "lcd";

pub struct LcdFilter {
    config: LcdConfig,
}

impl LcdFilter {
    pub fn new(config: LcdConfig) -> Self {
        Self { config }
    }
}

impl Filter for LcdFilter {
    fn apply(&self, doc: &mut crate::cdm::Document) -> Result<()> {
        if let Some(body) = doc.body().cloned() {
            retarget_regions(&body, MERGED_REGION_ID);
            strip_styles(&body, &self.config)?;
        }

        let old_ids: Vec<String> = doc.regions().map(|r| r.id().to_string()).collect();
        for id in old_ids {
            doc.remove_region(&id).map_err(|e| Error::FilterError(format!("lcd: {}", e)))?;
        }

        let inset = self.config.safe_area.min(30) as f64;
        let mut region = Region::new(MERGED_REGION_ID);
        region.set_style(StyleProperty::Origin, Value::LengthPair(Length::new(inset, Unit::Percent), Length::new(inset, Unit::Percent)))?;
        region.set_style(
            StyleProperty::Extent,
            Value::LengthPair(Length::new(100.0 - 2.0 * inset, Unit::Percent), Length::new(100.0 - 2.0 * inset, Unit::Percent)),
        )?;
        region.set_style(StyleProperty::ShowBackground, Value::Keyword("whenActive"))?;
        if let Some(spec) = &self.config.bg_color {
            let color = parse_color(spec)?;
            region.set_style(StyleProperty::BackgroundColor, Value::Color(color))?;
        }
        doc.add_region(region)?;

        Ok(())
    }
}

fn retarget_regions(node: &Rc<RefCell<Node>>, region_id: &str) {
    let mut n = node.borrow_mut();
    if n.region_ref().is_some() {
        let _ = n.set_region_ref(Some(region_id.to_string()));
    }
    let children = n.children().to_vec();
    drop(n);
    for child in &children {
        retarget_regions(child, region_id);
    }
}

fn strip_styles(node: &Rc<RefCell<Node>>, config: &LcdConfig) -> Result<()> {
    let override_color = config.color.as_deref().map(parse_color).transpose()?;
    {
        let mut n = node.borrow_mut();
        let carried: Vec<StyleProperty> = n.inline_styles().map(|(p, _)| p).collect();
        for p in carried {
            let keep = p == StyleProperty::Color || (p == StyleProperty::TextAlign && config.preserve_text_align);
            if !keep {
                n.remove_style(p);
            }
        }
        if let Some(color) = override_color {
            let _ = n.set_style(StyleProperty::Color, Value::Color(color));
        }
    }
    let children = node.borrow().children().to_vec();
    for child in &children {
        strip_styles(child, config)?;
    }
    Ok(())
}

fn parse_color(spec: &str) -> Result<Color> {
    let hex = spec.strip_prefix('#').unwrap_or(spec);
    let byte = |i: usize| -> Result<u8> {
        u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| Error::Domain(format!("invalid color: {}", spec)))
    };
    match hex.len() {
        6 => Ok(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Ok(Color::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => Err(Error::Domain(format!("invalid color: {}", spec))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdm::{Document, ElementKind};

    #[test]
    fn merges_two_regions_into_one_safe_area() {
        let mut doc = Document::new();
        doc.add_region(Region::new("r1")).unwrap();
        doc.add_region(Region::new("r2")).unwrap();
        let body = Node::new(ElementKind::Body);
        let div = Node::new(ElementKind::Div);
        div.borrow_mut().set_region_ref(Some("r1".to_string())).unwrap();
        Node::append_child(&body, div).unwrap();
        doc.set_body(body).unwrap();

        LcdFilter::new(LcdConfig::default()).apply(&mut doc).unwrap();
        assert_eq!(doc.regions().count(), 1);
        assert_eq!(doc.first_region_id(), Some("lcd"));
    }

    #[test]
    fn strips_all_styles_except_color_and_text_align() {
        let mut doc = Document::new();
        let body = Node::new(ElementKind::Body);
        let span = Node::new(ElementKind::Span);
        span.borrow_mut().set_style(StyleProperty::Color, Value::Color(Color::rgb(1, 2, 3))).unwrap();
        span.borrow_mut().set_style(StyleProperty::TextAlign, Value::Keyword("center")).unwrap();
        span.borrow_mut().set_style(StyleProperty::FontWeight, Value::Keyword("bold")).unwrap();
        Node::append_child(&body, span.clone()).unwrap();
        doc.set_body(body).unwrap();

        LcdFilter::new(LcdConfig::default()).apply(&mut doc).unwrap();
        assert!(span.borrow().inline_style(StyleProperty::FontWeight).is_none());
        assert!(span.borrow().inline_style(StyleProperty::TextAlign).is_some());
        assert!(span.borrow().inline_style(StyleProperty::Color).is_some());
    }

    #[test]
    fn color_override_applies_to_every_styled_element() {
        let mut doc = Document::new();
        let body = Node::new(ElementKind::Body);
        let span = Node::new(ElementKind::Span);
        Node::append_child(&body, span.clone()).unwrap();
        doc.set_body(body).unwrap();

        let config = LcdConfig { color: Some("#ff0000".to_string()), ..LcdConfig::default() };
        LcdFilter::new(config).apply(&mut doc).unwrap();
        assert_eq!(span.borrow().inline_style(StyleProperty::Color), Some(&Value::Color(Color::rgb(255, 0, 0))));
    }
}
