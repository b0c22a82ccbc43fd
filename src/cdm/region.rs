//! Regions (sec. 3.2, 3.4, 9): named display rectangles held in the
//! document's region table, referenced from content by id. A region is
//! never part of the body tree and never stores a back-pointer to content
//! that refers to it (sec. 9).

use indexmap::IndexMap;

use crate::error::Result;
use crate::style::{self, StyleProperty, Value};
use crate::time::Time;

#[derive(Clone, Debug)]
pub struct Region {
    id: String,
    styles: IndexMap<StyleProperty, Value>,
    begin: Option<Time>,
    end: Option<Time>,
    lang: Option<String>,
}

impl Region {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            styles: IndexMap::new(),
            begin: None,
            end: None,
            lang: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_style(&mut self, property: StyleProperty, value: Value) -> Result<()> {
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

    pub fn set_timing(&mut self, begin: Option<Time>, end: Option<Time>) {
        self.begin = begin;
        self.end = end;
    }

    pub fn begin(&self) -> Option<&Time> {
        self.begin.as_ref()
    }

    pub fn end(&self) -> Option<&Time> {
        self.end.as_ref()
    }

    pub fn set_lang(&mut self, lang: Option<String>) {
        self.lang = lang;
    }

    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_style_value_is_rejected() {
        let mut r = Region::new("r1");
        let err = r.set_style(StyleProperty::ShowBackground, Value::Keyword("sometimes")).unwrap_err();
        assert!(matches!(err, crate::error::Error::Domain(_)));
    }
}
