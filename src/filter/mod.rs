//! The filter interface (C6, sec. 4.5, 9, 10.6): named CDM-to-CDM transforms
//! registered in a table, looked up and composed by `--filter NAME`.

mod lcd;

use indexmap::IndexMap;

pub use lcd::LcdFilter;

use crate::cdm::Document;
use crate::config::Config;
use crate::error::{Error, Result};

/// A transform over a canonical document. Implementations MUST preserve the
/// document's structural invariants (sec. 3.2, 4.1) or fail with a
/// *filter-error*.
pub trait Filter {
    fn apply(&self, doc: &mut Document) -> Result<()>;
}

type FilterFactory = fn(&Config) -> Box<dyn Filter>;

/// The named-transform table from sec. 9's design note. `--filter NAME`
/// (repeatable) looks each name up here and applies them in argument order.
pub struct FilterRegistry {
    factories: IndexMap<&'static str, FilterFactory>,
}

impl FilterRegistry {
    pub fn with_defaults() -> Self {
        let mut factories: IndexMap<&'static str, FilterFactory> = IndexMap::new();
        factories.insert("lcd", (|config: &Config| Box::new(LcdFilter::new(config.lcd.clone())) as Box<dyn Filter>) as FilterFactory);
        Self { factories }
    }

    pub fn build(&self, name: &str, config: &Config) -> Result<Box<dyn Filter>> {
        match self.factories.get(name) {
            Some(factory) => Ok(factory(config)),
            None => Err(Error::Usage(format!("unknown filter: {}", name))),
        }
    }

    /// Builds and applies each named filter to `doc`, in order.
    pub fn apply_all(&self, names: &[String], config: &Config, doc: &mut Document) -> Result<()> {
        for name in names {
            let filter = self.build(name, config)?;
            filter.apply(doc)?;
        }
        Ok(())
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_filter_name_is_a_usage_error() {
        let registry = FilterRegistry::with_defaults();
        let err = registry.build("not-a-filter", &Config::default()).unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
    }

    #[test]
    fn lcd_is_registered_by_default() {
        let registry = FilterRegistry::with_defaults();
        assert!(registry.build("lcd", &Config::default()).is_ok());
    }
}
