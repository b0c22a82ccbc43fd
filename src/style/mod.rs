//! The style vocabulary (C1): every property the canonical document model
//! supports, declared once as a table rather than scattered per-property
//! code, per the design note in sec. 9 ("the style vocabulary should be
//! declared once as a table mapping property -> metadata; per-property code
//! should be derived from the table, not written per property").

use std::fmt;

use crate::error::{Error, Result};
use crate::time::{Color, Length, Unit};

/// The closed set of style properties sec. 4.4 requires "at minimum".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StyleProperty {
    Color,
    BackgroundColor,
    FontFamily,
    FontSize,
    FontStyle,
    FontWeight,
    LineHeight,
    Opacity,
    TextAlign,
    TextDecoration,
    Direction,
    WritingMode,
    Display,
    DisplayAlign,
    Extent,
    Origin,
    Padding,
    ShowBackground,
    Overflow,
    WrapOption,
    UnicodeBidi,
    Visibility,
    Ruby,
    RubyPosition,
    RubyAlign,
}

/// The value domains a property can declare, per sec. 4.4: "domain: enum /
/// length / color / fraction / list of T".
#[derive(Debug)]
pub enum Domain {
    Enum(&'static [&'static str]),
    Length,
    LengthPair,
    Padding,
    Color,
    /// An inclusive `[min, max]` fractional range, e.g. `opacity`.
    Fraction(f64, f64),
    FontFamilyList,
}

/// A concrete style value, typed by the `Domain` it must satisfy.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Keyword(&'static str),
    Length(Length),
    LengthPair(Length, Length),
    Padding([Length; 4]),
    Color(Color),
    Number(f64),
    FontFamily(Vec<String>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Keyword(k) => write!(f, "{}", k),
            Value::Length(l) => write!(f, "{}", l),
            Value::LengthPair(a, b) => write!(f, "{} {}", a, b),
            Value::Padding([t, r, b, l]) => write!(f, "{} {} {} {}", t, r, b, l),
            Value::Color(c) => write!(f, "{}", c),
            Value::Number(n) => write!(f, "{}", n),
            Value::FontFamily(families) => write!(f, "{}", families.join(", ")),
        }
    }
}

/// Every property in declaration order, for callers that must resolve or
/// enumerate the whole vocabulary (the ISD cascade).
pub const ALL: [StyleProperty; 25] = [
    StyleProperty::Color,
    StyleProperty::BackgroundColor,
    StyleProperty::FontFamily,
    StyleProperty::FontSize,
    StyleProperty::FontStyle,
    StyleProperty::FontWeight,
    StyleProperty::LineHeight,
    StyleProperty::Opacity,
    StyleProperty::TextAlign,
    StyleProperty::TextDecoration,
    StyleProperty::Direction,
    StyleProperty::WritingMode,
    StyleProperty::Display,
    StyleProperty::DisplayAlign,
    StyleProperty::Extent,
    StyleProperty::Origin,
    StyleProperty::Padding,
    StyleProperty::ShowBackground,
    StyleProperty::Overflow,
    StyleProperty::WrapOption,
    StyleProperty::UnicodeBidi,
    StyleProperty::Visibility,
    StyleProperty::Ruby,
    StyleProperty::RubyPosition,
    StyleProperty::RubyAlign,
];

/// Per-property metadata: domain, default, and the two cascade-relevant
/// flags from sec. 3.4.
#[derive(Debug)]
pub struct PropertyMeta {
    pub domain: Domain,
    pub default: Value,
    pub inheritable: bool,
    pub animatable: bool,
    /// True for properties sec. 3.4 lists as "inherited from region": a
    /// content element referencing region R inherits these from R instead
    /// of (or in addition to) its element ancestry.
    pub inherited_from_region: bool,
}

const PX: &[Unit] = &[Unit::Pixel, Unit::Percent, Unit::Cell, Unit::Em, Unit::RootHeight, Unit::RootWidth];

/// The single table driving every property's domain, default, and cascade
/// flags. Adding a property means adding one match arm here; no other code
/// in the crate should hand-roll a property's validation or defaulting.
pub fn meta(p: StyleProperty) -> PropertyMeta {
    use StyleProperty::*;
    match p {
        Color => PropertyMeta {
            domain: Domain::Color,
            default: Value::Color(crate::time::Color::WHITE),
            inheritable: true,
            animatable: true,
            inherited_from_region: false,
        },
        BackgroundColor => PropertyMeta {
            domain: Domain::Color,
            default: Value::Color(crate::time::Color::TRANSPARENT),
            inheritable: false,
            animatable: true,
            inherited_from_region: false,
        },
        FontFamily => PropertyMeta {
            domain: Domain::FontFamilyList,
            default: Value::FontFamily(vec!["default".to_string()]),
            inheritable: true,
            animatable: false,
            inherited_from_region: false,
        },
        FontSize => PropertyMeta {
            domain: Domain::Length,
            default: Value::Length(Length::new(1.0, Unit::Cell)),
            inheritable: true,
            animatable: true,
            inherited_from_region: false,
        },
        FontStyle => PropertyMeta {
            domain: Domain::Enum(&["normal", "italic"]),
            default: Value::Keyword("normal"),
            inheritable: true,
            animatable: false,
            inherited_from_region: false,
        },
        FontWeight => PropertyMeta {
            domain: Domain::Enum(&["normal", "bold"]),
            default: Value::Keyword("normal"),
            inheritable: true,
            animatable: false,
            inherited_from_region: false,
        },
        LineHeight => PropertyMeta {
            domain: Domain::Length,
            default: Value::Keyword("normal"),
            inheritable: true,
            animatable: true,
            inherited_from_region: false,
        },
        Opacity => PropertyMeta {
            domain: Domain::Fraction(0.0, 1.0),
            default: Value::Number(1.0),
            inheritable: false,
            animatable: true,
            inherited_from_region: false,
        },
        TextAlign => PropertyMeta {
            domain: Domain::Enum(&["start", "end", "left", "right", "center", "justify"]),
            default: Value::Keyword("start"),
            inheritable: true,
            animatable: false,
            inherited_from_region: false,
        },
        TextDecoration => PropertyMeta {
            domain: Domain::Enum(&["none", "underline", "lineThrough", "overline"]),
            default: Value::Keyword("none"),
            inheritable: true,
            animatable: true,
            inherited_from_region: false,
        },
        Direction => PropertyMeta {
            domain: Domain::Enum(&["ltr", "rtl"]),
            default: Value::Keyword("ltr"),
            inheritable: true,
            animatable: false,
            inherited_from_region: false,
        },
        WritingMode => PropertyMeta {
            domain: Domain::Enum(&["lrtb", "rltb", "tbrl", "tblr"]),
            default: Value::Keyword("lrtb"),
            inheritable: false,
            animatable: false,
            inherited_from_region: true,
        },
        Display => PropertyMeta {
            domain: Domain::Enum(&["auto", "none"]),
            default: Value::Keyword("auto"),
            inheritable: false,
            animatable: false,
            inherited_from_region: false,
        },
        DisplayAlign => PropertyMeta {
            domain: Domain::Enum(&["before", "center", "after"]),
            default: Value::Keyword("before"),
            inheritable: false,
            animatable: false,
            inherited_from_region: true,
        },
        Extent => PropertyMeta {
            domain: Domain::LengthPair,
            default: Value::LengthPair(Length::new(100.0, Unit::Percent), Length::new(100.0, Unit::Percent)),
            inheritable: false,
            animatable: true,
            inherited_from_region: true,
        },
        Origin => PropertyMeta {
            domain: Domain::LengthPair,
            default: Value::LengthPair(Length::new(0.0, Unit::Percent), Length::new(0.0, Unit::Percent)),
            inheritable: false,
            animatable: true,
            inherited_from_region: true,
        },
        Padding => PropertyMeta {
            domain: Domain::Padding,
            default: Value::Padding([
                Length::new(0.0, Unit::Cell),
                Length::new(0.0, Unit::Cell),
                Length::new(0.0, Unit::Cell),
                Length::new(0.0, Unit::Cell),
            ]),
            inheritable: false,
            animatable: true,
            inherited_from_region: true,
        },
        ShowBackground => PropertyMeta {
            domain: Domain::Enum(&["always", "whenActive"]),
            default: Value::Keyword("always"),
            inheritable: false,
            animatable: false,
            inherited_from_region: true,
        },
        Overflow => PropertyMeta {
            domain: Domain::Enum(&["visible", "hidden"]),
            default: Value::Keyword("hidden"),
            inheritable: false,
            animatable: false,
            inherited_from_region: true,
        },
        WrapOption => PropertyMeta {
            domain: Domain::Enum(&["wrap", "noWrap"]),
            default: Value::Keyword("wrap"),
            inheritable: true,
            animatable: false,
            inherited_from_region: false,
        },
        UnicodeBidi => PropertyMeta {
            domain: Domain::Enum(&["normal", "embed", "bidiOverride"]),
            default: Value::Keyword("normal"),
            inheritable: false,
            animatable: false,
            inherited_from_region: false,
        },
        Visibility => PropertyMeta {
            domain: Domain::Enum(&["visible", "hidden"]),
            default: Value::Keyword("visible"),
            inheritable: true,
            animatable: true,
            inherited_from_region: false,
        },
        Ruby => PropertyMeta {
            domain: Domain::Enum(&["none", "container", "base", "baseContainer", "text", "textContainer", "delimiter"]),
            default: Value::Keyword("none"),
            inheritable: false,
            animatable: false,
            inherited_from_region: false,
        },
        RubyPosition => PropertyMeta {
            domain: Domain::Enum(&["before", "after", "outside"]),
            default: Value::Keyword("outside"),
            inheritable: true,
            animatable: false,
            inherited_from_region: false,
        },
        RubyAlign => PropertyMeta {
            domain: Domain::Enum(&["start", "center", "spaceAround", "spaceBetween"]),
            default: Value::Keyword("center"),
            inheritable: true,
            animatable: false,
            inherited_from_region: false,
        },
    }
}

/// Validates `value` against `p`'s declared domain. This is the single
/// choke point every inline-style setter and animation-step setter must go
/// through, per sec. 4.4: "Implementers MUST reject values outside the
/// declared domain at set-time."
pub fn validate(p: StyleProperty, value: &Value) -> Result<()> {
    let m = meta(p);
    let ok = match (&m.domain, value) {
        (Domain::Enum(allowed), Value::Keyword(k)) => allowed.contains(k),
        (Domain::Length, Value::Length(l)) => PX.contains(&l.unit),
        (Domain::LengthPair, Value::LengthPair(a, b)) => PX.contains(&a.unit) && PX.contains(&b.unit),
        (Domain::Padding, Value::Padding(lengths)) => lengths.iter().all(|l| PX.contains(&l.unit)),
        (Domain::Color, Value::Color(_)) => true,
        (Domain::Fraction(min, max), Value::Number(n)) => *n >= *min && *n <= *max,
        (Domain::FontFamilyList, Value::FontFamily(list)) => !list.is_empty(),
        // `line-height: normal` is a keyword carve-out inside an otherwise
        // length-typed domain.
        (Domain::Length, Value::Keyword("normal")) if p == StyleProperty::LineHeight => true,
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::Domain(format!("{:?}: value {} is outside the declared domain", p, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opacity_rejects_out_of_range() {
        assert!(validate(StyleProperty::Opacity, &Value::Number(1.5)).is_err());
        assert!(validate(StyleProperty::Opacity, &Value::Number(0.5)).is_ok());
    }

    #[test]
    fn text_align_rejects_unknown_keyword() {
        assert!(validate(StyleProperty::TextAlign, &Value::Keyword("diagonal")).is_err());
        assert!(validate(StyleProperty::TextAlign, &Value::Keyword("center")).is_ok());
    }

    #[test]
    fn color_is_inheritable_background_is_not() {
        assert!(meta(StyleProperty::Color).inheritable);
        assert!(!meta(StyleProperty::BackgroundColor).inheritable);
    }

    #[test]
    fn show_background_is_inherited_from_region() {
        assert!(meta(StyleProperty::ShowBackground).inherited_from_region);
        assert!(!meta(StyleProperty::Color).inherited_from_region);
    }
}
