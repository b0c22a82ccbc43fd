#![deny(unsafe_code)]

pub mod config;
mod cdm;
mod error;
pub mod filter;
mod formats;
mod isd;
mod scc;
mod style;
mod time;
mod utils;

pub use cdm::{AnimationStep, Document, ElementKind, Node, Region};
pub use config::Config;
pub use error::{Error, Result};
pub use filter::{Filter, FilterRegistry};
pub use formats::{Format, Reader, Writer};
pub use isd::{generate as generate_isd, sig, Isd, IsdNode, IsdRegion};
pub use scc::{read as read_scc, SccReaderConfig, TextAlign as SccTextAlign};
pub use style::{StyleProperty, Value};
pub use time::{Color, Interval, Length, PixelResolution, Resolution, Time, Unit};

pub mod convert;
