#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod bnode;
mod hash;
mod iri;
mod quad;
pub mod registry;
mod value;
pub mod vocab;

pub use crate::bnode::{BNode, BNodeIdParseError};
pub use crate::hash::ValueHash;
pub use crate::iri::{Iri, IriRef};
pub use crate::quad::{Direction, Quad};
pub use crate::registry::{ConversionError, ConvertFn};
pub use crate::value::{print_quoted_str, Native, Value};
pub use oxilangtag::LanguageTagParseError;
pub use oxiri::IriParseError;
