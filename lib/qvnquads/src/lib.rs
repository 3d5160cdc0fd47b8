#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod error;
mod parser;
mod serializer;

pub use crate::error::{NQuadsParseError, NQuadsSyntaxError, SyntaxErrorKind};
pub use crate::parser::{NQuadsParser, ReaderNQuadsParser, SliceNQuadsParser};
pub use crate::serializer::{NQuadsSerializer, WriterNQuadsSerializer};
