#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod format;
mod reader;
mod writer;

pub use crate::format::{register_format, NewReaderFn, NewWriterFn, QuadFormat};
pub use crate::reader::{QuadReadError, QuadReader};
pub use crate::writer::QuadWriter;
