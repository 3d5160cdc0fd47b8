//! Bulk loading and dumping through the codec boundary.
//!
//! The engine never parses or serializes by itself: it pulls from a
//! [`QuadReader`] and pushes to a [`QuadWriter`], whatever codec produced
//! them.

use crate::delta::{Delta, IgnoreOpts};
use crate::error::{DeltaError, StoreError};
use crate::limits::EvalContext;
use crate::store::QuadStore;
use qvio::{QuadReadError, QuadReader, QuadWriter};
use std::io;
use thiserror::Error;

/// How many quads are batched into one delta application while loading.
const LOAD_BATCH_SIZE: usize = 10_000;

/// An error raised while loading quads into a store.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// An error raised while reading the input.
    #[error(transparent)]
    Parsing(#[from] QuadReadError),
    /// An error raised during the insertion in the store.
    #[error(transparent)]
    Storage(#[from] DeltaError),
}

impl From<LoaderError> for io::Error {
    #[inline]
    fn from(error: LoaderError) -> Self {
        match error {
            LoaderError::Parsing(error) => error.into(),
            LoaderError::Storage(error) => Self::new(io::ErrorKind::InvalidData, error),
        }
    }
}

/// An error raised while dumping a store.
#[derive(Debug, Error)]
pub enum SerializerError {
    /// An error raised while writing the output.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// An error raised while reading from the store.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Drains `reader` into the store in batches, returning the number of quads
/// read. Duplicates in the input are tolerated.
///
/// ```
/// use quiver::{io::load_from_reader, MemoryStore, QuadStore};
/// use qvio::QuadFormat;
///
/// let store = MemoryStore::new();
/// let format = QuadFormat::by_name("nquads").unwrap();
/// let mut reader = format.new_reader(Box::new("<a> <b> <c> .\n".as_bytes()));
/// let loaded = load_from_reader(&store, reader.as_mut())?;
/// assert_eq!(loaded, 1);
/// assert_eq!(store.stats(true)?.quads.value, 1);
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
pub fn load_from_reader<S: QuadStore>(
    store: &S,
    reader: &mut dyn QuadReader,
) -> Result<u64, LoaderError> {
    let opts = IgnoreOpts {
        ignore_dup: true,
        ignore_missing: false,
    };
    let mut total = 0_u64;
    let mut batch = Vec::with_capacity(LOAD_BATCH_SIZE);
    while let Some(quad) = reader.read_quad()? {
        batch.push(Delta::add(quad));
        if batch.len() >= LOAD_BATCH_SIZE {
            store.apply_deltas(&batch, opts)?;
            total += batch.len() as u64;
            batch.clear();
        }
    }
    if !batch.is_empty() {
        store.apply_deltas(&batch, opts)?;
        total += batch.len() as u64;
    }
    Ok(total)
}

/// Writes every stored quad to `writer`, returning the number written.
pub fn write_to_writer<S: QuadStore>(
    store: &S,
    writer: &mut dyn QuadWriter,
    ctx: &EvalContext,
) -> Result<u64, SerializerError> {
    let mut cursor = store.quads_all_iterator();
    let mut total = 0_u64;
    while cursor.next(ctx) {
        let Some(r) = cursor.result() else { break };
        writer.write_quad(&store.quad(&r)?)?;
        total += 1;
    }
    if let Some(e) = cursor.err() {
        let e = crate::iterator::clone_store_error(e);
        cursor.close()?;
        return Err(e.into());
    }
    cursor.close()?;
    writer.flush()?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use qvio::QuadFormat;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn load_then_dump_round_trips() {
        let content = "<a> <follows> <b> .\n<b> <status> \"cool\" <g> .\n";
        let format = QuadFormat::by_name("nquads").unwrap();
        let store = MemoryStore::new();

        let mut reader = format.new_reader(Box::new(content.as_bytes()));
        assert_eq!(load_from_reader(&store, reader.as_mut()).unwrap(), 2);

        let buf = SharedBuf::default();
        let mut writer = format.new_writer(Box::new(buf.clone()));
        let written =
            write_to_writer(&store, writer.as_mut(), &EvalContext::background()).unwrap();
        assert_eq!(written, 2);

        let bytes = buf.0.lock().unwrap().clone();
        let mut lines: Vec<&str> = std::str::from_utf8(&bytes)
            .unwrap()
            .lines()
            .collect();
        lines.sort_unstable();
        assert_eq!(
            lines,
            ["<a> <follows> <b> .", "<b> <status> \"cool\" <g> ."]
        );
    }

    #[test]
    fn duplicate_input_is_tolerated() {
        let content = "<a> <b> <c> .\n<a> <b> <c> .\n";
        let format = QuadFormat::by_name("nquads").unwrap();
        let store = MemoryStore::new();
        let mut reader = format.new_reader(Box::new(content.as_bytes()));
        assert_eq!(load_from_reader(&store, reader.as_mut()).unwrap(), 2);
        assert_eq!(store.stats(true).unwrap().quads.value, 1);
    }

    #[test]
    fn syntax_errors_surface() {
        let format = QuadFormat::by_name("nquads").unwrap();
        let store = MemoryStore::new();
        let mut reader = format.new_reader(Box::new("<broken".as_bytes()));
        assert!(matches!(
            load_from_reader(&store, reader.as_mut()),
            Err(LoaderError::Parsing(_))
        ));
    }
}
