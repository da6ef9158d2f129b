//! Event list readers.
//!
//! [`EventFileReader`] maps a whole file and slices it into records;
//! [`EventStreamReader`] pulls fixed-size blocks from any [`Read`], which
//! is how event lists arrive on standard input.

use crate::record::{decode_unchecked, RECORD_SIZE};
use crate::{Error, Result};
use ccdgrade_core::Event;
use memmap2::Mmap;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

/// Records per block when streaming.
pub const DEFAULT_BLOCK_EVENTS: usize = 1024;

/// A memory-mapped file reader.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Path the reader was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reader for a file of binary event records.
pub struct EventFileReader {
    reader: MappedFileReader,
}

impl EventFileReader {
    /// Opens and validates an event file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be mapped, or
    /// [`Error::InvalidFormat`] if it ends inside a record.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = MappedFileReader::open(path)?;
        if reader.len() % RECORD_SIZE != 0 {
            return Err(Error::InvalidFormat(format!(
                "file size {} is not a multiple of {RECORD_SIZE} (file: {})",
                reader.len(),
                reader.path().display()
            )));
        }
        log::debug!(
            "mapped {} ({} records)",
            reader.path().display(),
            reader.len() / RECORD_SIZE
        );
        Ok(Self { reader })
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.reader.len()
    }

    /// Returns the number of records in the file.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.reader.len() / RECORD_SIZE
    }

    /// Decodes every record.
    #[must_use]
    pub fn read_all(&self) -> Vec<Event> {
        self.records().collect()
    }

    /// Iterates over the records in order.
    pub fn records(&self) -> impl Iterator<Item = Event> + '_ {
        self.reader
            .as_bytes()
            .chunks_exact(RECORD_SIZE)
            .map(decode_unchecked)
    }

    /// Iterates over blocks of at most `block_events` records.
    ///
    /// A `block_events` of zero is treated as one.
    pub fn batches(&self, block_events: usize) -> impl Iterator<Item = Vec<Event>> + '_ {
        self.reader
            .as_bytes()
            .chunks(block_events.max(1) * RECORD_SIZE)
            .map(|block| block.chunks_exact(RECORD_SIZE).map(decode_unchecked).collect())
    }
}

/// Block-wise reader of event records from a byte stream.
pub struct EventStreamReader<R> {
    inner: R,
    buffer: Vec<u8>,
    offset: u64,
    /// Length of a trailing partial record, reported after the last block.
    partial: Option<usize>,
    done: bool,
}

impl<R: Read> EventStreamReader<R> {
    /// Creates a reader with blocks of [`DEFAULT_BLOCK_EVENTS`] records.
    pub fn new(inner: R) -> Self {
        Self::with_block_events(inner, DEFAULT_BLOCK_EVENTS)
    }

    /// Creates a reader with blocks of `block_events` records.
    pub fn with_block_events(inner: R, block_events: usize) -> Self {
        Self {
            inner,
            buffer: vec![0; block_events.max(1) * RECORD_SIZE],
            offset: 0,
            partial: None,
            done: false,
        }
    }

    /// Bytes consumed so far.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Reads the next block. Returns `Ok(None)` at a clean end of stream.
    ///
    /// Complete records before a trailing partial one are still returned;
    /// the following call reports the partial record.
    ///
    /// # Errors
    /// Returns [`Error::TruncatedRecord`] if the stream ends inside a
    /// record, or any underlying read error.
    pub fn read_block(&mut self) -> Result<Option<Vec<Event>>> {
        if let Some(len) = self.partial.take() {
            return Err(Error::TruncatedRecord {
                offset: self.offset,
                len,
            });
        }
        if self.done {
            return Ok(None);
        }

        let filled = self.fill()?;
        if filled < self.buffer.len() {
            self.done = true;
        }

        let whole = filled - filled % RECORD_SIZE;
        let events: Vec<Event> = self.buffer[..whole]
            .chunks_exact(RECORD_SIZE)
            .map(decode_unchecked)
            .collect();
        self.offset += whole as u64;

        if whole != filled {
            self.done = true;
            self.partial = Some(filled - whole);
            if events.is_empty() {
                return self.read_block();
            }
        }
        if events.is_empty() {
            return Ok(None);
        }
        Ok(Some(events))
    }

    fn fill(&mut self) -> Result<usize> {
        let mut filled = 0;
        while filled < self.buffer.len() {
            match self.inner.read(&mut self.buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

impl<R: Read> Iterator for EventStreamReader<R> {
    type Item = Result<Vec<Event>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_block().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::encode_record;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    fn sample(n: i32) -> Vec<Event> {
        (0..n)
            .map(|i| Event::new(i, i * 2, [i as f32; 9]).with_frame(i / 10, 0))
            .collect()
    }

    fn encode_all(events: &[Event]) -> Vec<u8> {
        events.iter().flat_map(encode_record).collect()
    }

    #[test]
    fn test_mapped_file_reader() {
        let mut file = NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..64).collect();
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        let reader = MappedFileReader::open(file.path()).unwrap();
        assert_eq!(reader.len(), 64);
        assert!(!reader.is_empty());
        assert_eq!(reader.as_bytes(), &data[..]);
    }

    #[test]
    fn test_event_file_reader() {
        let events = sample(25);
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&encode_all(&events)).unwrap();
        file.flush().unwrap();

        let reader = EventFileReader::open(file.path()).unwrap();
        assert_eq!(reader.record_count(), 25);
        assert_eq!(reader.read_all(), events);

        let sizes: Vec<usize> = reader.batches(10).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
    }

    #[test]
    fn test_event_file_reader_empty() {
        let file = NamedTempFile::new().unwrap();
        let reader = EventFileReader::open(file.path()).unwrap();
        assert_eq!(reader.record_count(), 0);
        assert!(reader.read_all().is_empty());
        assert_eq!(reader.batches(1024).count(), 0);
    }

    #[test]
    fn test_event_file_reader_invalid_size() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0u8; RECORD_SIZE + 7]).unwrap();
        file.flush().unwrap();

        assert!(matches!(
            EventFileReader::open(file.path()),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_stream_reader_blocks() {
        let events = sample(2500);
        let reader = EventStreamReader::new(Cursor::new(encode_all(&events)));
        let blocks: Vec<Vec<Event>> = reader.map(Result::unwrap).collect();

        assert_eq!(
            blocks.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![1024, 1024, 452]
        );
        assert_eq!(blocks.concat(), events);
    }

    #[test]
    fn test_stream_reader_exact_block() {
        let events = sample(4);
        let mut reader = EventStreamReader::with_block_events(Cursor::new(encode_all(&events)), 4);
        assert_eq!(reader.read_block().unwrap().unwrap().len(), 4);
        assert!(reader.read_block().unwrap().is_none());
        assert_eq!(reader.offset(), 4 * RECORD_SIZE as u64);
    }

    #[test]
    fn test_stream_reader_truncated() {
        let mut bytes = encode_all(&sample(3));
        bytes.truncate(2 * RECORD_SIZE + 20);
        let mut reader = EventStreamReader::new(Cursor::new(bytes));

        assert_eq!(reader.read_block().unwrap().unwrap().len(), 2);
        match reader.read_block() {
            Err(Error::TruncatedRecord { offset, len }) => {
                assert_eq!(offset, 2 * RECORD_SIZE as u64);
                assert_eq!(len, 20);
            }
            other => panic!("expected truncated record, got {other:?}"),
        }
        assert!(reader.read_block().unwrap().is_none());
    }

    #[test]
    fn test_stream_reader_only_partial() {
        let mut reader = EventStreamReader::new(Cursor::new(vec![0u8; 10]));
        assert!(matches!(
            reader.read_block(),
            Err(Error::TruncatedRecord { offset: 0, len: 10 })
        ));
        assert!(reader.next().is_none());
    }
}
