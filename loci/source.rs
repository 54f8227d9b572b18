// ========================================================================================
//
//                        Line-oriented access to variant tables
//
// ========================================================================================

use flate2::read::MultiGzDecoder;
use std::cell::Cell;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Opening {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Error reading {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A trait that abstracts sequential, line-oriented access to a variant table,
/// regardless of whether the bytes on disk are compressed.
pub trait TextSource {
    /// Size of the underlying file in bytes, when known.
    fn len(&self) -> Option<u64> {
        None
    }

    /// Bytes consumed from the underlying file so far.
    fn consumed(&self) -> u64;

    /// Returns the next line without its terminator, or `None` at end of input.
    fn next_line<'a>(&'a mut self) -> Result<Option<&'a [u8]>, SourceError>;
}

/// Opens `path` for reading, transparently decompressing `.gz` files.
pub fn open_text_source(path: &Path) -> Result<Box<dyn TextSource>, SourceError> {
    let file = File::open(path).map_err(|source| SourceError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let len = file
        .metadata()
        .map_err(|source| SourceError::Open {
            path: path.display().to_string(),
            source,
        })?
        .len();

    let consumed = Rc::new(Cell::new(0));
    let counter = CountingReader {
        inner: file,
        count: Rc::clone(&consumed),
    };
    let reader: Box<dyn BufRead> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(BufReader::new(MultiGzDecoder::new(counter)))
    } else {
        Box::new(BufReader::new(counter))
    };

    Ok(Box::new(LocalTextSource {
        reader,
        consumed,
        line: Vec::with_capacity(1024),
        line_active: false,
        len,
        path_display: path.display().to_string(),
    }))
}

struct LocalTextSource {
    reader: Box<dyn BufRead>,
    consumed: Rc<Cell<u64>>,
    line: Vec<u8>,
    line_active: bool,
    len: u64,
    path_display: String,
}

impl TextSource for LocalTextSource {
    fn len(&self) -> Option<u64> {
        Some(self.len)
    }

    fn consumed(&self) -> u64 {
        self.consumed.get()
    }

    fn next_line<'a>(&'a mut self) -> Result<Option<&'a [u8]>, SourceError> {
        if self.line_active {
            self.line.clear();
            self.line_active = false;
        }

        let bytes_read = self
            .reader
            .read_until(b'\n', &mut self.line)
            .map_err(|source| SourceError::Read {
                path: self.path_display.clone(),
                source,
            })?;

        if bytes_read == 0 {
            return Ok(None);
        }

        if self.line.last() == Some(&b'\n') {
            self.line.pop();
        }
        if self.line.last() == Some(&b'\r') {
            self.line.pop();
        }

        self.line_active = true;
        Ok(Some(&self.line))
    }
}

/// Wraps the raw file so progress can be reported in on-disk bytes even when the
/// table is decompressed on the fly.
struct CountingReader {
    inner: File,
    count: Rc<Cell<u64>>,
}

impl Read for CountingReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.count.set(self.count.get() + read as u64);
        Ok(read)
    }
}
