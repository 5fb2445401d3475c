//! CSV product source: header `id,title,description,category,price`, one row per product.

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::error::{Error, Result};
use crate::types::ProductRecord;

pub const REQUIRED_COLUMNS: [&str; 5] = ["id", "title", "description", "category", "price"];

pub struct CsvRecordSource {
    path: PathBuf,
}

impl CsvRecordSource {
    /// Fails with [`Error::InputMissing`] when the file does not exist and
    /// with [`Error::InvalidRecord`] when the header lacks a required column.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(Error::InputMissing(path));
        }
        let source = Self { path };
        let headers = source.reader()?.headers()?.clone();
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                return Err(Error::InvalidRecord { line: 1, reason: format!("missing column '{column}'") });
            }
        }
        Ok(source)
    }

    pub fn path(&self) -> &Path { &self.path }

    /// Number of data rows (header excluded), malformed rows included.
    pub fn count(&self) -> Result<u64> {
        let mut reader = self.reader()?;
        let mut record = StringRecord::new();
        let mut n = 0u64;
        loop {
            match reader.read_record(&mut record) {
                Ok(true) => n += 1,
                Ok(false) => break,
                Err(e) if e.is_io_error() => return Err(read_failure(e)),
                Err(_) => n += 1,
            }
        }
        Ok(n)
    }

    /// Streams validated records in file order. Row-level problems come back
    /// as `Err(Error::InvalidRecord)` items so the caller decides whether to skip.
    pub fn records(&self) -> Result<CsvRecords> {
        let mut reader = self.reader()?;
        let headers = reader.headers()?.clone();
        Ok(CsvRecords { reader, headers, record: StringRecord::new(), done: false })
    }

    fn reader(&self) -> Result<csv::Reader<File>> {
        match ReaderBuilder::new().trim(Trim::All).flexible(true).from_path(&self.path) {
            Ok(reader) => Ok(reader),
            Err(e) if e.is_io_error() && !self.path.exists() => Err(Error::InputMissing(self.path.clone())),
            Err(e) => Err(e.into()),
        }
    }
}

/// A failed read of the input file ends the run; it is never a bad row.
fn read_failure(e: csv::Error) -> Error {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => Error::Io(io),
        other => Error::Io(std::io::Error::other(format!("{other:?}"))),
    }
}

pub struct CsvRecords {
    reader: csv::Reader<File>,
    headers: StringRecord,
    record: StringRecord,
    done: bool,
}

impl Iterator for CsvRecords {
    type Item = Result<ProductRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_record(&mut self.record) {
            Ok(false) => {
                self.done = true;
                None
            }
            Ok(true) => {
                let line = self.record.position().map_or(0, |p| p.line());
                let parsed = self
                    .record
                    .deserialize::<ProductRecord>(Some(&self.headers))
                    .map_err(|e| Error::InvalidRecord { line, reason: e.to_string() })
                    .and_then(|r| r.validate().map(|()| r).map_err(|reason| Error::InvalidRecord { line, reason }));
                Some(parsed)
            }
            Err(e) if e.is_io_error() => {
                self.done = true;
                Some(Err(read_failure(e)))
            }
            Err(e) => {
                let line = e.position().map_or(0, |p| p.line());
                Some(Err(Error::InvalidRecord { line, reason: e.to_string() }))
            }
        }
    }
}
