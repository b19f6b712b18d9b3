//! CSV 表格读写
//!
//! The header row is mandatory. A row's index is its 0-based position among
//! the data rows.

use std::io::{Read, Write};
use std::path::Path;

use contracts::ContractError;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};

/// In-memory CSV table
#[derive(Debug, Clone)]
pub struct Table {
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

impl Table {
    /// Read a table from a CSV file
    pub fn read_csv(path: &Path) -> Result<Self, ContractError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file).map_err(|e| match e {
            ContractError::Other(message) => {
                ContractError::Other(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ContractError> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);

        let headers = rdr.headers().map_err(malformed)?.clone();
        if headers.is_empty() {
            return Err(ContractError::Other("csv has no header row".to_string()));
        }

        let rows = rdr
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(malformed)?;

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> Vec<String> {
        self.headers.iter().map(str::to_string).collect()
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `name` in the header, or `InvalidColumnError`
    pub fn column_index(&self, name: &str) -> Result<usize, ContractError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ContractError::invalid_column(name, &self.headers()))
    }

    /// Values of one column, in row order
    pub fn column(&self, index: usize) -> Vec<&str> {
        self.rows
            .iter()
            .map(|row| row.get(index).unwrap_or_default())
            .collect()
    }

    /// Write the header plus the rows at `indices` (in the given order)
    pub fn write_csv(&self, path: &Path, indices: &[usize]) -> Result<(), ContractError> {
        let file = std::fs::File::create(path)?;
        self.write_rows(file, indices)
    }

    pub fn write_rows<W: Write>(&self, writer: W, indices: &[usize]) -> Result<(), ContractError> {
        let mut wtr = WriterBuilder::new().from_writer(writer);
        wtr.write_record(&self.headers).map_err(malformed)?;
        for &i in indices {
            let row = self.rows.get(i).ok_or_else(|| {
                ContractError::Other(format!("row index {i} out of range ({} rows)", self.len()))
            })?;
            wtr.write_record(row).map_err(malformed)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn malformed(e: csv::Error) -> ContractError {
    if e.is_io_error() {
        match e.into_kind() {
            csv::ErrorKind::Io(io) => return ContractError::Io(io),
            other => return ContractError::Other(format!("malformed csv: {other:?}")),
        }
    }
    ContractError::Other(format!("malformed csv: {e}"))
}
