use std::io::{BufRead, Lines};

use serde::{Deserialize, Serialize};

use crate::error::TraceError;

use super::TraceRecord;

/// Layout of a delimited text trace.
///
/// Column ids are 1-based. Without a size column every object has size 1;
/// without a time column the record's position is its timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    pub delimiter: char,
    pub has_header: bool,
    pub key_column: usize,
    pub size_column: Option<usize>,
    pub time_column: Option<usize>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            has_header: false,
            key_column: 1,
            size_column: None,
            time_column: None,
        }
    }
}

/// Reader for delimited text traces
#[derive(Debug)]
pub struct CsvReader<R> {
    lines: Lines<R>,
    options: CsvOptions,
    line: u64,
    record: u64,
}

impl<R: BufRead> CsvReader<R> {
    pub fn new(inner: R, options: CsvOptions) -> Self {
        Self { lines: inner.lines(), options, line: 0, record: 0 }
    }

    fn parse_line(&self, text: &str) -> Result<TraceRecord<String>, TraceError> {
        let fields: Vec<&str> = text.split(self.options.delimiter).map(str::trim).collect();
        let id = self.field(&fields, self.options.key_column, "key")?;
        if id.is_empty() {
            return Err(self.malformed("empty object key"));
        }
        let size = match self.options.size_column {
            Some(col) => self.number(&fields, col, "size")?,
            None => 1,
        };
        let timestamp = match self.options.time_column {
            Some(col) => self.number(&fields, col, "time")?,
            None => self.record,
        };
        Ok(TraceRecord { timestamp, id: id.to_string(), size })
    }

    fn field<'a>(&self, fields: &[&'a str], column: usize, what: &str) -> Result<&'a str, TraceError> {
        column
            .checked_sub(1)
            .and_then(|i| fields.get(i).copied())
            .ok_or_else(|| self.malformed(&format!("missing {what} column {column}")))
    }

    fn number(&self, fields: &[&str], column: usize, what: &str) -> Result<u64, TraceError> {
        let text = self.field(fields, column, what)?;
        text.parse::<u64>()
            .map_err(|_| self.malformed(&format!("invalid {what} `{text}`")))
    }

    fn malformed(&self, reason: &str) -> TraceError {
        TraceError::Malformed { line: self.line, reason: reason.to_string() }
    }
}

impl<R: BufRead> Iterator for CsvReader<R> {
    type Item = Result<TraceRecord<String>, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(e) => return Some(Err(e.into())),
            };
            self.line += 1;
            if self.line == 1 && self.options.has_header {
                continue;
            }
            if text.trim().is_empty() {
                continue;
            }
            let record = self.parse_line(&text);
            self.record += 1;
            return Some(record);
        }
    }
}
