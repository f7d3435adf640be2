//! # Append-only Message Logs
//!
//! One CSV file per persisted stream, named `<system>_<type>.csv`. The
//! header row is [`MessageSchema::columns`]: `timestamp` followed by every
//! field, with array fields flattened to `name_0 .. name_{n-1}`. Each
//! arrival appends one row and flushes it.
//!
//! Reading a log back needs the same schema; [`MessageLog::read_all`]
//! rebuilds full [`Message`] values from the rows.

use crate::error::{Result, TelemetryError};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use types::{ComponentId, Message, MessageKey, MessageSchema};

pub struct MessageLog {
    path: PathBuf,
    writer: BufWriter<File>,
    rows: u64,
}

impl MessageLog {
    pub fn file_name(key: MessageKey) -> String {
        format!("{}_{}.csv", key.system, key.type_id)
    }

    pub fn path_for(dir: &Path, key: MessageKey) -> PathBuf {
        dir.join(Self::file_name(key))
    }

    /// Open for appending, writing the header if the file is new
    ///
    /// An existing file must carry the same header as `schema`.
    pub fn open(dir: &Path, key: MessageKey, schema: &MessageSchema) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| TelemetryError::persistence(dir, e))?;
        let path = Self::path_for(dir, key);
        let header = schema.columns().join(",");

        let existing = match fs::metadata(&path) {
            Ok(meta) => meta.len() > 0,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(TelemetryError::persistence(&path, e)),
        };

        if existing {
            let found = read_header(&path)?;
            if found != header {
                return Err(TelemetryError::persistence(
                    &path,
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("log header '{}' does not match schema '{}'", found, header),
                    ),
                ));
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| TelemetryError::persistence(&path, e))?;
        let mut log = Self {
            path,
            writer: BufWriter::new(file),
            rows: 0,
        };

        if !existing {
            log.write_line(&header)?;
            debug!("Created message log {:?}", log.path);
        }
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended through this handle
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn append(&mut self, msg: &Message) -> Result<()> {
        let line = msg
            .to_row()
            .iter()
            .map(|cell| escape(cell))
            .collect::<Vec<_>>()
            .join(",");
        self.write_line(&line)?;
        self.rows += 1;
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{}", line)
            .and_then(|_| self.writer.flush())
            .map_err(|e| TelemetryError::persistence(&self.path, e))
    }

    /// Rebuild every row of a log as messages of `key.system`
    pub fn read_all(path: &Path, schema: &Arc<MessageSchema>, key: MessageKey) -> Result<Vec<Message>> {
        let file = File::open(path).map_err(|e| TelemetryError::persistence(path, e))?;
        let mut lines = BufReader::new(file).lines();

        let header = match lines.next() {
            Some(line) => line.map_err(|e| TelemetryError::persistence(path, e))?,
            None => return Ok(Vec::new()),
        };
        let columns = split_row(&header);
        if columns != schema.columns() {
            return Err(TelemetryError::persistence(
                path,
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("log header does not match schema {}", schema.name),
                ),
            ));
        }

        let mut messages = Vec::new();
        for line in lines {
            let line = line.map_err(|e| TelemetryError::persistence(path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let cells = split_row(&line);
            let cells: Vec<&str> = cells.iter().map(String::as_str).collect();
            messages.push(Message::from_row(
                schema.clone(),
                key.system,
                ComponentId::default(),
                &cells,
            )?);
        }
        Ok(messages)
    }

    /// The newest `count` rows of a log, oldest first
    pub fn read_tail(
        path: &Path,
        schema: &Arc<MessageSchema>,
        key: MessageKey,
        count: usize,
    ) -> Result<Vec<Message>> {
        let mut all = Self::read_all(path, schema, key)?;
        let skip = all.len().saturating_sub(count);
        Ok(all.split_off(skip))
    }
}

fn read_header(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| TelemetryError::persistence(path, e))?;
    let mut header = String::new();
    BufReader::new(file)
        .read_line(&mut header)
        .map_err(|e| TelemetryError::persistence(path, e))?;
    Ok(split_row(header.trim_end()).join(","))
}

/// Quote a cell holding a comma or quote
fn escape(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

fn split_row(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) if chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            ('"', _) => quoted = !quoted,
            (',', false) => cells.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    cells.push(current);
    cells
}
