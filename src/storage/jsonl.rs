//! JSONL (JSON Lines) storage.
//!
//! Each line is a valid JSON object representing one recorded match.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::StorageError;
use crate::models::MatchResult;
use crate::observer::{ObserverError, ResultLogger};

/// JSONL file writer.
pub struct JsonlWriter<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    /// Create a new JSONL writer for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Ensure the parent directory exists.
    fn ensure_dir(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Append a single entity to the file.
    pub fn append(&self, entity: &T) -> Result<(), StorageError> {
        self.ensure_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = BufWriter::new(file);
        let json = serde_json::to_string(entity)?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;

        debug!("Appended entity to {:?}", self.path);
        Ok(())
    }
}

/// JSONL file reader.
pub struct JsonlReader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    /// Create a new JSONL reader for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Read all entities from the file. A missing file reads as empty.
    pub fn read_all(&self) -> Result<Vec<T>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut entities = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str(&line) {
                Ok(entity) => entities.push(entity),
                Err(e) => {
                    warn!(
                        "Failed to parse line {} in {:?}: {}",
                        index + 1,
                        self.path,
                        e
                    );
                }
            }
        }

        debug!("Read {} entities from {:?}", entities.len(), self.path);
        Ok(entities)
    }
}

/// One line of the result log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedMatch {
    /// Label of the group the match was played in
    pub group: String,
    pub result: MatchResult,
    pub logged_at: DateTime<Utc>,
}

/// `ResultLogger` that appends every recorded match to a JSONL file.
pub struct JsonlResultLogger {
    writer: Mutex<JsonlWriter<LoggedMatch>>,
}

impl JsonlResultLogger {
    pub fn new(path: PathBuf) -> Self {
        Self {
            writer: Mutex::new(JsonlWriter::new(path)),
        }
    }
}

impl ResultLogger for JsonlResultLogger {
    fn log_result(&self, result: &MatchResult, group: &str) -> Result<(), ObserverError> {
        let writer = self
            .writer
            .lock()
            .map_err(|_| ObserverError::Unavailable("result log writer poisoned".to_string()))?;
        writer.append(&LoggedMatch {
            group: group.to_string(),
            result: result.clone(),
            logged_at: Utc::now(),
        })?;
        Ok(())
    }
}
