//! Append-only ZIP → coordinate cache.
//!
//! One `zip,lat,lng` record per line, coordinates formatted to 4 decimal
//! places. Lookups return the first matching record; appends never rewrite
//! existing lines.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::types::{Coordinate, ZipCode};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cache task failed: {0}")]
    Task(String),
}

impl CacheError {
    fn io(path: &Path, source: io::Error) -> Self {
        CacheError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// File-backed geocode cache
#[derive(Debug, Clone)]
pub struct GeocodeCache {
    path: PathBuf,
}

impl GeocodeCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Find the first record for `zip`.
    ///
    /// A missing file is an empty cache. Malformed lines are skipped.
    pub fn lookup(&self, zip: &ZipCode) -> Result<Option<Coordinate>, CacheError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(&self.path, e)),
        };

        let mut reader = BufReader::new(file);
        let mut raw = Vec::new();
        let mut index = 0usize;

        loop {
            raw.clear();
            let read = reader
                .read_until(b'\n', &mut raw)
                .map_err(|e| CacheError::io(&self.path, e))?;
            if read == 0 {
                break;
            }
            index += 1;

            // Undecodable bytes are just another malformed line
            let entry = std::str::from_utf8(&raw).ok().and_then(|line| {
                if line.trim().is_empty() {
                    Some(None)
                } else {
                    parse_entry(line).map(Some)
                }
            });

            match entry {
                Some(Some((key, coordinate))) if key == zip.as_str() => return Ok(Some(coordinate)),
                Some(_) => {}
                None => {
                    tracing::warn!("Skipping malformed cache line {} in {:?}", index, self.path);
                }
            }
        }

        Ok(None)
    }

    /// Durably append one record.
    ///
    /// The record is written with a single `write_all` on a file opened in
    /// append mode, so concurrent writers never interleave partial lines.
    pub fn append(&self, zip: &ZipCode, coordinate: Coordinate) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| CacheError::io(&self.path, e))?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| CacheError::io(&self.path, e))?;

        let mut record = String::new();
        if !ends_with_newline(&mut file).map_err(|e| CacheError::io(&self.path, e))? {
            record.push('\n');
        }
        record.push_str(&format_entry(zip, coordinate));

        file.write_all(record.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|e| CacheError::io(&self.path, e))?;

        tracing::debug!("Cached coordinates for ZIP {} in {:?}", zip, self.path);
        Ok(())
    }

    /// `lookup` on the blocking pool.
    pub async fn lookup_async(&self, zip: &ZipCode) -> Result<Option<Coordinate>, CacheError> {
        let cache = self.clone();
        let zip = zip.clone();
        tokio::task::spawn_blocking(move || cache.lookup(&zip))
            .await
            .map_err(|e| CacheError::Task(e.to_string()))?
    }

    /// `append` on the blocking pool.
    pub async fn append_async(&self, zip: &ZipCode, coordinate: Coordinate) -> Result<(), CacheError> {
        let cache = self.clone();
        let zip = zip.clone();
        tokio::task::spawn_blocking(move || cache.append(&zip, coordinate))
            .await
            .map_err(|e| CacheError::Task(e.to_string()))?
    }
}

/// Serialize one record, newline included
pub fn format_entry(zip: &ZipCode, coordinate: Coordinate) -> String {
    format!(
        "{},{:.4},{:.4}\n",
        zip,
        coordinate.latitude(),
        coordinate.longitude()
    )
}

/// Parse `zip,lat,lng`; `None` if the line is not a well-formed record.
fn parse_entry(line: &str) -> Option<(&str, Coordinate)> {
    let mut fields = line.trim().split(',');
    let zip = fields.next()?.trim();
    let latitude: f64 = fields.next()?.trim().parse().ok()?;
    let longitude: f64 = fields.next()?.trim().parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    let coordinate = Coordinate::rounded(latitude, longitude)?;
    Some((zip, coordinate))
}

/// True for an empty file or one whose last byte is a newline.
fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
