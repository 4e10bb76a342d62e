use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use channel_core::ListingRecord;
use crawl_logging::crawl_info;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("output path {0} has no file name")]
    NoFileName(PathBuf),
    #[error("could not encode listing {source_id}: {source}")]
    Encode {
        source_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingExport {
    pub path: PathBuf,
    pub records: usize,
}

/// Creates `dir` if needed and checks that a file can be placed in it.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    NamedTempFile::new_in(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    Ok(())
}

/// One JSON object per line, in input order.
pub fn encode_json_lines(listings: &[ListingRecord]) -> Result<String, PersistError> {
    let mut out = String::new();
    for listing in listings {
        let line = serde_json::to_string(listing).map_err(|source| PersistError::Encode {
            source_id: listing.source_id.clone(),
            source,
        })?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

/// Writes files into a directory through a temp file and a rename, so
/// readers never observe a partial file.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Replaces `path` with the listings as JSON Lines.
pub fn export_listings(path: &Path, listings: &[ListingRecord]) -> Result<ListingExport, PersistError> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| PersistError::NoFileName(path.to_path_buf()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let content = encode_json_lines(listings)?;
    let written = AtomicFileWriter::new(dir).write(filename, &content)?;
    crawl_info!("Wrote {} listings to {}", listings.len(), written.display());
    Ok(ListingExport {
        path: written,
        records: listings.len(),
    })
}
