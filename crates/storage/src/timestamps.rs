//! Harvest-side timestamp files.
//!
//! Each harvesting database publishes a tab-separated file of
//! `identifier<TAB>timestamp` lines. Files are merged in increasing order of
//! importance, so a more important database overrides the timestamp of a
//! less important one for the same identifier.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info};

use crate::error::StorageError;

fn read_lines(path: &Path) -> Result<String, StorageError> {
    std::fs::read_to_string(path).map_err(|source| StorageError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn split_columns<'l>(path: &Path, index: usize, line: &'l str) -> Result<(&'l str, &'l str), StorageError> {
    line.split_once('\t').ok_or_else(|| StorageError::MalformedTimestampLine {
        path: path.display().to_string(),
        line: index + 1,
    })
}

/// Read one `identifier<TAB>timestamp` file. Later lines win over earlier
/// ones; blank lines are skipped.
pub fn read_timestamp_file(path: &Path) -> Result<BTreeMap<String, String>, StorageError> {
    let text = read_lines(path)?;
    let mut timestamps = BTreeMap::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let (identifier, timestamp) = split_columns(path, index, line)?;
        timestamps.insert(identifier.to_string(), timestamp.to_string());
    }
    debug!(path = %path.display(), count = timestamps.len(), "read timestamp file");
    Ok(timestamps)
}

/// Read the published-eprint mapping (`eprint<TAB>published identifier`)
/// and return the identifiers of its second column.
pub fn read_published_eprints(path: &Path) -> Result<Vec<String>, StorageError> {
    let text = read_lines(path)?;
    let mut identifiers = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let (_, published) = split_columns(path, index, line)?;
        identifiers.push(published.trim().to_string());
    }
    Ok(identifiers)
}

/// Merge timestamp files given in increasing order of importance, then drop
/// the identifiers listed in the published-eprints mapping, since those
/// records are catalogued under their published identifier instead.
pub fn load_harvest_timestamps<P: AsRef<Path>>(
    files: &[P],
    published_eprints: Option<&Path>,
) -> Result<BTreeMap<String, String>, StorageError> {
    let mut timestamps = BTreeMap::new();
    for file in files {
        timestamps.extend(read_timestamp_file(file.as_ref())?);
    }

    if let Some(path) = published_eprints {
        let mut removed = 0usize;
        for identifier in read_published_eprints(path)? {
            if timestamps.remove(&identifier).is_some() {
                removed += 1;
            }
        }
        debug!(removed, "dropped published eprints from harvest timestamps");
    }

    info!(files = files.len(), identifiers = timestamps.len(), "loaded harvest timestamps");
    Ok(timestamps)
}
