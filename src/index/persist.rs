use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::{IndexEntry, IndexHeader, VectorIndex};
use crate::{ChatError, Result};

#[derive(Serialize)]
struct PersistedIndexRef<'a> {
    header: &'a IndexHeader,
    entries: &'a [IndexEntry],
}

#[derive(Deserialize)]
struct PersistedIndex {
    header: IndexHeader,
    entries: Vec<IndexEntry>,
}

/// Write the index next to `path` and rename it into place, so readers never
/// observe a half-written file.
#[inline]
pub fn save(index: &VectorIndex, path: &Path) -> Result<()> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(directory)?;

    let temp = NamedTempFile::new_in(directory)?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        serde_json::to_writer(
            &mut writer,
            &PersistedIndexRef {
                header: index.header(),
                entries: index.entries(),
            },
        )
        .map_err(|e| ChatError::Index(format!("failed to serialize index: {e}")))?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| ChatError::Io(e.error))?;

    info!(
        "Persisted index with {} documents to {}",
        index.len(),
        path.display()
    );
    Ok(())
}

/// Load a persisted index; `None` when nothing has been written yet
#[inline]
pub fn load(path: &Path) -> Result<Option<VectorIndex>> {
    if !path.exists() {
        debug!("No persisted index at {}", path.display());
        return Ok(None);
    }

    let content = fs::read(path)?;
    let persisted: PersistedIndex = serde_json::from_slice(&content).map_err(|e| {
        ChatError::Index(format!(
            "persisted index {} is unreadable: {e}",
            path.display()
        ))
    })?;

    let index = VectorIndex::from_parts(persisted.header, persisted.entries)?;
    info!(
        "Loaded index with {} documents built at {}",
        index.len(),
        index.header().built_at
    );
    Ok(Some(index))
}

/// Fail when the index was embedded with a different model than the one configured
#[inline]
pub fn validate_model(header: &IndexHeader, configured: &str) -> Result<()> {
    if header.embedding_model == configured {
        Ok(())
    } else {
        Err(ChatError::ModelMismatch {
            built: header.embedding_model.clone(),
            configured: configured.to_string(),
        })
    }
}
