use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::enrich::NormalizedDoc;

pub fn ensure_dirs(raw_dir: &Path, out_dir: &Path) -> Result<()> {
    fs::create_dir_all(raw_dir)
        .with_context(|| format!("creating {}", raw_dir.display()))?;
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;
    Ok(())
}

/// Write the raw record verbatim as compact JSON.
pub fn write_raw(dir: &Path, mpid: &str, raw: &Value) -> Result<()> {
    let path = dir.join(format!("{}.json", mpid));
    let bytes = serde_json::to_vec(raw)?;
    fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))
}

/// Write the normalized document pretty-printed. serde_json leaves non-ASCII
/// characters unescaped, so formula names survive as written.
pub fn write_normalized(dir: &Path, mpid: &str, doc: &NormalizedDoc) -> Result<()> {
    let path = dir.join(format!("{}.json", mpid));
    let bytes = serde_json::to_vec_pretty(doc)?;
    fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))
}

/// Number of .json artifacts in a directory; a missing directory counts zero.
pub fn count_artifacts(dir: &Path) -> Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e).with_context(|| format!("reading {}", dir.display())),
    };
    let mut count = 0;
    for entry in entries {
        let entry = entry?;
        if entry.path().extension().is_some_and(|ext| ext == "json") {
            count += 1;
        }
    }
    Ok(count)
}
