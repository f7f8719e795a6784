//! Writing the descriptor to disk and echoing it to the terminal.
//!
//! The file only appears once the full document is serialized: content goes
//! to a hidden sibling first and is renamed over the target.

use crate::core::error::KgCwlError;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, KgCwlError> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    Ok(text)
}

fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "descriptor.json".to_string());
    target.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}

/// Write `contents` to `target`, replacing any existing file. Last writer wins.
pub fn write_atomic(target: &Path, contents: &str) -> Result<(), KgCwlError> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let staging = staging_path(target);
    let result = (|| -> Result<(), KgCwlError> {
        let mut file = fs::File::create(&staging)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        fs::rename(&staging, target)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&staging);
    }
    result
}

/// Collapse whitespace and bound length for one-line terminal display.
pub fn compact_line(input: &str, max_chars: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    let preview: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}
