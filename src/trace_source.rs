//! Trace source abstraction
//!
//! This module provides a trait-based abstraction over where aircraft-day trace documents
//! come from. This enables:
//! - Production: decompressed `trace_full_<icao>.json` files on disk
//! - Testing: documents held in memory
//!
//! Sources are indexable so a worker pool can pull documents in any order.
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Trait for indexable sources of raw trace documents
pub trait TraceSource: Sync {
    /// Number of documents in the source
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Human-readable name of a document, used in logs and the rejection list
    fn label(&self, index: usize) -> String;

    /// Read the raw JSON text of one document
    fn load(&self, index: usize) -> Result<String>;
}

/// Trace files discovered on disk
pub struct FileTraceSource {
    files: Vec<PathBuf>,
}

impl FileTraceSource {
    /// Collect `*.json` files from the given files and directories (recursively), sorted
    pub fn discover(paths: &[PathBuf]) -> Result<Self> {
        let mut files = Vec::new();
        for path in paths {
            if path.is_dir() {
                collect_json_files(path, &mut files)?;
            } else if path.is_file() {
                files.push(path.clone());
            } else {
                anyhow::bail!("Trace path {:?} does not exist", path);
            }
        }
        files.sort();
        files.dedup();

        info!("Discovered {} trace files", files.len());
        Ok(Self { files })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

fn collect_json_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to read directory {:?}", dir))?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to read entry in {:?}", dir))?
            .path();
        if path.is_dir() {
            collect_json_files(&path, files)?;
        } else if is_trace_file(&path) {
            files.push(path);
        } else {
            debug!("Skipping non-trace file {:?}", path);
        }
    }
    Ok(())
}

/// `trace_full_<icao>.json` and any other `*.json` document
fn is_trace_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

impl TraceSource for FileTraceSource {
    fn len(&self) -> usize {
        self.files.len()
    }

    fn label(&self, index: usize) -> String {
        self.files
            .get(index)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| format!("#{}", index))
    }

    fn load(&self, index: usize) -> Result<String> {
        let path = self
            .files
            .get(index)
            .with_context(|| format!("No trace file at index {}", index))?;
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
    }
}

/// In-memory documents, for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct MemoryTraceSource {
    documents: Vec<(String, String)>,
}

impl MemoryTraceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: &str, json: impl Into<String>) {
        self.documents.push((label.to_string(), json.into()));
    }
}

impl TraceSource for MemoryTraceSource {
    fn len(&self) -> usize {
        self.documents.len()
    }

    fn label(&self, index: usize) -> String {
        self.documents
            .get(index)
            .map(|(label, _)| label.clone())
            .unwrap_or_else(|| format!("#{}", index))
    }

    fn load(&self, index: usize) -> Result<String> {
        self.documents
            .get(index)
            .map(|(_, json)| json.clone())
            .with_context(|| format!("No document at index {}", index))
    }
}
