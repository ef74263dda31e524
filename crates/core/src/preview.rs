//! CSV intake: validation and a bounded preview grid.
//!
//! A file is first accepted (media type and size), then read as text
//! and cut down to the header plus the first five data rows.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    config::DEFAULT_MAX_UPLOAD_BYTES,
    error::{IntakeError, ReadError, ValidationError},
};

/// Media type accepted for upload.
pub const CSV_MEDIA_TYPE: &str = "text/csv";
/// Header row plus five data rows.
pub const PREVIEW_ROWS: usize = 6;

/// Tokenizer used for the preview grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewMode {
    /// Quote- and escape-aware CSV parsing.
    #[default]
    Quoted,
    /// Split on `\n` then `,` with no quoting, matching the web demo cell for cell.
    Compat,
}

/// One row of preview cells.
pub type PreviewRow = Vec<String>;

/// Preview grid; the first row is the header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewTable {
    rows: Vec<PreviewRow>,
}

impl PreviewTable {
    /// Build a table, keeping at most [`PREVIEW_ROWS`] rows.
    pub fn new(mut rows: Vec<PreviewRow>) -> Self {
        rows.truncate(PREVIEW_ROWS);
        Self { rows }
    }

    /// All rows including the header.
    pub fn rows(&self) -> &[PreviewRow] {
        &self.rows
    }

    /// Header row, if the table is not empty.
    pub fn header(&self) -> Option<&PreviewRow> {
        self.rows.first()
    }

    /// Rows after the header.
    pub fn data_rows(&self) -> &[PreviewRow] {
        self.rows.get(1..).unwrap_or_default()
    }

    /// Whether no rows were read.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row count including the header.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Widest row, in cells.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FileSource {
    Memory(Vec<u8>),
    Disk(PathBuf),
}

/// A file offered for upload: its declared metadata plus a way to read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    name: String,
    media_type: String,
    size: u64,
    source: FileSource,
}

impl UploadFile {
    /// An in-memory file with an explicitly declared media type.
    pub fn from_bytes(
        name: impl Into<String>,
        media_type: impl Into<String>,
        contents: impl Into<Vec<u8>>,
    ) -> Self {
        let contents = contents.into();
        Self {
            name: name.into(),
            media_type: media_type.into(),
            size: contents.len() as u64,
            source: FileSource::Memory(contents),
        }
    }

    /// Describe a file on disk. The media type is inferred from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ReadError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| ReadError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            name,
            media_type: media_type_for(path).to_string(),
            size: metadata.len(),
            source: FileSource::Disk(path.to_path_buf()),
        })
    }

    /// File name without directories.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared media type.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read the whole payload.
    pub async fn read_bytes(&self) -> Result<Vec<u8>, ReadError> {
        match &self.source {
            FileSource::Memory(bytes) => Ok(bytes.clone()),
            FileSource::Disk(path) => {
                tokio::fs::read(path)
                    .await
                    .map_err(|source| ReadError::Io {
                        path: path.display().to_string(),
                        source,
                    })
            }
        }
    }
}

impl fmt::Display for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.2} KB)", self.name, self.size as f64 / 1024.0)
    }
}

/// Media type a browser would declare for `path`.
pub fn media_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("csv") => CSV_MEDIA_TYPE,
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

/// Holds the currently accepted file and its preview.
#[derive(Debug, Clone)]
pub struct FilePreviewer {
    max_bytes: u64,
    mode: PreviewMode,
    accepted: Option<UploadFile>,
    table: Option<PreviewTable>,
}

impl Default for FilePreviewer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPLOAD_BYTES, PreviewMode::default())
    }
}

impl FilePreviewer {
    /// Create a previewer with a size bound and tokenizer.
    pub fn new(max_bytes: u64, mode: PreviewMode) -> Self {
        Self {
            max_bytes,
            mode,
            accepted: None,
            table: None,
        }
    }

    /// Validate a file's declared type and size.
    ///
    /// A rejected file also discards whatever was accepted before.
    pub fn accept(&mut self, file: UploadFile) -> Result<(), ValidationError> {
        if let Err(err) = self.validate(&file) {
            debug!(name = %file.name, %err, "rejected upload");
            self.clear();
            return Err(err);
        }
        self.accepted = Some(file);
        self.table = None;
        Ok(())
    }

    /// Read `file` and cut it down to the preview grid.
    pub async fn preview(&self, file: &UploadFile) -> Result<PreviewTable, ReadError> {
        let bytes = file.read_bytes().await?;
        let text = String::from_utf8(bytes)?;
        tokenize(&text, self.mode)
    }

    /// Accept and preview a file from disk, keeping both as state.
    pub async fn load(&mut self, path: impl AsRef<Path>) -> Result<&PreviewTable, IntakeError> {
        let file = match UploadFile::from_path(path).await {
            Ok(file) => file,
            Err(err) => {
                self.clear();
                return Err(err.into());
            }
        };
        self.accept(file.clone())?;
        match self.preview(&file).await {
            Ok(table) => {
                info!(name = %file.name, rows = table.len(), "previewed upload");
                let table = self.table.insert(table);
                Ok(&*table)
            }
            Err(err) => {
                self.clear();
                Err(err.into())
            }
        }
    }

    /// Record a preview produced for the accepted file.
    pub fn set_table(&mut self, table: PreviewTable) {
        if self.accepted.is_some() {
            self.table = Some(table);
        }
    }

    /// Currently accepted file.
    pub fn accepted(&self) -> Option<&UploadFile> {
        self.accepted.as_ref()
    }

    /// Preview of the accepted file, once read.
    pub fn table(&self) -> Option<&PreviewTable> {
        self.table.as_ref()
    }

    /// Tokenizer in use.
    pub fn mode(&self) -> PreviewMode {
        self.mode
    }

    /// Drop the accepted file and its preview.
    pub fn clear(&mut self) {
        self.accepted = None;
        self.table = None;
    }

    fn validate(&self, file: &UploadFile) -> Result<(), ValidationError> {
        let media_type = file
            .media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if media_type != CSV_MEDIA_TYPE {
            return Err(ValidationError::NotCsv {
                media_type: file.media_type.clone(),
            });
        }
        if file.size > self.max_bytes {
            return Err(ValidationError::TooLarge {
                size: file.size,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }
}

/// Split `text` into at most [`PREVIEW_ROWS`] rows.
pub fn tokenize(text: &str, mode: PreviewMode) -> Result<PreviewTable, ReadError> {
    match mode {
        PreviewMode::Compat => Ok(split_naive(text)),
        PreviewMode::Quoted => split_quoted(text),
    }
}

fn split_naive(text: &str) -> PreviewTable {
    let rows = text
        .split('\n')
        .take(PREVIEW_ROWS)
        .map(|line| line.split(',').map(str::to_string).collect())
        .collect();
    PreviewTable::new(rows)
}

fn split_quoted(text: &str) -> Result<PreviewTable, ReadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut rows = Vec::with_capacity(PREVIEW_ROWS);
    for record in reader.records().take(PREVIEW_ROWS) {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(PreviewTable::new(rows))
}
