//! File selection, validation and the upload phase.

use rand::Rng;
use std::path::{Path, PathBuf};

use crate::api::{FilePart, PDF_MIME};

pub const SUCCESS_NOTICE: &str = "Documents processed successfully!";
pub const WELCOME_FALLBACK: &str = "Documents uploaded successfully! Ask me anything about them.";
pub const EMPTY_SELECTION: &str = "Please select at least one PDF file";

const PROGRESS_CAP: f32 = 90.0;
const MAX_PROGRESS_STEP: f32 = 15.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub path: PathBuf,
    pub mime: String,
    pub size: u64,
}

impl SelectedFile {
    /// Reads name, MIME type and size for a path on disk.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        Ok(SelectedFile {
            mime: mime_for(&name),
            name,
            path: path.to_path_buf(),
            size: metadata.len(),
        })
    }

    pub fn to_part(&self) -> FilePart {
        FilePart {
            file_name: self.name.clone(),
            path: self.path.clone(),
        }
    }
}

/// Infers the MIME type from the file name.
pub fn mime_for(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FileRejected {
    #[error("{name}: Only PDF files are allowed")]
    NotPdf { name: String },
    #[error("{name}: File exceeds the {limit} limit")]
    TooLarge { name: String, limit: String },
}

/// Checks every file; returns one rejection per offending file.
pub fn validate_files(files: &[SelectedFile], max_size: u64) -> Vec<FileRejected> {
    let mut rejected = Vec::new();
    for file in files {
        if file.mime != PDF_MIME {
            rejected.push(FileRejected::NotPdf {
                name: file.name.clone(),
            });
        } else if file.size > max_size {
            rejected.push(FileRejected::TooLarge {
                name: file.name.clone(),
                limit: format_limit(max_size),
            });
        }
    }
    rejected
}

/// Files the user has picked but not yet uploaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSelection {
    files: Vec<SelectedFile>,
}

impl FileSelection {
    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Adds files, skipping paths that are already selected.
    pub fn add(&mut self, files: Vec<SelectedFile>) {
        for file in files {
            if !self.files.iter().any(|f| f.path == file.path) {
                self.files.push(file);
            }
        }
    }

    pub fn remove(&mut self, index: usize) {
        if index < self.files.len() {
            self.files.remove(index);
        }
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadPhase {
    #[default]
    Idle,
    Uploading,
    Succeeded,
}

/// Cosmetic progress estimate shown while an upload is outstanding.
///
/// It does not track bytes sent: it creeps up by random steps while the
/// request is pending, never past 90%, and jumps to 100% on completion.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimulatedProgress {
    percent: f32,
}

impl SimulatedProgress {
    pub fn percent(&self) -> f32 {
        self.percent
    }

    pub fn tick(&mut self) {
        let step = rand::thread_rng().gen_range(0.0..MAX_PROGRESS_STEP);
        self.advance(step);
    }

    pub fn advance(&mut self, step: f32) {
        if self.percent < PROGRESS_CAP {
            self.percent = (self.percent + step.max(0.0)).min(PROGRESS_CAP);
        }
    }

    pub fn complete(&mut self) {
        self.percent = 100.0;
    }

    pub fn reset(&mut self) {
        self.percent = 0.0;
    }
}

/// Formats a byte count for display, e.g. `2.4 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Formats a size limit: whole megabytes stay integral (`10 MB`), anything
/// else falls back to [`format_size`].
pub fn format_limit(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if bytes > 0 && bytes % MIB == 0 {
        format!("{} MB", bytes / MIB)
    } else {
        format_size(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: u64 = 10 * 1024 * 1024;

    fn file(name: &str, size: u64) -> SelectedFile {
        SelectedFile {
            name: name.to_string(),
            path: PathBuf::from(format!("/tmp/{name}")),
            mime: mime_for(name),
            size,
        }
    }

    #[test]
    fn test_mime_detection() {
        assert_eq!(mime_for("chapter3.pdf"), "application/pdf");
        assert_eq!(mime_for("REPORT.PDF"), "application/pdf");
        assert_ne!(mime_for("notes.docx"), "application/pdf");
        assert_eq!(mime_for("no_extension"), "application/octet-stream");
    }

    #[test]
    fn test_valid_pdfs_pass() {
        let files = vec![file("a.pdf", 5 * 1024 * 1024), file("b.pdf", LIMIT)];
        assert!(validate_files(&files, LIMIT).is_empty());
    }

    #[test]
    fn test_one_rejection_per_offending_file() {
        let files = vec![
            file("ok.pdf", 1024),
            file("notes.docx", 1024),
            file("huge.pdf", LIMIT + 1),
        ];

        let rejected = validate_files(&files, LIMIT);
        assert_eq!(rejected.len(), 2);
        assert_eq!(rejected[0].to_string(), "notes.docx: Only PDF files are allowed");
        assert_eq!(rejected[1].to_string(), "huge.pdf: File exceeds the 10 MB limit");
    }

    #[test]
    fn test_sub_megabyte_limit_is_not_rounded_to_zero() {
        let rejected = validate_files(&[file("scan.pdf", 600 * 1024)], 512 * 1024);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].to_string(), "scan.pdf: File exceeds the 512.0 KB limit");
    }

    #[test]
    fn test_selection_skips_duplicates() {
        let mut selection = FileSelection::default();
        selection.add(vec![file("a.pdf", 10), file("b.pdf", 20)]);
        selection.add(vec![file("a.pdf", 10)]);

        assert_eq!(selection.files().len(), 2);
        assert_eq!(selection.total_size(), 30);

        selection.remove(0);
        assert_eq!(selection.files()[0].name, "b.pdf");
        selection.remove(5);
        assert_eq!(selection.files().len(), 1);
    }

    #[test]
    fn test_progress_is_capped_until_complete() {
        let mut progress = SimulatedProgress::default();
        for _ in 0..100 {
            progress.tick();
            assert!(progress.percent() <= 90.0);
        }

        progress.advance(50.0);
        assert_eq!(progress.percent(), 90.0);

        progress.complete();
        assert_eq!(progress.percent(), 100.0);

        progress.reset();
        assert_eq!(progress.percent(), 0.0);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_format_limit_keeps_fractions() {
        assert_eq!(format_limit(10 * 1024 * 1024), "10 MB");
        assert_eq!(format_limit(10 * 1024 * 1024 + 512 * 1024), "10.5 MB");
        assert_eq!(format_limit(512 * 1024), "512.0 KB");
        assert_eq!(format_limit(0), "0 B");
    }

    #[test]
    fn test_from_path_reads_metadata() {
        let path = std::env::temp_dir().join(format!("pdf-chat-test-{}.pdf", std::process::id()));
        std::fs::write(&path, b"%PDF-1.4 test").unwrap();

        let selected = SelectedFile::from_path(&path).unwrap();
        assert_eq!(selected.mime, "application/pdf");
        assert_eq!(selected.size, 13);
        assert_eq!(selected.to_part().path, path);

        std::fs::remove_file(&path).ok();
    }
}
