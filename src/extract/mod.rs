// src/extract/mod.rs
//! Document text extraction.
//!
//! PDFs go through `pdftotext`; DOCX files are first converted to PDF with a
//! headless LibreOffice and then read the same way. Plain text is decoded
//! directly. The binaries are configurable so deployments can point at their
//! own installs.

pub mod identity;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

pub use identity::{extract_email, identity_or_default, DEFAULT_IDENTITY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    PlainText,
}

impl DocumentFormat {
    /// Format tag from a file name's extension (case-insensitive).
    pub fn from_filename(name: &str) -> Option<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" | "md" => Some(Self::PlainText),
            _ => None,
        }
    }
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract plain text. Empty output is an error.
    async fn extract(&self, bytes: &[u8], format: DocumentFormat) -> Result<String>;
    fn name(&self) -> &'static str;
}

/// Shells out to `pdftotext` / `libreoffice`.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    pub pdftotext_bin: PathBuf,
    pub libreoffice_bin: PathBuf,
    pub timeout: Duration,
}

impl Default for CommandExtractor {
    fn default() -> Self {
        Self {
            pdftotext_bin: PathBuf::from("pdftotext"),
            libreoffice_bin: PathBuf::from("libreoffice"),
            timeout: Duration::from_secs(60),
        }
    }
}

impl CommandExtractor {
    async fn run(&self, cmd: &mut Command, what: &str) -> Result<Vec<u8>> {
        let out = tokio::time::timeout(self.timeout, cmd.kill_on_drop(true).output())
            .await
            .map_err(|_| anyhow!("{what} timed out after {:?}", self.timeout))?
            .with_context(|| format!("spawning {what}"))?;
        if !out.status.success() {
            bail!(
                "{what} exited with {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        Ok(out.stdout)
    }

    async fn pdf_to_text(&self, pdf_path: &Path) -> Result<String> {
        let stdout = self
            .run(
                Command::new(&self.pdftotext_bin)
                    .arg("-layout")
                    .arg(pdf_path)
                    .arg("-"),
                "pdftotext",
            )
            .await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    async fn docx_to_pdf(&self, docx_path: &Path, out_dir: &Path) -> Result<PathBuf> {
        self.run(
            Command::new(&self.libreoffice_bin)
                .arg("--headless")
                .arg("--convert-to")
                .arg("pdf")
                .arg(docx_path)
                .arg("--outdir")
                .arg(out_dir),
            "libreoffice",
        )
        .await?;
        let pdf = docx_path.with_extension("pdf");
        if !pdf.exists() {
            bail!("libreoffice did not produce {}", pdf.display());
        }
        Ok(pdf)
    }
}

#[async_trait]
impl TextExtractor for CommandExtractor {
    async fn extract(&self, bytes: &[u8], format: DocumentFormat) -> Result<String> {
        let text = match format {
            DocumentFormat::PlainText => String::from_utf8_lossy(bytes).into_owned(),
            DocumentFormat::Pdf => {
                let dir = tempfile::tempdir().context("creating temp dir")?;
                let pdf = dir.path().join("input.pdf");
                tokio::fs::write(&pdf, bytes).await?;
                self.pdf_to_text(&pdf).await?
            }
            DocumentFormat::Docx => {
                let dir = tempfile::tempdir().context("creating temp dir")?;
                let docx = dir.path().join("input.docx");
                tokio::fs::write(&docx, bytes).await?;
                let pdf = self.docx_to_pdf(&docx, dir.path()).await?;
                self.pdf_to_text(&pdf).await?
            }
        };
        ensure_text(text, format)
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

fn ensure_text(text: String, format: DocumentFormat) -> Result<String> {
    if text.trim().is_empty() {
        bail!("no text extracted from {format:?} document");
    }
    debug!(target: "extract", ?format, chars = text.len(), "text extracted");
    Ok(text)
}
