//! Typst rendering engine.
//!
//! Turns a laid-out document into Typst source with absolutely placed
//! elements, writes it to a temporary directory, invokes the compiler and
//! reads back the PDF. The engine is located lazily on first use.

use async_trait::async_trait;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};
use tokio::sync::OnceCell;

use super::common::escape_typst_string;
use super::layout::{Align, Element, LaidOutDocument, Weight};
use super::DocumentError;

const SOURCE_FILE: &str = "document.typ";
const OUTPUT_FILE: &str = "document.pdf";

/// Converts a laid-out document into a binary artifact.
#[async_trait]
pub trait PdfEngine: Send + Sync {
    async fn render(&self, document: &LaidOutDocument) -> Result<Vec<u8>, DocumentError>;
}

/// Typst source for a laid-out document. Pure and deterministic: the
/// document date is pinned to `none` so the PDF carries no timestamp.
pub fn typst_source(document: &LaidOutDocument) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "#set document(title: \"{}\", date: none)",
        escape_typst_string(&document.title)
    );
    out.push_str("#set page(paper: \"a4\", margin: 0mm)\n");
    out.push_str(
        "#set text(font: (\"Liberation Serif\", \"DejaVu Serif\", \"Libertinus Serif\"), lang: \"bg\")\n",
    );

    for (i, page) in document.pages.iter().enumerate() {
        if i > 0 {
            out.push_str("#pagebreak()\n");
        }
        let _ = writeln!(out, "// page {}", page.number);
        for element in &page.elements {
            match element {
                Element::Text(block) => {
                    let align = match block.align {
                        Align::Left => "left",
                        Align::Center => "center",
                    };
                    let weight = match block.weight {
                        Weight::Regular => "regular",
                        Weight::Bold => "bold",
                    };
                    let _ = writeln!(
                        out,
                        "#place(top + left, dx: {:.2}mm, dy: {:.2}mm, box(width: {:.2}mm, align({}, text(size: {:.1}pt, weight: \"{}\", \"{}\"))))",
                        block.x_mm,
                        block.y_mm,
                        block.width_mm,
                        align,
                        block.size_pt,
                        weight,
                        escape_typst_string(&block.text)
                    );
                }
                Element::Rule(rule) => {
                    let _ = writeln!(
                        out,
                        "#place(top + left, dx: {:.2}mm, dy: {:.2}mm, line(length: {:.2}mm, stroke: 0.5pt))",
                        rule.x_mm, rule.y_mm, rule.length_mm
                    );
                }
            }
        }
    }
    out
}

/// Engine backed by the `typst` command line compiler.
pub struct TypstRenderEngine {
    binary: PathBuf,
}

impl TypstRenderEngine {
    /// Check that the compiler can be executed and report its version.
    pub async fn locate(binary: &Path) -> Result<Self, DocumentError> {
        let output = tokio::process::Command::new(binary)
            .arg("--version")
            .output()
            .await
            .map_err(|e| {
                DocumentError::EngineUnavailable(format!("{}: {}", binary.display(), e))
            })?;

        if !output.status.success() {
            return Err(DocumentError::EngineUnavailable(format!(
                "{} --version exited with {}",
                binary.display(),
                output.status
            )));
        }

        log::info!(
            "Using PDF engine {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(Self {
            binary: binary.to_path_buf(),
        })
    }
}

#[async_trait]
impl PdfEngine for TypstRenderEngine {
    async fn render(&self, document: &LaidOutDocument) -> Result<Vec<u8>, DocumentError> {
        let source = typst_source(document);
        let binary = self.binary.clone();
        tokio::task::spawn_blocking(move || {
            let temp_dir = tempdir().map_err(DocumentError::TempDir)?;
            fs::write(temp_dir.path().join(SOURCE_FILE), source)
                .map_err(DocumentError::WriteTypst)?;
            compile_typst_to_pdf(&binary, &temp_dir)
        })
        .await
        .map_err(|e| DocumentError::Join(e.to_string()))?
    }
}

/// Compile the source file in `temp_dir` to PDF.
fn compile_typst_to_pdf(binary: &Path, temp_dir: &TempDir) -> Result<Vec<u8>, DocumentError> {
    let typ_path = temp_dir.path().join(SOURCE_FILE);
    let output_path = temp_dir.path().join(OUTPUT_FILE);

    let status = Command::new(binary)
        .arg("compile")
        .arg(&typ_path)
        .arg(&output_path)
        .current_dir(temp_dir.path())
        .status()
        .map_err(DocumentError::TypstIo)?;

    if !status.success() {
        let code = status.code().unwrap_or(-1);
        return Err(DocumentError::TypstExit(code));
    }

    fs::read(&output_path).map_err(DocumentError::ReadPdf)
}

/// PDF engine that is located on first use and shared afterwards.
pub struct LazyEngine {
    binary: PathBuf,
    engine: OnceCell<Arc<dyn PdfEngine>>,
}

impl LazyEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            engine: OnceCell::new(),
        }
    }

    /// An already loaded engine; used by hosts that bring their own.
    pub fn preloaded(engine: Arc<dyn PdfEngine>) -> Self {
        Self {
            binary: PathBuf::new(),
            engine: OnceCell::new_with(Some(engine)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.engine.initialized()
    }

    pub async fn get(&self) -> Result<Arc<dyn PdfEngine>, DocumentError> {
        let engine = self
            .engine
            .get_or_try_init(|| async {
                log::info!("Loading PDF engine from {}", self.binary.display());
                let engine = TypstRenderEngine::locate(&self.binary).await?;
                Ok::<Arc<dyn PdfEngine>, DocumentError>(Arc::new(engine))
            })
            .await?;
        Ok(Arc::clone(engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::layout::LayoutBuilder;

    fn sample() -> LaidOutDocument {
        let mut builder = LayoutBuilder::new("Пълномощно \"А\"");
        builder.heading("ПЪЛНОМОЩНО").body("Долуподписаният ..........");
        builder.signatures(&[("Упълномощител:", "..........".to_string())]);
        builder.finish()
    }

    #[test]
    fn test_typst_source_is_deterministic() {
        assert_eq!(typst_source(&sample()), typst_source(&sample()));
    }

    #[test]
    fn test_typst_source_contents() {
        let source = typst_source(&sample());
        assert!(source.contains("date: none"));
        assert!(source.contains(r#"title: "Пълномощно \"А\"""#));
        assert!(source.contains("\"ПЪЛНОМОЩНО\""));
        assert!(source.contains("line(length:"));
        assert!(!source.contains("#pagebreak()"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_engine_unavailable() {
        let engine = LazyEngine::new("/nonexistent/typst-binary");
        let result = engine.get().await;
        assert!(matches!(result, Err(DocumentError::EngineUnavailable(_))));
        assert!(!engine.is_loaded());
    }
}
