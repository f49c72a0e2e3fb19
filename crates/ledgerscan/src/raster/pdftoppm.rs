use std::path::PathBuf;
use std::process::Command;

use log::debug;

use crate::error::ProcessError;
use crate::raster::{PageImage, RasterStrategy};

const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// CLI rasterizer using poppler's pdftoppm at high resolution with
/// anti-aliasing. Writes the source PDF to a scratch location, collects one
/// PNG per page, verifies each header, and deletes the scratch files.
pub struct PdftoppmStrategy {
    dpi: u32,
}

impl PdftoppmStrategy {
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }

    fn scratch_paths() -> (PathBuf, PathBuf) {
        let temp_dir = std::env::temp_dir();
        let token = uuid::Uuid::new_v4();
        (
            temp_dir.join(format!("ledgerscan_{token}.pdf")),
            temp_dir.join(format!("ledgerscan_page_{token}")),
        )
    }

    /// pdftoppm zero-pads the page suffix depending on total page count.
    fn find_page_output(prefix: &PathBuf, page: u32) -> Option<PathBuf> {
        let candidates = [
            format!("{}-{}.png", prefix.display(), page),
            format!("{}-{:02}.png", prefix.display(), page),
            format!("{}-{:03}.png", prefix.display(), page),
        ];
        candidates
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
    }
}

impl RasterStrategy for PdftoppmStrategy {
    fn name(&self) -> &'static str {
        "pdftoppm"
    }

    fn available(&self) -> bool {
        Command::new("pdftoppm")
            .arg("-v")
            .output()
            .map(|_| true)
            .unwrap_or(false)
    }

    fn rasterize(
        &self,
        pdf_bytes: &[u8],
        max_pages: usize,
    ) -> Result<Vec<PageImage>, ProcessError> {
        let _span = tracing::info_span!("raster.pdftoppm").entered();

        let (pdf_path, output_prefix) = Self::scratch_paths();

        std::fs::write(&pdf_path, pdf_bytes)
            .map_err(|e| ProcessError::Rasterize(format!("Failed to write scratch PDF: {e}")))?;

        let output = Command::new("pdftoppm")
            .args([
                "-png",
                "-r",
                &self.dpi.to_string(),
                "-aa",
                "yes",
                "-f",
                "1",
                "-l",
                &max_pages.to_string(),
            ])
            .arg(&pdf_path)
            .arg(&output_prefix)
            .output();

        // Scratch PDF is no longer needed whatever happened.
        let _ = std::fs::remove_file(&pdf_path);

        let output = output.map_err(|e| {
            ProcessError::Rasterize(format!(
                "Failed to run pdftoppm: {e}. Make sure poppler-utils is installed."
            ))
        })?;

        if !output.status.success() {
            return Err(ProcessError::Rasterize(format!(
                "pdftoppm failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let mut pages = Vec::new();
        for page in 1..=max_pages as u32 {
            let Some(path) = Self::find_page_output(&output_prefix, page) else {
                break;
            };

            let png = std::fs::read(&path).map_err(|e| {
                ProcessError::Rasterize(format!("Failed to read rendered page {page}: {e}"))
            });
            let _ = std::fs::remove_file(&path);
            let png = png?;

            if png.len() <= PNG_MAGIC.len() || png[..PNG_MAGIC.len()] != PNG_MAGIC {
                return Err(ProcessError::Rasterize(format!(
                    "pdftoppm page {page} is empty or not a valid PNG"
                )));
            }

            pages.push(PageImage {
                page_number: page,
                png,
                blank: false,
            });
        }

        if pages.is_empty() {
            return Err(ProcessError::Rasterize(
                "pdftoppm produced no page images".to_string(),
            ));
        }

        debug!("pdftoppm rendered {} page(s) at {} DPI", pages.len(), self.dpi);
        Ok(pages)
    }
}
