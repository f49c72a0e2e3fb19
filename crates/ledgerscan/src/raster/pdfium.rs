use image::{imageops, Rgba, RgbaImage};
use log::debug;
use pdfium_render::prelude::{PdfRenderConfig, Pdfium};

use crate::error::ProcessError;
use crate::raster::{PageImage, RasterStrategy};

/// In-process rendering fallback via pdfium. Used when the CLI rasterizer is
/// unavailable or produced nothing. Pages are rendered at a higher scale and
/// composited onto an explicit white background: scanned documents with
/// transparent backgrounds otherwise render blank.
pub struct PdfiumStrategy {
    scale: f32,
}

impl PdfiumStrategy {
    pub fn new(scale: f32) -> Self {
        Self { scale }
    }

    fn bind() -> Result<Pdfium, ProcessError> {
        Pdfium::bind_to_system_library()
            .map(Pdfium::new)
            .map_err(|e| {
                ProcessError::Rasterize(format!("pdfium library not bindable: {e:?}"))
            })
    }
}

impl RasterStrategy for PdfiumStrategy {
    fn name(&self) -> &'static str {
        "pdfium"
    }

    fn available(&self) -> bool {
        Pdfium::bind_to_system_library().is_ok()
    }

    fn rasterize(
        &self,
        pdf_bytes: &[u8],
        max_pages: usize,
    ) -> Result<Vec<PageImage>, ProcessError> {
        let _span = tracing::info_span!("raster.pdfium").entered();

        let pdfium = Self::bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(|e| ProcessError::Rasterize(format!("pdfium failed to load PDF: {e:?}")))?;

        let config = PdfRenderConfig::new().scale_page_by_factor(self.scale);

        let mut pages = Vec::new();
        for (index, page) in document.pages().iter().enumerate() {
            if index >= max_pages {
                break;
            }
            let page_number = index as u32 + 1;

            let rendered = page
                .render_with_config(&config)
                .map_err(|e| {
                    ProcessError::Rasterize(format!(
                        "pdfium failed to render page {page_number}: {e:?}"
                    ))
                })?
                .as_image()
                .into_rgba8();

            let mut canvas =
                RgbaImage::from_pixel(rendered.width(), rendered.height(), Rgba([255, 255, 255, 255]));
            imageops::overlay(&mut canvas, &rendered, 0, 0);

            let mut png = Vec::new();
            image::DynamicImage::ImageRgba8(canvas)
                .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
                .map_err(|e| {
                    ProcessError::Rasterize(format!(
                        "Failed to encode page {page_number} to PNG: {e}"
                    ))
                })?;

            pages.push(PageImage {
                page_number,
                png,
                blank: false,
            });
        }

        if pages.is_empty() {
            return Err(ProcessError::Rasterize(
                "pdfium rendered no pages".to_string(),
            ));
        }

        debug!("pdfium rendered {} page(s) at {}x scale", pages.len(), self.scale);
        Ok(pages)
    }
}
