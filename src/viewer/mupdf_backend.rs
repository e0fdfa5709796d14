//! PDF rendering through MuPDF

use mupdf::{Colorspace, Document, Matrix, Pixmap};

use super::backend::{PageBackend, PageDocument, check_page};
use super::request::RenderFault;
use super::types::{Surface, Viewport};

pub struct MupdfBackend;

impl PageBackend for MupdfBackend {
    fn open(&self, location: &str) -> Result<Box<dyn PageDocument>, RenderFault> {
        let doc = Document::open(location)?;
        let page_count = doc.page_count()?.max(0) as usize;
        if page_count == 0 {
            return Err(RenderFault::EmptyDocument);
        }
        Ok(Box::new(MupdfDocument { doc, page_count }))
    }
}

struct MupdfDocument {
    doc: Document,
    page_count: usize,
}

impl PageDocument for MupdfDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn viewport(&self, page: usize, scale: f32) -> Result<Viewport, RenderFault> {
        check_page(page, self.page_count)?;
        let bounds = self.doc.load_page((page - 1) as i32)?.bounds()?;
        Ok(Viewport::from_page_size(
            page,
            bounds.x1 - bounds.x0,
            bounds.y1 - bounds.y0,
            scale,
        ))
    }

    fn render(&self, viewport: &Viewport) -> Result<Surface, RenderFault> {
        check_page(viewport.page, self.page_count)?;
        let page = self.doc.load_page((viewport.page - 1) as i32)?;
        let transform = Matrix::new_scale(viewport.scale, viewport.scale);
        let pixmap = page.to_pixmap(&transform, &Colorspace::device_rgb(), false, false)?;
        let pixels = pixmap_to_rgb(&pixmap)?;
        Ok(Surface::new(
            viewport,
            pixmap.width(),
            pixmap.height(),
            pixels,
        ))
    }
}

fn pixmap_to_rgb(pixmap: &Pixmap) -> Result<Vec<u8>, RenderFault> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(RenderFault::generic(format!(
            "Unsupported pixmap format: {n} channels"
        )));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    if samples.len() < stride.saturating_mul(height) || row_bytes > stride {
        return Err(RenderFault::generic("Pixmap buffer size mismatch"));
    }

    let mut out = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        let row_start = y * stride;
        let row = &samples[row_start..row_start + row_bytes];
        if n == 3 {
            out.extend_from_slice(row);
        } else {
            for px in row.chunks_exact(n) {
                out.extend_from_slice(&px[..3]);
            }
        }
    }

    Ok(out)
}
