//! Page rendering backends
//!
//! A backend opens a document and rasterizes individual pages. Each render
//! worker opens its own document handle, so documents need not be `Send`.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use image::ImageReader;
use image::imageops::FilterType;
use log::debug;
use zip::ZipArchive;

use super::request::RenderFault;
use super::types::{Surface, Viewport};

/// An opened document
pub trait PageDocument {
    /// Number of pages in the document
    fn page_count(&self) -> usize;

    /// Dimensions of a 1-based page at the given scale
    fn viewport(&self, page: usize, scale: f32) -> Result<Viewport, RenderFault>;

    /// Rasterize the page described by `viewport`
    fn render(&self, viewport: &Viewport) -> Result<Surface, RenderFault>;
}

/// Opens documents by location
pub trait PageBackend: Send + Sync {
    fn open(&self, location: &str) -> Result<Box<dyn PageDocument>, RenderFault>;
}

/// Pick a backend from the document's file extension
pub fn backend_for_path(path: &Path) -> Result<Box<dyn PageBackend>, RenderFault> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("cbz" | "zip") => Ok(Box::new(CbzBackend)),
        #[cfg(feature = "pdf")]
        Some("pdf") => Ok(Box::new(super::mupdf_backend::MupdfBackend)),
        #[cfg(not(feature = "pdf"))]
        Some("pdf") => Err(RenderFault::generic(
            "PDF support requires building with the `pdf` feature",
        )),
        _ => Err(RenderFault::generic(format!(
            "Unsupported document type: {}",
            path.display()
        ))),
    }
}

pub(crate) fn check_page(page: usize, page_count: usize) -> Result<(), RenderFault> {
    if page == 0 || page > page_count {
        return Err(RenderFault::PageOutOfRange { page, page_count });
    }
    Ok(())
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Comic book archives: a zip file of page images ordered by name, with
/// digit runs compared by value (`page2` before `page10`)
pub struct CbzBackend;

impl PageBackend for CbzBackend {
    fn open(&self, location: &str) -> Result<Box<dyn PageDocument>, RenderFault> {
        Ok(Box::new(CbzDocument::open(Path::new(location))?))
    }
}

pub struct CbzDocument {
    archive: RefCell<ZipArchive<BufReader<File>>>,
    entries: Vec<String>,
    sizes: RefCell<HashMap<usize, (u32, u32)>>,
}

impl CbzDocument {
    pub fn open(path: &Path) -> Result<Self, RenderFault> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(BufReader::new(file))?;

        let mut entries: Vec<String> = archive
            .file_names()
            .filter(|name| is_image_entry(name))
            .map(str::to_string)
            .collect();
        entries.sort_by(|a, b| natural_cmp(a, b));

        if entries.is_empty() {
            return Err(RenderFault::EmptyDocument);
        }
        debug!("Opened {} with {} pages", path.display(), entries.len());

        Ok(Self {
            archive: RefCell::new(archive),
            entries,
            sizes: RefCell::new(HashMap::new()),
        })
    }

    fn read_entry(&self, page: usize) -> Result<Vec<u8>, RenderFault> {
        check_page(page, self.entries.len())?;
        let mut archive = self.archive.borrow_mut();
        let mut entry = archive.by_name(&self.entries[page - 1])?;
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    fn natural_size(&self, page: usize) -> Result<(u32, u32), RenderFault> {
        if let Some(size) = self.sizes.borrow().get(&page) {
            return Ok(*size);
        }
        let bytes = self.read_entry(page)?;
        let size = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .into_dimensions()?;
        self.sizes.borrow_mut().insert(page, size);
        Ok(size)
    }
}

impl PageDocument for CbzDocument {
    fn page_count(&self) -> usize {
        self.entries.len()
    }

    fn viewport(&self, page: usize, scale: f32) -> Result<Viewport, RenderFault> {
        let (width, height) = self.natural_size(page)?;
        Ok(Viewport::from_page_size(
            page,
            width as f32,
            height as f32,
            scale,
        ))
    }

    fn render(&self, viewport: &Viewport) -> Result<Surface, RenderFault> {
        let bytes = self.read_entry(viewport.page)?;
        let img = image::load_from_memory(&bytes)?;
        let scaled = img.resize_exact(viewport.width, viewport.height, FilterType::Triangle);
        let rgb = scaled.to_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(Surface::new(viewport, width, height, rgb.into_raw()))
    }
}

fn is_image_entry(name: &str) -> bool {
    if name.ends_with('/') || name.starts_with("__MACOSX") {
        return false;
    }
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Compare names so that runs of digits compare numerically
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();
    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let left = take_digits(&mut a);
                let right = take_digits(&mut b);
                let ordering = left
                    .len()
                    .cmp(&right.len())
                    .then_with(|| left.cmp(&right));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(x), Some(y)) => {
                let ordering = x.to_ascii_lowercase().cmp(&y.to_ascii_lowercase());
                if ordering != Ordering::Equal {
                    return ordering;
                }
                a.next();
                b.next();
            }
        }
    }
}

/// Consume a digit run, leading zeros dropped
fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        if !(digits.is_empty() && c == '0') {
            digits.push(c);
        }
    }
    digits
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use image::{ImageFormat, Rgb, RgbImage};
    use zip::write::FileOptions;

    use super::*;

    fn png_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(color));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn write_cbz(dir: &Path, entries: &[(&str, Vec<u8>)]) -> std::path::PathBuf {
        let path = dir.join("book.cbz");
        let file = File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
        path
    }

    #[test]
    fn cbz_pages_are_ordered_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_cbz(
            dir.path(),
            &[
                ("002.png", png_bytes(4, 6, [0, 255, 0])),
                ("notes.txt", b"not a page".to_vec()),
                ("001.png", png_bytes(4, 6, [255, 0, 0])),
            ],
        );

        let doc = CbzDocument::open(&path).unwrap();
        assert_eq!(doc.page_count(), 2);

        let viewport = doc.viewport(1, 1.0).unwrap();
        let surface = doc.render(&viewport).unwrap();
        assert_eq!(surface.pixel(0, 0), Some([255, 0, 0]));
    }

    #[test]
    fn cbz_pages_sort_numbers_by_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_cbz(
            dir.path(),
            &[
                ("page10.png", png_bytes(2, 2, [0, 0, 255])),
                ("page2.png", png_bytes(2, 2, [0, 255, 0])),
                ("page1.png", png_bytes(2, 2, [255, 0, 0])),
            ],
        );

        let doc = CbzDocument::open(&path).unwrap();
        let colors: Vec<_> = (1..=3)
            .map(|page| {
                let viewport = doc.viewport(page, 1.0).unwrap();
                doc.render(&viewport).unwrap().pixel(0, 0)
            })
            .collect();
        assert_eq!(
            colors,
            vec![Some([255, 0, 0]), Some([0, 255, 0]), Some([0, 0, 255])]
        );
    }

    #[test]
    fn natural_order_of_names() {
        let mut names = vec![
            "ch2/p10.jpg",
            "ch10/p1.jpg",
            "ch2/p9.jpg",
            "ch2/p09b.jpg",
            "Cover.jpg",
        ];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(
            names,
            vec![
                "ch2/p9.jpg",
                "ch2/p09b.jpg",
                "ch2/p10.jpg",
                "ch10/p1.jpg",
                "Cover.jpg"
            ]
        );
    }

    #[test]
    fn cbz_viewport_scales_natural_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_cbz(dir.path(), &[("a.png", png_bytes(10, 20, [0, 0, 0]))]);

        let doc = CbzDocument::open(&path).unwrap();
        let viewport = doc.viewport(1, 1.5).unwrap();
        assert_eq!((viewport.width, viewport.height), (15, 30));

        let surface = doc.render(&viewport).unwrap();
        assert_eq!((surface.width_px, surface.height_px), (15, 30));
        assert_eq!(surface.pixels.len(), 15 * 30 * 3);
    }

    #[test]
    fn cbz_rejects_out_of_range_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_cbz(dir.path(), &[("a.png", png_bytes(2, 2, [0, 0, 0]))]);

        let doc = CbzDocument::open(&path).unwrap();
        assert!(matches!(
            doc.viewport(2, 1.0),
            Err(RenderFault::PageOutOfRange { page: 2, .. })
        ));
    }

    #[test]
    fn archive_without_images_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_cbz(dir.path(), &[("readme.txt", b"hi".to_vec())]);
        assert!(matches!(
            CbzDocument::open(&path),
            Err(RenderFault::EmptyDocument)
        ));
    }

    #[test]
    fn backend_selection_by_extension() {
        assert!(backend_for_path(Path::new("book.CBZ")).is_ok());
        assert!(backend_for_path(Path::new("book.epub")).is_err());
    }
}
