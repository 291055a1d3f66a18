//! PDF-side collaborators: page counting, page rasterization and frame
//! export, plus the working-directory allocator.
//!
//! Rasterization shells out to poppler's `pdftoppm`, mirroring how the
//! encoding side uses the system ffmpeg; the produced PNG is decoded back
//! into a [`PixelSurface`] so exporters stay format-agnostic.

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use crate::{
    error::{SlidecastError, SlidecastResult},
    ports::{frame_file_name, FrameExporter, PageRasterizer, PixelSurface, WorkspaceAllocator},
};

/// Base rasterization density at scale 1.0, in DPI.
const BASE_DPI: f64 = 150.0;

pub struct PopplerRasterizer {
    pdftoppm_bin: String,
}

impl Default for PopplerRasterizer {
    fn default() -> Self {
        Self {
            pdftoppm_bin: "pdftoppm".to_string(),
        }
    }
}

impl PopplerRasterizer {
    pub fn with_binary(pdftoppm_bin: impl Into<String>) -> Self {
        Self {
            pdftoppm_bin: pdftoppm_bin.into(),
        }
    }
}

impl PageRasterizer for PopplerRasterizer {
    fn page_count(&self, document: &Path) -> SlidecastResult<u32> {
        let doc = lopdf::Document::load(document).map_err(|e| {
            SlidecastError::rasterization(format!(
                "failed to read pdf '{}': {e}",
                document.display()
            ))
        })?;
        Ok(doc.get_pages().len() as u32)
    }

    fn rasterize_page(
        &self,
        document: &Path,
        page_number: u32,
        scale: f64,
    ) -> SlidecastResult<PixelSurface> {
        if page_number == 0 {
            return Err(SlidecastError::rasterization(
                "page numbers are 1-based; got 0",
            ));
        }
        let dpi = (BASE_DPI * scale.max(0.1)).round() as u32;

        // pdftoppm pads the page number in its output file name depending on
        // the document's page count, so render into a private directory and
        // pick up whatever single PNG it produced.
        let out_dir = allocate_temp_dir("slidecast-raster")
            .map_err(|e| SlidecastError::rasterization(e.to_string()))?;
        let prefix = out_dir.join("page");

        let out = Command::new(&self.pdftoppm_bin)
            .arg("-png")
            .args(["-r", &dpi.to_string()])
            .args(["-f", &page_number.to_string()])
            .args(["-l", &page_number.to_string()])
            .arg(document)
            .arg(&prefix)
            .output()
            .map_err(|e| {
                SlidecastError::rasterization(format!(
                    "failed to spawn {} (is poppler installed?): {e}",
                    self.pdftoppm_bin
                ))
            })?;
        if !out.status.success() {
            return Err(SlidecastError::rasterization(format!(
                "{} failed on page {page_number} of '{}': {}",
                self.pdftoppm_bin,
                document.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let produced = std::fs::read_dir(&out_dir)
            .map_err(|e| SlidecastError::rasterization(format!("reading raster dir: {e}")))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .find(|p| p.extension().is_some_and(|ext| ext == "png"))
            .ok_or_else(|| {
                SlidecastError::rasterization(format!(
                    "no raster produced for page {page_number} of '{}'",
                    document.display()
                ))
            })?;

        let img = image::open(&produced)
            .map_err(|e| SlidecastError::rasterization(format!("decoding raster: {e}")))?
            .into_rgba8();
        let (width, height) = img.dimensions();
        let surface = PixelSurface {
            width,
            height,
            data: img.into_raw(),
        };

        let _ = std::fs::remove_dir_all(&out_dir);
        Ok(surface)
    }
}

/// Writes surfaces as `{index:05}.png` so lexicographic order matches slide
/// order for every downstream consumer.
pub struct PngFrameExporter;

impl FrameExporter for PngFrameExporter {
    fn export_frame(
        &self,
        working_dir: &Path,
        slide_index: u32,
        surface: &PixelSurface,
    ) -> SlidecastResult<PathBuf> {
        std::fs::create_dir_all(working_dir)
            .map_err(|e| SlidecastError::io(format!("creating frame dir: {e}")))?;
        let path = working_dir.join(frame_file_name(slide_index));
        let img = image::RgbaImage::from_raw(surface.width, surface.height, surface.data.clone())
            .ok_or_else(|| {
                SlidecastError::io("surface byte length does not match width*height*4")
            })?;
        img.save(&path)
            .map_err(|e| SlidecastError::io(format!("writing '{}': {e}", path.display())))?;
        Ok(path)
    }
}

fn allocate_temp_dir(prefix: &str) -> SlidecastResult<PathBuf> {
    use std::sync::atomic::{AtomicU64, Ordering};
    static SEQ: AtomicU64 = AtomicU64::new(0);

    let mut dir = std::env::temp_dir();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| SlidecastError::io(e.to_string()))?
        .as_nanos();
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    dir.push(format!("{prefix}-{nanos}-{seq}"));
    std::fs::create_dir_all(&dir)
        .map_err(|e| SlidecastError::io(format!("creating '{}': {e}", dir.display())))?;
    Ok(dir)
}

/// Allocates `prefix-{nanos}` directories under the system temp dir.
pub struct TempWorkspace;

impl WorkspaceAllocator for TempWorkspace {
    fn allocate(&self, prefix: &str) -> SlidecastResult<PathBuf> {
        allocate_temp_dir(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_dirs_are_fresh_and_exist() {
        let a = TempWorkspace.allocate("slidecast-test").unwrap();
        let b = TempWorkspace.allocate("slidecast-test").unwrap();
        assert!(a.exists());
        assert!(b.exists());
        assert_ne!(a, b);
        let _ = std::fs::remove_dir_all(a);
        let _ = std::fs::remove_dir_all(b);
    }

    #[test]
    fn exporter_writes_indexed_png() {
        let dir = TempWorkspace.allocate("slidecast-export").unwrap();
        let surface = PixelSurface {
            width: 2,
            height: 2,
            data: vec![255; 16],
        };
        let path = PngFrameExporter.export_frame(&dir, 7, &surface).unwrap();
        assert!(path.ends_with("00007.png"));
        assert!(path.exists());
        let back = image::open(&path).unwrap().into_rgba8();
        assert_eq!(back.dimensions(), (2, 2));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn exporter_rejects_mismatched_surface() {
        let dir = TempWorkspace.allocate("slidecast-export-bad").unwrap();
        let surface = PixelSurface {
            width: 4,
            height: 4,
            data: vec![0; 3],
        };
        assert!(PngFrameExporter.export_frame(&dir, 0, &surface).is_err());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn zero_page_number_is_rejected() {
        let err = PopplerRasterizer::default()
            .rasterize_page(Path::new("deck.pdf"), 0, 1.0)
            .unwrap_err();
        assert!(err.to_string().contains("1-based"));
    }
}
