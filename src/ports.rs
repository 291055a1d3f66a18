//! Collaborator seams consumed by the composition pipeline.
//!
//! Rasterization, probing, encoding and compositing are external services with
//! typed inputs/outputs; the pipeline only ever talks to these traits. The
//! shipped adapters live in [`crate::pdf`] and [`crate::ffmpeg`].

use std::path::{Path, PathBuf};

use crate::{domain::CompositionRequest, error::SlidecastResult};

/// A rasterized page: straight-alpha RGBA8, row-major, `width * height * 4`
/// bytes.
#[derive(Clone, Debug)]
pub struct PixelSurface {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

pub trait PageRasterizer {
    /// Number of pages in the document.
    fn page_count(&self, document: &Path) -> SlidecastResult<u32>;

    /// Rasterize a single page. `page_number` is 1-based, matching document
    /// order; fails with [`crate::SlidecastError::Rasterization`] on a corrupt
    /// or unsupported page.
    fn rasterize_page(
        &self,
        document: &Path,
        page_number: u32,
        scale: f64,
    ) -> SlidecastResult<PixelSurface>;
}

pub trait FrameExporter {
    /// Write one surface as an indexed image file under `working_dir`.
    /// `slide_index` is 0-based; the assembler expects contiguous indices.
    fn export_frame(
        &self,
        working_dir: &Path,
        slide_index: u32,
        surface: &PixelSurface,
    ) -> SlidecastResult<PathBuf>;
}

pub trait DurationProber {
    /// Probed media duration in seconds. The pipeline treats failure here as
    /// soft: the run continues without a duration ceiling.
    fn probe_duration(&self, media: &Path) -> SlidecastResult<f64>;
}

pub trait WorkspaceAllocator {
    /// Allocate a fresh directory for extracted frames.
    fn allocate(&self, prefix: &str) -> SlidecastResult<PathBuf>;
}

pub trait SlideVideoAssembler {
    /// Turn the exported frames into one video, each frame held for its
    /// duration. Frame files must be contiguous; a gap is an error.
    fn assemble(
        &self,
        frames_dir: &Path,
        durations: &[f64],
        output: &Path,
    ) -> SlidecastResult<()>;
}

pub trait FinalCompositor {
    fn compose(&self, request: &CompositionRequest) -> SlidecastResult<()>;
}

/// Frame-export naming convention shared by exporter and assembler:
/// zero-padded 0-based slide index.
pub fn frame_file_name(slide_index: u32) -> String {
    format!("{slide_index:05}.png")
}
