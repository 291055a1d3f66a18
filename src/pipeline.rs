//! The composition orchestrator: a phase state machine that drives source
//! selection, schedule editing and the multi-step rendering run.

use std::path::{Path, PathBuf};

use crate::{
    domain::CompositionRequest,
    error::{SlidecastError, SlidecastResult},
    ports::{
        DurationProber, FinalCompositor, FrameExporter, PageRasterizer, SlideVideoAssembler,
        WorkspaceAllocator,
    },
    timing::{derive_durations, uniform_schedule, Schedule, DEFAULT_TAIL_SECONDS},
};

/// Rasterization scale for interactive preview.
pub const PREVIEW_SCALE: f64 = 1.0;
/// Rasterization scale for the final render; higher fidelity than preview.
pub const RENDER_SCALE: f64 = 2.0;

/// The single process-wide phase cursor.
///
/// Failure during a run is not a state: the cursor returns to `Editing` with
/// the error message preserved so the operator can fix inputs and re-run.
/// `Done` permits starting the next run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Selecting,
    Editing,
    Rendering,
    Done,
}

/// Coarse-grained run progress: one unit per exported frame, one for
/// slide-video assembly, one for final composition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    pub completed_units: u32,
    pub total_units: u32,
}

impl Progress {
    fn begin(total_units: u32) -> Self {
        Self {
            completed_units: 0,
            total_units,
        }
    }

    fn advance(&mut self) {
        debug_assert!(self.completed_units < self.total_units);
        self.completed_units = (self.completed_units + 1).min(self.total_units);
    }
}

/// Per-step policy of the rendering sequence, kept explicit rather than folded
/// into a generic error path: a soft failure degrades the run, a fatal one
/// aborts it.
#[derive(Debug)]
pub enum StepOutcome<T> {
    Ok(T),
    SoftFail(String),
    Fatal(SlidecastError),
}

/// The collaborator set a run drains its schedule through.
pub struct Collaborators {
    pub rasterizer: Box<dyn PageRasterizer>,
    pub exporter: Box<dyn FrameExporter>,
    pub prober: Box<dyn DurationProber>,
    pub workspace: Box<dyn WorkspaceAllocator>,
    pub assembler: Box<dyn SlideVideoAssembler>,
    pub compositor: Box<dyn FinalCompositor>,
}

/// Options for one rendering run.
#[derive(Clone, Debug)]
pub struct RenderSettings {
    pub overlay_position: crate::domain::OverlayPosition,
    pub overlay_relative_width: f64,
    pub overlay_source: crate::domain::OverlaySource,
    pub quality: crate::domain::QualityProfile,
    pub fps: u32,
    pub output_width: u32,
    pub output_height: u32,
    /// Chosen output directory; joined with base name + extension using the
    /// directory's own separator convention.
    pub output_dir: Option<String>,
    pub output_base_name: String,
    pub output_extension: String,
    /// Used when no directory was chosen.
    pub raw_output_path: Option<String>,
    /// Tail duration for the final slide when no track length is known.
    pub fallback_tail_seconds: f64,
    pub render_scale: f64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            overlay_position: crate::domain::OverlayPosition::BottomRight,
            overlay_relative_width: 0.25,
            overlay_source: crate::domain::OverlaySource::Primary,
            quality: crate::domain::QualityProfile::Standard,
            fps: 30,
            output_width: 1920,
            output_height: 1080,
            output_dir: None,
            output_base_name: "composite".to_string(),
            output_extension: "mp4".to_string(),
            raw_output_path: None,
            fallback_tail_seconds: DEFAULT_TAIL_SECONDS,
            render_scale: RENDER_SCALE,
        }
    }
}

/// Join a chosen directory, base name and container extension into an output
/// path, using whichever separator the directory itself uses. With no
/// directory, fall back to the raw path, then to a bare default filename.
pub fn resolve_output_path(
    dir: Option<&str>,
    base_name: &str,
    extension: &str,
    raw_fallback: Option<&str>,
) -> String {
    match dir {
        Some(d) if !d.is_empty() => {
            let sep = if d.contains('\\') && !d.contains('/') {
                '\\'
            } else {
                '/'
            };
            let trimmed = d.trim_end_matches(['/', '\\']);
            format!("{trimmed}{sep}{base_name}.{extension}")
        }
        _ => match raw_fallback {
            Some(raw) if !raw.is_empty() => raw.to_string(),
            _ => format!("{base_name}.{extension}"),
        },
    }
}

/// Owns the schedule, progress counter and phase cursor for the lifetime of a
/// run. Strictly sequential: each collaborator call completes before the next
/// starts, and page export order is the contiguous on-disk order the
/// assembler depends on.
pub struct Orchestrator {
    collabs: Collaborators,
    phase: Phase,
    document: Option<PathBuf>,
    narration: Option<PathBuf>,
    page_count: Option<u32>,
    track_duration: Option<f64>,
    schedule: Schedule,
    progress: Progress,
    status: Option<String>,
}

impl Orchestrator {
    pub fn new(collabs: Collaborators) -> Self {
        Self {
            collabs,
            phase: Phase::Selecting,
            document: None,
            narration: None,
            page_count: None,
            track_duration: None,
            schedule: Vec::new(),
            progress: Progress::default(),
            status: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Last user-facing status message, if any.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn page_count(&self) -> Option<u32> {
        self.page_count
    }

    pub fn track_duration(&self) -> Option<f64> {
        self.track_duration
    }

    /// Select the source document and read its page count, seeding a uniform
    /// schedule.
    pub fn select_document(&mut self, path: impl Into<PathBuf>) -> SlidecastResult<u32> {
        let path = path.into();
        let pages = self.collabs.rasterizer.page_count(&path)?;
        tracing::info!(document = %path.display(), pages, "selected source document");
        self.document = Some(path);
        self.set_page_count(pages);
        Ok(pages)
    }

    /// Select the narration track. Probing its duration is best-effort; an
    /// unprobeable file can still be composed without a ceiling.
    pub fn select_narration(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        match self.collabs.prober.probe_duration(&path) {
            Ok(seconds) => {
                tracing::info!(narration = %path.display(), seconds, "probed narration duration");
                self.narration = Some(path);
                self.set_track_duration(seconds);
            }
            Err(err) => {
                tracing::warn!(narration = %path.display(), %err, "duration probe failed");
                self.narration = Some(path);
            }
        }
    }

    /// Record the page count and seed the schedule. With no known track
    /// duration yet, a provisional total of `pages * DEFAULT_TAIL_SECONDS`
    /// gives the operator editable rows.
    pub fn set_page_count(&mut self, pages: u32) {
        self.page_count = Some(pages);
        self.reseed();
    }

    /// Record the narration length and overwrite the schedule wholesale with a
    /// fresh uniform split.
    pub fn set_track_duration(&mut self, seconds: f64) {
        self.track_duration = Some(seconds);
        self.reseed();
    }

    fn reseed(&mut self) {
        if let Some(pages) = self.page_count {
            let total = self
                .track_duration
                .unwrap_or(f64::from(pages) * DEFAULT_TAIL_SECONDS);
            self.schedule = uniform_schedule(pages, total);
        }
    }

    /// Move from `Selecting` to `Editing`. Rejected (no state change) until a
    /// document, a narration track and a page count are all present.
    pub fn begin_editing(&mut self) -> SlidecastResult<()> {
        let missing = [
            (self.document.is_none(), "a source document"),
            (self.narration.is_none(), "a narration track"),
            (self.page_count.is_none(), "a page count"),
        ]
        .into_iter()
        .filter(|(absent, _)| *absent)
        .map(|(_, what)| what)
        .collect::<Vec<_>>();

        if !missing.is_empty() {
            let msg = format!("select {} before editing timings", missing.join(", "));
            self.status = Some(msg.clone());
            return Err(SlidecastError::input_not_ready(msg));
        }
        self.phase = Phase::Editing;
        self.status = None;
        Ok(())
    }

    /// Set one slide's start time during editing. Times are clamped
    /// non-negative; indices must exist in the schedule.
    pub fn edit_timing(&mut self, slide_index: u32, time_seconds: f64) -> SlidecastResult<()> {
        if self.phase != Phase::Editing {
            return Err(SlidecastError::validation(
                "timings can only be edited in the editing phase",
            ));
        }
        let entry = self
            .schedule
            .iter_mut()
            .find(|t| t.slide_index == slide_index)
            .ok_or_else(|| {
                SlidecastError::validation(format!("no slide with index {slide_index}"))
            })?;
        entry.time_seconds = if time_seconds.is_finite() {
            time_seconds.max(0.0)
        } else {
            0.0
        };
        Ok(())
    }

    /// Replace the whole schedule (operator-supplied timings). Only allowed
    /// during editing, like [`Self::edit_timing`]; indices must be contiguous
    /// and match the page count.
    pub fn replace_schedule(&mut self, schedule: Schedule) -> SlidecastResult<()> {
        if self.phase != Phase::Editing {
            return Err(SlidecastError::validation(
                "timings can only be edited in the editing phase",
            ));
        }
        crate::timing::validate_timings(&schedule)
            .map_err(|e| SlidecastError::validation(e.to_string()))?;
        if let Some(pages) = self.page_count {
            if schedule.len() != pages as usize {
                return Err(SlidecastError::validation(format!(
                    "schedule has {} entries but the document has {pages} pages",
                    schedule.len()
                )));
            }
        }
        self.schedule = schedule;
        Ok(())
    }

    /// Execute one rendering run: probe, extract, derive, assemble, compose.
    ///
    /// Inert while a run is already active. On any fatal step failure the
    /// phase returns to `Editing` with the message surfaced and the partially
    /// advanced progress preserved for diagnostics; nothing is retried
    /// automatically. Returns the resolved output path on success.
    pub fn render(
        &mut self,
        settings: &RenderSettings,
        observe: &mut dyn FnMut(Progress),
    ) -> SlidecastResult<String> {
        if self.phase == Phase::Rendering {
            return Err(SlidecastError::validation(
                "a composition run is already active",
            ));
        }
        if self.phase == Phase::Selecting {
            return Err(SlidecastError::input_not_ready(
                "finish source selection before generating",
            ));
        }
        let document = self
            .document
            .clone()
            .ok_or_else(|| SlidecastError::input_not_ready("no source document selected"))?;
        let narration = self
            .narration
            .clone()
            .ok_or_else(|| SlidecastError::input_not_ready("no narration track selected"))?;
        let pages = self
            .page_count
            .ok_or_else(|| SlidecastError::input_not_ready("page count unknown"))?;

        self.phase = Phase::Rendering;
        match self.run_steps(&document, &narration, pages, settings, observe) {
            Ok(output_path) => {
                self.phase = Phase::Done;
                self.status = Some(format!("composed {output_path}"));
                Ok(output_path)
            }
            Err(err) => {
                // Progress and schedule stay inspectable post-failure.
                self.phase = Phase::Editing;
                self.status = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn run_steps(
        &mut self,
        document: &Path,
        narration: &Path,
        pages: u32,
        settings: &RenderSettings,
        observe: &mut dyn FnMut(Progress),
    ) -> SlidecastResult<String> {
        // Step 1: re-probe the narration length. Soft: a failed probe only
        // disables the ceiling clamp for this run.
        let ceiling = match self.probe_step(narration) {
            StepOutcome::Ok(seconds) => {
                self.track_duration = Some(seconds);
                Some(seconds)
            }
            StepOutcome::SoftFail(msg) => {
                tracing::warn!(%msg, "continuing without a duration ceiling");
                None
            }
            StepOutcome::Fatal(err) => return Err(err),
        };

        // Step 2: fresh working directory; the progress counter restarts here.
        self.progress = Progress::begin(pages + 2);
        observe(self.progress);
        let working_dir = self.collabs.workspace.allocate("slidecast")?;
        tracing::debug!(dir = %working_dir.display(), "allocated working directory");

        // Step 3: sequential extraction. Export order is the contiguous
        // on-disk order the assembler expects; one bad page aborts the run
        // rather than leaving a gap.
        for page_number in 1..=pages {
            let surface = self.collabs.rasterizer.rasterize_page(
                document,
                page_number,
                settings.render_scale,
            )?;
            self.collabs
                .exporter
                .export_frame(&working_dir, page_number - 1, &surface)?;
            self.progress.advance();
            observe(self.progress);
        }

        // Step 4: schedule -> per-slide durations.
        let mut ordered = self.schedule.clone();
        ordered.sort_by_key(|t| t.slide_index);
        let durations = derive_durations(&ordered, settings.fallback_tail_seconds, ceiling);

        // Step 5: slide video.
        let slides_video = working_dir.join("slides.mp4");
        self.collabs
            .assembler
            .assemble(&working_dir, &durations, &slides_video)?;
        self.progress.advance();
        observe(self.progress);

        // Steps 6 and 7: resolve the destination and hand everything to the
        // compositor, absolute timestamps included.
        let output_path = resolve_output_path(
            settings.output_dir.as_deref(),
            &settings.output_base_name,
            &settings.output_extension,
            settings.raw_output_path.as_deref(),
        );
        let request = CompositionRequest {
            primary_path: narration.to_string_lossy().into_owned(),
            secondary_path: slides_video.to_string_lossy().into_owned(),
            output_path: output_path.clone(),
            overlay_position: settings.overlay_position,
            overlay_relative_width: settings.overlay_relative_width,
            overlay_source: settings.overlay_source,
            quality: settings.quality,
            fps: settings.fps,
            output_width: settings.output_width,
            output_height: settings.output_height,
            expected_duration_sec: ceiling.or(self.track_duration),
            timings: ordered,
        };
        self.collabs.compositor.compose(&request)?;
        self.progress.advance();
        observe(self.progress);
        tracing::info!(output = %output_path, "composition finished");
        Ok(output_path)
    }

    fn probe_step(&self, narration: &Path) -> StepOutcome<f64> {
        match self.collabs.prober.probe_duration(narration) {
            Ok(seconds) if seconds.is_finite() && seconds > 0.0 => StepOutcome::Ok(seconds),
            Ok(seconds) => {
                StepOutcome::SoftFail(format!("probe returned an unusable duration: {seconds}"))
            }
            Err(SlidecastError::Probe(msg)) => StepOutcome::SoftFail(msg),
            // Anything other than a probe failure out of the prober is a
            // programming error worth aborting on.
            Err(other) => StepOutcome::Fatal(other),
        }
    }
}
