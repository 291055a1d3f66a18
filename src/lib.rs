#![forbid(unsafe_code)]

pub mod config;
pub mod domain;
pub mod error;
pub mod ffmpeg;
pub mod pdf;
pub mod pipeline;
pub mod ports;
pub mod timing;

pub use domain::{
    validate_request, CompositionRequest, OverlayPosition, OverlaySource, QualityProfile,
};
pub use error::{SlidecastError, SlidecastResult};
pub use pipeline::{
    resolve_output_path, Collaborators, Orchestrator, Phase, Progress, RenderSettings,
    StepOutcome, PREVIEW_SCALE, RENDER_SCALE,
};
pub use ports::{
    DurationProber, FinalCompositor, FrameExporter, PageRasterizer, PixelSurface,
    SlideVideoAssembler, WorkspaceAllocator,
};
pub use timing::{
    clamp_durations_to_total, derive_durations, uniform_schedule, validate_timings, Schedule,
    SlideTiming, ValidationError, DEFAULT_TAIL_SECONDS, MIN_SLIDE_DURATION,
};
