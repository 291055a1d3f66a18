//! ffmpeg-backed collaborators: duration probing, slide-video assembly and the
//! final picture-in-picture composition.
//!
//! Argument construction is kept separate from process spawning so the
//! command lines are testable without the binary installed. We intentionally
//! shell out to the system `ffmpeg`/`ffprobe` rather than linking native
//! FFmpeg libraries.

use std::{path::Path, process::Command};

use crate::{
    domain::{validate_request, CompositionRequest, OverlayPosition, OverlaySource},
    error::{SlidecastError, SlidecastResult},
    ports::{frame_file_name, DurationProber, FinalCompositor, SlideVideoAssembler},
};

/// Margin, in pixels, between the overlay and the output frame edge.
const OVERLAY_MARGIN_PX: u32 = 16;

/// Resolve the ffmpeg binary: `SLIDECAST_FFMPEG` env var, then the persisted
/// config, then the platform default name.
pub fn ffmpeg_path() -> String {
    if let Ok(p) = std::env::var("SLIDECAST_FFMPEG") {
        if !p.is_empty() {
            return p;
        }
    }
    if let Some(p) = crate::config::get_ffmpeg_path_configured() {
        return p;
    }
    if cfg!(target_os = "windows") {
        "ffmpeg.exe".into()
    } else {
        "ffmpeg".into()
    }
}

/// ffprobe is assumed to sit next to the resolved ffmpeg binary.
pub fn ffprobe_path() -> String {
    sibling_ffprobe(&ffmpeg_path())
}

/// Substitute only in the file name; directories named "ffmpeg" (e.g.
/// `/opt/ffmpeg/bin/ffmpeg`) must stay untouched.
fn sibling_ffprobe(ffmpeg: &str) -> String {
    let name_start = ffmpeg.rfind(['/', '\\']).map(|i| i + 1).unwrap_or(0);
    let (dir, name) = ffmpeg.split_at(name_start);
    if name.contains("ffmpeg") {
        format!("{dir}{}", name.replace("ffmpeg", "ffprobe"))
    } else {
        "ffprobe".into()
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new(ffmpeg_path())
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegArgs(pub Vec<String>);

fn overlay_expr(position: OverlayPosition) -> (String, String) {
    let m = OVERLAY_MARGIN_PX;
    match position {
        OverlayPosition::TopLeft => (format!("{m}"), format!("{m}")),
        OverlayPosition::TopRight => (format!("W-w-{m}"), format!("{m}")),
        OverlayPosition::BottomLeft => (format!("{m}"), format!("H-h-{m}")),
        OverlayPosition::BottomRight => (format!("W-w-{m}"), format!("H-h-{m}")),
    }
}

/// Build the picture-in-picture `filter_complex` invocation. Input 0 is the
/// primary (narration) video, input 1 the assembled slide video; the overlay
/// source picks which of the two shrinks.
pub fn compose_args(req: &CompositionRequest) -> FfmpegArgs {
    let (bg, fg) = match req.overlay_source {
        OverlaySource::Primary => ("1:v", "0:v"),
        OverlaySource::Secondary => ("0:v", "1:v"),
    };
    let (ox, oy) = overlay_expr(req.overlay_position);
    let (w, h, fps) = (req.output_width, req.output_height, req.fps);
    let rel_w = req.overlay_relative_width;

    let filter = format!(
        "[{fg}]scale={w}*{rel_w}:-1[ov];[{bg}]scale={w}:{h}:flags=bicubic[bg];\
         [bg][ov]overlay={ox}:{oy}:eval=init,fps={fps}"
    );

    let args = vec![
        "-y".into(),
        "-hide_banner".into(),
        "-loglevel".into(),
        "warning".into(),
        "-i".into(),
        req.primary_path.clone(),
        "-i".into(),
        req.secondary_path.clone(),
        "-filter_complex".into(),
        filter,
        "-map".into(),
        "0:a?".into(),
        "-c:v".into(),
        "libx264".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-r".into(),
        fps.to_string(),
        "-s".into(),
        format!("{w}x{h}"),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "192k".into(),
        "-shortest".into(),
        "-movflags".into(),
        "+faststart".into(),
        req.output_path.clone(),
    ];

    FfmpegArgs(args)
}

/// Insert the CRF/preset pair for the chosen quality profile before the
/// output path.
pub fn apply_quality(args: &mut FfmpegArgs, quality: crate::domain::QualityProfile) {
    let (crf, preset) = match quality {
        crate::domain::QualityProfile::Draft => (32, "veryfast"),
        crate::domain::QualityProfile::Standard => (26, "medium"),
        crate::domain::QualityProfile::High => (20, "slow"),
    };
    let v = &mut args.0;
    let out = v.pop().unwrap_or_default();
    v.extend(["-crf".into(), crf.to_string(), "-preset".into(), preset.into()]);
    v.push(out);
}

/// One still image looped for an exact duration.
pub fn segment_args(
    image: &Path,
    duration_seconds: f64,
    fps: u32,
    width: u32,
    height: u32,
    output: &Path,
) -> FfmpegArgs {
    FfmpegArgs(vec![
        "-y".into(),
        "-loop".into(),
        "1".into(),
        "-t".into(),
        format!("{duration_seconds}"),
        "-i".into(),
        image.to_string_lossy().into_owned(),
        "-s".into(),
        format!("{width}x{height}"),
        "-r".into(),
        fps.to_string(),
        "-c:v".into(),
        "libx264".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        output.to_string_lossy().into_owned(),
    ])
}

/// Stitch the per-slide segments with the concat demuxer, stream-copied.
pub fn concat_args(list_file: &Path, output: &Path) -> FfmpegArgs {
    FfmpegArgs(vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        list_file.to_string_lossy().into_owned(),
        "-c".into(),
        "copy".into(),
        output.to_string_lossy().into_owned(),
    ])
}

fn run_ffmpeg(args: &FfmpegArgs) -> Result<(), String> {
    let out = Command::new(ffmpeg_path())
        .args(&args.0)
        .output()
        .map_err(|e| format!("failed to spawn ffmpeg (is it installed and on PATH?): {e}"))?;
    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        return Err(format!(
            "ffmpeg exited with status {}: {}",
            out.status,
            stderr.trim()
        ));
    }
    Ok(())
}

/// Probes media duration through `ffprobe -print_format json`.
pub struct FfprobeDurationProber;

impl DurationProber for FfprobeDurationProber {
    fn probe_duration(&self, media: &Path) -> SlidecastResult<f64> {
        #[derive(serde::Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeOut {
            format: Option<ProbeFormat>,
        }

        let out = Command::new(ffprobe_path())
            .args(["-v", "error", "-print_format", "json", "-show_format"])
            .arg(media)
            .output()
            .map_err(|e| SlidecastError::probe(format!("failed to run ffprobe: {e}")))?;
        if !out.status.success() {
            return Err(SlidecastError::probe(format!(
                "ffprobe failed for '{}': {}",
                media.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
            .map_err(|e| SlidecastError::probe(format!("ffprobe json parse failed: {e}")))?;
        parsed
            .format
            .and_then(|f| f.duration)
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
            .ok_or_else(|| {
                SlidecastError::probe(format!(
                    "no usable duration reported for '{}'",
                    media.display()
                ))
            })
    }
}

/// Builds the slide video as one looped-image segment per slide, then concats
/// them. Frame files must be contiguous on disk; a missing index is an error,
/// never a silently skipped slide.
pub struct FfmpegSlideAssembler {
    pub fps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for FfmpegSlideAssembler {
    fn default() -> Self {
        Self {
            fps: 30,
            width: 1920,
            height: 1080,
        }
    }
}

impl SlideVideoAssembler for FfmpegSlideAssembler {
    fn assemble(&self, frames_dir: &Path, durations: &[f64], output: &Path) -> SlidecastResult<()> {
        let segments_dir = output
            .parent()
            .map(|p| p.join("segments"))
            .ok_or_else(|| SlidecastError::encoding("invalid slide-video output path"))?;
        std::fs::create_dir_all(&segments_dir)
            .map_err(|e| SlidecastError::encoding(format!("creating segments dir: {e}")))?;

        let mut list = String::new();
        for (i, duration) in durations.iter().enumerate() {
            let frame = frames_dir.join(frame_file_name(i as u32));
            if !frame.exists() {
                return Err(SlidecastError::encoding(format!(
                    "missing slide frame: {}",
                    frame.display()
                )));
            }
            let segment = segments_dir.join(format!("seg_{i:05}.mp4"));
            let args = segment_args(&frame, *duration, self.fps, self.width, self.height, &segment);
            tracing::debug!(slide = i, duration, "encoding slide segment");
            run_ffmpeg(&args)
                .map_err(|e| SlidecastError::encoding(format!("segment {i}: {e}")))?;
            list.push_str(&format!("file '{}'\n", segment.to_string_lossy()));
        }

        let list_path = segments_dir.join("concat.txt");
        std::fs::write(&list_path, list)
            .map_err(|e| SlidecastError::encoding(format!("writing concat list: {e}")))?;
        run_ffmpeg(&concat_args(&list_path, output))
            .map_err(|e| SlidecastError::encoding(format!("concat: {e}")))
    }
}

/// Runs the final `filter_complex` composition.
pub struct FfmpegCompositor;

impl FinalCompositor for FfmpegCompositor {
    fn compose(&self, request: &CompositionRequest) -> SlidecastResult<()> {
        validate_request(request).map_err(|e| SlidecastError::validation(e.to_string()))?;
        let mut args = compose_args(request);
        apply_quality(&mut args, request.quality);
        tracing::info!(
            output = %request.output_path,
            expected_duration = ?request.expected_duration_sec,
            "composing final output"
        );
        run_ffmpeg(&args).map_err(SlidecastError::composition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OverlayPosition, OverlaySource, QualityProfile};
    use crate::timing::SlideTiming;

    fn request() -> CompositionRequest {
        CompositionRequest {
            primary_path: "talk.mp4".into(),
            secondary_path: "slides.mp4".into(),
            output_path: "out.mp4".into(),
            overlay_position: OverlayPosition::TopRight,
            overlay_relative_width: 0.2,
            overlay_source: OverlaySource::Primary,
            quality: QualityProfile::Standard,
            fps: 30,
            output_width: 1920,
            output_height: 1080,
            expected_duration_sec: Some(120.0),
            timings: vec![
                SlideTiming { slide_index: 0, time_seconds: 0.0 },
                SlideTiming { slide_index: 1, time_seconds: 60.0 },
            ],
        }
    }

    #[test]
    fn ffprobe_sits_next_to_ffmpeg() {
        assert_eq!(
            sibling_ffprobe("/opt/ffmpeg/bin/ffmpeg"),
            "/opt/ffmpeg/bin/ffprobe"
        );
        assert_eq!(
            sibling_ffprobe("C:\\tools\\ffmpeg\\ffmpeg.exe"),
            "C:\\tools\\ffmpeg\\ffprobe.exe"
        );
        assert_eq!(sibling_ffprobe("ffmpeg"), "ffprobe");
        // A custom binary name without "ffmpeg" falls back to PATH lookup.
        assert_eq!(sibling_ffprobe("/usr/local/bin/encoder"), "ffprobe");
    }

    #[test]
    fn compose_args_build_basic() {
        let args = compose_args(&request());
        let joined = args.0.join(" ");
        assert!(joined.contains("-i talk.mp4"));
        assert!(joined.contains("-i slides.mp4"));
        assert!(joined.contains("filter_complex"));
        assert!(joined.contains("scale=1920*0.2"));
        assert!(joined.contains("-map 0:a?"));
        assert!(joined.contains("-shortest"));
        assert!(joined.contains("-loglevel warning"));
        assert!(joined.contains("-r 30"));
        assert!(joined.contains("-s 1920x1080"));
        assert!(joined.ends_with("out.mp4"));
    }

    #[test]
    fn compose_args_pick_overlay_source() {
        let primary = compose_args(&request());
        assert!(primary.0.join(" ").contains("[0:v]scale="));

        let mut req = request();
        req.overlay_source = OverlaySource::Secondary;
        let secondary = compose_args(&req);
        assert!(secondary.0.join(" ").contains("[1:v]scale="));
    }

    #[test]
    fn compose_args_respect_output_geometry() {
        let mut req = request();
        req.output_width = 1280;
        req.output_height = 720;
        req.fps = 25;
        let joined = compose_args(&req).0.join(" ");
        assert!(joined.contains("scale=1280*0.2"));
        assert!(joined.contains("scale=1280:720:flags=bicubic"));
        assert!(joined.contains("fps=25"));
        assert!(joined.contains("-s 1280x720"));
    }

    #[test]
    fn overlay_corners_map_to_expressions() {
        let (ox, oy) = overlay_expr(OverlayPosition::TopLeft);
        assert_eq!((ox.as_str(), oy.as_str()), ("16", "16"));
        let (ox, oy) = overlay_expr(OverlayPosition::BottomRight);
        assert_eq!((ox.as_str(), oy.as_str()), ("W-w-16", "H-h-16"));
    }

    #[test]
    fn quality_profile_applies_flags_before_output() {
        let mut args = compose_args(&request());
        let last_before = args.0.last().cloned().unwrap();
        apply_quality(&mut args, QualityProfile::Draft);
        let joined = args.0.join(" ");
        assert_eq!(args.0.last().unwrap(), &last_before);
        assert!(joined.contains("-crf 32"));
        assert!(joined.contains("-preset veryfast"));

        let mut args = compose_args(&request());
        apply_quality(&mut args, QualityProfile::High);
        let joined = args.0.join(" ");
        assert!(joined.contains("-crf 20"));
        assert!(joined.contains("-preset slow"));
    }

    #[test]
    fn segment_and_concat_args() {
        let seg = segment_args(
            Path::new("frames/00003.png"),
            2.5,
            30,
            1920,
            1080,
            Path::new("segments/seg_00003.mp4"),
        );
        let joined = seg.0.join(" ");
        assert!(joined.contains("-loop 1"));
        assert!(joined.contains("-t 2.5"));
        assert!(joined.contains("-i frames/00003.png"));
        assert!(joined.contains("-s 1920x1080"));

        let cat = concat_args(Path::new("segments/concat.txt"), Path::new("slides.mp4"));
        let joined = cat.0.join(" ");
        assert!(joined.contains("-f concat"));
        assert!(joined.contains("-safe 0"));
        assert!(joined.contains("-c copy"));
        assert!(joined.ends_with("slides.mp4"));
    }
}
