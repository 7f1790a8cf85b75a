use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use super::{
    FrameRead, FrameSink, FrameSource, Timeline, VideoFileSink, VideoFileSource,
    DEFAULT_PLACEMENT_ATTEMPTS, EDIT_FILE_SUFFIX, MANIFEST_FILE_SUFFIX,
};
use crate::config::CompositionConfig;
use crate::{Error, Result};

/// One interval cut out of a pool source and placed into the reel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedClip {
    /// Pool video the clip was cut from.
    pub source: PathBuf,
    /// Clip start offset into the source, in seconds.
    pub start: f64,
    /// Clip end offset into the source, in seconds.
    pub end: f64,
}

/// Outcome of one assembly run.
#[derive(Debug)]
pub struct CompositionReport {
    /// Path of the assembled reel.
    pub output_path: PathBuf,
    /// Path of the JSON manifest describing the placed clips.
    pub manifest_path: PathBuf,
    /// The placed clips, in reel order.
    pub clips: Vec<PlacedClip>,
    /// Frames written to the reel.
    pub frames_written: u64,
}

// JSON sidecar written next to the reel on success.
#[derive(Serialize)]
struct Manifest<'a> {
    created: String,
    timeline: String,
    clips: &'a [PlacedClip],
}

/// Assembles a highlight reel from a [Timeline] and a pool of source videos.
///
/// Each gap between consecutive timeline events becomes one reel segment of that
/// duration, cut at a random offset from a randomly chosen pool source. Intervals
/// cut from the same source never overlap; placement is bounded, so a saturated
/// pool fails with [Error::ClipExtraction] instead of looping forever. The reel is
/// encoded into a `.part` file and renamed on success, so a failed run leaves no
/// partial output.
pub struct Composer {
    config: CompositionConfig,
    placement_attempts: usize,
    full_validation: bool,
}

impl Composer {
    /// Creates a composer from a validated configuration.
    pub fn new(config: CompositionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            placement_attempts: DEFAULT_PLACEMENT_ATTEMPTS,
            full_validation: true,
        })
    }

    /// Overrides the per-segment placement attempt budget.
    pub fn with_placement_attempts(mut self, attempts: usize) -> Self {
        self.placement_attempts = attempts.max(1);
        self
    }

    /// Switches pool validation between full FFmpeg probing and header sniffing.
    pub fn with_full_validation(mut self, full: bool) -> Self {
        self.full_validation = full;
        self
    }

    /// Assembles a reel from the given timeline file.
    ///
    /// The reel is written to `<output_dir>/<project>_edit.mp4`, where `project` is
    /// the timeline's file stem without its `_timestamps` suffix, with a JSON
    /// manifest beside it.
    pub fn run(&self, timeline_path: impl AsRef<Path>) -> Result<CompositionReport> {
        let span = tracing::span!(tracing::Level::TRACE, "compose");
        let _enter = span.enter();

        let timeline_path = timeline_path.as_ref();
        let timeline = Timeline::load(timeline_path)?;
        if timeline.timestamps.len() < 2 {
            return Err(Error::TimelineTooShort(timeline.timestamps.len()));
        }
        if timeline.source_matches() == Some(false) {
            tracing::warn!(
                source = %timeline.source_video,
                "timeline source has changed since detection; proceeding anyway"
            );
        }
        let durations = timeline.durations();

        let sources = self.probe_pool()?;
        let plan = plan_segments(
            &durations,
            &sources,
            &mut rand::thread_rng(),
            self.placement_attempts,
        )?;

        let project = crate::util::video_stem(timeline_path)?;
        let project = project
            .strip_suffix("_timestamps")
            .unwrap_or(&project)
            .to_string();
        let output_path = self
            .config
            .output_dir
            .join(format!("{}{}", project, EDIT_FILE_SUFFIX));
        let part_path = output_path.with_extension("part");

        tracing::debug!(
            segments = plan.len(),
            output = %output_path.display(),
            "assembling reel"
        );
        let frames_written = match self.write_reel(&plan, &part_path) {
            Ok(n) => n,
            Err(e) => {
                // Never leave a partial reel behind.
                let _ = std::fs::remove_file(&part_path);
                return Err(e);
            }
        };
        std::fs::rename(&part_path, &output_path)?;

        let manifest_path = self
            .config
            .output_dir
            .join(format!("{}{}", project, MANIFEST_FILE_SUFFIX));
        let manifest = Manifest {
            created: chrono::Local::now().to_rfc3339(),
            timeline: timeline_path.to_string_lossy().into_owned(),
            clips: &plan,
        };
        serde_json::to_writer_pretty(std::fs::File::create(&manifest_path)?, &manifest)?;

        Ok(CompositionReport {
            output_path,
            manifest_path,
            clips: plan,
            frames_written,
        })
    }

    // Scans the pool directory and probes each video's duration. Unreadable files
    // are dropped with a warning.
    fn probe_pool(&self) -> Result<Vec<(PathBuf, f64)>> {
        let pool = crate::util::find_video_files(&self.config.source_dir, self.full_validation)?;
        if pool.is_empty() {
            return Err(Error::EmptySourcePool(self.config.source_dir.clone()));
        }

        let mut sources = Vec::with_capacity(pool.len());
        for path in pool {
            match VideoFileSource::open(&path) {
                Ok(source) => sources.push((path, source.duration())),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable pool video");
                }
            }
        }
        if sources.is_empty() {
            return Err(Error::EmptySourcePool(self.config.source_dir.clone()));
        }
        Ok(sources)
    }

    // Extracts each planned clip in order and encodes them into a single file.
    fn write_reel(&self, plan: &[PlacedClip], part_path: &Path) -> Result<u64> {
        let mut sink: Option<VideoFileSink> = None;
        let mut frames_written = 0u64;

        for clip in plan {
            let mut source = VideoFileSource::open(&clip.source)?;
            source.seek_to(clip.start)?;

            // Reel dimensions default to those of the first placed source.
            if sink.is_none() {
                let width = self.config.width.unwrap_or_else(|| source.width());
                let height = self.config.height.unwrap_or_else(|| source.height());
                sink = Some(VideoFileSink::create(
                    part_path,
                    &self.config.fourcc,
                    width,
                    height,
                    self.config.fps,
                )?);
            }
            frames_written += copy_clip(&mut source, sink.as_mut().unwrap(), clip)?;
        }

        match sink {
            Some(mut sink) => {
                sink.finish()?;
                Ok(frames_written)
            }
            None => Err(Error::ClipExtraction(
                "no segments were extracted".to_string(),
            )),
        }
    }
}

// Copies the frames inside `[clip.start, clip.end)` from an already positioned
// source into the sink. Seeking lands on a keyframe at or before the start, so
// preroll frames are discarded by timestamp; corrupt frames are skipped.
fn copy_clip(
    source: &mut impl FrameSource,
    sink: &mut impl FrameSink,
    clip: &PlacedClip,
) -> Result<u64> {
    let mut frames_written = 0u64;
    loop {
        match source.read_frame()? {
            FrameRead::Frame(frame) => {
                if frame.timestamp() < clip.start {
                    continue;
                }
                if frame.timestamp() >= clip.end {
                    break;
                }
                sink.write_frame(&frame)?;
                frames_written += 1;
            }
            FrameRead::Corrupt => {
                tracing::warn!(source = %clip.source.display(), "skipping corrupt frame");
            }
            FrameRead::End => break,
        }
    }
    Ok(frames_written)
}

// Plans one non-overlapping random interval per segment duration.
//
// Pure given the RNG, which makes placement reproducible under test. Overlap
// tracking is scoped per source: intervals only conflict when cut from the same
// pool video.
pub(crate) fn plan_segments(
    durations: &[f64],
    sources: &[(PathBuf, f64)],
    rng: &mut impl Rng,
    attempts: usize,
) -> Result<Vec<PlacedClip>> {
    let mut used: HashMap<&Path, Vec<(f64, f64)>> = HashMap::new();
    let mut plan = Vec::with_capacity(durations.len());

    for (segment, &duration) in durations.iter().enumerate() {
        if duration <= 0.0 {
            tracing::warn!(segment, "skipping zero-length segment");
            continue;
        }
        if !sources.iter().any(|(_, len)| *len >= duration) {
            return Err(Error::ClipExtraction(format!(
                "segment {} needs {:.3}s but no pool source is that long",
                segment, duration
            )));
        }

        let mut placed = false;
        for _ in 0..attempts {
            let (path, source_duration) = sources.choose(rng).unwrap();
            if *source_duration < duration {
                continue;
            }
            let max_start = source_duration - duration;
            let start = if max_start > 0.0 {
                rng.gen_range(0.0..=max_start)
            } else {
                0.0
            };
            let end = start + duration;

            let intervals = used.entry(path.as_path()).or_default();
            if intervals.iter().any(|&(s, e)| start < e && end > s) {
                continue;
            }
            intervals.push((start, end));
            plan.push(PlacedClip {
                source: path.clone(),
                start,
                end,
            });
            placed = true;
            break;
        }
        if !placed {
            return Err(Error::ClipExtraction(format!(
                "could not place segment {} ({:.3}s) within {} attempts; pool may be saturated",
                segment, duration, attempts
            )));
        }
    }

    Ok(plan)
}
