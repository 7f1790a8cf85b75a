use std::path::PathBuf;

use super::{
    EventLabel, FrameAnnotator, FrameRead, FrameSink, FrameSource, Signature, Timeline,
    VideoFileSink, VideoFileSource, PROCESSED_FILE_SUFFIX, TIMESTAMPS_FILE_SUFFIX,
};
use crate::config::DetectionConfig;
use crate::{Error, Result};

/// Outcome of one detection run.
#[derive(Debug)]
pub struct DetectionReport {
    /// The detected event timeline, as persisted to the timeline file.
    pub timeline: Timeline,
    /// Path of the processed output video.
    pub output_path: PathBuf,
    /// Path of the timeline YAML file.
    pub timeline_path: PathBuf,
    /// Frames read from the source, excluding corrupt ones.
    pub frames_read: u64,
    /// Frames written to the sink.
    pub frames_written: u64,
    /// Corrupt frames skipped mid-stream.
    pub frames_skipped: u64,
}

// What one pass over a frame stream produced.
#[derive(Debug, Default)]
struct StreamOutcome {
    timestamps: Vec<f64>,
    frames_read: u64,
    frames_written: u64,
    frames_skipped: u64,
}

/// Streaming scene cut detector.
///
/// Fingerprints each frame with a [Signature] and scores it against the previous
/// frame's signature; a correlation strictly below the configured threshold marks a
/// scene cut at that frame's timestamp. Every frame is forwarded to the sink, with
/// event frames optionally annotated first. Only the previous signature is retained
/// between iterations, so memory use is constant regardless of video length.
///
/// Construction validates the configuration; a detector value is always ready to
/// run. One [run](Self::run) call owns its source and sink exclusively and releases
/// them on every exit path.
pub struct SceneDetector {
    config: DetectionConfig,
    annotator: Option<Box<dyn FrameAnnotator>>,
}

impl SceneDetector {
    /// Creates a detector from a validated configuration.
    pub fn new(config: DetectionConfig) -> Result<Self> {
        config.validate()?;
        let annotator: Option<Box<dyn FrameAnnotator>> = if config.annotate_events {
            Some(Box::new(EventLabel::default()))
        } else {
            None
        };
        Ok(Self { config, annotator })
    }

    /// Replaces the default event frame annotator.
    ///
    /// Has no effect when `annotate_events` is disabled in the configuration.
    pub fn with_annotator(mut self, annotator: Box<dyn FrameAnnotator>) -> Self {
        if self.annotator.is_some() {
            self.annotator = Some(annotator);
        }
        self
    }

    /// Runs detection over the configured input video.
    ///
    /// Decodes the input frame by frame, writes the (possibly annotated) frames to
    /// `<output_dir>/<input_stem>_processed.mp4`, and persists the timeline to
    /// `<yaml_dir>/<input_stem>_timestamps.yml`. An input with no frames at all
    /// finalizes with an empty timeline; it is not an error.
    pub fn run(&self) -> Result<DetectionReport> {
        let span = tracing::span!(tracing::Level::TRACE, "run");
        let _enter = span.enter();

        let config = &self.config;
        if !config.input_path.exists() {
            return Err(Error::InputNotFound(config.input_path.clone()));
        }
        let stem = crate::util::video_stem(&config.input_path)?;

        let mut source = VideoFileSource::open(&config.input_path)?;
        let output_path = config
            .output_dir
            .join(format!("{}{}", stem, PROCESSED_FILE_SUFFIX));

        // Declared playback rate only; the frame count is untouched.
        let output_fps = source.frame_rate() / config.slow_factor;
        let mut sink = VideoFileSink::create(
            &output_path,
            &config.fourcc,
            source.width(),
            source.height(),
            output_fps,
        )?;

        tracing::debug!(
            input = %config.input_path.display(),
            threshold = config.threshold,
            output_fps,
            "starting scene detection"
        );
        let outcome = self.stream(&mut source, &mut sink)?;
        sink.finish()?;
        tracing::debug!(
            events = outcome.timestamps.len(),
            frames_read = outcome.frames_read,
            frames_skipped = outcome.frames_skipped,
            "completed scene detection"
        );

        let timeline = Timeline::new(
            &config.input_path,
            crate::util::compute_header_md5sum(&config.input_path)?,
            outcome.timestamps,
        );
        let timeline_path = config
            .yaml_dir()
            .join(format!("{}{}", stem, TIMESTAMPS_FILE_SUFFIX));
        timeline.write_to(&timeline_path)?;

        Ok(DetectionReport {
            timeline,
            output_path,
            timeline_path,
            frames_read: outcome.frames_read,
            frames_written: outcome.frames_written,
            frames_skipped: outcome.frames_skipped,
        })
    }

    // The streaming state machine: strictly sequential, one signature of state.
    fn stream<S, K>(&self, source: &mut S, sink: &mut K) -> Result<StreamOutcome>
    where
        S: FrameSource,
        K: FrameSink,
    {
        let mut outcome = StreamOutcome::default();

        // First frame: establishes the initial signature and is never an event.
        let first = loop {
            match source.read_frame()? {
                FrameRead::Frame(frame) => break frame,
                FrameRead::Corrupt => {
                    outcome.frames_skipped += 1;
                    tracing::warn!("skipping corrupt frame");
                }
                // No frames at all: finalize with an empty timeline.
                FrameRead::End => return Ok(outcome),
            }
        };
        outcome.frames_read += 1;
        let mut previous = Signature::of_frame(&first);
        sink.write_frame(&first)?;
        outcome.frames_written += 1;

        loop {
            let mut frame = match source.read_frame()? {
                FrameRead::Frame(frame) => frame,
                FrameRead::Corrupt => {
                    outcome.frames_skipped += 1;
                    tracing::warn!("skipping corrupt frame");
                    continue;
                }
                FrameRead::End => break,
            };
            outcome.frames_read += 1;

            let current = Signature::of_frame(&frame);
            let correlation = previous.correlation(&current);
            if correlation < self.config.threshold {
                let timestamp = frame.timestamp();
                tracing::debug!(
                    at = %crate::util::format_time(std::time::Duration::from_secs_f64(
                        timestamp.max(0.0)
                    )),
                    correlation,
                    "scene cut detected"
                );
                outcome.timestamps.push(timestamp);
                if let Some(annotator) = &self.annotator {
                    annotator.annotate(&mut frame);
                }
            }

            sink.write_frame(&frame)?;
            outcome.frames_written += 1;
            previous = current;
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod test {
    use std::collections::VecDeque;
    use std::path::PathBuf;

    use super::*;
    use crate::video::VideoFrame;

    struct FakeSource {
        width: u32,
        height: u32,
        frame_rate: f64,
        frames: VecDeque<FrameRead>,
    }

    impl FakeSource {
        // N frames of each color in sequence, timestamped at the given frame rate.
        fn from_colors(colors: &[([u8; 3], usize)], frame_rate: f64) -> Self {
            let (width, height) = (64, 48);
            let mut frames = VecDeque::new();
            let mut idx = 0usize;
            for &(color, count) in colors {
                for _ in 0..count {
                    let timestamp = idx as f64 / frame_rate;
                    frames.push_back(FrameRead::Frame(VideoFrame::solid(
                        color, width, height, timestamp,
                    )));
                    idx += 1;
                }
            }
            Self {
                width,
                height,
                frame_rate,
                frames,
            }
        }
    }

    impl FrameSource for FakeSource {
        fn width(&self) -> u32 {
            self.width
        }

        fn height(&self) -> u32 {
            self.height
        }

        fn frame_rate(&self) -> f64 {
            self.frame_rate
        }

        fn read_frame(&mut self) -> Result<FrameRead> {
            Ok(self.frames.pop_front().unwrap_or(FrameRead::End))
        }
    }

    #[derive(Default)]
    struct FakeSink {
        frames: Vec<VideoFrame>,
        finished: bool,
    }

    impl FrameSink for FakeSink {
        fn write_frame(&mut self, frame: &VideoFrame) -> Result<()> {
            self.frames.push(frame.clone());
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    fn detector(threshold: f64, annotate: bool) -> SceneDetector {
        SceneDetector::new(DetectionConfig {
            input_path: PathBuf::from("clip.mp4"),
            output_dir: PathBuf::from("out"),
            threshold,
            slow_factor: 1.0,
            yaml_dir: None,
            fourcc: "mp4v".to_string(),
            annotate_events: annotate,
        })
        .unwrap()
    }

    const BLUE: [u8; 3] = [0, 0, 255];
    const RED: [u8; 3] = [255, 0, 0];

    #[test]
    fn test_single_cut_detected_at_switch() {
        let mut source = FakeSource::from_colors(&[(BLUE, 10), (RED, 10)], 30.0);
        let mut sink = FakeSink::default();

        let outcome = detector(0.9, false).stream(&mut source, &mut sink).unwrap();

        assert_eq!(outcome.timestamps.len(), 1);
        // The cut lands on the first red frame, index 10.
        assert!((outcome.timestamps[0] - 10.0 / 30.0).abs() < 1e-9);
        assert_eq!(outcome.frames_read, 20);
        assert_eq!(outcome.frames_written, 20);
        assert_eq!(outcome.frames_skipped, 0);
    }

    #[test]
    fn test_uniform_video_has_no_events() {
        let mut source = FakeSource::from_colors(&[(BLUE, 30)], 30.0);
        let mut sink = FakeSink::default();

        let outcome = detector(0.9, false).stream(&mut source, &mut sink).unwrap();

        assert!(outcome.timestamps.is_empty());
        assert_eq!(outcome.frames_written, 30);
    }

    #[test]
    fn test_empty_source_finalizes_with_empty_timeline() {
        let mut source = FakeSource::from_colors(&[], 30.0);
        let mut sink = FakeSink::default();

        let outcome = detector(0.9, false).stream(&mut source, &mut sink).unwrap();

        assert!(outcome.timestamps.is_empty());
        assert_eq!(outcome.frames_read, 0);
        assert_eq!(outcome.frames_written, 0);
        assert!(sink.frames.is_empty());
    }

    #[test]
    fn test_corrupt_frames_are_skipped() {
        let mut source = FakeSource::from_colors(&[(BLUE, 5), (RED, 5)], 30.0);
        // Inject a corrupt frame mid-stream and one before the first frame.
        source.frames.insert(3, FrameRead::Corrupt);
        source.frames.push_front(FrameRead::Corrupt);
        let mut sink = FakeSink::default();

        let outcome = detector(0.9, false).stream(&mut source, &mut sink).unwrap();

        assert_eq!(outcome.frames_skipped, 2);
        assert_eq!(outcome.frames_read, 10);
        assert_eq!(outcome.frames_written, 10);
        // The timeline is unaffected by the skipped frames.
        assert_eq!(outcome.timestamps.len(), 1);
        assert!((outcome.timestamps[0] - 5.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // Identical frames correlate at exactly 1.0; a threshold of 1.0 must not
        // flag them because the comparison is strict.
        let mut source = FakeSource::from_colors(&[(BLUE, 5)], 30.0);
        let mut sink = FakeSink::default();

        let outcome = detector(1.0, false).stream(&mut source, &mut sink).unwrap();
        assert!(outcome.timestamps.is_empty());
    }

    #[test]
    fn test_event_frame_is_annotated() {
        let mut source = FakeSource::from_colors(&[(BLUE, 3), (RED, 3)], 30.0);
        let mut sink = FakeSink::default();

        detector(0.9, true).stream(&mut source, &mut sink).unwrap();

        // Only the event frame differs from a pristine solid frame.
        assert_eq!(sink.frames.len(), 6);
        for (i, frame) in sink.frames.iter().enumerate() {
            let color = if i < 3 { BLUE } else { RED };
            let pristine = VideoFrame::solid(color, 64, 48, frame.timestamp());
            if i == 3 {
                assert_ne!(frame, &pristine, "event frame should carry the label");
                assert_eq!(frame.width(), 64);
                assert_eq!(frame.height(), 48);
            } else {
                assert_eq!(frame, &pristine, "frame {} should be untouched", i);
            }
        }
    }

    #[test]
    fn test_annotation_can_be_disabled() {
        let mut source = FakeSource::from_colors(&[(BLUE, 3), (RED, 3)], 30.0);
        let mut sink = FakeSink::default();

        let outcome = detector(0.9, false).stream(&mut source, &mut sink).unwrap();

        assert_eq!(outcome.timestamps.len(), 1);
        let event = &sink.frames[3];
        assert_eq!(event, &VideoFrame::solid(RED, 64, 48, event.timestamp()));
    }

    #[test]
    fn test_end_to_end_blue_to_red_at_five_seconds() {
        // 10 seconds at 30 fps, switching at 5.0s.
        let mut source = FakeSource::from_colors(&[(BLUE, 150), (RED, 150)], 30.0);
        let mut sink = FakeSink::default();

        let outcome = detector(0.9, false).stream(&mut source, &mut sink).unwrap();

        assert_eq!(outcome.timestamps.len(), 1);
        assert!((outcome.timestamps[0] - 5.0).abs() <= 1.0 / 30.0 + 1e-9);
        assert_eq!(sink.frames.len(), 300);
        assert!(sink
            .frames
            .iter()
            .all(|f| f.width() == 64 && f.height() == 48));
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let result = SceneDetector::new(DetectionConfig {
            input_path: PathBuf::from("clip.mp4"),
            output_dir: PathBuf::from("out"),
            threshold: 1.5,
            slow_factor: 1.0,
            yaml_dir: None,
            fourcc: "mp4v".to_string(),
            annotate_events: true,
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
