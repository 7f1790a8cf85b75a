//! Scene cut detection and highlight reel assembly.
//!
//! The pipeline reads a video frame by frame, fingerprints each frame with a joint
//! HSV color histogram, and scores adjacent frames with a Pearson correlation. A
//! correlation below the configured threshold marks a scene cut; the cut timestamps
//! form a [Timeline] that is persisted as YAML. A [Composer] can later turn any
//! timeline into a highlight reel by cutting random, non-overlapping clips of the
//! matching durations out of a pool of source videos.

mod composer;
mod detector;
mod io;
mod overlay;
mod signature;
mod timeline;

pub use composer::{Composer, CompositionReport, PlacedClip};
pub use detector::{DetectionReport, SceneDetector};
pub use io::{FrameRead, FrameSink, FrameSource, VideoFileSink, VideoFileSource, VideoFrame};
pub use overlay::{EventLabel, FrameAnnotator};
pub use signature::Signature;
pub use timeline::Timeline;

pub(crate) use io::codec_for_fourcc;

/// Default slow-motion factor.
///
/// The output video's declared frame rate is the input rate divided by this factor.
/// Frames are never duplicated; a factor above 1 simply plays the same frames slower.
pub const DEFAULT_SLOW_FACTOR: f64 = 1.0;

/// Default four-character code for output videos.
pub const DEFAULT_FOURCC: &str = "mp4v";

/// Default frame rate of an assembled reel.
pub const DEFAULT_COMPOSITION_FPS: f64 = 30.0;

/// Default number of placement attempts per reel segment.
///
/// Random interval placement retries up to this many times before the segment is
/// reported as unplaceable. Bounds the search when a source is nearly saturated.
pub const DEFAULT_PLACEMENT_ATTEMPTS: usize = 64;

/// Number of histogram bins along each HSV channel.
pub const SIGNATURE_BINS_PER_CHANNEL: usize = 8;

/// Total number of bins in a frame signature.
pub const SIGNATURE_SIZE: usize =
    SIGNATURE_BINS_PER_CHANNEL * SIGNATURE_BINS_PER_CHANNEL * SIGNATURE_BINS_PER_CHANNEL;

pub(crate) static PROCESSED_FILE_SUFFIX: &str = "_processed.mp4";
pub(crate) static TIMESTAMPS_FILE_SUFFIX: &str = "_timestamps.yml";
pub(crate) static EDIT_FILE_SUFFIX: &str = "_edit.mp4";
pub(crate) static MANIFEST_FILE_SUFFIX: &str = "_edit.json";
