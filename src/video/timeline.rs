use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The durable record of one detection run, and the sole contract between the
/// detector and the [Composer](super::Composer).
///
/// Persisted as YAML at `<yaml_dir>/<input_stem>_timestamps.yml`. Timestamps are
/// event times in seconds, in stream order, so consecutive gaps are the durations
/// of the scenes between cuts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    /// Path of the analyzed video.
    pub source_video: String,
    /// MD5 digest of the source file's first 8 KiB. Used to warn about stale
    /// timelines; absent in files written by older versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_md5: Option<String>,
    /// Wall-clock time of the detection run, ISO-8601.
    pub detection_time: String,
    /// Detected scene cut timestamps, in seconds, monotonically non-decreasing.
    pub timestamps: Vec<f64>,
}

impl Timeline {
    pub(crate) fn new(source_video: &Path, source_md5: String, timestamps: Vec<f64>) -> Self {
        Self {
            source_video: source_video.to_string_lossy().into_owned(),
            source_md5: Some(source_md5),
            detection_time: chrono::Local::now().to_rfc3339(),
            timestamps,
        }
    }

    /// Loads a timeline from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::TimelineNotFound(path.to_path_buf()));
        }
        let f = std::fs::File::open(path)?;
        Ok(serde_yaml::from_reader(f)?)
    }

    /// Writes the timeline as YAML.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let f = std::fs::File::create(path.as_ref())?;
        serde_yaml::to_writer(f, self)?;
        Ok(())
    }

    /// Path of the analyzed video.
    pub fn source_video(&self) -> PathBuf {
        PathBuf::from(&self.source_video)
    }

    /// Gap lengths between consecutive events, in seconds.
    ///
    /// These are the segment durations a reel assembled from this timeline will use.
    /// Fewer than two events yield no durations.
    pub fn durations(&self) -> Vec<f64> {
        self.timestamps
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }

    /// Checks whether the source file still matches the digest recorded at
    /// detection time. `None` if the digest or the file is unavailable.
    pub(crate) fn source_matches(&self) -> Option<bool> {
        let recorded = self.source_md5.as_ref()?;
        let current = crate::util::compute_header_md5sum(self.source_video()).ok()?;
        Some(*recorded == current)
    }
}
