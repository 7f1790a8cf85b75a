use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Top-level configuration document for a montage run.
///
/// Loaded from a YAML file with a `scene_detection` section, a `composition` section, or
/// both. Loading validates value ranges, checks that the input video exists, and eagerly
/// creates all output directories so that later stages never fail on a missing directory.
///
/// # Example
///
/// ```yaml
/// scene_detection:
///   input_path: footage/raw.mp4
///   output_dir: output
///   threshold: 0.9
///   slow_factor: 1.0
///   yaml_dir: inspiration/timestamp_yamls
/// composition:
///   source_dir: source_videos
///   output_dir: output
///   fps: 30.0
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Scene detection settings, if this config drives a detection run.
    #[serde(default)]
    pub scene_detection: Option<DetectionConfig>,
    /// Reel composition settings, if this config drives an assembly run.
    #[serde(default)]
    pub composition: Option<CompositionConfig>,
}

/// Settings for one scene detection run.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Video file to analyze. Must exist when the config is loaded.
    pub input_path: PathBuf,
    /// Directory for the processed output video. Created eagerly.
    pub output_dir: PathBuf,
    /// Correlation threshold in (-1, 1]. An adjacent-frame correlation *below* this
    /// value is recorded as a scene cut.
    pub threshold: f64,
    /// Declared playback slowdown. The output video carries a frame rate of
    /// `input_fps / slow_factor`; frames are never duplicated.
    #[serde(default = "default_slow_factor")]
    pub slow_factor: f64,
    /// Directory for the timeline YAML file. Defaults to `output_dir`.
    #[serde(default)]
    pub yaml_dir: Option<PathBuf>,
    /// Four-character code selecting the output codec.
    #[serde(default = "default_fourcc")]
    pub fourcc: String,
    /// Draw the event label onto frames at detected cuts.
    #[serde(default = "default_annotate_events")]
    pub annotate_events: bool,
}

/// Settings for one reel assembly run.
#[derive(Debug, Clone, Deserialize)]
pub struct CompositionConfig {
    /// Directory holding the pool of candidate source videos.
    pub source_dir: PathBuf,
    /// Directory for the assembled reel. Created eagerly.
    pub output_dir: PathBuf,
    /// Frame rate of the assembled reel.
    ///
    /// Clips are copied frame for frame at this rate, so reel timing assumes pool
    /// sources play at it too; a source with a different native rate comes out
    /// time-stretched by the ratio.
    #[serde(default = "default_fps")]
    pub fps: f64,
    /// Reel width in pixels. Defaults to the first placed source's width.
    #[serde(default)]
    pub width: Option<u32>,
    /// Reel height in pixels. Defaults to the first placed source's height.
    #[serde(default)]
    pub height: Option<u32>,
    /// Four-character code selecting the reel codec.
    #[serde(default = "default_fourcc")]
    pub fourcc: String,
}

fn default_slow_factor() -> f64 {
    crate::video::DEFAULT_SLOW_FACTOR
}

fn default_fourcc() -> String {
    crate::video::DEFAULT_FOURCC.to_string()
}

fn default_annotate_events() -> bool {
    true
}

fn default_fps() -> f64 {
    crate::video::DEFAULT_COMPOSITION_FPS
}

impl Config {
    /// Loads and validates a config file.
    ///
    /// Fails with [Error::Config] before any I/O is performed if a required key is missing
    /// or a value is out of range. On success, all configured output directories exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        // serde reports missing required keys by name, e.g. "missing field `threshold`".
        let config: Config = serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.resolve()?;
        Ok(config)
    }

    // Validates values and creates output directories. The input video's directory is
    // never created; only its existence is checked.
    fn resolve(&self) -> Result<()> {
        if self.scene_detection.is_none() && self.composition.is_none() {
            return Err(Error::Config(
                "config has neither a scene_detection nor a composition section".to_string(),
            ));
        }
        if let Some(detection) = &self.scene_detection {
            detection.validate()?;
            if !detection.input_path.exists() {
                return Err(Error::InputNotFound(detection.input_path.clone()));
            }
            std::fs::create_dir_all(&detection.output_dir)?;
            std::fs::create_dir_all(detection.yaml_dir())?;
        }
        if let Some(composition) = &self.composition {
            composition.validate()?;
            if !composition.source_dir.is_dir() {
                return Err(Error::Config(format!(
                    "composition source_dir is not a directory: {}",
                    composition.source_dir.display()
                )));
            }
            std::fs::create_dir_all(&composition.output_dir)?;
        }
        Ok(())
    }
}

impl DetectionConfig {
    /// Directory the timeline YAML is written to.
    pub fn yaml_dir(&self) -> &Path {
        self.yaml_dir.as_deref().unwrap_or(&self.output_dir)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.threshold > -1.0 && self.threshold <= 1.0) {
            return Err(Error::Config(format!(
                "threshold must be in (-1, 1], got {}",
                self.threshold
            )));
        }
        if self.slow_factor < 1.0 {
            return Err(Error::Config(format!(
                "slow_factor must be at least 1, got {}",
                self.slow_factor
            )));
        }
        validate_fourcc(&self.fourcc)
    }
}

impl CompositionConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.fps > 0.0) {
            return Err(Error::Config(format!(
                "composition fps must be positive, got {}",
                self.fps
            )));
        }
        for (name, dim) in [("width", self.width), ("height", self.height)] {
            if let Some(v) = dim {
                // yuv420p output requires even dimensions.
                if v == 0 || v % 2 != 0 {
                    return Err(Error::Config(format!(
                        "composition {} must be a positive even number, got {}",
                        name, v
                    )));
                }
            }
        }
        validate_fourcc(&self.fourcc)
    }
}

fn validate_fourcc(fourcc: &str) -> Result<()> {
    if crate::video::codec_for_fourcc(fourcc).is_none() {
        return Err(Error::Config(format!(
            "unknown fourcc {:?}; supported: mp4v, avc1, h264, hev1, hevc, mjpg",
            fourcc
        )));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("config.yml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn detection_yaml(dir: &Path) -> String {
        let input = dir.join("clip.mp4");
        std::fs::write(&input, b"stub").unwrap();
        format!(
            "scene_detection:\n  input_path: {}\n  output_dir: {}\n  threshold: 0.9\n",
            input.display(),
            dir.join("out").display(),
        )
    }

    #[test]
    fn test_load_creates_output_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!(
            "{}  yaml_dir: {}\n",
            detection_yaml(dir.path()),
            dir.path().join("timestamps").display()
        );
        let path = write_config(dir.path(), &yaml);

        let config = Config::load(&path).unwrap();
        let detection = config.scene_detection.unwrap();

        assert!(dir.path().join("out").is_dir());
        assert!(dir.path().join("timestamps").is_dir());
        assert_eq!(detection.yaml_dir(), dir.path().join("timestamps"));
        assert_eq!(detection.threshold, 0.9);
        assert_eq!(detection.slow_factor, 1.0);
        assert_eq!(detection.fourcc, "mp4v");
        assert!(detection.annotate_events);
    }

    #[test]
    fn test_yaml_dir_defaults_to_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), &detection_yaml(dir.path()));
        let config = Config::load(&path).unwrap();
        let detection = config.scene_detection.unwrap();
        assert_eq!(detection.yaml_dir(), dir.path().join("out"));
    }

    #[test]
    fn test_missing_required_key_is_named() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "scene_detection:\n  input_path: clip.mp4\n  output_dir: out\n",
        );
        let err = Config::load(&path).unwrap_err();
        match err {
            Error::Config(msg) => assert!(msg.contains("threshold"), "got: {}", msg),
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_input_fails_before_any_output() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!(
            "scene_detection:\n  input_path: {}\n  output_dir: {}\n  threshold: 0.9\n",
            dir.path().join("missing.mp4").display(),
            dir.path().join("out").display(),
        );
        let path = write_config(dir.path(), &yaml);
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, Error::InputNotFound(_)));
        // Validation runs before directory creation.
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_threshold_range() {
        let dir = tempfile::tempdir().unwrap();
        for bad in ["1.5", "-1.0", "-3"] {
            let yaml = detection_yaml(dir.path()).replace("threshold: 0.9", &format!("threshold: {}", bad));
            let path = write_config(dir.path(), &yaml);
            assert!(
                matches!(Config::load(&path), Err(Error::Config(_))),
                "threshold {} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_slow_factor_must_be_at_least_one() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!("{}  slow_factor: 0.5\n", detection_yaml(dir.path()));
        let path = write_config(dir.path(), &yaml);
        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_fourcc_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!("{}  fourcc: xvid\n", detection_yaml(dir.path()));
        let path = write_config(dir.path(), &yaml);
        let err = Config::load(&path).unwrap_err();
        match err {
            Error::Config(msg) => assert!(msg.contains("xvid"), "got: {}", msg),
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_composition_section() {
        let dir = tempfile::tempdir().unwrap();
        let source_dir = dir.path().join("pool");
        std::fs::create_dir(&source_dir).unwrap();
        let yaml = format!(
            "composition:\n  source_dir: {}\n  output_dir: {}\n  width: 1280\n  height: 720\n",
            source_dir.display(),
            dir.path().join("edits").display(),
        );
        let path = write_config(dir.path(), &yaml);
        let config = Config::load(&path).unwrap();
        let composition = config.composition.unwrap();
        assert_eq!(composition.fps, 30.0);
        assert_eq!(composition.width, Some(1280));
        assert!(dir.path().join("edits").is_dir());
    }

    #[test]
    fn test_composition_odd_dimensions_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source_dir = dir.path().join("pool");
        std::fs::create_dir(&source_dir).unwrap();
        let yaml = format!(
            "composition:\n  source_dir: {}\n  output_dir: {}\n  width: 1279\n",
            source_dir.display(),
            dir.path().join("edits").display(),
        );
        let path = write_config(dir.path(), &yaml);
        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "{}\n");
        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
    }
}
