use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

/// Formats the given [Duration] as "MM:SS.mmms".
pub fn format_time(t: Duration) -> String {
    let minutes = t.as_secs() / 60;
    let seconds = t.as_secs() % 60;
    let millis = t.subsec_millis();
    format!("{:02}:{:02}.{:03}s", minutes, seconds, millis)
}

/// Checks if the given path points to a valid video file.
///
/// If `full` is set to **false**, only the file header will be checked. This is a very cheap
/// operation, but it does not guarantee validity. If set to **true**, FFmpeg will be used to
/// check the video contents - note that this is more expensive, but much more accurate.
pub fn is_valid_video_file(path: impl AsRef<Path>, full: bool) -> bool {
    if !full {
        let mut buf = [0u8; 8192];
        let mut f = match std::fs::File::open(path.as_ref()) {
            Ok(f) => f,
            Err(_) => return false,
        };
        let n = match f.read(&mut buf) {
            Ok(n) => n,
            Err(_) => return false,
        };
        return infer::is_video(&buf[..n]);
    }

    if let Ok(input) = ffmpeg_next::format::input(&path.as_ref()) {
        input
            .streams()
            .filter(|s| s.parameters().medium() == ffmpeg_next::util::media::Type::Video)
            .count()
            > 0
    } else {
        false
    }
}

/// Returns all valid video files in the given directory, sorted by path.
///
/// Validation mode is controlled by `full`: see [is_valid_video_file]. Non-video entries
/// and subdirectories are ignored.
pub fn find_video_files(dir: impl AsRef<Path>, full: bool) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut videos = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_valid_video_file(&path, full) {
            videos.push(path);
        }
    }
    videos.sort();
    Ok(videos)
}

// Computes the MD5 hash of the first 8 KiB of the file. Used to detect stale
// timeline files without hashing entire videos.
pub(crate) fn compute_header_md5sum(video: impl AsRef<Path>) -> Result<String> {
    let mut buf = Vec::with_capacity(8192);
    let f = std::fs::File::open(video.as_ref())?;
    f.take(8192).read_to_end(&mut buf)?;
    let hash = format!("{:x}", md5::compute(&buf));
    Ok(hash)
}

// Returns the file stem of a video path as a UTF-8 string. Output artifact
// names are derived from it.
pub(crate) fn video_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Config(format!("cannot derive a file stem from {:?}", path)))
}

/// Returns the underlying FFmpeg version integer used by montage.
pub fn ffmpeg_version() -> u32 {
    ffmpeg_next::util::version()
}

/// Returns the underlying FFmpeg version string used by montage.
pub fn ffmpeg_version_string() -> String {
    let version_int = ffmpeg_version();

    // Reference: https://github.com/FFmpeg/FFmpeg/blob/130d19bf2044ac76372d1b97ab87ab283c8b37f8/libavutil/version.h#L64
    format!(
        "{}.{}.{}",
        version_int >> 16, // MAJOR
        (version_int & 0x00FF00) >> 8, // MINOR
        version_int & 0xFF // MICRO
    )
}
