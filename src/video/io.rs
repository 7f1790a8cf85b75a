extern crate ffmpeg_next;

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// One decoded frame: packed RGB24 pixels plus a source timestamp in seconds.
///
/// The buffer is tightly packed (`width * height * 3` bytes, row-major, no stride
/// padding). Frames are ephemeral; the pipeline never retains one beyond the
/// iteration that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    width: u32,
    height: u32,
    timestamp: f64,
    data: Vec<u8>,
}

impl VideoFrame {
    /// Wraps packed RGB24 pixel data into a frame.
    ///
    /// # Panics
    ///
    /// Panics if `data` is not exactly `width * height * 3` bytes.
    pub fn from_rgb24(data: Vec<u8>, width: u32, height: u32, timestamp: f64) -> Self {
        assert_eq!(data.len(), (width * height * 3) as usize);
        Self {
            width,
            height,
            timestamp,
            data,
        }
    }

    /// Creates a frame filled with a single color.
    pub fn solid(color: [u8; 3], width: u32, height: u32, timestamp: f64) -> Self {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&color);
        }
        Self::from_rgb24(data, width, height, timestamp)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Source timestamp, in seconds.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Result of one read from a [FrameSource].
#[derive(Debug)]
pub enum FrameRead {
    /// A successfully decoded frame.
    Frame(VideoFrame),
    /// A frame that failed to decode. Recoverable; callers skip it and continue.
    Corrupt,
    /// The source is exhausted.
    End,
}

/// A sequential source of video frames.
pub trait FrameSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Declared frame rate of the source, in frames per second.
    fn frame_rate(&self) -> f64;
    /// Reads the next frame in stream order.
    fn read_frame(&mut self) -> Result<FrameRead>;
}

/// A sequential sink of video frames.
pub trait FrameSink {
    /// Appends one frame to the output.
    fn write_frame(&mut self, frame: &VideoFrame) -> Result<()>;
    /// Flushes any buffered frames and finalizes the output.
    fn finish(&mut self) -> Result<()>;
}

// Maps a four-character code from the config onto an FFmpeg codec.
pub(crate) fn codec_for_fourcc(fourcc: &str) -> Option<ffmpeg_next::codec::Id> {
    match fourcc.to_ascii_lowercase().as_str() {
        "mp4v" => Some(ffmpeg_next::codec::Id::MPEG4),
        "avc1" | "h264" => Some(ffmpeg_next::codec::Id::H264),
        "hev1" | "hevc" => Some(ffmpeg_next::codec::Id::HEVC),
        "mjpg" => Some(ffmpeg_next::codec::Id::MJPEG),
        _ => None,
    }
}

/// Wraps the `FFmpeg` video decoder as a [FrameSource].
///
/// Frames are demuxed from the best video stream, decoded, and converted to RGB24.
/// Timestamps are derived from the stream's presentation timestamps, with a
/// frame-counter fallback for streams that carry none.
pub struct VideoFileSource {
    ctx: ffmpeg_next::format::context::Input,
    stream_idx: usize,
    decoder: ffmpeg_next::codec::decoder::Video,
    converter: ffmpeg_next::software::scaling::context::Context,
    time_base: f64,
    frame_rate: f64,
    duration: f64,
    decoded: ffmpeg_next::frame::Video,
    converted: ffmpeg_next::frame::Video,
    // Stream position in frames. Synthesizes timestamps for pts-less streams, so
    // it is realigned on seek rather than counting from zero.
    frame_pos: u64,
    eof_sent: bool,
}

impl std::fmt::Debug for VideoFileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFileSource")
            .field("stream_idx", &self.stream_idx)
            .field("time_base", &self.time_base)
            .field("frame_rate", &self.frame_rate)
            .field("duration", &self.duration)
            .field("frame_pos", &self.frame_pos)
            .field("eof_sent", &self.eof_sent)
            .finish_non_exhaustive()
    }
}

impl VideoFileSource {
    /// Opens a video file for sequential decoding.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::InputNotFound(path.to_path_buf()));
        }

        let ctx = ffmpeg_next::format::input(&path)?;
        let stream = ctx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| Error::MissingVideoStream(path.to_path_buf()))?;
        let stream_idx = stream.index();
        let time_base = f64::from(stream.time_base());

        let mut frame_rate = f64::from(stream.avg_frame_rate());
        if !(frame_rate > 0.0) {
            frame_rate = f64::from(stream.rate());
        }

        let decoder =
            ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?
                .decoder()
                .video()?;
        let converter = decoder.converter(ffmpeg_next::format::Pixel::RGB24)?;

        let duration = ctx.duration() as f64 * f64::from(ffmpeg_next::rescale::TIME_BASE);

        Ok(Self {
            ctx,
            stream_idx,
            decoder,
            converter,
            time_base,
            frame_rate,
            duration,
            decoded: ffmpeg_next::frame::Video::empty(),
            converted: ffmpeg_next::frame::Video::empty(),
            frame_pos: 0,
            eof_sent: false,
        })
    }

    /// Total duration of the file, in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Seeks to the nearest keyframe at or before `seconds`.
    ///
    /// Frames decoded after the seek still carry their absolute source timestamps,
    /// so callers can discard frames until the exact position is reached.
    pub fn seek_to(&mut self, seconds: f64) -> Result<()> {
        let ts = (seconds / f64::from(ffmpeg_next::rescale::TIME_BASE)) as i64;
        self.ctx.seek(ts, ..ts)?;
        self.decoder.flush();
        self.frame_pos = (seconds.max(0.0) * self.frame_rate).round() as u64;
        self.eof_sent = false;
        Ok(())
    }

    fn next_packet(&mut self) -> Option<ffmpeg_next::packet::Packet> {
        let stream_idx = self.stream_idx;
        self.ctx
            .packets()
            .find(|(s, _)| s.index() == stream_idx)
            .map(|(_, p)| p)
    }

    // Converts the most recently decoded frame to a packed RGB24 [VideoFrame].
    fn convert_decoded(&mut self) -> Result<VideoFrame> {
        self.converter.run(&self.decoded, &mut self.converted)?;

        let timestamp = self
            .decoded
            .timestamp()
            .or_else(|| self.decoded.pts())
            .map(|pts| pts as f64 * self.time_base)
            .unwrap_or(self.frame_pos as f64 / self.frame_rate);
        self.frame_pos += 1;

        let (width, height) = (self.converted.width(), self.converted.height());
        let stride = self.converted.stride(0);
        let row_len = width as usize * 3;
        let plane = self.converted.data(0);

        // The converted frame may carry per-row alignment padding; copy it out row
        // by row into a tightly packed buffer.
        let mut data = Vec::with_capacity(row_len * height as usize);
        for row in 0..height as usize {
            data.extend_from_slice(&plane[row * stride..row * stride + row_len]);
        }

        Ok(VideoFrame::from_rgb24(data, width, height, timestamp))
    }
}

impl FrameSource for VideoFileSource {
    fn width(&self) -> u32 {
        self.decoder.width()
    }

    fn height(&self) -> u32 {
        self.decoder.height()
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn read_frame(&mut self) -> Result<FrameRead> {
        loop {
            if self.decoder.receive_frame(&mut self.decoded).is_ok() {
                return Ok(FrameRead::Frame(self.convert_decoded()?));
            }
            if self.eof_sent {
                return Ok(FrameRead::End);
            }
            match self.next_packet() {
                Some(packet) => {
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        tracing::debug!(error = %e, "decoder rejected packet");
                        return Ok(FrameRead::Corrupt);
                    }
                }
                None => {
                    // Demuxer exhausted; flush the decoder and drain buffered frames.
                    self.eof_sent = true;
                    self.decoder.send_eof()?;
                }
            }
        }
    }
}

/// Wraps the `FFmpeg` video encoder as a [FrameSink].
///
/// Incoming RGB24 frames are converted to YUV420P, scaled to the sink's dimensions
/// if needed, and encoded at the declared frame rate. [FrameSink::finish] must be
/// called to flush the encoder and write the container trailer; dropping the sink
/// without finishing abandons the output.
pub struct VideoFileSink {
    path: PathBuf,
    octx: ffmpeg_next::format::context::Output,
    encoder: ffmpeg_next::codec::encoder::video::Encoder,
    encoder_time_base: ffmpeg_next::Rational,
    // Recreated whenever the input frame dimensions change.
    converter: Option<ffmpeg_next::software::scaling::context::Context>,
    converter_input: (u32, u32),
    encoded: ffmpeg_next::frame::Video,
    frame_idx: i64,
    finished: bool,
}

impl VideoFileSink {
    /// Creates an output video file.
    ///
    /// Any encoder or container setup failure is reported as [Error::OutputInit].
    pub fn create(
        path: impl AsRef<Path>,
        fourcc: &str,
        width: u32,
        height: u32,
        frame_rate: f64,
    ) -> Result<Self> {
        let path = path.as_ref();
        let codec_id = codec_for_fourcc(fourcc)
            .ok_or_else(|| Error::Config(format!("unknown fourcc {:?}", fourcc)))?;

        Self::create_inner(path, codec_id, width, height, frame_rate).map_err(|e| {
            tracing::debug!(error = %e, "output initialization failed");
            Error::OutputInit(path.to_path_buf())
        })
    }

    fn create_inner(
        path: &Path,
        codec_id: ffmpeg_next::codec::Id,
        width: u32,
        height: u32,
        frame_rate: f64,
    ) -> Result<Self> {
        // Millisecond-precision rational keeps fractional rates (e.g. 29.97) exact
        // enough while staying within MPEG-4's 16-bit time base limit.
        let rate = ffmpeg_next::Rational((frame_rate * 1000.0).round() as i32, 1000);
        let encoder_time_base = rate.invert();

        // The muxer is named explicitly: temp files carry a `.part` extension, so
        // FFmpeg cannot guess the container from the filename.
        let mut octx = ffmpeg_next::format::output_as(&path, "mp4")?;
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(codec_id)
            .ok_or(ffmpeg_next::Error::EncoderNotFound)?;
        let mut stream = octx.add_stream(codec)?;

        let mut encoder =
            ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?
                .encoder()
                .video()?;
        encoder.set_width(width);
        encoder.set_height(height);
        encoder.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder.set_time_base(encoder_time_base);
        encoder.set_frame_rate(Some(rate));
        if global_header {
            encoder.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder.open_as(codec)?;
        stream.set_parameters(&encoder);
        stream.set_time_base(encoder_time_base);

        octx.write_header()?;

        Ok(Self {
            path: path.to_path_buf(),
            octx,
            encoder,
            encoder_time_base,
            converter: None,
            converter_input: (0, 0),
            encoded: ffmpeg_next::frame::Video::new(
                ffmpeg_next::format::Pixel::YUV420P,
                width,
                height,
            ),
            frame_idx: 0,
            finished: false,
        })
    }

    /// Path of the file being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn converter_for(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<&mut ffmpeg_next::software::scaling::context::Context> {
        if self.converter.is_none() || self.converter_input != (width, height) {
            self.converter = Some(ffmpeg_next::software::scaling::context::Context::get(
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
                ffmpeg_next::format::Pixel::YUV420P,
                self.encoder.width(),
                self.encoder.height(),
                ffmpeg_next::software::scaling::flag::Flags::BILINEAR,
            )?);
            self.converter_input = (width, height);
        }
        Ok(self.converter.as_mut().unwrap())
    }

    fn write_encoded_packets(&mut self) -> Result<()> {
        let mut packet = ffmpeg_next::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(0);
            let stream_time_base = self.octx.stream(0).unwrap().time_base();
            packet.rescale_ts(self.encoder_time_base, stream_time_base);
            packet.write_interleaved(&mut self.octx)?;
        }
        Ok(())
    }
}

impl FrameSink for VideoFileSink {
    fn write_frame(&mut self, frame: &VideoFrame) -> Result<()> {
        let (width, height) = (frame.width(), frame.height());

        // Copy the packed RGB24 buffer into an FFmpeg frame, honoring its row stride.
        let mut rgb =
            ffmpeg_next::frame::Video::new(ffmpeg_next::format::Pixel::RGB24, width, height);
        let stride = rgb.stride(0);
        let row_len = width as usize * 3;
        let plane = rgb.data_mut(0);
        for (row, src) in frame.data().chunks_exact(row_len).enumerate() {
            plane[row * stride..row * stride + row_len].copy_from_slice(src);
        }

        let mut encoded = std::mem::replace(&mut self.encoded, ffmpeg_next::frame::Video::empty());
        self.converter_for(width, height)?.run(&rgb, &mut encoded)?;
        encoded.set_pts(Some(self.frame_idx));
        self.frame_idx += 1;

        self.encoder.send_frame(&encoded)?;
        self.encoded = encoded;

        self.write_encoded_packets()
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.encoder.send_eof()?;
        self.write_encoded_packets()?;
        self.octx.write_trailer()?;
        self.finished = true;
        Ok(())
    }
}
