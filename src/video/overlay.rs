use super::VideoFrame;

/// A pluggable transform applied to frames at detected scene cuts.
///
/// Annotation is a presentation detail: implementations must not change the frame's
/// dimensions and should only touch pixels inside the region they draw.
pub trait FrameAnnotator: Send + Sync {
    fn annotate(&self, frame: &mut VideoFrame);
}

/// Default annotator: paints a centered text label onto the frame.
///
/// Glyphs come from a built-in 5x7 uppercase bitmap font, scaled up by an integer
/// factor. The scale shrinks as needed so the label fits the frame; frames too
/// small for the label even at scale 1 are left untouched. Only the lit pixels of
/// each glyph are written, so everything outside the label's bounding box is left
/// untouched.
pub struct EventLabel {
    text: String,
    color: [u8; 3],
    scale: usize,
}

impl Default for EventLabel {
    fn default() -> Self {
        Self {
            text: "EVENT".to_string(),
            color: [0, 255, 0],
            scale: 8,
        }
    }
}

impl EventLabel {
    pub fn new(text: impl Into<String>, color: [u8; 3], scale: usize) -> Self {
        Self {
            text: text.into().to_ascii_uppercase(),
            color,
            scale: scale.max(1),
        }
    }

    // Label size in pixels at a given scale: glyphs are 5 columns wide with a
    // 1-column gap.
    fn text_size(&self, scale: usize) -> (usize, usize) {
        let glyphs = self.text.chars().count();
        if glyphs == 0 {
            return (0, 0);
        }
        (
            (glyphs * (GLYPH_WIDTH + 1) - 1) * scale,
            GLYPH_HEIGHT * scale,
        )
    }

    // Largest scale, at most the configured one, at which the label fits the frame.
    fn fitted_scale(&self, frame_w: usize, frame_h: usize) -> Option<usize> {
        (1..=self.scale).rev().find(|&scale| {
            let (text_w, text_h) = self.text_size(scale);
            text_w > 0 && text_w <= frame_w && text_h <= frame_h
        })
    }
}

impl FrameAnnotator for EventLabel {
    fn annotate(&self, frame: &mut VideoFrame) {
        let (frame_w, frame_h) = (frame.width() as usize, frame.height() as usize);
        let Some(scale) = self.fitted_scale(frame_w, frame_h) else {
            return;
        };
        let (text_w, text_h) = self.text_size(scale);

        let x0 = (frame_w - text_w) / 2;
        let y0 = (frame_h - text_h) / 2;

        for (i, c) in self.text.chars().enumerate() {
            let Some(rows) = glyph(c) else { continue };
            let glyph_x = x0 + i * (GLYPH_WIDTH + 1) * scale;
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                        continue;
                    }
                    // Paint one scaled-up font pixel.
                    for dy in 0..scale {
                        for dx in 0..scale {
                            let x = glyph_x + col * scale + dx;
                            let y = y0 + row * scale + dy;
                            let offset = (y * frame_w + x) * 3;
                            frame.data_mut()[offset..offset + 3].copy_from_slice(&self.color);
                        }
                    }
                }
            }
        }
    }
}

const GLYPH_WIDTH: usize = 5;
const GLYPH_HEIGHT: usize = 7;

// 5x7 uppercase bitmap font. Each glyph is 7 rows, low 5 bits per row, MSB left.
fn glyph(c: char) -> Option<[u8; GLYPH_HEIGHT]> {
    let rows = match c.to_ascii_uppercase() {
        ' ' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x01, 0x01, 0x01, 0x01, 0x11, 0x11, 0x0E],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x1B, 0x11],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_dimensions_unchanged() {
        let mut frame = VideoFrame::solid([0, 0, 0], 320, 240, 0.0);
        EventLabel::default().annotate(&mut frame);
        assert_eq!(frame.width(), 320);
        assert_eq!(frame.height(), 240);
        assert_eq!(frame.data().len(), 320 * 240 * 3);
    }

    #[test]
    fn test_label_pixels_are_painted() {
        let mut frame = VideoFrame::solid([0, 0, 0], 320, 240, 0.0);
        EventLabel::default().annotate(&mut frame);
        let painted = frame
            .data()
            .chunks_exact(3)
            .filter(|p| *p == [0, 255, 0])
            .count();
        assert!(painted > 0);
    }

    #[test]
    fn test_pixels_outside_label_box_untouched() {
        let (w, h) = (320u32, 240u32);
        let original = VideoFrame::solid([7, 8, 9], w, h, 0.0);
        let mut frame = original.clone();
        let label = EventLabel::default();
        label.annotate(&mut frame);

        let scale = label.fitted_scale(w as usize, h as usize).unwrap();
        let (text_w, text_h) = label.text_size(scale);
        let x0 = (w as usize - text_w) / 2;
        let y0 = (h as usize - text_h) / 2;

        for y in 0..h as usize {
            for x in 0..w as usize {
                let inside = x >= x0 && x < x0 + text_w && y >= y0 && y < y0 + text_h;
                if inside {
                    continue;
                }
                let offset = (y * w as usize + x) * 3;
                assert_eq!(
                    &frame.data()[offset..offset + 3],
                    &original.data()[offset..offset + 3],
                    "pixel ({}, {}) outside the label was modified",
                    x,
                    y
                );
            }
        }
    }

    #[test]
    fn test_label_shrinks_to_fit_small_frames() {
        // "EVENT" at the default scale 8 is 232 px wide; a 64x48 frame must still
        // get a label, at a reduced scale.
        let label = EventLabel::default();
        assert_eq!(label.fitted_scale(64, 48), Some(2));

        let mut frame = VideoFrame::solid([0, 0, 0], 64, 48, 0.0);
        label.annotate(&mut frame);
        let painted = frame
            .data()
            .chunks_exact(3)
            .filter(|p| *p == [0, 255, 0])
            .count();
        assert!(painted > 0);
    }

    #[test]
    fn test_label_larger_than_frame_is_skipped() {
        let original = VideoFrame::solid([1, 2, 3], 16, 16, 0.0);
        let mut frame = original.clone();
        EventLabel::default().annotate(&mut frame);
        assert_eq!(frame, original);
    }

    #[test]
    fn test_unknown_characters_are_skipped() {
        let mut frame = VideoFrame::solid([0, 0, 0], 320, 240, 0.0);
        EventLabel::new("A?B", [255, 0, 0], 2).annotate(&mut frame);
        let painted = frame
            .data()
            .chunks_exact(3)
            .filter(|p| *p == [255, 0, 0])
            .count();
        assert!(painted > 0);
    }
}
