//! Video half of the processor (§4.G step 3). Video container probing and
//! frame decode are out of scope (§1 Non-goals: "image and video decoder
//! libraries"); this module consumes decoded frames through the
//! `FrameSource` trait and does the hashing/suppression/emission work.

use image::DynamicImage;
use media_dedup_hash::{autocrop, dct_hash_64, hamm64};
use media_dedup_video_index::{VideoIndex, MAX_FRAMES_PER_VIDEO};

/// Injectable decoder boundary, analogous to `AffineValidator` in the
/// template-match crate (§4.J): the real decode library lives outside this
/// crate's scope.
pub trait FrameSource {
    /// Next decoded frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Option<DynamicImage>;
}

/// How many of the most recently *emitted* hashes are checked for
/// near-duplicate suppression.
const SUPPRESSION_WINDOW: usize = 8;

pub struct VideoOptions {
    pub video_threshold: u32,
    pub auto_crop: bool,
}

impl Default for VideoOptions {
    fn default() -> Self {
        VideoOptions { video_threshold: 3, auto_crop: true }
    }
}

/// Iterate frames from `source`, keep frame 0, suppress near-duplicates of
/// the sliding emitted window, always keep the final frame, and cap at
/// `MAX_FRAMES_PER_VIDEO`.
pub fn process_video(source: &mut dyn FrameSource, opts: &VideoOptions) -> VideoIndex {
    let mut frames = Vec::new();
    let mut hashes = Vec::new();
    let mut window: std::collections::VecDeque<u64> = std::collections::VecDeque::with_capacity(SUPPRESSION_WINDOW);

    let mut pending: Option<(i32, u64)> = None;
    let mut frame_no: i32 = 0;

    while let Some(frame) = source.next_frame() {
        if frames.len() >= MAX_FRAMES_PER_VIDEO {
            tracing::warn!(cap = MAX_FRAMES_PER_VIDEO, "video exceeds frame cap, truncating");
            break;
        }

        let cropped = if opts.auto_crop { autocrop(&frame, 12) } else { frame };
        let hash = dct_hash_64(&cropped);

        let is_duplicate = frame_no != 0 && window.iter().any(|&h| hamm64(h, hash) <= opts.video_threshold);
        if !is_duplicate || frame_no == 0 {
            if window.len() == SUPPRESSION_WINDOW {
                window.pop_front();
            }
            window.push_back(hash);
            pending = Some((frame_no, hash));
            frames.push(frame_no);
            hashes.push(hash);
        } else {
            pending = Some((frame_no, hash));
        }
        frame_no += 1;
    }

    // The final decoded frame is always kept as a reference, even if it
    // would otherwise have been suppressed as a near-duplicate.
    if let Some((last_frame, last_hash)) = pending {
        if frames.last().copied() != Some(last_frame) {
            frames.push(last_frame);
            hashes.push(last_hash);
        }
    }

    VideoIndex::new(frames, hashes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    struct StaticFrames(Vec<DynamicImage>);

    impl FrameSource for StaticFrames {
        fn next_frame(&mut self) -> Option<DynamicImage> {
            if self.0.is_empty() {
                None
            } else {
                Some(self.0.remove(0))
            }
        }
    }

    fn frame(gray: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(ImageBuffer::from_pixel(64, 64, Luma([gray])))
    }

    #[test]
    fn first_and_last_frame_always_kept() {
        let mut source = StaticFrames(vec![frame(10), frame(10), frame(10), frame(200)]);
        let idx = process_video(&mut source, &VideoOptions { video_threshold: 0, auto_crop: false });
        assert_eq!(idx.frames[0], 0);
        assert_eq!(*idx.frames.last().unwrap(), 3);
    }

    #[test]
    fn near_duplicate_frames_are_suppressed() {
        let mut source = StaticFrames(vec![frame(10); 5]);
        let idx = process_video(&mut source, &VideoOptions { video_threshold: 0, auto_crop: false });
        // identical frames collapse to just frame 0 (kept) and the final
        // frame (always emitted as reference).
        assert!(idx.frames.len() <= 2);
    }

    #[test]
    fn video_index_is_valid() {
        let mut source = StaticFrames(vec![frame(1), frame(2), frame(3)]);
        let idx = process_video(&mut source, &VideoOptions { video_threshold: 0, auto_crop: false });
        assert!(idx.validate().is_ok());
    }

    #[test]
    fn empty_stream_yields_empty_index() {
        let mut source = StaticFrames(vec![]);
        let idx = process_video(&mut source, &VideoOptions::default());
        assert!(idx.frames.is_empty());
    }
}
