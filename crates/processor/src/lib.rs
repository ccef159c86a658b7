//! The processor (§4.G): turns one file path into a populated `Media`
//! record, plus a `VideoIndex` side-output for video files.

mod digest;
mod error;
mod image_pipeline;
mod video_pipeline;

pub use digest::compute_digest;
pub use error::{ProcessorError, Result};
pub use image_pipeline::{process_image, ImageOptions};
pub use video_pipeline::{process_video, FrameSource, VideoOptions};

use media_dedup_common::{Media, MediaType};
use media_dedup_video_index::VideoIndex;
use std::path::{Path, PathBuf};

/// Outcome of processing one scanned path (§4.G).
pub struct IndexResult {
    pub ok: bool,
    pub path: PathBuf,
    pub media: Option<Media>,
    pub video_index: Option<VideoIndex>,
}

impl IndexResult {
    #[must_use]
    pub fn success(media: Media, video_index: Option<VideoIndex>) -> Self {
        IndexResult { ok: true, path: media.path.clone(), media: Some(media), video_index }
    }

    #[must_use]
    pub fn failure(path: PathBuf) -> Self {
        IndexResult { ok: false, path, media: None, video_index: None }
    }
}

/// Process an image file end to end.
pub fn index_image(path: &Path, opts: &ImageOptions) -> IndexResult {
    match process_image(path, opts) {
        Ok(media) => IndexResult::success(media, None),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "image processing failed");
            IndexResult::failure(path.to_path_buf())
        }
    }
}

/// Process a video's decoded frame stream, build its `Media` shell (the
/// hash fields that apply at the video level come from frame 0), and write
/// the resulting `.vdx` file atomically.
pub fn index_video(
    path: &Path,
    digest_bytes: &[u8],
    source: &mut dyn FrameSource,
    opts: &VideoOptions,
    vdx_path: &Path,
    app_version: &str,
) -> Result<IndexResult> {
    let video_index = process_video(source, opts);
    video_index.save_atomic(vdx_path, app_version)?;

    let mut media = Media::new(path.to_path_buf(), MediaType::Video);
    media.digest = Some(digest::compute_digest(digest_bytes));
    media.dct_hash = video_index.hashes.first().copied();
    Ok(IndexResult::success(media, Some(video_index)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, Luma};

    struct OneFrame(Option<DynamicImage>);
    impl FrameSource for OneFrame {
        fn next_frame(&mut self) -> Option<DynamicImage> {
            self.0.take()
        }
    }

    #[test]
    fn index_video_writes_vdx_and_media() {
        let dir = tempfile::tempdir().unwrap();
        let vdx_path = dir.path().join("v.vdx");
        let frame = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(32, 32, Luma([100])));
        let mut source = OneFrame(Some(frame));
        let result = index_video(
            Path::new("/video.mp4"),
            b"payload",
            &mut source,
            &VideoOptions { video_threshold: 0, auto_crop: false },
            &vdx_path,
            "1.0",
        )
        .unwrap();
        assert!(result.ok);
        assert!(vdx_path.exists());
        assert!(result.media.unwrap().dct_hash.is_some());
    }

    #[test]
    fn index_image_failure_marks_result_not_ok() {
        let result = index_image(Path::new("/nope.png"), &ImageOptions::default());
        assert!(!result.ok);
    }
}
