//! Frame sources.
//!
//! A source hands the pipeline one decoded RGB frame at a time. `Ok(None)` is the
//! normal end of a stream; any `Err` is an acquisition failure and stops the run.

use crate::error::{VisionError, VisionResult};
use image::RgbImage;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Extensions `ImageSequenceSource` picks up, compared case-insensitively.
const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

pub trait FrameSource {
    fn next_frame(&mut self) -> VisionResult<Option<RgbImage>>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> VisionResult<Option<RgbImage>> {
        (**self).next_frame()
    }
}

/// Frames read from the image files of a directory, in lexical file-name order.
#[derive(Debug)]
pub struct ImageSequenceSource {
    pending: VecDeque<PathBuf>,
    dimensions: Option<(u32, u32)>,
}

impl ImageSequenceSource {
    pub fn open(directory: impl AsRef<Path>) -> VisionResult<Self> {
        let directory = directory.as_ref();
        let entries = std::fs::read_dir(directory).map_err(|e| {
            VisionError::acquisition(format!("cannot read {}: {e}", directory.display()))
        })?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && has_frame_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(Self {
            pending: paths.into(),
            dimensions: None,
        })
    }

    /// Frames not yet read.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

fn has_frame_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| FRAME_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> VisionResult<Option<RgbImage>> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };
        let frame = image::open(&path)
            .map_err(|e| VisionError::acquisition(format!("{}: {e}", path.display())))?
            .to_rgb8();
        match self.dimensions {
            None => self.dimensions = Some(frame.dimensions()),
            Some(expected) if expected != frame.dimensions() => {
                return Err(VisionError::acquisition(format!(
                    "{} is {:?}, expected {:?}",
                    path.display(),
                    frame.dimensions(),
                    expected
                )));
            }
            Some(_) => {}
        }
        Ok(Some(frame))
    }
}

/// Frames already held in memory. Used for synthetic scenes and tests.
#[derive(Debug, Default)]
pub struct MemorySource {
    frames: VecDeque<RgbImage>,
}

impl MemorySource {
    pub fn new(frames: impl IntoIterator<Item = RgbImage>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn push(&mut self, frame: RgbImage) {
        self.frames.push_back(frame);
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> VisionResult<Option<RgbImage>> {
        Ok(self.frames.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn reads_frames_in_lexical_order() -> VisionResult<()> {
        let dir = tempfile::tempdir()?;
        RgbImage::from_pixel(4, 3, Rgb([2, 2, 2])).save(dir.path().join("frame_002.png"))?;
        RgbImage::from_pixel(4, 3, Rgb([1, 1, 1])).save(dir.path().join("frame_001.png"))?;
        std::fs::write(dir.path().join("notes.txt"), "not a frame")?;

        let mut source = ImageSequenceSource::open(dir.path())?;
        assert_eq!(source.remaining(), 2);
        let first = source.next_frame()?.ok_or_else(|| VisionError::acquisition("no frame"))?;
        assert_eq!(first.get_pixel(0, 0), &Rgb([1, 1, 1]));
        let second = source.next_frame()?.ok_or_else(|| VisionError::acquisition("no frame"))?;
        assert_eq!(second.get_pixel(0, 0), &Rgb([2, 2, 2]));
        assert!(source.next_frame()?.is_none());
        Ok(())
    }

    #[test]
    fn size_change_is_an_acquisition_error() -> VisionResult<()> {
        let dir = tempfile::tempdir()?;
        RgbImage::new(4, 3).save(dir.path().join("a.png"))?;
        RgbImage::new(5, 3).save(dir.path().join("b.png"))?;
        let mut source = ImageSequenceSource::open(dir.path())?;
        assert!(source.next_frame()?.is_some());
        assert!(matches!(source.next_frame(), Err(VisionError::Acquisition(_))));
        Ok(())
    }

    #[test]
    fn unreadable_input_is_distinct_from_end_of_stream() -> VisionResult<()> {
        assert!(matches!(
            ImageSequenceSource::open("/definitely/not/a/real/dir"),
            Err(VisionError::Acquisition(_))
        ));
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("broken.png"), b"not png data")?;
        let mut source = ImageSequenceSource::open(dir.path())?;
        assert!(matches!(source.next_frame(), Err(VisionError::Acquisition(_))));
        Ok(())
    }

    #[test]
    fn memory_source_drains_in_order() -> VisionResult<()> {
        let mut source = MemorySource::new([RgbImage::new(1, 1)]);
        source.push(RgbImage::new(2, 2));
        assert_eq!(source.next_frame()?.map(|f| f.width()), Some(1));
        assert_eq!(source.next_frame()?.map(|f| f.width()), Some(2));
        assert!(source.next_frame()?.is_none());
        Ok(())
    }
}
