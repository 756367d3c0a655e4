//! Clips stored as a directory of numbered image files.

use std::path::{Path, PathBuf};

use image::{GrayImage, RgbaImage};
use steadyframe_common::error::{SteadyError, SteadyResult};
use steadyframe_processing_core::FrameSource;

/// Extensions recognised as frames (lower-case).
pub const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp"];

/// Ordered image files making up one clip.
///
/// Files are ordered by the last run of digits in their stem, so
/// `frame_9.png` comes before `frame_10.png`. Files without digits sort
/// after numbered ones, by name.
#[derive(Debug, Clone)]
pub struct ImageSequence {
    dir: PathBuf,
    frames: Vec<PathBuf>,
}

impl ImageSequence {
    pub fn open(dir: &Path) -> SteadyResult<Self> {
        if !dir.is_dir() {
            return Err(SteadyError::FileNotFound {
                path: dir.to_path_buf(),
            });
        }

        let mut frames = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_frame_file(&path) {
                frames.push(path);
            }
        }
        frames.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));

        tracing::debug!(dir = %dir.display(), frames = frames.len(), "Opened image sequence");
        Ok(Self {
            dir: dir.to_path_buf(),
            frames,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn path(&self, index: usize) -> SteadyResult<&Path> {
        self.frames
            .get(index)
            .map(PathBuf::as_path)
            .ok_or_else(|| SteadyError::missing_frame(index as u64))
    }

    /// Frame `index` decoded as 8-bit RGBA.
    pub fn rgba_frame(&self, index: usize) -> SteadyResult<RgbaImage> {
        Ok(self.decode(index)?.to_rgba8())
    }

    fn decode(&self, index: usize) -> SteadyResult<image::DynamicImage> {
        let path = self.path(index)?;
        image::open(path)
            .map_err(|e| SteadyError::image(format!("Failed to decode {}: {e}", path.display())))
    }
}

impl FrameSource for ImageSequence {
    fn frame_count(&self) -> usize {
        self.len()
    }

    fn gray_frame(&self, index: usize) -> SteadyResult<GrayImage> {
        Ok(self.decode(index)?.to_luma8())
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// `(has no number, number, file name)`.
fn sort_key(path: &Path) -> (bool, u64, String) {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let number = trailing_number(stem);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    (number.is_none(), number.unwrap_or(0), name)
}

fn trailing_number(stem: &str) -> Option<u64> {
    let end = stem.rfind(|c: char| c.is_ascii_digit())? + 1;
    let start = stem[..end]
        .rfind(|c: char| !c.is_ascii_digit())
        .map_or(0, |i| i + 1);
    stem[start..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgba};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("steadyframe_test_sequence").join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_trailing_number() {
        assert_eq!(trailing_number("frame_0012"), Some(12));
        assert_eq!(trailing_number("take2_frame10"), Some(10));
        assert_eq!(trailing_number("7"), Some(7));
        assert_eq!(trailing_number("cover"), None);
    }

    #[test]
    fn test_frames_sorted_numerically() {
        let dir = temp_dir("ordering");
        for name in ["frame_10.png", "frame_9.png", "frame_1.png", "notes.txt"] {
            let path = dir.join(name);
            if name.ends_with(".png") {
                RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]))
                    .save(&path)
                    .unwrap();
            } else {
                std::fs::write(&path, "not a frame").unwrap();
            }
        }

        let sequence = ImageSequence::open(&dir).unwrap();
        let names: Vec<_> = (0..sequence.len())
            .map(|i| {
                sequence
                    .path(i)
                    .unwrap()
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        assert_eq!(names, vec!["frame_1.png", "frame_9.png", "frame_10.png"]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_gray_and_rgba_decoding() {
        let dir = temp_dir("decode");
        GrayImage::from_pixel(6, 5, Luma([77]))
            .save(dir.join("0001.png"))
            .unwrap();

        let sequence = ImageSequence::open(&dir).unwrap();
        assert_eq!(sequence.frame_count(), 1);
        let gray = sequence.gray_frame(0).unwrap();
        assert_eq!(gray.dimensions(), (6, 5));
        assert_eq!(gray.get_pixel(2, 2).0[0], 77);
        let rgba = sequence.rgba_frame(0).unwrap();
        assert_eq!(*rgba.get_pixel(0, 0), Rgba([77, 77, 77, 255]));

        assert!(matches!(
            sequence.gray_frame(1),
            Err(SteadyError::MissingFrame { frame_index: 1 })
        ));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_directory() {
        let dir = std::env::temp_dir().join("steadyframe_test_sequence_absent");
        assert!(matches!(
            ImageSequence::open(&dir),
            Err(SteadyError::FileNotFound { .. })
        ));
    }
}
