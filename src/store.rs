//! # Image Store Module
//!
//! File-system backed ring-buffer pools of images. Each pool is a directory of `<slot>.png`
//! files, where the slot comes from a [`BoundedCounter`](crate::BoundedCounter), so saving at a
//! reused slot overwrites the oldest image held there.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use log::{debug, warn};

use crate::error::{Error, Result};

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

const POOL_EXTENSION: &str = "png";

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// On-disk layout of a single camera's background data.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraPaths {
    root: PathBuf
}

/// A directory of slot-indexed images acting as a fixed capacity ring buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePool {
    dir: PathBuf,

    /// Slot last written and the ring capacity, used to order files sharing a modification time
    newest_hint: Option<(usize, usize)>
}

/// A counted, single pass sequence of images, newest first.
///
/// Images are decoded lazily as the sequence is consumed. Files which can't be decoded are
/// skipped, so `len` is an upper bound on the number of images produced.
pub struct PoolImages {
    count: usize,
    images: Box<dyn Iterator<Item = RgbImage> + Send>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl CameraPaths {
    pub fn new<P: AsRef<Path>>(camera_folder: P) -> Self {
        Self {
            root: camera_folder.as_ref().to_path_buf()
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `resources/backgrounds/captures`
    pub fn captures_dir(&self) -> PathBuf {
        self.root.join("resources").join("backgrounds").join("captures")
    }

    /// `resources/backgrounds/generated`
    pub fn generated_dir(&self) -> PathBuf {
        self.root.join("resources").join("backgrounds").join("generated")
    }

    /// `report/images`
    pub fn report_images_dir(&self) -> PathBuf {
        self.root.join("report").join("images")
    }

    /// `report/metadata`
    pub fn report_metadata_dir(&self) -> PathBuf {
        self.root.join("report").join("metadata")
    }

    pub fn capture_pool(&self) -> ImagePool {
        ImagePool::new(self.captures_dir())
    }

    pub fn generate_pool(&self) -> ImagePool {
        ImagePool::new(self.generated_dir())
    }
}

impl ImagePool {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            newest_hint: None
        }
    }

    /// Mark `slot` as the most recently written slot of a ring with `capacity` slots.
    ///
    /// Files sharing a modification time are then ordered by how far behind `slot` they sit in
    /// the ring, which stays correct once slot numbers have wrapped around. Without a hint they
    /// fall back to descending slot order.
    pub fn with_newest_slot(mut self, slot: usize, capacity: usize) -> Self {
        self.newest_hint = Some((slot, capacity.max(1)));

        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the pool directory if it doesn't exist yet.
    pub fn ensure_exists(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::IoError(self.dir.clone(), e))
    }

    /// Path of the file stored at the given slot.
    pub fn slot_path(&self, slot: usize) -> PathBuf {
        self.dir.join(format!("{}.{}", slot, POOL_EXTENSION))
    }

    /// Save an image into a slot, overwriting whatever was stored there.
    pub fn save(&self, slot: usize, image: &RgbImage, png_compression: u8) -> Result<PathBuf> {
        self.ensure_exists()?;

        let path = self.slot_path(slot);
        write_png(&path, image, png_compression)?;

        Ok(path)
    }

    /// List the pool's image files, newest first by modification time.
    ///
    /// Files sharing a modification time are ordered by ring position, see
    /// [`with_newest_slot`](Self::with_newest_slot).
    pub fn list_newest_first(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::IoError(self.dir.clone(), e))
        };

        let mut files: Vec<(SystemTime, usize, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::IoError(self.dir.clone(), e))?;
            let path = entry.path();

            let slot = match slot_from_path(&path) {
                Some(s) => s,
                None => continue
            };

            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .map_err(|e| Error::IoError(path.clone(), e))?;

            files.push((modified, slot, path));
        }

        let hint = self.newest_hint;
        files.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| match hint {
                    Some((newest, capacity)) => {
                        ring_age(a.1, newest, capacity).cmp(&ring_age(b.1, newest, capacity))
                    },
                    None => std::cmp::Ordering::Equal
                })
                .then(b.1.cmp(&a.1))
        });

        Ok(files.into_iter().map(|(_, _, p)| p).collect())
    }

    /// Number of images currently held.
    pub fn count(&self) -> Result<usize> {
        Ok(self.list_newest_first()?.len())
    }

    /// Slot number of the most recently written image, if any.
    pub fn newest_slot(&self) -> Result<Option<usize>> {
        Ok(self.list_newest_first()?.first().and_then(|p| slot_from_path(p)))
    }

    /// Lazily iterate over the pool's images.
    ///
    /// The directory is listed once per call, so calling this again restarts from the newest.
    pub fn iterate(&self, newest_first: bool) -> Result<PoolImages> {
        let mut paths = self.list_newest_first()?;
        if !newest_first {
            paths.reverse();
        }

        Ok(PoolImages::from_paths(paths))
    }

    /// Load the newest image, or `None` if the pool is empty.
    pub fn load_newest(&self) -> Result<Option<RgbImage>> {
        match self.list_newest_first()?.first() {
            Some(path) => load_rgb(path).map(Some),
            None => Ok(None)
        }
    }

    /// Load the newest image, treating an empty pool as an error.
    pub fn require_newest(&self) -> Result<RgbImage> {
        self.load_newest()?
            .ok_or_else(|| Error::EmptyPool(self.dir.clone()))
    }

    /// Delete every stored image and recreate the empty directory.
    pub fn reset(&self) -> Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir).map_err(|e| Error::IoError(self.dir.clone(), e))?;
        }
        debug!("Cleared image pool {:?}", self.dir);

        self.ensure_exists()
    }
}

impl PoolImages {
    /// Build a sequence over in-memory images, already ordered newest first.
    pub fn from_images(images: Vec<RgbImage>) -> Self {
        Self {
            count: images.len(),
            images: Box::new(images.into_iter())
        }
    }

    fn from_paths(paths: Vec<PathBuf>) -> Self {
        let count = paths.len();
        let images = paths.into_iter().filter_map(|path| match load_rgb(&path) {
            Ok(img) => Some(img),
            Err(e) => {
                warn!("Skipping unreadable pool image: {}", e);
                None
            }
        });

        Self {
            count,
            images: Box::new(images)
        }
    }

    /// Number of images listed when the sequence was created.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl Iterator for PoolImages {
    type Item = RgbImage;

    fn next(&mut self) -> Option<Self::Item> {
        self.images.next()
    }
}

// -----------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Load any supported image file as 8-bit RGB.
pub fn load_rgb<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    image::open(path)
        .map(|img| img.into_rgb8())
        .map_err(|e| Error::ImageLoadError(path.to_path_buf(), e))
}

/// Write a PNG, with compression on the usual 0 (none) to 9 (best) scale.
///
/// The image is written next to its destination and renamed into place, so readers never see a
/// partially written file.
pub fn write_png<P: AsRef<Path>>(path: P, image: &RgbImage, compression_0_to_9: u8) -> Result<()> {
    let compression = match compression_0_to_9 {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best
    };

    write_atomic(path.as_ref(), |writer| {
        PngEncoder::new_with_quality(writer, compression, FilterType::Adaptive).write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8
        )
    })
}

/// Write a JPEG at the given quality (0 to 100).
pub fn write_jpg<P: AsRef<Path>>(path: P, image: &RgbImage, quality_0_to_100: u8) -> Result<()> {
    let quality = quality_0_to_100.max(1).min(100);

    write_atomic(path.as_ref(), |writer| {
        JpegEncoder::new_with_quality(writer, quality).write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8
        )
    })
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Parse the slot number out of a pool file name, ignoring anything that isn't `<slot>.png`.
fn slot_from_path(path: &Path) -> Option<usize> {
    match path.extension() {
        Some(ext) if ext == POOL_EXTENSION => (),
        _ => return None
    }

    path.file_stem()?.to_str()?.parse().ok()
}

/// How many writes ago `slot` was written, given `newest` was the last slot written.
fn ring_age(slot: usize, newest: usize, capacity: usize) -> usize {
    (newest % capacity + capacity - slot % capacity) % capacity
}

fn write_atomic<F>(path: &Path, encode: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> image::ImageResult<()>
{
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| Error::IoError(dir.to_path_buf(), e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = dir.join(format!(".{}.tmp", file_name));

    let file = File::create(&tmp_path).map_err(|e| Error::IoError(tmp_path.clone(), e))?;
    let mut writer = BufWriter::new(file);

    encode(&mut writer).map_err(|e| Error::ImageSaveError(path.to_path_buf(), e))?;

    writer
        .into_inner()
        .map_err(|e| Error::IoError(tmp_path.clone(), e.into_error()))?
        .sync_all()
        .map_err(|e| Error::IoError(tmp_path.clone(), e))?;

    fs::rename(&tmp_path, path).map_err(|e| Error::IoError(path.to_path_buf(), e))
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
