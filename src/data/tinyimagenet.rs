// ============================================================
// Layer 4 — TinyImageNet Loader
// ============================================================
// Reads the extracted `tiny-imagenet-200` archive:
//
//   tiny-imagenet-200/
//     wnids.txt                       ← 200 class ids, one per line
//     train/<wnid>/images/*.JPEG      ← 500 images per class
//     val/images/*.JPEG               ← 10 000 images
//     val/val_annotations.txt         ← "<file>\t<wnid>\t<bbox...>"
//
// The official test split ships without labels, so the `test`
// subset is served from `val/`. Label ids are the positions of
// the wnids in sorted order, which keeps them stable no matter
// how wnids.txt is ordered.
//
// Images are 64x64; a few are greyscale and are expanded to
// RGB so every sample is 3x64x64.
//
// `load` only lists files and reads each header for its size.
// Pixels are decoded when the DataLoader asks for an item, so
// the 100k training images are never resident all at once.

use anyhow::{bail, Context, Result};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use crate::domain::sample::{ImageSample, Subset};

pub const TINY_IMAGENET_DIR: &str = "tiny-imagenet-200";

/// An image on disk, not yet decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub path:   PathBuf,
    pub label:  usize,
    pub height: usize,
    pub width:  usize,
}

impl ImageFile {
    /// Read the header only; fails for files `image` cannot parse.
    pub fn from_header(path: PathBuf, label: usize) -> Result<Self> {
        let (width, height) = image::image_dimensions(&path)
            .with_context(|| format!("Cannot read image header '{}'", path.display()))?;
        Ok(Self { path, label, height: height as usize, width: width as usize })
    }

    pub fn dims(&self) -> [usize; 3] {
        [3, self.height, self.width]
    }

    /// Decode to a CHW sample scaled to [0, 1].
    pub fn decode(&self) -> Result<ImageSample> {
        let img = image::open(&self.path)
            .with_context(|| format!("Cannot decode '{}'", self.path.display()))?
            .to_rgb8();
        let (width, height) = img.dimensions();
        if (height as usize, width as usize) != (self.height, self.width) {
            bail!(
                "'{}' is {}x{}, expected {}x{}",
                self.path.display(), height, width, self.height, self.width
            );
        }
        Ok(ImageSample::from_rgb_hwc(img.as_raw(), self.height, self.width, self.label))
    }
}

pub struct TinyImageNetLoader {
    dir: PathBuf,
}

impl TinyImageNetLoader {
    pub fn new(data_root: impl AsRef<Path>) -> Self {
        Self { dir: data_root.as_ref().join(TINY_IMAGENET_DIR) }
    }

    /// wnid → label id
    pub fn class_index(&self) -> Result<HashMap<String, usize>> {
        let path = self.dir.join("wnids.txt");
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read class list '{}'", path.display()))?;
        Ok(class_index_from(&text))
    }

    pub fn load(&self, subset: Subset) -> Result<Vec<ImageFile>> {
        let classes = self.class_index()?;
        let files = match subset {
            Subset::Train => self.train_files(&classes)?,
            Subset::Test  => self.val_files(&classes)?,
        };

        let mut images = Vec::with_capacity(files.len());
        for (path, label) in files {
            match ImageFile::from_header(path, label) {
                Ok(file) => images.push(file),
                // unreadable files are skipped, not fatal
                Err(e) => tracing::warn!("Skipping image: {:#}", e),
            }
        }
        tracing::info!("Indexed {} TinyImageNet {} images", images.len(), subset);
        Ok(images)
    }

    fn train_files(&self, classes: &HashMap<String, usize>) -> Result<Vec<(PathBuf, usize)>> {
        let mut wnids: Vec<(&String, &usize)> = classes.iter().collect();
        wnids.sort_by_key(|entry| *entry.1);

        let mut files = Vec::new();
        for (wnid, &label) in wnids {
            let dir = self.dir.join("train").join(wnid).join("images");
            for path in image_files(&dir)? {
                files.push((path, label));
            }
        }
        Ok(files)
    }

    fn val_files(&self, classes: &HashMap<String, usize>) -> Result<Vec<(PathBuf, usize)>> {
        let path = self.dir.join("val").join("val_annotations.txt");
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read annotations '{}'", path.display()))?;

        let images = self.dir.join("val").join("images");
        let mut files = Vec::new();
        for (file, wnid) in parse_annotations(&text) {
            match classes.get(wnid) {
                Some(&label) => files.push((images.join(file), label)),
                None => tracing::warn!("Annotation for '{}' names unknown class '{}'", file, wnid),
            }
        }
        Ok(files)
    }
}

fn class_index_from(wnids: &str) -> HashMap<String, usize> {
    let mut ids: Vec<&str> = wnids
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids.into_iter()
        .enumerate()
        .map(|(label, wnid)| (wnid.to_string(), label))
        .collect()
}

/// `(file name, wnid)` pairs from `val_annotations.txt`.
fn parse_annotations(text: &str) -> Vec<(&str, &str)> {
    text.lines()
        .filter_map(|line| {
            let mut cols = line.split('\t');
            let file = cols.next()?.trim();
            let wnid = cols.next()?.trim();
            (!file.is_empty() && !wnid.is_empty()).then_some((file, wnid))
        })
        .collect()
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "jpeg" | "jpg" | "png"))
        .unwrap_or(false)
}

/// Image files in `dir`, sorted by name for a stable order.
fn image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
    {
        let path = entry?.path();
        if is_image(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
