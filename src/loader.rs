//! Loader for directories of face images.
//!
//! Every regular file in a directory is decoded with the `image` crate and
//! reduced to its luma channel. Images must already have the expected square
//! size; nothing is resized.
//!
//! # Example
//!
//! ```ignore
//! use face_age_pca::loader::read_image_batch;
//!
//! let images = read_image_batch("Image/Children_train", 48)?;
//! ```

use std::path::{Path, PathBuf};

use image::RgbImage;
use log::{debug, info};

use crate::config::DataLayout;
use crate::error::{Error, Result};
use crate::features::{vectorize, LumaImage};
use crate::types::{Dataset, Label, Split};

/// Y of YCbCr (ITU-R BT.601), in 16-bit fixed point with rounding.
///
/// Grey input maps to itself because the weights sum to 65536.
pub fn bt601_luma(r: u8, g: u8, b: u8) -> u8 {
    let y = 19595 * u32::from(r) + 38470 * u32::from(g) + 7471 * u32::from(b) + (1 << 15);
    (y >> 16) as u8
}

fn luma_from_rgb(rgb: &RgbImage) -> LumaImage {
    LumaImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let p = rgb.get_pixel(x, y);
        bt601_luma(p[0], p[1], p[2])
    })
}

/// Decode one image and check it is `size x size`.
pub fn load_luma_image<P: AsRef<Path>>(path: P, size: u32) -> Result<LumaImage> {
    let path = path.as_ref();
    let img = image::open(path).map_err(|source| Error::Image {
        path: path.to_path_buf(),
        source,
    })?;

    if img.width() != size || img.height() != size {
        return Err(Error::ShapeMismatch {
            path: path.to_path_buf(),
            expected: size,
            width: img.width(),
            height: img.height(),
        });
    }

    Ok(luma_from_rgb(&img.to_rgb8()))
}

/// Sorted list of the regular files in `dir`.
fn image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Load every image in `dir`, in file-name order.
pub fn read_image_batch<P: AsRef<Path>>(dir: P, size: u32) -> Result<Vec<LumaImage>> {
    let dir = dir.as_ref();
    let files = image_files(dir)?;
    if files.is_empty() {
        return Err(Error::EmptyDirectory(dir.to_path_buf()));
    }

    let images = files
        .iter()
        .map(|path| load_luma_image(path, size))
        .collect::<Result<Vec<_>>>()?;

    debug!("loaded {} images from {}", images.len(), dir.display());
    Ok(images)
}

fn labelled_set(layout: &DataLayout, children: &Path, adults: &Path, size: u32) -> Result<Dataset> {
    let children = vectorize(&read_image_batch(layout.resolve(children), size)?)?;
    let adults = vectorize(&read_image_batch(layout.resolve(adults), size)?)?;
    Dataset::from_labelled_blocks(vec![(children, Label::Child), (adults, Label::Adult)])
}

/// Load the four directories into a train/test split.
///
/// Within each partition all children come first, then all adults.
pub fn load_split(layout: &DataLayout, size: u32) -> Result<Split> {
    let train = labelled_set(layout, &layout.children_train, &layout.adults_train, size)?;
    let test = labelled_set(layout, &layout.children_test, &layout.adults_test, size)?;

    let (train_children, train_adults) = train.class_counts();
    let (test_children, test_adults) = test.class_counts();
    info!(
        "loaded {} training images ({} children, {} adults) and {} test images ({} children, {} adults)",
        train.len(),
        train_children,
        train_adults,
        test.len(),
        test_children,
        test_adults
    );

    Ok(Split { train, test })
}
