//! Weight and test-set file loading
//!
//! | File | Format |
//! |------|--------|
//! | weights | `WEIGHTS_LEN` little-endian Q16.16 words, no header |
//! | images, [`ImageFormat::Fixed`] | `n × IMAGE_LEN` little-endian Q16.16 words, pre-normalized |
//! | images, [`ImageFormat::Idx`] | MNIST IDX3 (`0x00000803`, big-endian header), `u8` pixels |
//! | labels, [`LabelFormat::Raw`] | one `u8` per sample |
//! | labels, [`LabelFormat::Idx`] | MNIST IDX1 (`0x00000801`) |
//!
//! Q16.16 files are what the board application embeds as constant arrays,
//! dumped as they sit in memory.

use crate::error::{HlsCnnError, Result};
use crate::evaluation::TestCase;
use crate::fixed::Fixed;
use crate::vectors::{ImageVector, WeightVector};
use bytes::{Buf, Bytes};
use hlscnn_chip::layout::{IMAGE_LEN, IMAGE_SIDE, WEIGHTS_LEN};
use std::path::Path;
use tracing::{debug, info};

/// IDX3 magic: unsigned byte, three dimensions.
pub const IDX3_MAGIC: u32 = 0x0000_0803;

/// IDX1 magic: unsigned byte, one dimension.
pub const IDX1_MAGIC: u32 = 0x0000_0801;

/// On-disk image encoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImageFormat {
    /// Raw Q16.16 words
    #[default]
    Fixed,
    /// MNIST IDX3 bytes, scaled by 1/255
    Idx,
}

/// On-disk label encoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LabelFormat {
    /// One byte per label
    #[default]
    Raw,
    /// MNIST IDX1
    Idx,
}

fn read_words(mut buf: Bytes, count: usize) -> Vec<Fixed> {
    (0..count).map(|_| Fixed::from_raw(buf.get_i32_le())).collect()
}

/// Parse a weight dump.
///
/// # Errors
///
/// Returns `Dataset` unless the buffer holds exactly `WEIGHTS_LEN` words.
pub fn parse_weights(buf: Bytes) -> Result<WeightVector> {
    let expected = WEIGHTS_LEN * 4;
    if buf.len() != expected {
        return Err(HlsCnnError::dataset(format!(
            "weight file is {} bytes, expected {expected} ({WEIGHTS_LEN} Q16.16 words)",
            buf.len()
        )));
    }
    WeightVector::new(read_words(buf, WEIGHTS_LEN))
}

fn read_idx_header(buf: &mut Bytes, magic: u32, dims: usize, what: &str) -> Result<Vec<usize>> {
    if buf.remaining() < 4 + 4 * dims {
        return Err(HlsCnnError::dataset(format!("{what}: truncated IDX header")));
    }
    let found = buf.get_u32();
    if found != magic {
        return Err(HlsCnnError::dataset(format!(
            "{what}: bad IDX magic {found:#010x}, expected {magic:#010x}"
        )));
    }
    (0..dims)
        .map(|_| {
            usize::try_from(buf.get_u32())
                .map_err(|_| HlsCnnError::dataset(format!("{what}: IDX dimension overflows usize")))
        })
        .collect()
}

/// Parse a test-image file.
///
/// # Errors
///
/// Returns `Dataset` on a bad header, wrong image dimensions, or a size that
/// is not a whole number of images.
pub fn parse_images(mut buf: Bytes, format: ImageFormat) -> Result<Vec<ImageVector>> {
    match format {
        ImageFormat::Fixed => {
            let image_bytes = IMAGE_LEN * 4;
            if buf.len() % image_bytes != 0 {
                return Err(HlsCnnError::dataset(format!(
                    "image file is {} bytes, not a multiple of {image_bytes}",
                    buf.len()
                )));
            }
            let count = buf.len() / image_bytes;
            (0..count)
                .map(|_| ImageVector::new(read_words(buf.split_to(image_bytes), IMAGE_LEN)))
                .collect()
        }
        ImageFormat::Idx => {
            let dims = read_idx_header(&mut buf, IDX3_MAGIC, 3, "images")?;
            let (count, rows, cols) = (dims[0], dims[1], dims[2]);
            if rows != IMAGE_SIDE || cols != IMAGE_SIDE {
                return Err(HlsCnnError::dataset(format!(
                    "images are {rows}x{cols}, core expects {IMAGE_SIDE}x{IMAGE_SIDE}"
                )));
            }
            let needed = count.saturating_mul(IMAGE_LEN);
            if buf.remaining() < needed {
                return Err(HlsCnnError::dataset(format!(
                    "IDX header declares {count} images, payload holds {}",
                    buf.remaining() / IMAGE_LEN
                )));
            }
            (0..count)
                .map(|_| ImageVector::from_gray8(&buf.split_to(IMAGE_LEN)))
                .collect()
        }
    }
}

/// Parse a label file.
///
/// # Errors
///
/// Returns `Dataset` on a bad IDX header or short payload.
pub fn parse_labels(mut buf: Bytes, format: LabelFormat) -> Result<Vec<i32>> {
    let count = match format {
        LabelFormat::Raw => buf.len(),
        LabelFormat::Idx => {
            let count = read_idx_header(&mut buf, IDX1_MAGIC, 1, "labels")?[0];
            if buf.remaining() < count {
                return Err(HlsCnnError::dataset(format!(
                    "IDX header declares {count} labels, payload holds {}",
                    buf.remaining()
                )));
            }
            count
        }
    };
    Ok(buf[..count].iter().map(|&l| i32::from(l)).collect())
}

/// Load a weight dump from disk.
///
/// # Errors
///
/// Returns `Io` if the file cannot be read, otherwise as [`parse_weights`].
pub fn load_weights(path: impl AsRef<Path>) -> Result<WeightVector> {
    let path = path.as_ref();
    let weights = parse_weights(Bytes::from(std::fs::read(path)?))?;
    info!("Read {} weights from {}", weights.len(), path.display());
    Ok(weights)
}

/// Where and how the test set is stored
#[derive(Debug, Clone)]
pub struct TestSetSource<'a> {
    /// Image file
    pub images: &'a Path,
    /// Image encoding
    pub image_format: ImageFormat,
    /// Label file
    pub labels: &'a Path,
    /// Label encoding
    pub label_format: LabelFormat,
}

/// Load images and labels and pair them, keeping at most `limit` cases.
///
/// # Errors
///
/// Returns `Io` if a file cannot be read, `Dataset` if either file is
/// malformed or the image and label counts differ.
pub fn load_test_set(source: &TestSetSource<'_>, limit: Option<usize>) -> Result<Vec<TestCase>> {
    let images = parse_images(Bytes::from(std::fs::read(source.images)?), source.image_format)?;
    let labels = parse_labels(Bytes::from(std::fs::read(source.labels)?), source.label_format)?;
    let cases = pair_test_set(images, labels, limit)?;
    info!(
        "Loaded {} test cases from {}",
        cases.len(),
        source.images.display()
    );
    Ok(cases)
}

/// Pair parsed images with labels, keeping at most `limit` cases.
///
/// # Errors
///
/// Returns `Dataset` if the counts differ.
pub fn pair_test_set(
    images: Vec<ImageVector>,
    labels: Vec<i32>,
    limit: Option<usize>,
) -> Result<Vec<TestCase>> {
    if images.len() != labels.len() {
        return Err(HlsCnnError::dataset(format!(
            "{} images but {} labels",
            images.len(),
            labels.len()
        )));
    }
    let keep = limit.map_or(images.len(), |n| n.min(images.len()));
    debug!("Pairing {keep} of {} samples", images.len());
    Ok(images
        .into_iter()
        .zip(labels)
        .take(keep)
        .map(|(image, expected)| TestCase::new(image, expected))
        .collect())
}
