//! Sample loading and batching
//!
//! A thin I/O wrapper over the core's conversion primitives. The binary
//! formats are the classic big-endian IDX files: an image file carries the
//! header `{magic 0x0000_0803, count, rows, cols}` followed by
//! `count·rows·cols` unsigned bytes; a label file carries
//! `{magic 0x0000_0801, count}` followed by `count` bytes. Header fields
//! are byte-swapped on little-endian hosts before use.
//!
//! Load failures reflect possibly-corrupt external input, so they surface
//! as a [`DatasetError`] result at this boundary — unlike the kernel
//! operations, where an error is always a caller contract violation.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;

use crate::error::CentellaError;
use crate::matrix::Matrix;
use crate::ops;
use crate::tensor::Tensor;
use crate::vector::Vector;

const IMAGE_MAGIC: u32 = 0x0000_0803;
const LABEL_MAGIC: u32 = 0x0000_0801;

/// Pixel scale applied when samples land in float matrices
pub const PIXEL_SCALE: f32 = 1.0 / 255.0;

/// Errors at the sample-file boundary
#[derive(Debug, Error)]
pub enum DatasetError {
    /// File does not start with the expected IDX magic
    #[error("bad magic: expected {expected:#010x}, got {actual:#010x}")]
    BadMagic {
        /// Magic the format requires
        expected: u32,
        /// Magic found in the file
        actual: u32,
    },

    /// Payload shorter than the header promised
    #[error("truncated payload: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes the header promised
        expected: usize,
        /// Bytes actually present
        actual: usize,
    },

    /// Underlying I/O failure
    #[error(transparent)]
    Io(#[from] io::Error),
}

fn read_be_u32(r: &mut impl Read) -> Result<u32, DatasetError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

/// Load an IDX image file into a byte tensor (`batch × rows × cols`)
pub fn load_images(path: impl AsRef<Path>) -> Result<Tensor<u8>, DatasetError> {
    let mut r = BufReader::new(File::open(path)?);
    let magic = read_be_u32(&mut r)?;
    if magic != IMAGE_MAGIC {
        return Err(DatasetError::BadMagic {
            expected: IMAGE_MAGIC,
            actual: magic,
        });
    }
    let count = read_be_u32(&mut r)? as usize;
    let rows = read_be_u32(&mut r)? as usize;
    let cols = read_be_u32(&mut r)? as usize;

    let expected = count * rows * cols;
    let mut data = Vec::new();
    r.read_to_end(&mut data)?;
    if data.len() < expected {
        return Err(DatasetError::Truncated {
            expected,
            actual: data.len(),
        });
    }
    data.truncate(expected);

    let mut t = Tensor::new();
    t.assign(count, rows, cols, 0);
    t.as_mut_slice().copy_from_slice(&data);
    Ok(t)
}

/// Load an IDX label file into a byte vector
pub fn load_labels(path: impl AsRef<Path>) -> Result<Vector<u8>, DatasetError> {
    let mut r = BufReader::new(File::open(path)?);
    let magic = read_be_u32(&mut r)?;
    if magic != LABEL_MAGIC {
        return Err(DatasetError::BadMagic {
            expected: LABEL_MAGIC,
            actual: magic,
        });
    }
    let count = read_be_u32(&mut r)? as usize;

    let mut data = Vec::new();
    r.read_to_end(&mut data)?;
    if data.len() < count {
        return Err(DatasetError::Truncated {
            expected: count,
            actual: data.len(),
        });
    }
    data.truncate(count);
    Ok(Vector::from_slice(&data))
}

/// Shuffled mini-batch iterator over a loaded sample set
///
/// Owns only the sample order; image and label storage stays with the
/// caller, and each step fills caller-owned containers through the core's
/// per-sample copy primitive — nothing is allocated per batch.
///
/// Batches that would run past the end of an epoch trigger a reshuffle and
/// start the next epoch instead, so every delivered batch is full-size.
#[derive(Debug)]
pub struct Batcher {
    order: Vec<usize>,
    cursor: usize,
    batch_size: usize,
    rng: StdRng,
}

impl Batcher {
    /// Batcher over `sample_count` samples with a reproducible seed
    pub fn new(sample_count: usize, batch_size: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut order: Vec<usize> = (0..sample_count).collect();
        order.shuffle(&mut rng);
        Self {
            order,
            cursor: 0,
            batch_size,
            rng,
        }
    }

    /// Samples per batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Full batches available per epoch
    pub fn batches_per_epoch(&self) -> usize {
        self.order.len() / self.batch_size
    }

    /// Fill `dest` (one normalized sample per row) and `dest_labels` with
    /// the next mini-batch
    ///
    /// `dest` must be `batch_size × matrix_size` and `dest_labels` must
    /// hold `batch_size` slots; `labels` must carry one label per image.
    pub fn next_batch(
        &mut self,
        dest: &mut Matrix<f32>,
        dest_labels: &mut Vector<u8>,
        images: &Tensor<u8>,
        labels: &Vector<u8>,
    ) -> Result<(), CentellaError> {
        ops::check_shape(self.order.len(), images.batch())?;
        ops::check_shape(images.batch(), labels.len())?;
        ops::check_shape(self.batch_size, dest.rows())?;
        ops::check_shape(self.batch_size, dest_labels.len())?;

        if self.cursor + self.batch_size > self.order.len() {
            self.order.shuffle(&mut self.rng);
            self.cursor = 0;
        }

        for i in 0..self.batch_size {
            let sample = self.order[self.cursor + i];
            ops::copy_sample_scaled(dest, i, images, sample, PIXEL_SCALE)?;
            dest_labels.as_mut_slice()[i] = labels.as_slice()[sample];
        }
        self.cursor += self.batch_size;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_image_file(path: &Path, count: u32, rows: u32, cols: u32, payload: &[u8]) {
        let mut f = File::create(path).unwrap();
        f.write_all(&IMAGE_MAGIC.to_be_bytes()).unwrap();
        f.write_all(&count.to_be_bytes()).unwrap();
        f.write_all(&rows.to_be_bytes()).unwrap();
        f.write_all(&cols.to_be_bytes()).unwrap();
        f.write_all(payload).unwrap();
    }

    fn write_label_file(path: &Path, payload: &[u8]) {
        let mut f = File::create(path).unwrap();
        f.write_all(&LABEL_MAGIC.to_be_bytes()).unwrap();
        f.write_all(&(payload.len() as u32).to_be_bytes()).unwrap();
        f.write_all(payload).unwrap();
    }

    #[test]
    fn test_load_images_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images.idx3");
        let payload: Vec<u8> = (0..12).collect();
        write_image_file(&path, 3, 2, 2, &payload);

        let t = load_images(&path).unwrap();
        assert_eq!(t.batch(), 3);
        assert_eq!(t.rows(), 2);
        assert_eq!(t.row_size(), 2);
        assert_eq!(t.element(1), &[4, 5, 6, 7]);
    }

    #[test]
    fn test_load_rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.idx3");
        let mut f = File::create(&path).unwrap();
        f.write_all(&0xdead_beefu32.to_be_bytes()).unwrap();
        f.write_all(&[0u8; 12]).unwrap();
        drop(f);

        match load_images(&path) {
            Err(DatasetError::BadMagic { expected, actual }) => {
                assert_eq!(expected, IMAGE_MAGIC);
                assert_eq!(actual, 0xdead_beef);
            }
            other => panic!("expected BadMagic, got {other:?}"),
        }
    }

    #[test]
    fn test_load_rejects_truncated_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.idx3");
        write_image_file(&path, 2, 2, 2, &[1, 2, 3]); // 8 promised, 3 present

        match load_images(&path) {
            Err(DatasetError::Truncated { expected, actual }) => {
                assert_eq!(expected, 8);
                assert_eq!(actual, 3);
            }
            other => panic!("expected Truncated, got {other:?}"),
        }
    }

    #[test]
    fn test_load_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.idx1");
        write_label_file(&path, &[7, 2, 1, 0]);

        let labels = load_labels(&path).unwrap();
        assert_eq!(labels.as_slice(), &[7, 2, 1, 0]);
    }

    #[test]
    fn test_batcher_covers_each_sample_once_per_epoch() {
        let mut images = Tensor::new();
        images.assign(12, 1, 2, 0u8);
        for i in 0..12 {
            images.element_mut(i).copy_from_slice(&[i as u8, 0]);
        }
        let labels = Vector::from_slice(&(0..12).map(|i| i as u8).collect::<Vec<_>>());

        let mut batcher = Batcher::new(12, 4, 42);
        assert_eq!(batcher.batches_per_epoch(), 3);

        let mut dest = Matrix::new();
        dest.assign(4, 2, 0.0f32);
        let mut dest_labels = Vector::new();
        dest_labels.assign(4, 0u8);

        let mut seen = Vec::new();
        for _ in 0..3 {
            batcher
                .next_batch(&mut dest, &mut dest_labels, &images, &labels)
                .unwrap();
            seen.extend_from_slice(dest_labels.as_slice());
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..12).collect::<Vec<u8>>());
    }

    #[test]
    fn test_batcher_normalizes_pixels() {
        let mut images = Tensor::new();
        images.assign(1, 1, 2, 0u8);
        images.element_mut(0).copy_from_slice(&[255, 51]);
        let labels = Vector::from_slice(&[3u8]);

        let mut batcher = Batcher::new(1, 1, 7);
        let mut dest = Matrix::new();
        dest.assign(1, 2, 0.0f32);
        let mut dest_labels = Vector::new();
        dest_labels.assign(1, 0u8);

        batcher
            .next_batch(&mut dest, &mut dest_labels, &images, &labels)
            .unwrap();
        assert!((dest.row(0)[0] - 1.0).abs() < 1e-6);
        assert!((dest.row(0)[1] - 0.2).abs() < 1e-6);
        assert_eq!(dest_labels.as_slice(), &[3]);
    }

    #[test]
    fn test_batcher_shape_contract() {
        let mut images = Tensor::new();
        images.assign(4, 1, 2, 0u8);
        let labels = Vector::from_slice(&[0u8; 4]);

        let mut batcher = Batcher::new(4, 2, 1);
        let mut dest = Matrix::new();
        dest.assign(3, 2, 0.0f32); // wrong batch rows
        let mut dest_labels = Vector::new();
        dest_labels.assign(2, 0u8);

        assert!(batcher
            .next_batch(&mut dest, &mut dest_labels, &images, &labels)
            .is_err());
    }
}
