use std::{fs, path::Path};

use ndarray::Array3;

use crate::error::DataLoadError;

const IMAGES_MAGIC: u32 = 0x0000_0803;
const HEADER_LEN: usize = 16;

pub const TRAIN_IMAGES: &str = "mnist/train-images-idx3-ubyte";
pub const TEST_IMAGES: &str = "mnist/t10k-images-idx3-ubyte";

/// Loads the MNIST train and test digits from `data_dir`, scaled to `[0, 1]`.
pub fn load(data_dir: &Path) -> Result<(Array3<f32>, Array3<f32>), DataLoadError> {
    let train = read_idx_images(&data_dir.join(TRAIN_IMAGES))?;
    let val = read_idx_images(&data_dir.join(TEST_IMAGES))?;
    Ok((train, val))
}

/// Reads an IDX3 unsigned byte image file into a `(n, rows, cols)` array.
pub fn read_idx_images(path: &Path) -> Result<Array3<f32>, DataLoadError> {
    let bytes = fs::read(path).map_err(|e| DataLoadError::io(path, e))?;
    if bytes.len() < HEADER_LEN {
        return Err(DataLoadError::malformed(path, "truncated header"));
    }

    let word = |i: usize| u32::from_be_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);

    let magic = word(0);
    if magic != IMAGES_MAGIC {
        return Err(DataLoadError::malformed(
            path,
            format!("bad magic number {magic:#010x}"),
        ));
    }

    let [n, rows, cols] = [word(4), word(8), word(12)].map(|v| v as usize);
    let expected = n
        .checked_mul(rows)
        .and_then(|v| v.checked_mul(cols))
        .ok_or_else(|| DataLoadError::malformed(path, "header overflows"))?;

    let body = &bytes[HEADER_LEN..];
    if body.len() != expected {
        return Err(DataLoadError::malformed(
            path,
            format!(
                "header promises {n} images of {rows}x{cols} but the file holds {} pixels",
                body.len()
            ),
        ));
    }

    let pixels = body.iter().map(|&p| p as f32 / 255.).collect();
    Array3::from_shape_vec((n, rows, cols), pixels)
        .map_err(|e| DataLoadError::malformed(path, e.to_string()))
}

/// Encodes images as an IDX3 file, the inverse of `read_idx_images` for byte valued pixels.
#[cfg(test)]
pub(crate) fn encode_idx_images(n: usize, rows: usize, cols: usize, pixels: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + pixels.len());
    for word in [IMAGES_MAGIC, n as u32, rows as u32, cols as u32] {
        bytes.extend(word.to_be_bytes());
    }

    bytes.extend(pixels);
    bytes
}
