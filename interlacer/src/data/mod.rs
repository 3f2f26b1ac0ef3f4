mod generator;
pub mod mnist;
pub mod mri;

use std::{path::Path, sync::Arc};

use log::info;
use ndarray::Array3;

pub use generator::{KspaceGenerator, Split};

use crate::{config::Dataset, error::DataLoadError};

/// The train and validation images of a dataset, each shaped `(N, n, n)`.
#[derive(Debug, Clone)]
pub struct Images {
    pub train: Arc<Array3<f32>>,
    pub val: Arc<Array3<f32>>,
}

impl Images {
    /// The side length of every image.
    pub fn side(&self) -> usize {
        self.train.dim().1
    }

    pub fn train_len(&self) -> usize {
        self.train.dim().0
    }
}

/// Loads the images of `dataset` from its files under `data_dir`.
pub fn load_images(dataset: Dataset, data_dir: &Path) -> Result<Images, DataLoadError> {
    let (train, val) = match dataset {
        Dataset::Mri => mri::load(data_dir)?,
        Dataset::Mnist => mnist::load(data_dir)?,
    };

    for (split, images) in [("train", &train), ("validation", &val)] {
        let (n, height, width) = images.dim();
        if height != width {
            return Err(DataLoadError::NotSquare { height, width });
        }

        if n == 0 || height == 0 {
            return Err(DataLoadError::Empty { split });
        }
    }

    if train.dim().1 != val.dim().1 {
        return Err(DataLoadError::SideMismatch {
            train: train.dim().1,
            val: val.dim().1,
        });
    }

    info!(
        "loaded {} train and {} validation images of {}x{}",
        train.dim().0,
        val.dim().0,
        train.dim().1,
        train.dim().2
    );

    Ok(Images {
        train: Arc::new(train),
        val: Arc::new(val),
    })
}
