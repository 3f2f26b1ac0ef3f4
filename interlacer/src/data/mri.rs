use std::{fs, path::Path};

use ndarray::Array3;
use safetensors::{Dtype, SafeTensors};

use crate::error::DataLoadError;

pub const IMAGES: &str = "mri/images.safetensors";

/// Loads the `train` and `val` MRI slices from `data_dir`.
pub fn load(data_dir: &Path) -> Result<(Array3<f32>, Array3<f32>), DataLoadError> {
    let path = data_dir.join(IMAGES);
    let bytes = fs::read(&path).map_err(|e| DataLoadError::io(&path, e))?;
    let tensors = SafeTensors::deserialize(&bytes)
        .map_err(|e| DataLoadError::malformed(&path, format!("{e:?}")))?;

    let read = |name: &str| -> Result<Array3<f32>, DataLoadError> {
        let view = tensors
            .tensor(name)
            .map_err(|e| DataLoadError::malformed(&path, format!("tensor {name:?}: {e:?}")))?;

        if view.dtype() != Dtype::F32 {
            return Err(DataLoadError::malformed(
                &path,
                format!("tensor {name:?} is {:?}, expected F32", view.dtype()),
            ));
        }

        let &[n, h, w] = view.shape() else {
            return Err(DataLoadError::malformed(
                &path,
                format!("tensor {name:?} has shape {:?}, expected [N, n, n]", view.shape()),
            ));
        };

        let data: Vec<f32> = bytemuck::pod_collect_to_vec(view.data());
        Array3::from_shape_vec((n, h, w), data)
            .map_err(|e| DataLoadError::malformed(&path, e.to_string()))
    };

    Ok((read("train")?, read("val")?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use safetensors::tensor::TensorView;

    fn write(dir: &Path, tensors: &[(&str, Vec<usize>, Vec<f32>)]) {
        let views: Vec<_> = tensors
            .iter()
            .map(|(name, shape, data)| {
                let view =
                    TensorView::new(Dtype::F32, shape.clone(), bytemuck::cast_slice(data)).unwrap();
                (name.to_string(), view)
            })
            .collect();

        fs::create_dir_all(dir.join("mri")).unwrap();
        let bytes = safetensors::serialize(views, &None).unwrap();
        fs::write(dir.join(IMAGES), bytes).unwrap();
    }

    #[test]
    fn reads_both_splits() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            &[
                ("train", vec![2, 2, 2], (0..8).map(|i| i as f32).collect()),
                ("val", vec![1, 2, 2], vec![0.5; 4]),
            ],
        );

        let (train, val) = load(dir.path()).unwrap();

        assert_eq!(train.dim(), (2, 2, 2));
        assert_eq!(train[[1, 1, 0]], 6.);
        assert_eq!(val.dim(), (1, 2, 2));
    }

    #[test]
    fn missing_split_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), &[("train", vec![1, 2, 2], vec![0.; 4])]);

        assert!(matches!(load(dir.path()), Err(DataLoadError::Malformed { .. })));
    }

    #[test]
    fn wrong_rank_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            &[
                ("train", vec![4, 2], vec![0.; 8]),
                ("val", vec![1, 2, 2], vec![0.; 4]),
            ],
        );

        assert!(matches!(load(dir.path()), Err(DataLoadError::Malformed { .. })));
    }
}
