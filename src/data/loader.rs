// ============================================================
// Layer 4 — Dataset Loader
// ============================================================
// Minimal on-disk reader for preprocessed datasets:
//
//   <dset_dir>/<dataset>/
//     images.bin       ← raw u8 pixels, [N, nc, size, size], row-major
//     attributes.csv   ← SCAN only: header of attribute keys, then one
//                        row of numbers per image (> 0 means present)
//
// Anything richer (decoding, resizing, augmentation) happens before
// the files are written.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::dataset::{AttributeDataset, ImageDataset};
use crate::domain::{config::DatasetKind, error::SolverError};

pub struct DatasetLoader {
    root:       PathBuf,
    nc:         usize,
    image_size: usize,
}

impl DatasetLoader {
    pub fn new(dset_dir: impl AsRef<Path>, kind: DatasetKind, image_size: usize) -> Self {
        Self {
            root: dset_dir.as_ref().join(kind.dir_name()),
            nc: kind.channels(),
            image_size,
        }
    }

    pub fn images(&self) -> Result<ImageDataset, SolverError> {
        let path = self.root.join("images.bin");
        let bytes = fs::read(&path).map_err(|e| SolverError::data(&path, e))?;
        let images = decode_images(&bytes, self.nc * self.image_size * self.image_size)
            .map_err(|reason| SolverError::data(&path, reason))?;
        tracing::info!("Loaded {} images from '{}'", images.len(), path.display());
        Ok(ImageDataset::new(images, self.nc, self.image_size))
    }

    pub fn with_attributes(&self) -> Result<AttributeDataset, SolverError> {
        let images = self.images()?;
        let path = self.root.join("attributes.csv");
        let text = fs::read_to_string(&path).map_err(|e| SolverError::data(&path, e))?;
        let (keys, rows) = parse_attributes(&text).map_err(|reason| SolverError::data(&path, reason))?;
        tracing::info!("Loaded {} attribute rows ({} keys)", rows.len(), keys.len());
        Ok(AttributeDataset::new(images, rows, keys))
    }
}

/// Split raw bytes into images of `per_image` pixels scaled to [0, 1].
fn decode_images(bytes: &[u8], per_image: usize) -> Result<Vec<Vec<f32>>, String> {
    if per_image == 0 {
        return Err("image size must be > 0".into());
    }
    if bytes.len() % per_image != 0 {
        return Err(format!(
            "{} bytes is not a whole number of {}-pixel images",
            bytes.len(),
            per_image
        ));
    }
    Ok(bytes
        .chunks_exact(per_image)
        .map(|img| img.iter().map(|&b| b as f32 / 255.0).collect())
        .collect())
}

fn parse_attributes(text: &str) -> Result<(Vec<String>, Vec<Vec<f32>>), String> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header = lines.next().ok_or("missing header row")?;
    let keys: Vec<String> = header.split(',').map(|k| k.trim().to_string()).collect();

    let mut rows = Vec::new();
    for (n, line) in lines.enumerate() {
        let row = line
            .split(',')
            .map(|v| {
                v.trim()
                    .parse::<f32>()
                    .map(|x| if x > 0.0 { 1.0 } else { 0.0 })
                    .map_err(|e| format!("row {}: {e}", n + 1))
            })
            .collect::<Result<Vec<f32>, String>>()?;
        if row.len() != keys.len() {
            return Err(format!("row {} has {} values, expected {}", n + 1, row.len(), keys.len()));
        }
        rows.push(row);
    }
    Ok((keys, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::data::dataset::Dataset;

    #[test]
    fn test_decode_images_scales_bytes() {
        let imgs = decode_images(&[0, 255, 51, 102], 2).unwrap();
        assert_eq!(imgs, vec![vec![0.0, 1.0], vec![0.2, 0.4]]);
        assert!(decode_images(&[1, 2, 3], 2).is_err());
    }

    #[test]
    fn test_parse_attributes_binarises() {
        let (keys, rows) = parse_attributes("Smiling,Male\n1,-1\n-1,1\n").unwrap();
        assert_eq!(keys, vec!["Smiling", "Male"]);
        assert_eq!(rows, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert!(parse_attributes("a,b\n1\n").is_err());
    }

    #[test]
    fn test_loader_reads_directory_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("celeba");
        fs::create_dir_all(&dir).unwrap();
        // two 3x2x2 images
        fs::write(dir.join("images.bin"), vec![255u8; 24]).unwrap();
        fs::write(dir.join("attributes.csv"), "Smiling,Young\n1,1\n-1,1\n").unwrap();

        let loader = DatasetLoader::new(tmp.path(), DatasetKind::CelebA, 2);
        let ds = loader.with_attributes().unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.n_keys(), 2);
        assert_eq!(ds.images().nc(), 3);
    }

    #[test]
    fn test_missing_files_are_data_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = DatasetLoader::new(tmp.path(), DatasetKind::Dsprites, 4);
        assert!(matches!(loader.images(), Err(SolverError::DataLoad { .. })));
    }
}
