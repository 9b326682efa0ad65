use std::sync::Arc;

use burn::data::dataset::Dataset;

/// One image, flattened channel-major: `nc * size * size` values in [0, 1].
#[derive(Debug, Clone)]
pub struct ImageItem {
    pub pixels: Vec<f32>,
}

/// One image with its attribute vector (SCAN training).
#[derive(Debug, Clone)]
pub struct AttributeItem {
    pub pixels:     Vec<f32>,
    /// 1.0 where the attribute is present, 0.0 otherwise
    pub attributes: Vec<f32>,
}

/// In-memory image set with a fixed geometry.
pub struct ImageDataset {
    images:     Vec<Vec<f32>>,
    nc:         usize,
    image_size: usize,
}

impl ImageDataset {
    pub fn new(images: Vec<Vec<f32>>, nc: usize, image_size: usize) -> Self {
        Self { images, nc, image_size }
    }

    pub fn nc(&self) -> usize { self.nc }

    pub fn image_size(&self) -> usize { self.image_size }
}

impl Dataset<ImageItem> for ImageDataset {
    fn get(&self, index: usize) -> Option<ImageItem> {
        self.images.get(index).map(|p| ImageItem { pixels: p.clone() })
    }

    fn len(&self) -> usize {
        self.images.len()
    }
}

/// Images paired row by row with attribute vectors.
pub struct AttributeDataset {
    images:     ImageDataset,
    attributes: Vec<Vec<f32>>,
    keys:       Arc<Vec<String>>,
}

impl AttributeDataset {
    /// Rows beyond the shorter of the two sources are dropped.
    pub fn new(images: ImageDataset, attributes: Vec<Vec<f32>>, keys: Vec<String>) -> Self {
        Self { images, attributes, keys: Arc::new(keys) }
    }

    pub fn keys(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.keys)
    }

    pub fn n_keys(&self) -> usize {
        self.keys.len()
    }

    pub fn images(&self) -> &ImageDataset {
        &self.images
    }
}

impl Dataset<AttributeItem> for AttributeDataset {
    fn get(&self, index: usize) -> Option<AttributeItem> {
        let image = self.images.get(index)?;
        let attributes = self.attributes.get(index)?.clone();
        Some(AttributeItem { pixels: image.pixels, attributes })
    }

    fn len(&self) -> usize {
        self.images.len().min(self.attributes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_dataset_pairs_rows() {
        let images = ImageDataset::new(vec![vec![0.0; 4], vec![1.0; 4], vec![0.5; 4]], 1, 2);
        let attrs = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let ds = AttributeDataset::new(images, attrs, vec!["a".into(), "b".into()]);
        assert_eq!(ds.len(), 2);
        let item = ds.get(1).unwrap();
        assert_eq!(item.pixels, vec![1.0; 4]);
        assert_eq!(item.attributes, vec![0.0, 1.0]);
        assert!(ds.get(2).is_none());
    }
}
