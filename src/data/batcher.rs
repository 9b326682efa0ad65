// ============================================================
// Layer 4 — Batchers
// ============================================================
// Implements Burn's Batcher trait to stack samples into tensors.
//
//   Vec<ImageItem>      → ImageBatch { images: [N, nc, s, s] }
//   Vec<AttributeItem>  → ScanBatch  { images: [N, nc, s, s],
//                                      symbols: [N, n_keys],
//                                      keys }
//
// Every item already has the same geometry, so batching is a
// flatten followed by one reshape.
//
// Reference: Burn Book §4 (Batcher)

use std::sync::Arc;

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::dataset::{AttributeItem, ImageItem};

// ─── Batch types ──────────────────────────────────────────────────────────────
/// Images for the DAE and beta-VAE strategies.
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// shape: [batch, nc, size, size]
    pub images: Tensor<B, 4>,
}

/// Images with their attribute vectors for SCAN.
#[derive(Debug, Clone)]
pub struct ScanBatch<B: Backend> {
    pub images:  Tensor<B, 4>,
    /// shape: [batch, n_keys], entries 0 or 1
    pub symbols: Tensor<B, 2>,
    /// Attribute names, in column order of `symbols`
    pub keys:    Arc<Vec<String>>,
}

fn stack_images<B: Backend>(
    pixels:     Vec<f32>,
    batch:      usize,
    nc:         usize,
    image_size: usize,
    device:     &B::Device,
) -> Tensor<B, 4> {
    Tensor::from_data(TensorData::new(pixels, [batch, nc, image_size, image_size]), device)
}

// ─── ImageBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct ImageBatcher {
    pub nc:         usize,
    pub image_size: usize,
}

impl ImageBatcher {
    pub fn new(nc: usize, image_size: usize) -> Self {
        Self { nc, image_size }
    }
}

impl<B: Backend> Batcher<B, ImageItem, ImageBatch<B>> for ImageBatcher {
    fn batch(&self, items: Vec<ImageItem>, device: &B::Device) -> ImageBatch<B> {
        let batch = items.len();
        let pixels: Vec<f32> = items.into_iter().flat_map(|i| i.pixels).collect();
        ImageBatch {
            images: stack_images::<B>(pixels, batch, self.nc, self.image_size, device),
        }
    }
}

// ─── ScanBatcher ──────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct ScanBatcher {
    pub nc:         usize,
    pub image_size: usize,
    pub keys:       Arc<Vec<String>>,
}

impl ScanBatcher {
    pub fn new(nc: usize, image_size: usize, keys: Arc<Vec<String>>) -> Self {
        Self { nc, image_size, keys }
    }
}

impl<B: Backend> Batcher<B, AttributeItem, ScanBatch<B>> for ScanBatcher {
    fn batch(&self, items: Vec<AttributeItem>, device: &B::Device) -> ScanBatch<B> {
        let batch = items.len();
        let n_keys = self.keys.len();

        let mut pixels = Vec::with_capacity(batch * self.nc * self.image_size * self.image_size);
        let mut symbols = Vec::with_capacity(batch * n_keys);
        for item in items {
            pixels.extend(item.pixels);
            symbols.extend(item.attributes);
        }

        ScanBatch {
            images:  stack_images::<B>(pixels, batch, self.nc, self.image_size, device),
            symbols: Tensor::from_data(TensorData::new(symbols, [batch, n_keys]), device),
            keys:    Arc::clone(&self.keys),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    #[test]
    fn test_image_batch_shape() {
        let device = Default::default();
        let items = vec![
            ImageItem { pixels: vec![0.0; 12] },
            ImageItem { pixels: vec![1.0; 12] },
        ];
        let batch: ImageBatch<TB> = ImageBatcher::new(3, 2).batch(items, &device);
        assert_eq!(batch.images.dims(), [2, 3, 2, 2]);
        let data: Vec<f32> = batch.images.into_data().to_vec().unwrap();
        assert_eq!(data[11], 0.0);
        assert_eq!(data[12], 1.0);
    }

    #[test]
    fn test_scan_batch_carries_keys() {
        let device = Default::default();
        let keys = Arc::new(vec!["Smiling".to_string(), "Male".to_string()]);
        let items = vec![AttributeItem { pixels: vec![0.5; 4], attributes: vec![1.0, 0.0] }];
        let batch: ScanBatch<TB> = ScanBatcher::new(1, 2, keys).batch(items, &device);
        assert_eq!(batch.images.dims(), [1, 1, 2, 2]);
        assert_eq!(batch.symbols.into_data().to_vec::<f32>().unwrap(), vec![1.0, 0.0]);
        assert_eq!(batch.keys.as_slice(), ["Smiling", "Male"]);
    }
}
