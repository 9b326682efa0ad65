// ============================================================
// Layer 4 — Batch Source
// ============================================================
// Feeds the training engine from a Burn data loader. The loader
// reshuffles the dataset at the start of every pass, so each
// call to `epoch` walks the samples in a new order.
//
// The shuffle RNG is seeded once per run. Epoch order is
// reproducible for a given seed, not across restarts.
//
// Reference: Burn Book §4 (DataLoader)

use std::{fmt::Debug, sync::Arc};

use burn::{
    data::{
        dataloader::{batcher::Batcher, DataLoader, DataLoaderBuilder},
        dataset::Dataset,
    },
    prelude::*,
};

use crate::domain::traits::BatchSource;

pub struct LoaderSource<B: Backend, O> {
    loader: Arc<dyn DataLoader<B, O>>,
}

impl<B: Backend, O> LoaderSource<B, O> {
    pub fn new(loader: Arc<dyn DataLoader<B, O>>) -> Self {
        Self { loader }
    }

    /// Build a shuffling loader over `dataset` with batches on `device`.
    pub fn shuffled<I, D, T>(dataset: D, batcher: T, batch_size: usize, seed: u64, device: B::Device) -> Self
    where
        I: Send + Sync + Clone + Debug + 'static,
        O: Send + Clone + Debug + 'static,
        D: Dataset<I> + 'static,
        T: Batcher<B, I, O> + 'static,
    {
        let loader = DataLoaderBuilder::new(batcher)
            .batch_size(batch_size.max(1))
            .shuffle(seed)
            .set_device(device)
            .build(dataset);
        Self::new(loader)
    }

    /// Number of samples in one pass.
    pub fn len(&self) -> usize {
        self.loader.num_items()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<B: Backend, O> BatchSource for LoaderSource<B, O> {
    type Batch = O;

    fn epoch(&mut self) -> Box<dyn Iterator<Item = O> + '_> {
        tracing::debug!("New epoch over {} samples", self.len());
        Box::new(self.loader.iter())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    use crate::data::{
        batcher::{ImageBatch, ImageBatcher},
        dataset::{ImageDataset, ImageItem},
    };

    type TB = NdArray;

    fn loader(n: usize, batch_size: usize) -> LoaderSource<TB, ImageBatch<TB>> {
        let images = (0..n).map(|i| vec![i as f32; 4]).collect();
        LoaderSource::shuffled::<ImageItem, _, _>(
            ImageDataset::new(images, 1, 2),
            ImageBatcher::new(1, 2),
            batch_size,
            5,
            Default::default(),
        )
    }

    fn first_pixels(src: &mut LoaderSource<TB, ImageBatch<TB>>) -> Vec<f32> {
        src.epoch()
            .flat_map(|b| {
                let v: Vec<f32> = b.images.into_data().to_vec().unwrap();
                v.chunks(4).map(|c| c[0]).collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn test_epoch_covers_every_sample_once() {
        let mut src = loader(7, 3);
        assert_eq!(src.len(), 7);
        let sizes: Vec<usize> = src.epoch().map(|b| b.images.dims()[0]).collect();
        assert_eq!(sizes, vec![3, 3, 1]);

        let mut seen = first_pixels(&mut src);
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(seen, (0..7).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_order() {
        let (mut a, mut b) = (loader(16, 4), loader(16, 4));
        assert_eq!(first_pixels(&mut a), first_pixels(&mut b));
    }

    #[test]
    fn test_empty_dataset_yields_nothing() {
        let mut src = loader(0, 4);
        assert!(src.is_empty());
        assert_eq!(src.epoch().count(), 0);
    }
}
