// ============================================================
// Layer 5 — Occlusion Generator
// ============================================================
// Corrupts DAE inputs by zeroing one random axis-aligned
// rectangle per sample, across all channels.
//
// For an image tensor [batch, nc, w, h] each sample draws
// left, right ∈ [0, w] and down, up ∈ [0, h], orders each pair,
// and zeroes pixels with left ≤ i < right and down ≤ j < up.
// A zero-area rectangle leaves the sample untouched.

use burn::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// One occluded rectangle, half-open on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occlusion {
    pub left:  usize,
    pub right: usize,
    pub down:  usize,
    pub up:    usize,
}

impl Occlusion {
    /// Draw a rectangle inside a `width × height` image.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, width: usize, height: usize) -> Self {
        let (a, b) = (rng.gen_range(0..=width), rng.gen_range(0..=width));
        let (c, d) = (rng.gen_range(0..=height), rng.gen_range(0..=height));
        Self {
            left:  a.min(b),
            right: a.max(b),
            down:  c.min(d),
            up:    c.max(d),
        }
    }

    pub fn contains(&self, i: usize, j: usize) -> bool {
        (self.left..self.right).contains(&i) && (self.down..self.up).contains(&j)
    }

    pub fn area(&self) -> usize {
        (self.right - self.left) * (self.up - self.down)
    }
}

/// Fresh independent rectangles, one per sample.
pub fn random_occlusions<R: Rng + ?Sized>(
    rng:    &mut R,
    batch:  usize,
    width:  usize,
    height: usize,
) -> Vec<Occlusion> {
    (0..batch).map(|_| Occlusion::random(rng, width, height)).collect()
}

/// Copy of `images` with each sample's rectangle zeroed.
pub fn apply_occlusions<B: Backend>(images: Tensor<B, 4>, masks: &[Occlusion]) -> Tensor<B, 4> {
    let [batch, nc, width, height] = images.dims();
    assert_eq!(masks.len(), batch, "one occlusion per sample");

    // 1.0 keeps a pixel, 0.0 blanks it
    let mut keep = Vec::with_capacity(batch * nc * width * height);
    for mask in masks {
        for _ in 0..nc {
            for i in 0..width {
                for j in 0..height {
                    keep.push(if mask.contains(i, j) { 0.0f32 } else { 1.0 });
                }
            }
        }
    }

    let keep = Tensor::<B, 4>::from_data(
        TensorData::new(keep, [batch, nc, width, height]),
        &images.device(),
    );
    images * keep
}

/// Generator for the masks of one training step.
///
/// Derived from the run seed and the step index alone, so a resumed
/// run draws the same rectangles an uninterrupted run would have.
pub fn step_rng(seed: u64, iteration: usize) -> StdRng {
    StdRng::seed_from_u64(seed ^ (iteration as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Draw masks for `images` and apply them.
pub fn random_occluding<B: Backend, R: Rng + ?Sized>(
    rng:    &mut R,
    images: Tensor<B, 4>,
) -> (Tensor<B, 4>, Vec<Occlusion>) {
    let [batch, _, width, height] = images.dims();
    let masks = random_occlusions(rng, batch, width, height);
    (apply_occlusions(images, &masks), masks)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    #[test]
    fn test_rectangles_are_well_formed() {
        let mut rng = StdRng::seed_from_u64(3);
        for m in random_occlusions(&mut rng, 500, 7, 5) {
            assert!(m.left <= m.right && m.right <= 7);
            assert!(m.down <= m.up && m.up <= 5);
        }
    }

    #[test]
    fn test_masks_differ_between_calls() {
        let mut rng = StdRng::seed_from_u64(11);
        let a = random_occlusions(&mut rng, 16, 64, 64);
        let b = random_occlusions(&mut rng, 16, 64, 64);
        assert_ne!(a, b);
    }

    #[test]
    fn test_step_rng_repeats_per_iteration() {
        let a = random_occlusions(&mut step_rng(7, 42), 8, 16, 16);
        let b = random_occlusions(&mut step_rng(7, 42), 8, 16, 16);
        let c = random_occlusions(&mut step_rng(7, 43), 8, 16, 16);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_only_pixels_inside_rectangle_change() {
        let device = Default::default();
        let images = Tensor::<TB, 4>::ones([2, 3, 4, 4], &device);
        let masks = vec![
            Occlusion { left: 1, right: 3, down: 0, up: 2 },
            Occlusion { left: 2, right: 2, down: 0, up: 4 },
        ];
        let out: Vec<f32> = apply_occlusions(images, &masks).into_data().to_vec().unwrap();

        let mut idx = 0;
        for (s, mask) in masks.iter().enumerate() {
            for _c in 0..3 {
                for i in 0..4 {
                    for j in 0..4 {
                        let expected = if mask.contains(i, j) { 0.0 } else { 1.0 };
                        assert_eq!(out[idx], expected, "sample {s} pixel ({i},{j})");
                        idx += 1;
                    }
                }
            }
        }
        // Zero-area mask: second sample untouched
        assert_eq!(masks[1].area(), 0);
        assert!(out[48..].iter().all(|v| *v == 1.0));
    }
}
