// ============================================================
// Layer 5 — Frozen Upstream Networks
// ============================================================
// A trained network another strategy consumes for inference.
//
//   DAE  ──frozen──▶  perceptual beta-VAE
//   DAE + beta-VAE ──frozen──▶  SCAN
//
// Freezing marks every parameter as not requiring gradients and
// moves the module behind an Arc. Holders only get `&M`, and the
// optimizer step consumes modules by value, so a frozen network
// can never be handed to an optimizer. Gradients still flow
// through it into whatever produced its input.

use std::{ops::Deref, sync::Arc};

use burn::{module::Module, tensor::backend::Backend};

/// Shared read-only handle to a network with gradients switched off.
#[derive(Debug)]
pub struct Frozen<M> {
    inner: Arc<M>,
}

impl<M> Frozen<M> {
    pub fn freeze<B: Backend>(module: M) -> Self
    where
        M: Module<B>,
    {
        Self { inner: Arc::new(module.no_grad()) }
    }

    /// Number of live handles to the same network.
    pub fn holders(this: &Self) -> usize {
        Arc::strong_count(&this.inner)
    }
}

impl<M> Clone for Frozen<M> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<M> Deref for Frozen<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.inner
    }
}
