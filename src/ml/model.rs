use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::{
        activation::{relu, sigmoid},
        Distribution,
    },
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.

// ─── Shared building blocks ──────────────────────────────────────────────────

/// Stack of Linear + ReLU layers.
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    pub layers: Vec<Linear<B>>,
}

impl<B: Backend> Mlp<B> {
    /// `widths = [in, h1, h2, ...]`
    pub fn new(widths: &[usize], device: &B::Device) -> Self {
        let layers = widths
            .windows(2)
            .map(|w| LinearConfig::new(w[0], w[1]).init(device))
            .collect();
        Self { layers }
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.layers.iter().fold(x, |x, layer| relu(layer.forward(x)))
    }
}

/// Forward-pass result of every latent-variable network.
pub struct PosteriorOutput<B: Backend, const D: usize> {
    pub recon:  Tensor<B, D>,
    pub mu:     Tensor<B, 2>,
    pub logvar: Tensor<B, 2>,
}

/// Split a `[batch, 2·z]` distribution into (mu, logvar).
pub fn split_posterior<B: Backend>(
    distribution: Tensor<B, 2>,
    z_dim:        usize,
) -> (Tensor<B, 2>, Tensor<B, 2>) {
    let [batch, _] = distribution.dims();
    let mu = distribution.clone().slice([0..batch, 0..z_dim]);
    let logvar = distribution.slice([0..batch, z_dim..2 * z_dim]);
    (mu, logvar)
}

/// z = mu + eps · exp(logvar / 2), eps ~ N(0, I)
pub fn reparameterize<B: Backend>(mu: Tensor<B, 2>, logvar: Tensor<B, 2>) -> Tensor<B, 2> {
    let std = logvar.mul_scalar(0.5).exp();
    let eps = Tensor::random(std.shape(), Distribution::Normal(0.0, 1.0), &std.device());
    mu + eps * std
}

fn flatten_images<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 2> {
    let [batch, nc, h, w] = x.dims();
    x.reshape([batch, nc * h * w])
}

// ─── Denoising autoencoder ───────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct DaeNetConfig {
    pub nc:         usize,
    pub image_size: usize,
    pub z_dim:      usize,
    #[config(default = 256)]
    pub hidden:     usize,
}

impl DaeNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> DaeNet<B> {
        let pixels = self.nc * self.image_size * self.image_size;
        DaeNet {
            encoder:    Mlp::new(&[pixels, self.hidden], device),
            to_code:    LinearConfig::new(self.hidden, self.z_dim).init(device),
            decoder:    Mlp::new(&[self.z_dim, self.hidden], device),
            to_image:   LinearConfig::new(self.hidden, pixels).init(device),
            nc:         self.nc,
            image_size: self.image_size,
        }
    }
}

/// Image → bounded feature code → image.
#[derive(Module, Debug)]
pub struct DaeNet<B: Backend> {
    pub encoder:    Mlp<B>,
    pub to_code:    Linear<B>,
    pub decoder:    Mlp<B>,
    pub to_image:   Linear<B>,
    pub nc:         usize,
    pub image_size: usize,
}

impl<B: Backend> DaeNet<B> {
    /// images: [batch, nc, s, s] → features: [batch, z_dim], each in (0, 1)
    pub fn encode(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        sigmoid(self.to_code.forward(self.encoder.forward(flatten_images(images))))
    }

    /// features: [batch, z_dim] → images: [batch, nc, s, s]
    pub fn decode(&self, code: Tensor<B, 2>) -> Tensor<B, 4> {
        let [batch, _] = code.dims();
        sigmoid(self.to_image.forward(self.decoder.forward(code)))
            .reshape([batch, self.nc, self.image_size, self.image_size])
    }

    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        self.decode(self.encode(images))
    }
}

// ─── Beta-VAE ─────────────────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct BetaVaeNetConfig {
    pub nc:            usize,
    pub image_size:    usize,
    pub z_dim:         usize,
    /// 1 for architecture H, 2 for architecture B
    #[config(default = 1)]
    pub hidden_layers: usize,
    #[config(default = 256)]
    pub hidden:        usize,
}

impl BetaVaeNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> BetaVaeNet<B> {
        let pixels = self.nc * self.image_size * self.image_size;
        let depth = self.hidden_layers.max(1);

        let mut enc_widths = vec![pixels];
        enc_widths.extend(std::iter::repeat(self.hidden).take(depth));
        let mut dec_widths = vec![self.z_dim];
        dec_widths.extend(std::iter::repeat(self.hidden).take(depth));

        BetaVaeNet {
            encoder:         Mlp::new(&enc_widths, device),
            to_distribution: LinearConfig::new(self.hidden, 2 * self.z_dim).init(device),
            decoder:         Mlp::new(&dec_widths, device),
            to_image:        LinearConfig::new(self.hidden, pixels).init(device),
            z_dim:           self.z_dim,
            nc:              self.nc,
            image_size:      self.image_size,
        }
    }
}

#[derive(Module, Debug)]
pub struct BetaVaeNet<B: Backend> {
    pub encoder:         Mlp<B>,
    pub to_distribution: Linear<B>,
    pub decoder:         Mlp<B>,
    pub to_image:        Linear<B>,
    pub z_dim:           usize,
    pub nc:              usize,
    pub image_size:      usize,
}

impl<B: Backend> BetaVaeNet<B> {
    /// Raw posterior parameters `[mu | logvar]`: [batch, 2·z_dim]
    pub fn encode(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.to_distribution.forward(self.encoder.forward(flatten_images(images)))
    }

    pub fn posterior(&self, images: Tensor<B, 4>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        split_posterior(self.encode(images), self.z_dim)
    }

    pub fn decode(&self, z: Tensor<B, 2>) -> Tensor<B, 4> {
        let [batch, _] = z.dims();
        sigmoid(self.to_image.forward(self.decoder.forward(z)))
            .reshape([batch, self.nc, self.image_size, self.image_size])
    }

    pub fn forward(&self, images: Tensor<B, 4>) -> PosteriorOutput<B, 4> {
        let (mu, logvar) = self.posterior(images);
        let z = reparameterize(mu.clone(), logvar.clone());
        PosteriorOutput { recon: self.decode(z), mu, logvar }
    }
}

// ─── SCAN ─────────────────────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct ScanNetConfig {
    /// Number of attributes in a symbol vector
    pub n_symbols: usize,
    pub z_dim:     usize,
    #[config(default = 128)]
    pub hidden:    usize,
}

impl ScanNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ScanNet<B> {
        ScanNet {
            encoder:         Mlp::new(&[self.n_symbols, self.hidden], device),
            to_distribution: LinearConfig::new(self.hidden, 2 * self.z_dim).init(device),
            decoder:         Mlp::new(&[self.z_dim, self.hidden], device),
            to_symbols:      LinearConfig::new(self.hidden, self.n_symbols).init(device),
            z_dim:           self.z_dim,
        }
    }
}

/// Symbol vector → latent posterior → symbol probabilities.
#[derive(Module, Debug)]
pub struct ScanNet<B: Backend> {
    pub encoder:         Mlp<B>,
    pub to_distribution: Linear<B>,
    pub decoder:         Mlp<B>,
    pub to_symbols:      Linear<B>,
    pub z_dim:           usize,
}

impl<B: Backend> ScanNet<B> {
    pub fn encode(&self, symbols: Tensor<B, 2>) -> Tensor<B, 2> {
        self.to_distribution.forward(self.encoder.forward(symbols))
    }

    pub fn posterior(&self, symbols: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        split_posterior(self.encode(symbols), self.z_dim)
    }

    /// z: [batch, z_dim] → symbol probabilities: [batch, n_symbols]
    pub fn decode(&self, z: Tensor<B, 2>) -> Tensor<B, 2> {
        sigmoid(self.to_symbols.forward(self.decoder.forward(z)))
    }

    pub fn forward(&self, symbols: Tensor<B, 2>) -> PosteriorOutput<B, 2> {
        let (mu, logvar) = self.posterior(symbols);
        let z = reparameterize(mu.clone(), logvar.clone());
        PosteriorOutput { recon: self.decode(z), mu, logvar }
    }
}
