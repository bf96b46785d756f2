//! Windowed real-input power spectrum on top of rustfft.

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::sync::Arc;

/// Analysis window applied before the transform.
///
/// Both taper to zero at the ends (periodic form), which keeps leakage from
/// a non-integer number of periods out of neighbouring bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    /// Hann window (raised cosine)
    Hann,
    /// Blackman window
    #[default]
    Blackman,
}

impl Window {
    /// Window value at index `i` of `n`.
    fn value(self, i: usize, n: usize) -> f32 {
        let x = 2.0 * PI * i as f32 / n as f32;
        match self {
            Window::Hann => 0.5 * (1.0 - x.cos()),
            Window::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
        }
    }

    /// Window coefficients for a frame of `size` samples.
    pub fn coefficients(self, size: usize) -> Vec<f32> {
        (0..size).map(|i| self.value(i, size)).collect()
    }
}

/// Planned forward FFT with preallocated buffers.
///
/// [`power`](Self::power) does not allocate.
pub struct PowerSpectrum {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl PowerSpectrum {
    /// Plan a transform of `size` points with the given window.
    pub fn new(size: usize, window: Window) -> Self {
        let fft = FftPlanner::new().plan_fft_forward(size);
        let scratch_len = fft.get_inplace_scratch_len();
        Self {
            fft,
            window: window.coefficients(size),
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
        }
    }

    /// Transform size.
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    /// Window `samples`, transform, and write `|X[k]|^2 / N` for the first
    /// `N / 2` bins into `out`.
    ///
    /// `samples` shorter than `N` are zero-padded; `out` must hold `N / 2`.
    pub fn power(&mut self, samples: &[f32], out: &mut [f32]) {
        let n = self.size();
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let x = samples.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(x * self.window[i], 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let scale = 1.0 / n as f32;
        for (o, c) in out.iter_mut().zip(&self.buffer[..n / 2]) {
            *o = c.norm_sqr() * scale;
        }
    }
}

impl std::fmt::Debug for PowerSpectrum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PowerSpectrum")
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}
