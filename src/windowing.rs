use image::{GrayImage, ImageBuffer, Luma};
use rayon::prelude::*;

use crate::dataset::Dataset;
use crate::dictionary::tags;
use crate::volume::MprSlice;

/// Visible intensity range `[center - width/2, center + width/2]`.
///
/// Windowing must be applied to calibrated samples (Hounsfield units for CT),
/// never to an already windowed buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowSpec {
    pub center: f64,
    pub width: f64,
}

/// Named clinical window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowPreset {
    pub name: &'static str,
    pub window: WindowSpec,
}

const fn preset(name: &'static str, center: f64, width: f64) -> WindowPreset {
    WindowPreset {
        name,
        window: WindowSpec { center, width },
    }
}

pub static PRESETS: &[WindowPreset] = &[
    preset("brain", 40.0, 80.0),
    preset("soft tissue", 40.0, 400.0),
    preset("bone", 400.0, 1800.0),
    preset("lung", -600.0, 1500.0),
    preset("liver", 60.0, 160.0),
    preset("mediastinum", 50.0, 350.0),
    preset("spine", 50.0, 250.0),
];

impl Default for WindowSpec {
    fn default() -> Self {
        Self::SOFT_TISSUE
    }
}

impl WindowSpec {
    pub const SOFT_TISSUE: WindowSpec = WindowSpec {
        center: 40.0,
        width: 400.0,
    };

    pub fn new(center: f64, width: f64) -> Self {
        Self { center, width }
    }

    /// Looks up a preset by name, ignoring case and `-`/`_` separators.
    pub fn preset(name: &str) -> Option<Self> {
        let wanted = name.to_ascii_lowercase().replace(['-', '_'], " ");
        PRESETS
            .iter()
            .find(|p| p.name == wanted || p.name.replace(' ', "") == wanted)
            .map(|p| p.window)
    }

    /// The first Window Center / Window Width pair stored in `dataset`.
    pub fn from_dataset(dataset: &Dataset) -> Option<Self> {
        let center = dataset.f64(tags::WINDOW_CENTER)?;
        let width = dataset.f64(tags::WINDOW_WIDTH)?;
        Some(Self::new(center, width))
    }

    /// Window spanning `[min, max]`.
    pub fn from_range(min: f64, max: f64) -> Self {
        Self::new((min + max) / 2.0, max - min)
    }

    fn effective_width(&self) -> f64 {
        if self.width > 0.0 { self.width } else { 1.0 }
    }

    pub fn min_visible(&self) -> f64 {
        self.center - self.effective_width() / 2.0
    }

    pub fn max_visible(&self) -> f64 {
        self.center + self.effective_width() / 2.0
    }

    /// `clamp((sample - min_visible) / width, 0, 1)`.
    #[inline]
    pub fn normalize(&self, sample: f64) -> f64 {
        ((sample - self.min_visible()) / self.effective_width()).clamp(0.0, 1.0)
    }

    #[inline]
    pub fn quantize(&self, sample: f64) -> u8 {
        (self.normalize(sample) * 255.0).round() as u8
    }

    pub fn apply_normalized(&self, samples: &[f32]) -> Vec<f32> {
        samples
            .par_iter()
            .map(|&s| self.normalize(s as f64) as f32)
            .collect()
    }

    pub fn apply_u8(&self, samples: &[f32]) -> Vec<u8> {
        samples.par_iter().map(|&s| self.quantize(s as f64)).collect()
    }

    /// Windowed 8-bit image of an MPR slice.
    pub fn to_image(&self, slice: &MprSlice) -> Option<GrayImage> {
        let pixels = match slice.data().as_slice() {
            Some(samples) => self.apply_u8(samples),
            None => slice.data().iter().map(|&s| self.quantize(s as f64)).collect(),
        };
        ImageBuffer::<Luma<u8>, Vec<u8>>::from_raw(slice.width() as u32, slice.height() as u32, pixels)
    }
}
