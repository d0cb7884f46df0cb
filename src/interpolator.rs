use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;

use crate::enums::Interpolation;

/// The two stored planes bracketing a fractional index and the weight of the upper one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Bracket {
    pub lower: usize,
    pub upper: usize,
    pub weight: f32,
}

pub(crate) struct Interpolator;

impl Interpolator {
    /// Clamps `position` into `[0, len - 1]`.
    #[inline]
    pub(crate) fn clamp_index(position: f64, len: usize) -> f64 {
        let max = len.saturating_sub(1) as f64;
        if position.is_nan() { 0.0 } else { position.clamp(0.0, max) }
    }

    pub(crate) fn bracket(position: f64, len: usize, interpolation: Interpolation) -> Bracket {
        let position = Self::clamp_index(position, len);
        match interpolation {
            Interpolation::Nearest => {
                let index = position.round() as usize;
                Bracket {
                    lower: index,
                    upper: index,
                    weight: 0.0,
                }
            }
            Interpolation::Linear => {
                let lower = position.floor() as usize;
                let upper = (lower + 1).min(len.saturating_sub(1));
                Bracket {
                    lower,
                    upper,
                    weight: (position - lower as f64) as f32,
                }
            }
        }
    }

    #[inline]
    pub(crate) fn lerp(a: f32, b: f32, t: f32) -> f32 {
        if t == 0.0 { a } else { a.mul_add(1.0 - t, b * t) }
    }

    pub(crate) fn get_isotropic_dimensions(
        spacing: (f64, f64, f64),
        original_dim: (usize, usize, usize),
    ) -> (usize, usize, usize) {
        let (x_spacing, y_spacing, z_spacing) = spacing;
        let min_spacing = x_spacing.min(y_spacing).min(z_spacing);
        if min_spacing <= 0.0 {
            return original_dim;
        }
        let inv_min_spacing = 1.0 / min_spacing;

        // original_dim is (x, y, z)
        let new_x = (original_dim.0 as f64 * x_spacing * inv_min_spacing).round() as usize;
        let new_y = (original_dim.1 as f64 * y_spacing * inv_min_spacing).round() as usize;
        let new_z = (original_dim.2 as f64 * z_spacing * inv_min_spacing).round() as usize;

        (new_x.max(1), new_y.max(1), new_z.max(1))
    }

    #[inline]
    pub(crate) fn bilinear_interpolate(slice: &ArrayView2<f32>, y: f32, x: f32) -> f32 {
        let (height, width) = slice.dim();

        let y0 = y.floor() as usize;
        let x0 = x.floor() as usize;
        let y1 = (y0 + 1).min(height - 1);
        let x1 = (x0 + 1).min(width - 1);

        let dy = y - y0 as f32;
        let dx = x - x0 as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let v00 = slice[[y0, x0]];
        let v01 = slice[[y0, x1]];
        let v10 = slice[[y1, x0]];
        let v11 = slice[[y1, x1]];

        let v0 = v00.mul_add(one_minus_dx, v01 * dx);
        let v1 = v10.mul_add(one_minus_dx, v11 * dx);

        v0.mul_add(one_minus_dy, v1 * dy)
    }

    /// Resamples `slice` to `width` x `height` with pixel-center alignment.
    pub(crate) fn resample(slice: &ArrayView2<f32>, width: usize, height: usize) -> Array2<f32> {
        let (slice_height, slice_width) = slice.dim();
        let mut out = Array2::<f32>::zeros((height, width));
        if slice_height == 0 || slice_width == 0 {
            return out;
        }

        out.axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(y, mut row)| {
                let norm_y = (y as f32 + 0.5) / height as f32;
                let src_y = (norm_y * slice_height as f32 - 0.5).clamp(0.0, (slice_height - 1) as f32);
                for (x, value) in row.iter_mut().enumerate() {
                    let norm_x = (x as f32 + 0.5) / width as f32;
                    let src_x = (norm_x * slice_width as f32 - 0.5).clamp(0.0, (slice_width - 1) as f32);
                    *value = Self::bilinear_interpolate(slice, src_y, src_x);
                }
            });
        out
    }
}
