use crate::enums::{Interpolation, Orientation, PositionConfidence};
use crate::geometry::VolumeGeometry;
use crate::interpolator::{Bracket, Interpolator};
use crate::windowing::WindowSpec;

use image::GrayImage;
use nalgebra::{Point3, Vector3};
use ndarray::Array2;
use ndarray::Array3;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray::s;
use rayon::prelude::*;

/// Dense signed 16-bit intensity grid of one series, indexed `[z, y, x]`.
///
/// Built once by [`crate::volume_loader::VolumeLoader`] and read-only after
/// that, so it can be shared across threads without locking.
#[derive(Clone, Debug)]
pub struct Volume {
    data: Array3<i16>,
    geometry: VolumeGeometry,
    default_window: Option<WindowSpec>,
    confidence: PositionConfidence,
}

/// A 2D grid of calibrated samples cut from a [`Volume`].
#[derive(Clone, Debug, PartialEq)]
pub struct MprSlice {
    orientation: Orientation,
    position: f64,
    data: Array2<f32>,
}

impl MprSlice {
    pub fn new(orientation: Orientation, position: f64, data: Array2<f32>) -> Self {
        Self {
            orientation,
            position,
            data,
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Index along the plane's fixed axis after clamping.
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// Samples indexed `[row, column]`.
    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn get(&self, column: usize, row: usize) -> Option<f32> {
        self.data.get([row, column]).copied()
    }
}

impl Volume {
    pub fn new(data: Array3<i16>, geometry: VolumeGeometry) -> Self {
        Self {
            data,
            geometry,
            default_window: None,
            confidence: PositionConfidence::Measured,
        }
    }

    pub(crate) fn with_default_window(mut self, window: Option<WindowSpec>) -> Self {
        self.default_window = window;
        self
    }

    pub(crate) fn with_confidence(mut self, confidence: PositionConfidence) -> Self {
        self.confidence = confidence;
        self
    }

    /// Get the dimensions of the volume (columns, rows, slices)
    pub fn dim(&self) -> (usize, usize, usize) {
        let (depth, height, width) = self.data.dim();
        (width, height, depth)
    }

    /// Get a reference to the underlying data, indexed `[z, y, x]`
    pub fn data(&self) -> &Array3<i16> {
        &self.data
    }

    pub fn voxel(&self, x: usize, y: usize, z: usize) -> Option<i16> {
        self.data.get([z, y, x]).copied()
    }

    pub fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    /// Voxel size (x, y, z) in millimeters.
    pub fn spacing(&self) -> (f64, f64, f64) {
        let s = self.geometry.spacing();
        (s.x, s.y, s.z)
    }

    pub fn origin(&self) -> Point3<f64> {
        self.geometry.origin()
    }

    /// Window stored in the first slice, if any.
    pub fn default_window(&self) -> Option<WindowSpec> {
        self.default_window
    }

    /// [`PositionConfidence::InputIndex`] when any slice lacked a position.
    pub fn position_confidence(&self) -> PositionConfidence {
        self.confidence
    }

    pub fn voxel_to_physical(&self, voxel: Vector3<f64>) -> Point3<f64> {
        self.geometry.voxel_to_physical(voxel)
    }

    pub fn physical_to_voxel(&self, point: Point3<f64>) -> Vector3<f64> {
        self.geometry.physical_to_voxel(point)
    }

    /// Number of planes along the axis `orientation` holds fixed.
    pub fn axis_len(&self, orientation: Orientation) -> usize {
        let (x, y, z) = self.dim();
        match orientation {
            Orientation::Axial => z,
            Orientation::Coronal => y,
            Orientation::Sagittal => x,
        }
    }

    /// Output dimensions (width, height) of a slice in `orientation`.
    pub fn get_output_dimensions(&self, orientation: Orientation) -> (usize, usize) {
        let (x, y, z) = self.dim();
        match orientation {
            // Looking down Z-axis: X is width, Y is height
            Orientation::Axial => (x, y),
            // Looking down Y-axis: X is width, Z is height
            Orientation::Coronal => (x, z),
            // Looking down X-axis: Y is width, Z is height
            Orientation::Sagittal => (y, z),
        }
    }

    /// Output dimensions (width, height) with every axis resampled to the
    /// finest spacing, preserving physical aspect ratio.
    pub fn display_dimensions(&self, orientation: Orientation) -> (usize, usize) {
        let (x, y, z) = Interpolator::get_isotropic_dimensions(self.spacing(), self.dim());
        match orientation {
            Orientation::Axial => (x, y),
            Orientation::Coronal => (x, z),
            Orientation::Sagittal => (y, z),
        }
    }

    /// Fractional index of `point` along the axis `orientation` holds fixed.
    pub fn index_for_physical(&self, orientation: Orientation, point: Point3<f64>) -> f64 {
        self.physical_to_voxel(point)[orientation.fixed_axis()]
    }

    /// Cuts the plane `orientation` at index `position` along its fixed axis.
    ///
    /// Axial positions round to the nearest stored slice and are copied
    /// directly. Sagittal and coronal positions may be fractional and are
    /// sampled with `interpolation`. Positions outside the volume clamp to the
    /// nearest valid plane. A volume with no voxels yields an empty plane.
    pub fn slice(
        &self,
        orientation: Orientation,
        position: f64,
        interpolation: Interpolation,
    ) -> MprSlice {
        if self.data.is_empty() {
            let (width, height) = self.get_output_dimensions(orientation);
            return MprSlice::new(orientation, 0.0, Array2::zeros((height, width)));
        }
        let len = self.axis_len(orientation);
        let clamped = Interpolator::clamp_index(position, len);
        let data = match orientation {
            Orientation::Axial => {
                let z = clamped.round() as usize;
                self.data.slice(s![z, .., ..]).mapv(f32::from)
            }
            Orientation::Coronal | Orientation::Sagittal => {
                let bracket = Interpolator::bracket(clamped, len, interpolation);
                self.gather(orientation, bracket)
            }
        };
        let position = match (orientation, interpolation) {
            (Orientation::Axial, _) | (_, Interpolation::Nearest) => clamped.round(),
            _ => clamped,
        };
        MprSlice::new(orientation, position, data)
    }

    /// Cuts the plane through physical `point`.
    pub fn slice_at_physical(
        &self,
        orientation: Orientation,
        point: Point3<f64>,
        interpolation: Interpolation,
    ) -> MprSlice {
        self.slice(
            orientation,
            self.index_for_physical(orientation, point),
            interpolation,
        )
    }

    // One output row per stored slab: each scan line reads a single z slab.
    fn gather(&self, orientation: Orientation, bracket: Bracket) -> Array2<f32> {
        let (width, height) = self.get_output_dimensions(orientation);
        let mut out = Array2::<f32>::zeros((height, width));
        out.axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(self.data.axis_iter(Axis(0)).into_par_iter())
            .for_each(|(mut row, slab)| {
                let (lower, upper) = match orientation {
                    Orientation::Sagittal => (
                        slab.column(bracket.lower),
                        slab.column(bracket.upper),
                    ),
                    _ => (slab.row(bracket.lower), slab.row(bracket.upper)),
                };
                for ((value, &a), &b) in row.iter_mut().zip(lower.iter()).zip(upper.iter()) {
                    *value = Interpolator::lerp(f32::from(a), f32::from(b), bracket.weight);
                }
            });
        out
    }

    /// Windowed 8-bit image of a slice. With `aspect_correct`, non-axial
    /// slices are resampled to [`Volume::display_dimensions`].
    pub fn render(
        &self,
        orientation: Orientation,
        position: f64,
        interpolation: Interpolation,
        window: WindowSpec,
        aspect_correct: bool,
    ) -> Option<GrayImage> {
        let slice = self.slice(orientation, position, interpolation);
        if !aspect_correct || matches!(orientation, Orientation::Axial) {
            return window.to_image(&slice);
        }
        let (width, height) = self.display_dimensions(orientation);
        let resampled = Interpolator::resample(&slice.data().view(), width, height);
        window.to_image(&MprSlice::new(orientation, slice.position(), resampled))
    }

    /// Borrowed view of stored slice `z`.
    pub fn axial_view(&self, z: usize) -> Option<ArrayView2<'_, i16>> {
        (z < self.data.len_of(Axis(0))).then(|| self.data.index_axis(Axis(0), z))
    }
}
