use std::sync::Arc;

use log::{debug, warn};

use crate::dataset::Dataset;
use crate::dictionary::tags;
use crate::enums::PositionConfidence;
use crate::error::ParseError;
use crate::parser::DatasetParser;
use crate::pixel::PixelBuffer;
use crate::windowing::WindowSpec;

/// One readable input of a series: a display name and the file contents.
#[derive(Clone, Debug)]
pub struct SliceSource {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SliceSource {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Pixel samples and spatial metadata of one ingested file.
///
/// Records only live until the volume builder folds them into a
/// [`crate::volume::Volume`].
#[derive(Clone, Debug)]
pub struct SliceRecord {
    pub name: String,
    /// Position of the source in the input list.
    pub index: usize,
    pub pixels: PixelBuffer,
    pub position: Option<[f64; 3]>,
    pub orientation: Option<[f64; 6]>,
    /// Pixel Spacing as stored: (row spacing, column spacing).
    pub pixel_spacing: Option<[f64; 2]>,
    pub slice_thickness: Option<f64>,
    pub rescale_slope: Option<f64>,
    pub rescale_intercept: Option<f64>,
    pub instance_number: Option<i32>,
    pub window: Option<WindowSpec>,
}

fn fixed<const N: usize>(values: Option<Vec<f64>>) -> Option<[f64; N]> {
    values.and_then(|v| v.get(..N).and_then(|head| head.try_into().ok()))
}

impl SliceRecord {
    pub fn from_source(index: usize, source: SliceSource) -> Result<Self, ParseError> {
        let dataset = DatasetParser::parse_shared(Arc::from(source.bytes))?;
        Self::from_dataset(source.name, index, &dataset)
    }

    pub fn from_dataset(name: String, index: usize, dataset: &Dataset) -> Result<Self, ParseError> {
        let pixels = PixelBuffer::from_dataset(dataset)?;
        let position = fixed::<3>(dataset.multi_f64(tags::IMAGE_POSITION_PATIENT));
        if position.is_none() {
            warn!(
                "{}: no Image Position (Patient), ordering by input index {}",
                name, index
            );
        }
        let record = Self {
            pixels,
            position,
            orientation: fixed::<6>(dataset.multi_f64(tags::IMAGE_ORIENTATION_PATIENT)),
            pixel_spacing: fixed::<2>(dataset.multi_f64(tags::PIXEL_SPACING)),
            slice_thickness: dataset.f64(tags::SLICE_THICKNESS),
            rescale_slope: dataset.f64(tags::RESCALE_SLOPE),
            rescale_intercept: dataset.f64(tags::RESCALE_INTERCEPT),
            instance_number: dataset.i32(tags::INSTANCE_NUMBER),
            window: WindowSpec::from_dataset(dataset),
            name,
            index,
        };
        debug!(
            "ingested {} ({}x{}, position {:?})",
            record.name,
            record.pixels.columns(),
            record.pixels.rows(),
            record.position
        );
        Ok(record)
    }

    pub fn confidence(&self) -> PositionConfidence {
        match self.position {
            Some(_) => PositionConfidence::Measured,
            None => PositionConfidence::InputIndex,
        }
    }

    /// Physical position, or `(0, 0, -index)` when the file carries none, so
    /// that the descending position sort keeps such slices in input order.
    pub fn resolved_position(&self) -> [f64; 3] {
        self.position.unwrap_or([0.0, 0.0, -(self.index as f64)])
    }

    /// In-plane spacing as (x, y) millimeters, 1.0 when missing or invalid.
    pub fn resolved_pixel_spacing(&self) -> (f64, f64) {
        match self.pixel_spacing {
            Some([row, column]) if row > 0.0 && column > 0.0 => (column, row),
            _ => (1.0, 1.0),
        }
    }

    /// (columns, rows)
    pub fn dimensions(&self) -> (usize, usize) {
        (self.pixels.columns(), self.pixels.rows())
    }

    /// Samples after the modality rescale, saturated to the `i16` range.
    pub fn calibrated_samples(&self) -> Vec<i16> {
        let slope = self.rescale_slope.filter(|s| *s != 0.0).unwrap_or(1.0);
        let intercept = self.rescale_intercept.unwrap_or(0.0);
        if slope == 1.0 && intercept == 0.0 {
            return self.pixels.samples_i16();
        }
        let rescale = |v: f64| (v * slope + intercept).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        if self.pixels.is_signed() {
            self.pixels
                .samples_i16()
                .into_iter()
                .map(|v| rescale(v as f64))
                .collect()
        } else {
            self.pixels
                .samples_u16()
                .into_iter()
                .map(|v| rescale(v as f64))
                .collect()
        }
    }
}
