use crate::{
    enums::{PositionConfidence, SortBy},
    error::{ParseError, SliceFailure, VolumeLoaderError},
    geometry::{VolumeGeometry, resolve_orientation},
    slice::{SliceRecord, SliceSource},
    volume::Volume,
};

use log::{debug, info, warn};
use nalgebra::{Point3, Vector3};
use ndarray::{Array3, Axis};
use rayon::prelude::*;
use std::{cmp::Ordering, collections::HashMap, fs, path::Path};
use web_time::Instant;

/// A built volume plus the sources that had to be dropped on the way.
#[derive(Debug)]
pub struct LoadReport {
    pub volume: Volume,
    pub failures: Vec<SliceFailure>,
    /// Source names in stacking order: entry `z` filled slab `z`.
    pub slice_names: Vec<String>,
}

/// Largest in-plane spacing difference, in millimeters, still treated as equal.
const SPACING_TOLERANCE: f64 = 1e-4;
/// Smallest step between neighbouring slices along the normal, in millimeters.
const POSITION_TOLERANCE: f64 = 1e-4;

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a volume from in-memory sources
    ///
    /// # Arguments
    ///
    /// * `sources` - Named file contents of one series, in input order
    /// * `sort_by` - Method to sort the slices
    ///
    /// # Errors
    ///
    /// Returns error if no source could be ingested or in-plane dimensions
    /// differ. Sources that fail to parse are reported in
    /// [`LoadReport::failures`] instead.
    pub fn load_from_sources(
        sources: Vec<SliceSource>,
        sort_by: SortBy,
    ) -> Result<LoadReport, VolumeLoaderError> {
        Self::load_inputs(sources.into_iter().map(Ok).collect(), sort_by)
    }

    /// Load a volume from file paths, reading files in parallel
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path> + Sync],
        sort_by: SortBy,
    ) -> Result<LoadReport, VolumeLoaderError> {
        let inputs = paths
            .par_iter()
            .map(|path| {
                let path = path.as_ref();
                let name = path.display().to_string();
                match fs::read(path) {
                    Ok(bytes) => Ok(SliceSource::new(name, bytes)),
                    Err(err) => Err(SliceFailure {
                        name,
                        error: ParseError::MalformedInput(format!("unreadable: {err}")),
                    }),
                }
            })
            .collect();

        Self::load_inputs(inputs, sort_by)
    }

    /// Load a volume from a directory containing .dcm files
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        sort_by: SortBy,
    ) -> Result<LoadReport, VolumeLoaderError> {
        let mut paths: Vec<_> = fs::read_dir(path.as_ref())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();

        if paths.is_empty() {
            return Err(VolumeLoaderError::NoSlices {
                failures: Vec::new(),
            });
        }
        paths.sort();

        Self::load_from_file_paths(&paths, sort_by)
    }

    /// [`VolumeLoader::load_from_sources`] on a blocking worker thread, for
    /// hosts that must keep their async executor responsive.
    pub async fn load_async(
        sources: Vec<SliceSource>,
        sort_by: SortBy,
    ) -> Result<LoadReport, VolumeLoaderError> {
        tokio::task::spawn_blocking(move || Self::load_from_sources(sources, sort_by))
            .await
            .map_err(|err| VolumeLoaderError::Task(err.to_string()))?
    }

    fn load_inputs(
        inputs: Vec<Result<SliceSource, SliceFailure>>,
        sort_by: SortBy,
    ) -> Result<LoadReport, VolumeLoaderError> {
        let started = Instant::now();
        let (mut records, failures) = Self::ingest(inputs);
        for failure in &failures {
            warn!("dropping {}: {}", failure.name, failure.error);
        }
        if records.is_empty() {
            return Err(VolumeLoaderError::NoSlices { failures });
        }
        debug!(
            "ingested {} slice(s) in {:?}",
            records.len(),
            started.elapsed()
        );

        Self::sort_records(&mut records, sort_by);
        Self::validate_dimensions(&records)?;
        Self::validate_geometry(&records)?;

        let volume = Self::build_volume(&records);
        info!(
            "built volume {:?} with spacing {:?} from {} slice(s) ({} dropped) in {:?}",
            volume.dim(),
            volume.spacing(),
            records.len(),
            failures.len(),
            started.elapsed()
        );

        Ok(LoadReport {
            volume,
            failures,
            slice_names: records.into_iter().map(|r| r.name).collect(),
        })
    }

    fn ingest(
        inputs: Vec<Result<SliceSource, SliceFailure>>,
    ) -> (Vec<SliceRecord>, Vec<SliceFailure>) {
        let results: Vec<Result<SliceRecord, SliceFailure>> = inputs
            .into_par_iter()
            .enumerate()
            .map(|(index, input)| {
                let source = input?;
                let name = source.name.clone();
                SliceRecord::from_source(index, source).map_err(|error| SliceFailure { name, error })
            })
            .collect();

        let mut records = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(record) => records.push(record),
                Err(failure) => failures.push(failure),
            }
        }
        (records, failures)
    }

    /// Unit normal of the acquisition plane of the first slice.
    fn slice_normal(records: &[SliceRecord]) -> Vector3<f64> {
        let (row, column) = resolve_orientation(records.first().and_then(|r| r.orientation));
        row.cross(&column).normalize()
    }

    fn sort_records(records: &mut [SliceRecord], sort_by: SortBy) {
        match sort_by {
            SortBy::ImagePositionPatient => {
                let normal = Self::slice_normal(records);
                let dominant = normal.iamax();
                records.sort_by(|a, b| {
                    let pa = a.resolved_position()[dominant];
                    let pb = b.resolved_position()[dominant];
                    pb.partial_cmp(&pa)
                        .unwrap_or(Ordering::Equal)
                        .then(a.index.cmp(&b.index))
                });
            }
            SortBy::InstanceNumber => {
                records.sort_by_key(|r| (r.instance_number.is_none(), r.instance_number, r.index));
            }
            SortBy::None => records.sort_by_key(|r| r.index),
        }
    }

    /// All slices must match the most common (columns, rows); the first one
    /// that does not is reported.
    fn validate_dimensions(records: &[SliceRecord]) -> Result<(), VolumeLoaderError> {
        let mut counts: HashMap<(usize, usize), usize> = HashMap::new();
        for record in records {
            *counts.entry(record.dimensions()).or_default() += 1;
        }
        let best = counts.values().copied().max().unwrap_or(0);
        let expected = records
            .iter()
            .map(SliceRecord::dimensions)
            .find(|dim| counts[dim] == best)
            .unwrap_or_default();

        match records.iter().find(|r| r.dimensions() != expected) {
            Some(offender) => Err(VolumeLoaderError::InconsistentSeries {
                file: offender.name.clone(),
                expected,
                actual: offender.dimensions(),
            }),
            None => Ok(()),
        }
    }

    /// In-plane spacing must agree across slices, and measured positions
    /// must advance strictly in one direction along the slice normal.
    fn validate_geometry(records: &[SliceRecord]) -> Result<(), VolumeLoaderError> {
        let expected = records[0].resolved_pixel_spacing();
        for record in &records[1..] {
            let actual = record.resolved_pixel_spacing();
            if (actual.0 - expected.0).abs() > SPACING_TOLERANCE
                || (actual.1 - expected.1).abs() > SPACING_TOLERANCE
            {
                return Err(VolumeLoaderError::InconsistentSpacing {
                    file: record.name.clone(),
                    expected,
                    actual,
                });
            }
        }

        // Substituted positions are ordinals, not distances.
        if records
            .iter()
            .any(|r| r.confidence() != PositionConfidence::Measured)
        {
            return Ok(());
        }

        let normal = Self::slice_normal(records);
        let offsets: Vec<f64> = records
            .iter()
            .map(|r| normal.dot(&Vector3::from(r.resolved_position())))
            .collect();
        let mut direction = 0.0;
        for (pair, offset) in records.windows(2).zip(offsets.windows(2)) {
            let step = offset[1] - offset[0];
            if step.abs() < POSITION_TOLERANCE || step * direction < 0.0 {
                return Err(VolumeLoaderError::PositionConflict {
                    first: pair[0].name.clone(),
                    second: pair[1].name.clone(),
                    first_offset: offset[0],
                    second_offset: offset[1],
                });
            }
            direction = step;
        }

        if offsets.len() > 2 {
            let mean = (offsets[offsets.len() - 1] - offsets[0]) / (offsets.len() - 1) as f64;
            if let Some(gap) = offsets
                .windows(2)
                .map(|w| w[1] - w[0])
                .find(|step| (step - mean).abs() > mean.abs() * 0.01)
            {
                warn!(
                    "uneven slice gap of {:.3} mm against a mean of {:.3} mm",
                    gap.abs(),
                    mean.abs()
                );
            }
        }
        Ok(())
    }

    fn build_volume(records: &[SliceRecord]) -> Volume {
        let volume_array = Self::build_volume_array(records);
        let geometry = Self::build_geometry(records);
        let confidence = if records
            .iter()
            .all(|r| r.confidence() == PositionConfidence::Measured)
        {
            PositionConfidence::Measured
        } else {
            PositionConfidence::InputIndex
        };
        Volume::new(volume_array, geometry)
            .with_default_window(records[0].window)
            .with_confidence(confidence)
    }

    fn build_volume_array(records: &[SliceRecord]) -> Array3<i16> {
        let (width, height) = records[0].dimensions();
        let depth = records.len();
        let mut volume = Array3::<i16>::zeros((depth, height, width));

        volume
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(records.par_iter())
            .for_each(|(mut slab, record)| {
                for (voxel, sample) in slab.iter_mut().zip(record.calibrated_samples()) {
                    *voxel = sample;
                }
            });

        volume
    }

    fn build_geometry(records: &[SliceRecord]) -> VolumeGeometry {
        let first = &records[0];
        let (row, column) = resolve_orientation(first.orientation);
        let normal = row.cross(&column).normalize();
        let (spacing_x, spacing_y) = first.resolved_pixel_spacing();

        let first_pos = Vector3::from(first.resolved_position());
        let last_pos = Vector3::from(records[records.len() - 1].resolved_position());
        let extent = last_pos - first_pos;
        let fallback = || first.slice_thickness.filter(|t| *t > 0.0).unwrap_or(1.0);
        let spacing_z = if records.len() > 1 && extent.norm() > 1e-6 {
            extent.norm() / (records.len() - 1) as f64
        } else {
            fallback()
        };
        // Slice axis points from slab 0 towards the last slab.
        let slice = if extent.dot(&normal) < 0.0 { -normal } else { normal };

        VolumeGeometry::new(
            Point3::from(first_pos),
            Vector3::new(spacing_x, spacing_y, spacing_z),
            row,
            column,
            slice,
        )
    }
}
