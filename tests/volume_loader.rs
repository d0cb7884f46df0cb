mod common;

use std::collections::HashMap;
use std::fs;

use common::SliceBuilder;
use dicom_mpr::{
    Interpolation, Orientation, ParseError, PositionConfidence, SliceSource, SortBy,
    VolumeLoader, VolumeLoaderError, WindowSpec,
};
use nalgebra::{Point3, Vector3};
use rstest::rstest;
use tempfile::tempdir;

fn source(name: &str, builder: &SliceBuilder) -> SliceSource {
    SliceSource::new(name, builder.build())
}

fn voxel_value(x: usize, y: usize, z: usize) -> i16 {
    ((x * 7 + y * 13 + z * 101) % 30_000) as i16
}

fn stack(columns: u16, rows: u16, depth: usize, spacing: f64) -> Vec<SliceSource> {
    (0..depth)
        .map(|k| {
            let builder = SliceBuilder::new(columns, rows)
                .position([0.0, 0.0, -(k as f64) * spacing])
                .pixels_from(|x, y| voxel_value(x, y, k));
            source(&format!("slice{k:03}.dcm"), &builder)
        })
        .collect()
}

#[rstest]
#[case(2)]
#[case(5)]
#[case(10)]
fn stacks_slices_at_regular_spacing(#[case] depth: usize) {
    let sources: Vec<_> = (0..depth)
        .map(|k| {
            let builder = SliceBuilder::new(64, 64).position([0.0, 0.0, 3.0 * k as f64]);
            source(&format!("{k}.dcm"), &builder)
        })
        .collect();

    let report = VolumeLoader::load_from_sources(sources, SortBy::ImagePositionPatient)
        .expect("series loads");
    assert!(report.failures.is_empty());
    assert_eq!(report.volume.dim(), (64, 64, depth));
    let (sx, sy, sz) = report.volume.spacing();
    assert_eq!((sx, sy), (1.0, 1.0));
    assert!((sz - 3.0).abs() < 1e-9);
    assert_eq!(
        report.volume.position_confidence(),
        PositionConfidence::Measured
    );
}

#[test]
fn shuffled_input_is_sorted_by_position() {
    let order = [2usize, 0, 3, 1];
    let sources: Vec<_> = order
        .iter()
        .map(|&k| {
            let builder = SliceBuilder::new(8, 6)
                .position([0.0, 0.0, 10.0 - 2.5 * k as f64])
                .fill(k as i16);
            source(&format!("fill{k}.dcm"), &builder)
        })
        .collect();

    let report = VolumeLoader::load_from_sources(sources, SortBy::ImagePositionPatient)
        .expect("series loads");
    let volume = &report.volume;
    assert_eq!(volume.dim(), (8, 6, 4));
    for z in 0..4 {
        for y in 0..6 {
            for x in 0..8 {
                assert_eq!(volume.voxel(x, y, z), Some(z as i16));
            }
        }
    }
    assert_eq!(
        report.slice_names,
        vec!["fill0.dcm", "fill1.dcm", "fill2.dcm", "fill3.dcm"]
    );
    assert!((volume.spacing().2 - 2.5).abs() < 1e-9);
}

#[test]
fn mismatched_dimensions_name_the_offending_file() {
    let mut sources = stack(64, 64, 5, 2.0);
    let odd = SliceBuilder::new(128, 128).position([0.0, 0.0, 50.0]);
    sources.insert(2, source("odd.dcm", &odd));

    let err = VolumeLoader::load_from_sources(sources, SortBy::ImagePositionPatient)
        .expect_err("dimensions differ");
    match err {
        VolumeLoaderError::InconsistentSeries {
            file,
            expected,
            actual,
        } => {
            assert_eq!(file, "odd.dcm");
            assert_eq!(expected, (64, 64));
            assert_eq!(actual, (128, 128));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn unusable_files_are_reported_and_skipped() {
    let mut sources = stack(16, 16, 3, 1.0);
    let no_pixels = SliceBuilder::new(16, 16)
        .position([0.0, 0.0, 5.0])
        .without_pixel_data();
    sources.push(source("no_pixels.dcm", &no_pixels));
    let compressed = SliceBuilder::new(16, 16)
        .position([0.0, 0.0, 6.0])
        .transfer_syntax("1.2.840.10008.1.2.4.70");
    sources.push(source("compressed.dcm", &compressed));
    sources.push(SliceSource::new("notes.dcm", b"not a dicom file".to_vec()));

    let report = VolumeLoader::load_from_sources(sources, SortBy::ImagePositionPatient)
        .expect("three good slices remain");
    assert_eq!(report.volume.dim(), (16, 16, 3));

    let failures: HashMap<_, _> = report
        .failures
        .iter()
        .map(|f| (f.name.as_str(), &f.error))
        .collect();
    assert_eq!(failures.len(), 3);
    assert_eq!(
        failures["no_pixels.dcm"],
        &ParseError::MissingRequiredField("PixelData")
    );
    assert!(matches!(
        failures["compressed.dcm"],
        ParseError::UnsupportedEncoding(_)
    ));
    assert!(matches!(failures["notes.dcm"], ParseError::MalformedInput(_)));
}

#[test]
fn no_usable_slices_is_an_error() {
    let sources = vec![
        SliceSource::new("a.dcm", Vec::new()),
        SliceSource::new("b.dcm", vec![0xFF; 40]),
    ];
    match VolumeLoader::load_from_sources(sources, SortBy::ImagePositionPatient) {
        Err(VolumeLoaderError::NoSlices { failures }) => assert_eq!(failures.len(), 2),
        other => panic!("expected NoSlices, got {other:?}"),
    }
}

#[test]
fn sagittal_slice_matches_voxels() {
    let report = VolumeLoader::load_from_sources(stack(64, 64, 10, 2.0), SortBy::ImagePositionPatient)
        .expect("series loads");
    let volume = &report.volume;

    let slice = volume.slice(Orientation::Sagittal, 32.0, Interpolation::Nearest);
    assert_eq!((slice.width(), slice.height()), (64, 10));
    for z in 0..10 {
        for y in 0..64 {
            let expected = volume.voxel(32, y, z).map(f32::from);
            assert_eq!(slice.get(y, z), expected);
        }
    }
    // Slabs follow the input stack, which was already in descending order.
    assert_eq!(volume.voxel(32, 5, 3), Some(voxel_value(32, 5, 3)));
}

#[test]
fn coronal_linear_blends_neighbouring_rows() {
    let report = VolumeLoader::load_from_sources(stack(8, 8, 3, 1.0), SortBy::ImagePositionPatient)
        .expect("series loads");
    let volume = &report.volume;

    let slice = volume.slice(Orientation::Coronal, 2.5, Interpolation::Linear);
    assert_eq!((slice.width(), slice.height()), (8, 3));
    let lower = f32::from(voxel_value(4, 2, 1));
    let upper = f32::from(voxel_value(4, 3, 1));
    let value = slice.get(4, 1).expect("in bounds");
    assert!((value - (lower + upper) / 2.0).abs() < 1e-4);
}

#[test]
fn oblique_voxel_physical_round_trip() {
    let angle = 30f64.to_radians();
    let (sin, cos) = angle.sin_cos();
    let orientation = [cos, sin, 0.0, -sin, cos, 0.0];
    let origin = [12.0, -40.0, 7.5];

    let mut positions = HashMap::new();
    let sources: Vec<_> = (0..5)
        .map(|k| {
            let position = [origin[0], origin[1], origin[2] + 2.5 * k as f64];
            let name = format!("oblique{k}.dcm");
            positions.insert(name.clone(), position);
            let builder = SliceBuilder::new(4, 3)
                .position(position)
                .orientation(orientation)
                .pixel_spacing(0.7, 0.9);
            source(&name, &builder)
        })
        .collect();

    let report = VolumeLoader::load_from_sources(sources, SortBy::ImagePositionPatient)
        .expect("series loads");
    let volume = &report.volume;
    let (sx, sy, sz) = volume.spacing();
    assert!((sx - 0.9).abs() < 1e-9);
    assert!((sy - 0.7).abs() < 1e-9);
    assert!((sz - 2.5).abs() < 1e-9);

    for (z, name) in report.slice_names.iter().enumerate() {
        let expected = Point3::from(positions[name]);
        let actual = volume.voxel_to_physical(Vector3::new(0.0, 0.0, z as f64));
        assert!((actual - expected).norm() < 1e-6, "slab {z} at {actual}");
    }

    let step = volume.voxel_to_physical(Vector3::new(1.0, 0.0, 0.0))
        - volume.voxel_to_physical(Vector3::zeros());
    assert!((step - Vector3::new(cos, sin, 0.0) * 0.9).norm() < 1e-9);

    let (nx, ny, nz) = volume.dim();
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let voxel = Vector3::new(x as f64, y as f64, z as f64);
                let back = volume.physical_to_voxel(volume.voxel_to_physical(voxel));
                assert!((back - voxel).norm() < 1e-3);
            }
        }
    }
}

#[test]
fn missing_positions_keep_input_order() {
    let sources: Vec<_> = (0..3)
        .map(|k| source(&format!("{k}.dcm"), &SliceBuilder::new(4, 4).fill(10 * k as i16)))
        .collect();

    let report = VolumeLoader::load_from_sources(sources, SortBy::ImagePositionPatient)
        .expect("series loads");
    let volume = &report.volume;
    assert_eq!(volume.position_confidence(), PositionConfidence::InputIndex);
    for z in 0..3 {
        assert_eq!(volume.voxel(1, 1, z), Some(10 * z as i16));
    }
}

#[test]
fn instance_number_ordering() {
    let sources: Vec<_> = [3, 1, 2]
        .iter()
        .map(|&n| {
            let builder = SliceBuilder::new(4, 4)
                .position([0.0, 0.0, -2.0 * n as f64])
                .instance_number(n)
                .fill(n as i16);
            source(&format!("{n}.dcm"), &builder)
        })
        .collect();

    let report =
        VolumeLoader::load_from_sources(sources, SortBy::InstanceNumber).expect("series loads");
    let values: Vec<_> = (0..3).filter_map(|z| report.volume.voxel(0, 0, z)).collect();
    assert_eq!(values, vec![1, 2, 3]);
}

fn stack_at(offsets: &[f64]) -> Vec<SliceSource> {
    offsets
        .iter()
        .enumerate()
        .map(|(k, &z)| {
            let builder = SliceBuilder::new(4, 4).position([0.0, 0.0, z]);
            source(&format!("z{k}.dcm"), &builder)
        })
        .collect()
}

#[test]
fn duplicate_positions_are_rejected() {
    let err = VolumeLoader::load_from_sources(
        stack_at(&[9.0, 6.0, 6.0, 0.0]),
        SortBy::ImagePositionPatient,
    )
    .expect_err("two slices share z = 6");
    match err {
        VolumeLoaderError::PositionConflict {
            first,
            second,
            first_offset,
            second_offset,
        } => {
            assert_eq!((first.as_str(), second.as_str()), ("z1.dcm", "z2.dcm"));
            assert_eq!((first_offset, second_offset), (6.0, 6.0));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn direction_reversal_is_rejected() {
    // Input order is kept, so the stack turns back between z1 and z2.
    let err = VolumeLoader::load_from_sources(stack_at(&[0.0, 3.0, 1.5]), SortBy::None)
        .expect_err("positions reverse");
    assert!(matches!(
        err,
        VolumeLoaderError::PositionConflict { ref first, ref second, .. }
            if first == "z1.dcm" && second == "z2.dcm"
    ));
}

#[test]
fn uneven_gaps_still_load() {
    let report = VolumeLoader::load_from_sources(
        stack_at(&[9.0, 6.0, 0.0]),
        SortBy::ImagePositionPatient,
    )
    .expect("gaps are allowed");
    assert_eq!(report.volume.dim(), (4, 4, 3));
    assert_eq!(report.slice_names, vec!["z0.dcm", "z1.dcm", "z2.dcm"]);
}

#[test]
fn pixel_spacing_mismatch_names_the_file() {
    let mut sources = stack(8, 8, 3, 2.0);
    let coarse = SliceBuilder::new(8, 8)
        .position([0.0, 0.0, -6.0])
        .pixel_spacing(0.5, 0.8);
    sources.push(source("coarse.dcm", &coarse));

    let err = VolumeLoader::load_from_sources(sources, SortBy::ImagePositionPatient)
        .expect_err("spacing differs");
    match err {
        VolumeLoaderError::InconsistentSpacing {
            file,
            expected,
            actual,
        } => {
            assert_eq!(file, "coarse.dcm");
            assert_eq!(expected, (1.0, 1.0));
            assert_eq!(actual, (0.8, 0.5));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn modality_rescale_is_applied() {
    let builder = SliceBuilder::new(4, 4)
        .position([0.0, 0.0, 0.0])
        .rescale(2.0, -1024.0)
        .fill(1000);
    let report = VolumeLoader::load_from_sources(vec![source("ct.dcm", &builder)], SortBy::None)
        .expect("slice loads");
    assert_eq!(report.volume.voxel(2, 2, 0), Some(976));
}

#[rstest]
#[case(Some(2.5), 2.5)]
#[case(None, 1.0)]
fn single_slice_spacing_falls_back_to_thickness(
    #[case] thickness: Option<f64>,
    #[case] expected: f64,
) {
    let mut builder = SliceBuilder::new(4, 4).position([0.0, 0.0, 0.0]);
    if let Some(thickness) = thickness {
        builder = builder.slice_thickness(thickness);
    }
    let report = VolumeLoader::load_from_sources(vec![source("one.dcm", &builder)], SortBy::None)
        .expect("slice loads");
    assert_eq!(report.volume.dim(), (4, 4, 1));
    assert_eq!(report.volume.spacing().2, expected);
}

#[test]
fn default_window_comes_from_the_first_slice() {
    let report = VolumeLoader::load_from_sources(stack(4, 4, 2, 1.0), SortBy::None)
        .expect("series loads");
    assert_eq!(
        report.volume.default_window(),
        Some(WindowSpec::new(40.0, 400.0))
    );
}

#[test]
fn loads_dcm_files_from_directory() {
    let dir = tempdir().expect("temp dir");
    for (k, src) in stack(8, 8, 4, 1.5).into_iter().enumerate() {
        fs::write(dir.path().join(format!("{k}.dcm")), src.bytes).expect("write slice");
    }
    fs::write(dir.path().join("README.txt"), "ignored").expect("write readme");

    let report = VolumeLoader::load_from_directory(dir.path(), SortBy::ImagePositionPatient)
        .expect("directory loads");
    assert_eq!(report.volume.dim(), (8, 8, 4));
    assert!(report.failures.is_empty());
    assert!((report.volume.spacing().2 - 1.5).abs() < 1e-9);
}

#[test]
fn empty_directory_has_no_slices() {
    let dir = tempdir().expect("temp dir");
    assert!(matches!(
        VolumeLoader::load_from_directory(dir.path(), SortBy::ImagePositionPatient),
        Err(VolumeLoaderError::NoSlices { .. })
    ));
}

#[test]
fn unreadable_paths_are_reported() {
    let dir = tempdir().expect("temp dir");
    let good = dir.path().join("good.dcm");
    let sources = stack(4, 4, 1, 1.0);
    fs::write(&good, &sources[0].bytes).expect("write slice");
    let missing = dir.path().join("missing.dcm");

    let report = VolumeLoader::load_from_file_paths(&[good, missing.clone()], SortBy::None)
        .expect("one file loads");
    assert_eq!(report.volume.dim(), (4, 4, 1));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, missing.display().to_string());
    assert!(matches!(
        report.failures[0].error,
        ParseError::MalformedInput(_)
    ));
}

#[tokio::test]
async fn loads_on_a_blocking_worker() {
    let report = VolumeLoader::load_async(stack(16, 8, 3, 2.0), SortBy::ImagePositionPatient)
        .await
        .expect("series loads");
    assert_eq!(report.volume.dim(), (16, 8, 3));
    assert_eq!(report.volume.voxel(15, 7, 2), Some(voxel_value(15, 7, 2)));
}
