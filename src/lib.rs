//! # DICOM-MPR library
//!
//! This crate parses a stack of uncompressed DICOM files, assembles them into
//! a single 3D intensity volume and serves windowed slices along the three
//! medical axes:
//!  - Axial
//!  - Coronal
//!  - Sagittal
//!
//! Files are parsed by a small built-in tag-length-value reader that handles
//! explicit and implicit VR framing and skips nested sequences of defined and
//! undefined length. Slices are ingested in parallel using rayon, sorted by
//! their position along the stacking axis and stacked into an immutable
//! [`Volume`] of calibrated (rescaled) signed 16-bit samples.
//!
//! Coronal and sagittal slices gather one sample from every stored slab and
//! can either take the nearest plane or blend the two bracketing planes.
//! Library consumers can also resample them to preserve physical aspect
//! ratios. DICOM files are assumed to have the following attributes:
//!   - Uncompressed transfer syntax (implicit VR LE, explicit VR LE or BE)
//!   - Single sample per pixel, 8 or 16 bits allocated
//!   - No multiframe (always the first frame is used)
//!   - Images from the same series
//!
//! # Examples
//!
//! ## Reading multiple DICOM files into a volume
//!
//! Read all DICOM files from the dicom/ directory, sort them by position and
//! render the sagittal slice at the center of the volume with a bone window.
//!
//! ```no_run
//! # use dicom_mpr::{VolumeLoader, Orientation, Interpolation, SortBy, WindowSpec};
//! # use std::path::PathBuf;
//! let report = VolumeLoader::load_from_directory(&PathBuf::from("dicom"), SortBy::ImagePositionPatient)
//!     .expect("should have loaded files from directory");
//! let volume = report.volume;
//! let window = WindowSpec::preset("bone").expect("bone is a known preset");
//! let image = volume
//!     .render(
//!         Orientation::Sagittal,
//!         (volume.dim().0 / 2) as f64,
//!         Interpolation::Linear,
//!         window,
//!         true,
//!     )
//!     .expect("should have rendered image at center of volume");
//! image.save("result.png").expect("should have written png");
//! ```

pub mod byte_reader;
pub mod dataset;
pub mod dictionary;
pub mod enums;
pub mod error;
pub mod geometry;
mod interpolator;
pub mod parser;
pub mod pixel;
pub mod slice;
pub mod slice_cache;
pub mod volume;
pub mod volume_loader;
pub mod windowing;

pub use dataset::{Dataset, Element, TransferSyntax};
pub use dictionary::{Tag, Vr};
pub use enums::{Interpolation, Orientation, PositionConfidence, SortBy};
pub use error::{ParseError, SliceFailure, VolumeLoaderError};
pub use geometry::VolumeGeometry;
pub use parser::DatasetParser;
pub use pixel::PixelBuffer;
pub use slice::{SliceRecord, SliceSource};
pub use slice_cache::SliceCache;
pub use volume::{MprSlice, Volume};
pub use volume_loader::{LoadReport, VolumeLoader};
pub use windowing::{PRESETS, WindowPreset, WindowSpec};
