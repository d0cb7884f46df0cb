use log::warn;
use nalgebra::{Matrix3, Point3, Vector3};

/// Row and column direction cosines used when a series carries none.
pub const DEFAULT_ORIENTATION: [f64; 6] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

const DEGENERATE_EPSILON: f64 = 1e-6;

/// Resolves optional Image Orientation (Patient) values to unit row and
/// column directions, falling back to [`DEFAULT_ORIENTATION`] when missing or
/// degenerate.
pub fn resolve_orientation(orientation: Option<[f64; 6]>) -> (Vector3<f64>, Vector3<f64>) {
    let axes = |o: [f64; 6]| {
        (
            Vector3::new(o[0], o[1], o[2]),
            Vector3::new(o[3], o[4], o[5]),
        )
    };
    if let Some(values) = orientation {
        let (row, column) = axes(values);
        let valid = row.norm() > DEGENERATE_EPSILON
            && column.norm() > DEGENERATE_EPSILON
            && row.cross(&column).norm() > DEGENERATE_EPSILON;
        if valid {
            return (row.normalize(), column.normalize());
        }
        warn!("degenerate image orientation {:?}, using identity", values);
    }
    axes(DEFAULT_ORIENTATION)
}

/// Mapping between voxel indices `(x, y, z)` and patient space in millimeters.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeGeometry {
    origin: Point3<f64>,
    spacing: Vector3<f64>,
    /// Columns are the row, column and slice directions.
    direction: Matrix3<f64>,
    to_physical: Matrix3<f64>,
    to_voxel: Matrix3<f64>,
}

impl Default for VolumeGeometry {
    fn default() -> Self {
        Self::new(
            Point3::origin(),
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::x(),
            Vector3::y(),
            Vector3::z(),
        )
    }
}

impl VolumeGeometry {
    pub fn new(
        origin: Point3<f64>,
        spacing: Vector3<f64>,
        row: Vector3<f64>,
        column: Vector3<f64>,
        slice: Vector3<f64>,
    ) -> Self {
        let direction = Matrix3::from_columns(&[row, column, slice]);
        let to_physical = direction * Matrix3::from_diagonal(&spacing);
        let to_voxel = to_physical.try_inverse().unwrap_or_else(|| {
            warn!("voxel to patient transform is singular, inverse falls back to identity");
            Matrix3::identity()
        });
        Self {
            origin,
            spacing,
            direction,
            to_physical,
            to_voxel,
        }
    }

    pub fn origin(&self) -> Point3<f64> {
        self.origin
    }

    /// Voxel size in millimeters along x, y and z.
    pub fn spacing(&self) -> Vector3<f64> {
        self.spacing
    }

    pub fn row_direction(&self) -> Vector3<f64> {
        self.direction.column(0).into_owned()
    }

    pub fn column_direction(&self) -> Vector3<f64> {
        self.direction.column(1).into_owned()
    }

    pub fn slice_direction(&self) -> Vector3<f64> {
        self.direction.column(2).into_owned()
    }

    /// `origin + D · (v ⊙ spacing)`. Indices may be fractional.
    pub fn voxel_to_physical(&self, voxel: Vector3<f64>) -> Point3<f64> {
        self.origin + self.to_physical * voxel
    }

    /// Exact inverse of [`VolumeGeometry::voxel_to_physical`].
    pub fn physical_to_voxel(&self, point: Point3<f64>) -> Vector3<f64> {
        self.to_voxel * (point - self.origin)
    }
}
