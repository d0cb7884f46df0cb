use std::fmt;
use std::str::FromStr;

/// Plane of a multi-planar slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Constant z, the acquisition plane.
    Axial,
    /// Constant y.
    Coronal,
    /// Constant x.
    Sagittal,
}

impl Orientation {
    pub const ALL: [Orientation; 3] = [Self::Axial, Self::Coronal, Self::Sagittal];

    /// Volume axis held constant by this plane: 0 = x, 1 = y, 2 = z.
    pub fn fixed_axis(self) -> usize {
        match self {
            Self::Sagittal => 0,
            Self::Coronal => 1,
            Self::Axial => 2,
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Axial => "axial",
            Self::Coronal => "coronal",
            Self::Sagittal => "sagittal",
        };
        f.write_str(name)
    }
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "axial" | "transverse" => Ok(Self::Axial),
            "coronal" => Ok(Self::Coronal),
            "sagittal" => Ok(Self::Sagittal),
            other => Err(format!("unknown plane '{other}'")),
        }
    }
}

/// Sampling between stored planes for sagittal and coronal slices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Interpolation {
    /// Nearest stored plane; cheapest, used while navigating.
    #[default]
    Nearest,
    /// Linear blend of the two bracketing planes.
    Linear,
}

/// How ingested slices are ordered along the stacking axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortBy {
    /// Descending position along the dominant stacking axis (superior first).
    #[default]
    ImagePositionPatient,
    /// Ascending Instance Number.
    InstanceNumber,
    /// Keep input order.
    None,
}

/// Whether a slice position was read from the file or substituted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PositionConfidence {
    Measured,
    /// Image Position (Patient) was missing; the input index stands in
    /// for it along z and is not a distance in millimeters.
    InputIndex,
}
