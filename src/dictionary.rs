use std::fmt;

use dicom_core::VR;
use dicom_core::dictionary::{DataDictionary, VirtualVr};
use dicom_dictionary_std::StandardDataDictionary;

/// A DICOM attribute tag, `(group, element)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(pub u16, pub u16);

impl Tag {
    pub const fn group(self) -> u16 {
        self.0
    }

    pub const fn element(self) -> u16 {
        self.1
    }

    /// The tag packed as `0xGGGGEEEE`, which is also its sort key.
    pub const fn packed(self) -> u32 {
        ((self.0 as u32) << 16) | self.1 as u32
    }

    pub const fn from_packed(value: u32) -> Self {
        Tag((value >> 16) as u16, value as u16)
    }

    pub fn is_delimiter(self) -> bool {
        self.0 == 0xFFFE
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.0, self.1)
    }
}

pub mod tags {
    use super::Tag;

    pub const FILE_META_INFORMATION_GROUP_LENGTH: Tag = Tag(0x0002, 0x0000);
    pub const MEDIA_STORAGE_SOP_CLASS_UID: Tag = Tag(0x0002, 0x0002);
    pub const MEDIA_STORAGE_SOP_INSTANCE_UID: Tag = Tag(0x0002, 0x0003);
    pub const TRANSFER_SYNTAX_UID: Tag = Tag(0x0002, 0x0010);
    pub const IMPLEMENTATION_CLASS_UID: Tag = Tag(0x0002, 0x0012);
    pub const SPECIFIC_CHARACTER_SET: Tag = Tag(0x0008, 0x0005);
    pub const SOP_CLASS_UID: Tag = Tag(0x0008, 0x0016);
    pub const SOP_INSTANCE_UID: Tag = Tag(0x0008, 0x0018);
    pub const MODALITY: Tag = Tag(0x0008, 0x0060);
    pub const SERIES_DESCRIPTION: Tag = Tag(0x0008, 0x103E);
    pub const PATIENT_NAME: Tag = Tag(0x0010, 0x0010);
    pub const PATIENT_ID: Tag = Tag(0x0010, 0x0020);
    pub const SLICE_THICKNESS: Tag = Tag(0x0018, 0x0050);
    pub const SPACING_BETWEEN_SLICES: Tag = Tag(0x0018, 0x0088);
    pub const STUDY_INSTANCE_UID: Tag = Tag(0x0020, 0x000D);
    pub const SERIES_INSTANCE_UID: Tag = Tag(0x0020, 0x000E);
    pub const SERIES_NUMBER: Tag = Tag(0x0020, 0x0011);
    pub const INSTANCE_NUMBER: Tag = Tag(0x0020, 0x0013);
    pub const IMAGE_POSITION_PATIENT: Tag = Tag(0x0020, 0x0032);
    pub const IMAGE_ORIENTATION_PATIENT: Tag = Tag(0x0020, 0x0037);
    pub const FRAME_OF_REFERENCE_UID: Tag = Tag(0x0020, 0x0052);
    pub const SLICE_LOCATION: Tag = Tag(0x0020, 0x1041);
    pub const SAMPLES_PER_PIXEL: Tag = Tag(0x0028, 0x0002);
    pub const PHOTOMETRIC_INTERPRETATION: Tag = Tag(0x0028, 0x0004);
    pub const NUMBER_OF_FRAMES: Tag = Tag(0x0028, 0x0008);
    pub const ROWS: Tag = Tag(0x0028, 0x0010);
    pub const COLUMNS: Tag = Tag(0x0028, 0x0011);
    pub const PIXEL_SPACING: Tag = Tag(0x0028, 0x0030);
    pub const BITS_ALLOCATED: Tag = Tag(0x0028, 0x0100);
    pub const BITS_STORED: Tag = Tag(0x0028, 0x0101);
    pub const HIGH_BIT: Tag = Tag(0x0028, 0x0102);
    pub const PIXEL_REPRESENTATION: Tag = Tag(0x0028, 0x0103);
    pub const WINDOW_CENTER: Tag = Tag(0x0028, 0x1050);
    pub const WINDOW_WIDTH: Tag = Tag(0x0028, 0x1051);
    pub const RESCALE_INTERCEPT: Tag = Tag(0x0028, 0x1052);
    pub const RESCALE_SLOPE: Tag = Tag(0x0028, 0x1053);
    pub const RESCALE_TYPE: Tag = Tag(0x0028, 0x1054);
    pub const STRUCTURE_SET_ROI_SEQUENCE: Tag = Tag(0x3006, 0x0020);
    pub const ROI_CONTOUR_SEQUENCE: Tag = Tag(0x3006, 0x0039);
    pub const PIXEL_DATA: Tag = Tag(0x7FE0, 0x0010);
    pub const ITEM: Tag = Tag(0xFFFE, 0xE000);
    pub const ITEM_DELIMITATION_ITEM: Tag = Tag(0xFFFE, 0xE00D);
    pub const SEQUENCE_DELIMITATION_ITEM: Tag = Tag(0xFFFE, 0xE0DD);
}

/// Value representation of a data element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Vr {
    AE,
    AS,
    AT,
    CS,
    DA,
    DS,
    DT,
    FD,
    FL,
    IS,
    LO,
    LT,
    OB,
    OD,
    OF,
    OL,
    OV,
    OW,
    PN,
    SH,
    SL,
    SQ,
    SS,
    ST,
    SV,
    TM,
    UC,
    UI,
    UL,
    UN,
    UR,
    US,
    UT,
    UV,
}

impl Vr {
    /// Parses the two ASCII bytes of an explicit VR. Unknown codes yield `None`.
    pub fn from_bytes(bytes: [u8; 2]) -> Option<Self> {
        let vr = match &bytes {
            b"AE" => Vr::AE,
            b"AS" => Vr::AS,
            b"AT" => Vr::AT,
            b"CS" => Vr::CS,
            b"DA" => Vr::DA,
            b"DS" => Vr::DS,
            b"DT" => Vr::DT,
            b"FD" => Vr::FD,
            b"FL" => Vr::FL,
            b"IS" => Vr::IS,
            b"LO" => Vr::LO,
            b"LT" => Vr::LT,
            b"OB" => Vr::OB,
            b"OD" => Vr::OD,
            b"OF" => Vr::OF,
            b"OL" => Vr::OL,
            b"OV" => Vr::OV,
            b"OW" => Vr::OW,
            b"PN" => Vr::PN,
            b"SH" => Vr::SH,
            b"SL" => Vr::SL,
            b"SQ" => Vr::SQ,
            b"SS" => Vr::SS,
            b"ST" => Vr::ST,
            b"SV" => Vr::SV,
            b"TM" => Vr::TM,
            b"UC" => Vr::UC,
            b"UI" => Vr::UI,
            b"UL" => Vr::UL,
            b"UN" => Vr::UN,
            b"UR" => Vr::UR,
            b"US" => Vr::US,
            b"UT" => Vr::UT,
            b"UV" => Vr::UV,
            _ => return None,
        };
        Some(vr)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Vr::AE => "AE",
            Vr::AS => "AS",
            Vr::AT => "AT",
            Vr::CS => "CS",
            Vr::DA => "DA",
            Vr::DS => "DS",
            Vr::DT => "DT",
            Vr::FD => "FD",
            Vr::FL => "FL",
            Vr::IS => "IS",
            Vr::LO => "LO",
            Vr::LT => "LT",
            Vr::OB => "OB",
            Vr::OD => "OD",
            Vr::OF => "OF",
            Vr::OL => "OL",
            Vr::OV => "OV",
            Vr::OW => "OW",
            Vr::PN => "PN",
            Vr::SH => "SH",
            Vr::SL => "SL",
            Vr::SQ => "SQ",
            Vr::SS => "SS",
            Vr::ST => "ST",
            Vr::SV => "SV",
            Vr::TM => "TM",
            Vr::UC => "UC",
            Vr::UI => "UI",
            Vr::UL => "UL",
            Vr::UN => "UN",
            Vr::UR => "UR",
            Vr::US => "US",
            Vr::UT => "UT",
            Vr::UV => "UV",
        }
    }

    /// VRs whose explicit header carries 2 reserved bytes and a 4-byte length.
    pub fn has_long_length(self) -> bool {
        matches!(
            self,
            Vr::OB
                | Vr::OD
                | Vr::OF
                | Vr::OL
                | Vr::OV
                | Vr::OW
                | Vr::SQ
                | Vr::UC
                | Vr::UN
                | Vr::UR
                | Vr::UT
                | Vr::UV
        )
    }

    /// Text VRs whose values are padded character strings.
    pub fn is_text(self) -> bool {
        matches!(
            self,
            Vr::AE
                | Vr::AS
                | Vr::CS
                | Vr::DA
                | Vr::DS
                | Vr::DT
                | Vr::IS
                | Vr::LO
                | Vr::LT
                | Vr::PN
                | Vr::SH
                | Vr::ST
                | Vr::TM
                | Vr::UC
                | Vr::UI
                | Vr::UR
                | Vr::UT
        )
    }
}

impl fmt::Display for Vr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes the parser and loader care about, sorted by packed tag.
static ENTRIES: &[(u32, Vr, &str)] = &[
    (0x0002_0000, Vr::UL, "FileMetaInformationGroupLength"),
    (0x0002_0001, Vr::OB, "FileMetaInformationVersion"),
    (0x0002_0002, Vr::UI, "MediaStorageSOPClassUID"),
    (0x0002_0003, Vr::UI, "MediaStorageSOPInstanceUID"),
    (0x0002_0010, Vr::UI, "TransferSyntaxUID"),
    (0x0002_0012, Vr::UI, "ImplementationClassUID"),
    (0x0002_0013, Vr::SH, "ImplementationVersionName"),
    (0x0008_0005, Vr::CS, "SpecificCharacterSet"),
    (0x0008_0008, Vr::CS, "ImageType"),
    (0x0008_0016, Vr::UI, "SOPClassUID"),
    (0x0008_0018, Vr::UI, "SOPInstanceUID"),
    (0x0008_0020, Vr::DA, "StudyDate"),
    (0x0008_0030, Vr::TM, "StudyTime"),
    (0x0008_0060, Vr::CS, "Modality"),
    (0x0008_103E, Vr::LO, "SeriesDescription"),
    (0x0008_1140, Vr::SQ, "ReferencedImageSequence"),
    (0x0010_0010, Vr::PN, "PatientName"),
    (0x0010_0020, Vr::LO, "PatientID"),
    (0x0018_0050, Vr::DS, "SliceThickness"),
    (0x0018_0088, Vr::DS, "SpacingBetweenSlices"),
    (0x0020_000D, Vr::UI, "StudyInstanceUID"),
    (0x0020_000E, Vr::UI, "SeriesInstanceUID"),
    (0x0020_0011, Vr::IS, "SeriesNumber"),
    (0x0020_0013, Vr::IS, "InstanceNumber"),
    (0x0020_0032, Vr::DS, "ImagePositionPatient"),
    (0x0020_0037, Vr::DS, "ImageOrientationPatient"),
    (0x0020_0052, Vr::UI, "FrameOfReferenceUID"),
    (0x0020_1041, Vr::DS, "SliceLocation"),
    (0x0028_0002, Vr::US, "SamplesPerPixel"),
    (0x0028_0004, Vr::CS, "PhotometricInterpretation"),
    (0x0028_0008, Vr::IS, "NumberOfFrames"),
    (0x0028_0010, Vr::US, "Rows"),
    (0x0028_0011, Vr::US, "Columns"),
    (0x0028_0030, Vr::DS, "PixelSpacing"),
    (0x0028_0100, Vr::US, "BitsAllocated"),
    (0x0028_0101, Vr::US, "BitsStored"),
    (0x0028_0102, Vr::US, "HighBit"),
    (0x0028_0103, Vr::US, "PixelRepresentation"),
    (0x0028_1050, Vr::DS, "WindowCenter"),
    (0x0028_1051, Vr::DS, "WindowWidth"),
    (0x0028_1052, Vr::DS, "RescaleIntercept"),
    (0x0028_1053, Vr::DS, "RescaleSlope"),
    (0x0028_1054, Vr::LO, "RescaleType"),
    (0x3006_0020, Vr::SQ, "StructureSetROISequence"),
    (0x3006_0039, Vr::SQ, "ROIContourSequence"),
    (0x3006_0040, Vr::SQ, "ContourSequence"),
    (0x3006_0050, Vr::DS, "ContourData"),
    (0x7FE0_0010, Vr::OW, "PixelData"),
    (0xFFFE_E000, Vr::UN, "Item"),
    (0xFFFE_E00D, Vr::UN, "ItemDelimitationItem"),
    (0xFFFE_E0DD, Vr::UN, "SequenceDelimitationItem"),
];

fn entry(tag: Tag) -> Option<&'static (u32, Vr, &'static str)> {
    ENTRIES
        .binary_search_by_key(&tag.packed(), |(packed, _, _)| *packed)
        .ok()
        .map(|idx| &ENTRIES[idx])
}

/// VR used for `tag` when the stream does not declare one.
pub fn lookup_vr(tag: Tag) -> Vr {
    if tag.element() == 0x0000 && !tag.is_delimiter() {
        return Vr::UL;
    }
    entry(tag)
        .map(|(_, vr, _)| *vr)
        .or_else(|| standard_vr(tag))
        .unwrap_or(Vr::UN)
}

/// VR from the standard data dictionary. Context dependent VRs resolve to
/// their 16-bit word form.
fn standard_vr(tag: Tag) -> Option<Vr> {
    let entry = StandardDataDictionary.by_tag(dicom_core::Tag(tag.0, tag.1))?;
    let vr = match entry.vr {
        VirtualVr::Exact(vr) => vr,
        VirtualVr::Xs => VR::US,
        _ => VR::OW,
    };
    let code: [u8; 2] = vr.to_string().as_bytes().try_into().ok()?;
    Vr::from_bytes(code)
}

/// Human readable keyword of `tag`, falling back to the standard data dictionary.
pub fn keyword(tag: Tag) -> Option<&'static str> {
    entry(tag).map(|(_, _, name)| *name).or_else(|| {
        StandardDataDictionary
            .by_tag(dicom_core::Tag(tag.0, tag.1))
            .map(|entry| entry.alias)
    })
}
