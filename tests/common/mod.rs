//! Builders for synthetic DICOM Part 10 files.
#![allow(dead_code)]

use dicom_mpr::byte_reader::Endian;
use dicom_mpr::dataset::{TransferSyntax, UNDEFINED_LENGTH};
use dicom_mpr::dictionary::{Tag, tags};

fn put_u16(out: &mut Vec<u8>, value: u16, endian: Endian) {
    match endian {
        Endian::Little => out.extend_from_slice(&value.to_le_bytes()),
        Endian::Big => out.extend_from_slice(&value.to_be_bytes()),
    }
}

fn put_u32(out: &mut Vec<u8>, value: u32, endian: Endian) {
    match endian {
        Endian::Little => out.extend_from_slice(&value.to_le_bytes()),
        Endian::Big => out.extend_from_slice(&value.to_be_bytes()),
    }
}

fn is_long(vr: &[u8; 2]) -> bool {
    matches!(
        vr,
        b"OB" | b"OD" | b"OF" | b"OL" | b"OV" | b"OW" | b"SQ" | b"UC" | b"UN" | b"UR" | b"UT" | b"UV"
    )
}

/// Explicit VR element header and value; `length` overrides the value length.
pub fn explicit_with_length(
    tag: Tag,
    vr: &[u8; 2],
    length: u32,
    value: &[u8],
    endian: Endian,
) -> Vec<u8> {
    let mut out = Vec::new();
    put_u16(&mut out, tag.0, endian);
    put_u16(&mut out, tag.1, endian);
    out.extend_from_slice(vr);
    if is_long(vr) {
        out.extend_from_slice(&[0, 0]);
        put_u32(&mut out, length, endian);
    } else {
        put_u16(&mut out, length as u16, endian);
    }
    out.extend_from_slice(value);
    out
}

pub fn explicit(tag: Tag, vr: &[u8; 2], value: &[u8]) -> Vec<u8> {
    explicit_with_length(tag, vr, value.len() as u32, value, Endian::Little)
}

pub fn explicit_be(tag: Tag, vr: &[u8; 2], value: &[u8]) -> Vec<u8> {
    explicit_with_length(tag, vr, value.len() as u32, value, Endian::Big)
}

pub fn implicit(tag: Tag, value: &[u8]) -> Vec<u8> {
    implicit_with_length(tag, value.len() as u32, value)
}

pub fn implicit_with_length(tag: Tag, length: u32, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    put_u16(&mut out, tag.0, Endian::Little);
    put_u16(&mut out, tag.1, Endian::Little);
    put_u32(&mut out, length, Endian::Little);
    out.extend_from_slice(value);
    out
}

/// Item or delimiter header, `(FFFE,xxxx)` followed by a 4-byte length.
pub fn delimiter(tag: Tag, length: u32) -> Vec<u8> {
    implicit_with_length(tag, length, &[])
}

pub fn undefined_sequence_header(tag: Tag) -> Vec<u8> {
    explicit_with_length(tag, b"SQ", UNDEFINED_LENGTH, &[], Endian::Little)
}

/// Text value padded to even length.
pub fn text(value: &str) -> Vec<u8> {
    let mut out = value.as_bytes().to_vec();
    if out.len() % 2 == 1 {
        out.push(b' ');
    }
    out
}

pub fn uid(value: &str) -> Vec<u8> {
    let mut out = value.as_bytes().to_vec();
    if out.len() % 2 == 1 {
        out.push(0);
    }
    out
}

pub fn decimals(values: &[f64]) -> Vec<u8> {
    let joined = values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("\\");
    text(&joined)
}

/// Preamble, signature and a minimal meta group declaring `transfer_syntax`.
pub fn part10(transfer_syntax: &str, body: &[u8]) -> Vec<u8> {
    let mut meta = explicit(tags::MEDIA_STORAGE_SOP_CLASS_UID, b"UI", &uid("1.2.840.10008.5.1.4.1.1.2"));
    meta.extend(explicit(tags::TRANSFER_SYNTAX_UID, b"UI", &uid(transfer_syntax)));

    let mut out = vec![0u8; 128];
    out.extend_from_slice(b"DICM");
    out.extend(explicit(
        tags::FILE_META_INFORMATION_GROUP_LENGTH,
        b"UL",
        &(meta.len() as u32).to_le_bytes(),
    ));
    out.extend(meta);
    out.extend_from_slice(body);
    out
}

/// A single-frame 16-bit CT image in explicit VR little endian.
#[derive(Clone, Debug)]
pub struct SliceBuilder {
    pub rows: u16,
    pub columns: u16,
    pub position: Option<[f64; 3]>,
    pub orientation: Option<[f64; 6]>,
    pub pixel_spacing: [f64; 2],
    pub slice_thickness: Option<f64>,
    pub rescale: Option<(f64, f64)>,
    pub instance_number: Option<i32>,
    pub signed: bool,
    pub pixels: Vec<i16>,
    pub transfer_syntax: &'static str,
    pub omit_pixel_data: bool,
}

impl SliceBuilder {
    pub fn new(columns: u16, rows: u16) -> Self {
        Self {
            rows,
            columns,
            position: None,
            orientation: Some([1.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
            pixel_spacing: [1.0, 1.0],
            slice_thickness: None,
            rescale: None,
            instance_number: None,
            signed: true,
            pixels: vec![0; rows as usize * columns as usize],
            transfer_syntax: TransferSyntax::EXPLICIT_VR_LE,
            omit_pixel_data: false,
        }
    }

    pub fn position(mut self, position: [f64; 3]) -> Self {
        self.position = Some(position);
        self
    }

    pub fn orientation(mut self, orientation: [f64; 6]) -> Self {
        self.orientation = Some(orientation);
        self
    }

    pub fn pixel_spacing(mut self, row: f64, column: f64) -> Self {
        self.pixel_spacing = [row, column];
        self
    }

    pub fn slice_thickness(mut self, thickness: f64) -> Self {
        self.slice_thickness = Some(thickness);
        self
    }

    pub fn rescale(mut self, slope: f64, intercept: f64) -> Self {
        self.rescale = Some((slope, intercept));
        self
    }

    pub fn instance_number(mut self, number: i32) -> Self {
        self.instance_number = Some(number);
        self
    }

    pub fn unsigned(mut self) -> Self {
        self.signed = false;
        self
    }

    pub fn fill(mut self, value: i16) -> Self {
        self.pixels.iter_mut().for_each(|p| *p = value);
        self
    }

    /// Pixel at column `x`, row `y` from `f(x, y)`.
    pub fn pixels_from(mut self, f: impl Fn(usize, usize) -> i16) -> Self {
        let columns = self.columns as usize;
        for (i, p) in self.pixels.iter_mut().enumerate() {
            *p = f(i % columns, i / columns);
        }
        self
    }

    pub fn transfer_syntax(mut self, uid: &'static str) -> Self {
        self.transfer_syntax = uid;
        self
    }

    pub fn without_pixel_data(mut self) -> Self {
        self.omit_pixel_data = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend(explicit(tags::MODALITY, b"CS", &text("CT")));
        if let Some(thickness) = self.slice_thickness {
            body.extend(explicit(tags::SLICE_THICKNESS, b"DS", &decimals(&[thickness])));
        }
        if let Some(number) = self.instance_number {
            body.extend(explicit(tags::INSTANCE_NUMBER, b"IS", &text(&number.to_string())));
        }
        if let Some(position) = self.position {
            body.extend(explicit(tags::IMAGE_POSITION_PATIENT, b"DS", &decimals(&position)));
        }
        if let Some(orientation) = self.orientation {
            body.extend(explicit(tags::IMAGE_ORIENTATION_PATIENT, b"DS", &decimals(&orientation)));
        }
        body.extend(explicit(tags::SAMPLES_PER_PIXEL, b"US", &1u16.to_le_bytes()));
        body.extend(explicit(tags::PHOTOMETRIC_INTERPRETATION, b"CS", &text("MONOCHROME2")));
        body.extend(explicit(tags::ROWS, b"US", &self.rows.to_le_bytes()));
        body.extend(explicit(tags::COLUMNS, b"US", &self.columns.to_le_bytes()));
        body.extend(explicit(tags::PIXEL_SPACING, b"DS", &decimals(&self.pixel_spacing)));
        body.extend(explicit(tags::BITS_ALLOCATED, b"US", &16u16.to_le_bytes()));
        body.extend(explicit(tags::BITS_STORED, b"US", &16u16.to_le_bytes()));
        body.extend(explicit(tags::HIGH_BIT, b"US", &15u16.to_le_bytes()));
        body.extend(explicit(
            tags::PIXEL_REPRESENTATION,
            b"US",
            &(self.signed as u16).to_le_bytes(),
        ));
        body.extend(explicit(tags::WINDOW_CENTER, b"DS", &decimals(&[40.0])));
        body.extend(explicit(tags::WINDOW_WIDTH, b"DS", &decimals(&[400.0])));
        if let Some((slope, intercept)) = self.rescale {
            body.extend(explicit(tags::RESCALE_INTERCEPT, b"DS", &decimals(&[intercept])));
            body.extend(explicit(tags::RESCALE_SLOPE, b"DS", &decimals(&[slope])));
        }
        if !self.omit_pixel_data {
            let bytes: Vec<u8> = self.pixels.iter().flat_map(|p| p.to_le_bytes()).collect();
            body.extend(explicit(tags::PIXEL_DATA, b"OW", &bytes));
        }
        part10(self.transfer_syntax, &body)
    }
}
