use std::collections::BTreeMap;
use std::sync::Arc;

use crate::byte_reader::{ByteReader, Endian};
use crate::dictionary::{Tag, Vr};
use crate::parser::DatasetParser;

/// Declared length marking undefined-length sequences and items.
pub const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;

/// Framing of the dataset body, derived from the transfer syntax UID.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferSyntax {
    ImplicitVrLittleEndian,
    ExplicitVrLittleEndian,
    ExplicitVrBigEndian,
    /// No transfer syntax was declared; VR framing is detected per element.
    Detected,
}

impl TransferSyntax {
    pub const IMPLICIT_VR_LE: &'static str = "1.2.840.10008.1.2";
    pub const EXPLICIT_VR_LE: &'static str = "1.2.840.10008.1.2.1";
    pub const EXPLICIT_VR_BE: &'static str = "1.2.840.10008.1.2.2";

    /// Maps a transfer syntax UID to a supported framing. Encapsulated
    /// (compressed) and deflated syntaxes are not supported.
    pub fn from_uid(uid: &str) -> Option<Self> {
        match uid.trim_end_matches(['\0', ' ']) {
            Self::IMPLICIT_VR_LE => Some(Self::ImplicitVrLittleEndian),
            Self::EXPLICIT_VR_LE => Some(Self::ExplicitVrLittleEndian),
            Self::EXPLICIT_VR_BE => Some(Self::ExplicitVrBigEndian),
            _ => None,
        }
    }

    pub fn endian(self) -> Endian {
        match self {
            Self::ExplicitVrBigEndian => Endian::Big,
            _ => Endian::Little,
        }
    }
}

/// One decoded data element.
///
/// Sequence elements skipped by the general walk keep their declared
/// length but carry an empty payload; see [`Dataset::raw_sequence`].
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub tag: Tag,
    pub vr: Vr,
    pub length: u32,
    pub value: Vec<u8>,
}

impl Element {
    pub fn new(tag: Tag, vr: Vr, length: u32, value: Vec<u8>) -> Self {
        Self {
            tag,
            vr,
            length,
            value,
        }
    }

    pub fn is_undefined_length(&self) -> bool {
        self.length == UNDEFINED_LENGTH
    }

    /// The value as text with trailing NUL/space padding removed.
    pub fn to_str(&self) -> String {
        String::from_utf8_lossy(&self.value)
            .trim_matches(|c: char| c == '\0' || c.is_whitespace())
            .to_string()
    }

    /// Backslash-separated numeric values (`DS`/`IS`) or binary floats/ints.
    pub fn to_multi_f64(&self, endian: Endian) -> Vec<f64> {
        match self.vr {
            Vr::FD | Vr::OD => read_binary(&self.value, 8, |r, o| r.read_f64(o, endian)),
            Vr::FL | Vr::OF => read_binary(&self.value, 4, |r, o| r.read_f32(o, endian) as f64),
            Vr::US | Vr::OW => read_binary(&self.value, 2, |r, o| r.read_u16(o, endian) as f64),
            Vr::SS => read_binary(&self.value, 2, |r, o| r.read_i16(o, endian) as f64),
            Vr::UL | Vr::OL => read_binary(&self.value, 4, |r, o| r.read_u32(o, endian) as f64),
            Vr::SL => read_binary(&self.value, 4, |r, o| r.read_i32(o, endian) as f64),
            _ => self
                .to_str()
                .split('\\')
                .filter_map(|part| part.trim().parse::<f64>().ok())
                .collect(),
        }
    }

    pub fn to_f64(&self, endian: Endian) -> Option<f64> {
        self.to_multi_f64(endian).first().copied()
    }

    /// Integer value; binary VRs are read directly, text VRs are parsed.
    pub fn to_u32(&self, endian: Endian) -> Option<u32> {
        let reader = ByteReader::new(&self.value);
        match self.vr {
            Vr::US | Vr::SS | Vr::OW if reader.has(0, 2) => Some(reader.read_u16(0, endian) as u32),
            Vr::UL | Vr::SL if reader.has(0, 4) => Some(reader.read_u32(0, endian)),
            // Implicit VR dictionary misses end up as UN; guess from the width.
            Vr::UN if self.value.len() == 2 => Some(reader.read_u16(0, endian) as u32),
            Vr::UN if self.value.len() == 4 => Some(reader.read_u32(0, endian)),
            _ => self.to_f64(endian).filter(|v| *v >= 0.0).map(|v| v as u32),
        }
    }
}

fn read_binary(value: &[u8], width: usize, read: impl Fn(&ByteReader<'_>, usize) -> f64) -> Vec<f64> {
    let reader = ByteReader::new(value);
    (0..value.len() / width)
        .map(|i| read(&reader, i * width))
        .collect()
}

/// Tag to element mapping of one parsed file.
#[derive(Clone, Debug)]
pub struct Dataset {
    elements: BTreeMap<Tag, Element>,
    transfer_syntax: TransferSyntax,
    source: Option<Arc<[u8]>>,
    conformant: bool,
    truncated: bool,
}

impl Dataset {
    pub(crate) fn new(
        elements: BTreeMap<Tag, Element>,
        transfer_syntax: TransferSyntax,
        source: Option<Arc<[u8]>>,
    ) -> Self {
        Self {
            elements,
            transfer_syntax,
            source,
            conformant: true,
            truncated: false,
        }
    }

    pub(crate) fn set_conformant(&mut self, conformant: bool) {
        self.conformant = conformant;
    }

    pub(crate) fn set_truncated(&mut self, truncated: bool) {
        self.truncated = truncated;
    }

    /// False when the file lacked the `DICM` signature at offset 128.
    pub fn is_conformant(&self) -> bool {
        self.conformant
    }

    /// True when a declared length overran the buffer and parsing stopped early.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn transfer_syntax(&self) -> TransferSyntax {
        self.transfer_syntax
    }

    /// Byte order of body values; meta group values are always little endian.
    pub fn endian_of(&self, tag: Tag) -> Endian {
        if tag.group() == 0x0002 {
            Endian::Little
        } else {
            self.transfer_syntax.endian()
        }
    }

    pub fn element(&self, tag: Tag) -> Option<&Element> {
        self.elements.get(&tag)
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.elements.contains_key(&tag)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    pub fn string(&self, tag: Tag) -> Option<String> {
        self.element(tag)
            .map(Element::to_str)
            .filter(|value| !value.is_empty())
    }

    pub fn f64(&self, tag: Tag) -> Option<f64> {
        self.element(tag)?.to_f64(self.endian_of(tag))
    }

    pub fn multi_f64(&self, tag: Tag) -> Option<Vec<f64>> {
        let values = self.element(tag)?.to_multi_f64(self.endian_of(tag));
        (!values.is_empty()).then_some(values)
    }

    pub fn u32(&self, tag: Tag) -> Option<u32> {
        self.element(tag)?.to_u32(self.endian_of(tag))
    }

    pub fn u16(&self, tag: Tag) -> Option<u16> {
        self.u32(tag).and_then(|v| u16::try_from(v).ok())
    }

    pub fn i32(&self, tag: Tag) -> Option<i32> {
        self.f64(tag).map(|v| v.round() as i32)
    }

    /// Raw nested bytes of a sequence the general walk skipped, recovered by
    /// rescanning the source buffer.
    pub fn raw_sequence(&self, tag: Tag) -> Option<Element> {
        if let Some(element) = self.element(tag).filter(|e| !e.value.is_empty()) {
            return Some(element.clone());
        }
        let source = self.source.as_deref()?;
        DatasetParser::find_raw_element(source, tag)
    }
}
