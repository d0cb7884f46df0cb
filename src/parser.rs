use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, warn};

use crate::byte_reader::{ByteReader, Endian};
use crate::dataset::{Dataset, Element, TransferSyntax, UNDEFINED_LENGTH};
use crate::dictionary::{self, Tag, Vr, tags};
use crate::error::ParseError;

const PREAMBLE_LEN: usize = 128;
const SIGNATURE: &[u8; 4] = b"DICM";
/// How far into a file the fallback signature scan looks.
const SIGNATURE_SCAN_LIMIT: usize = 1024;

/// How value representations are framed in the stream being walked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Framing {
    Implicit,
    Explicit,
    /// Peek at each element and decide.
    Detect,
}

#[derive(Clone, Copy, Debug)]
struct Header {
    tag: Tag,
    vr: Vr,
    length: u32,
    header_len: usize,
}

/// Result of reading one element at a cursor position.
#[derive(Debug)]
struct Step {
    element: Element,
    next: usize,
    truncated: bool,
}

/// Extent of an undefined-length value.
#[derive(Debug, PartialEq, Eq)]
struct Span {
    /// End of the content, excluding the closing delimiter.
    content_end: usize,
    /// Offset just past the closing delimiter.
    next: usize,
    truncated: bool,
}

/// Where the dataset starts and whether the file carried a proper signature.
struct BodyStart {
    offset: usize,
    conformant: bool,
}

/// Cursor-driven walker over a tag-length-value byte stream.
pub struct DatasetParser<'a> {
    reader: ByteReader<'a>,
    framing: Framing,
    endian: Endian,
}

impl<'a> DatasetParser<'a> {
    fn new(data: &'a [u8], framing: Framing, endian: Endian) -> Self {
        Self {
            reader: ByteReader::new(data),
            framing,
            endian,
        }
    }

    fn for_body(data: &'a [u8], transfer_syntax: TransferSyntax) -> Self {
        let framing = match transfer_syntax {
            TransferSyntax::ImplicitVrLittleEndian => Framing::Implicit,
            TransferSyntax::ExplicitVrLittleEndian | TransferSyntax::ExplicitVrBigEndian => {
                Framing::Explicit
            }
            TransferSyntax::Detected => Framing::Detect,
        };
        Self::new(data, framing, transfer_syntax.endian())
    }

    /// Parses a complete file into a [`Dataset`].
    ///
    /// Sequence bodies are skipped; use [`Dataset::raw_sequence`] or
    /// [`DatasetParser::find_raw_element`] to recover one.
    pub fn parse(bytes: &[u8]) -> Result<Dataset, ParseError> {
        Self::parse_shared(Arc::from(bytes))
    }

    /// Like [`DatasetParser::parse`], keeping `source` alive inside the dataset.
    pub fn parse_shared(source: Arc<[u8]>) -> Result<Dataset, ParseError> {
        let data: &[u8] = &source;
        let start = locate_body_start(data)?;
        let (mut elements, body_offset) = read_meta_group(data, start.offset);
        let transfer_syntax = transfer_syntax_of(&elements)?;
        debug!(
            "dataset body at {} framed as {:?} (conformant: {})",
            body_offset, transfer_syntax, start.conformant
        );

        let parser = DatasetParser::for_body(data, transfer_syntax);
        let mut offset = body_offset;
        let mut truncated = false;
        while let Some(step) = parser.next_element(offset, None) {
            offset = step.next;
            if !step.element.tag.is_delimiter() {
                elements.insert(step.element.tag, step.element);
            }
            if step.truncated {
                truncated = true;
                break;
            }
        }

        let mut dataset = Dataset::new(elements, transfer_syntax, Some(source.clone()));
        dataset.set_conformant(start.conformant);
        dataset.set_truncated(truncated);
        Ok(dataset)
    }

    /// Rescans `bytes` for `tag` and returns it with its raw value, including
    /// the nested bytes of sequences that [`DatasetParser::parse`] skips.
    ///
    /// Top level elements are found by walking the dataset. Tags nested inside
    /// other sequences are found by a byte-pattern scan of the whole buffer.
    pub fn find_raw_element(bytes: &[u8], tag: Tag) -> Option<Element> {
        let start = locate_body_start(bytes).ok()?;
        let (meta, body_offset) = read_meta_group(bytes, start.offset);
        if tag.group() == 0x0002 {
            return meta.get(&tag).cloned();
        }
        let transfer_syntax = transfer_syntax_of(&meta).ok()?;
        let parser = DatasetParser::for_body(bytes, transfer_syntax);

        let mut offset = body_offset;
        while let Some(step) = parser.next_element(offset, Some(tag)) {
            if step.element.tag == tag {
                return Some(step.element);
            }
            if step.truncated || (step.element.tag > tag && !step.element.tag.is_delimiter()) {
                break;
            }
            offset = step.next;
        }

        parser.scan_for_nested(body_offset, tag)
    }

    fn read_tag(&self, offset: usize) -> Tag {
        Tag(
            self.reader.read_u16(offset, self.endian),
            self.reader.read_u16(offset + 2, self.endian),
        )
    }

    fn read_header(&self, offset: usize) -> Option<Header> {
        if !self.reader.has(offset, 8) {
            return None;
        }
        let tag = self.read_tag(offset);
        if tag.is_delimiter() {
            return Some(Header {
                tag,
                vr: Vr::UN,
                length: self.reader.read_u32(offset + 4, self.endian),
                header_len: 8,
            });
        }

        let explicit_vr = match self.framing {
            Framing::Implicit => None,
            Framing::Explicit | Framing::Detect => Vr::from_bytes([
                self.reader.read_u8(offset + 4),
                self.reader.read_u8(offset + 5),
            ]),
        };
        if explicit_vr.is_none() && self.framing == Framing::Explicit {
            debug!("{} has no recognizable VR at {}, reading as implicit", tag, offset);
        }

        let header = match explicit_vr {
            Some(vr) if vr.has_long_length() => Header {
                tag,
                vr,
                length: self.reader.read_u32(offset + 8, self.endian),
                header_len: 12,
            },
            Some(vr) => Header {
                tag,
                vr,
                length: self.reader.read_u16(offset + 6, self.endian) as u32,
                header_len: 8,
            },
            None => Header {
                tag,
                vr: dictionary::lookup_vr(tag),
                length: self.reader.read_u32(offset + 4, self.endian),
                header_len: 8,
            },
        };
        Some(header)
    }

    /// Reads the element at `offset`. Sequences and undefined-length values
    /// are skipped unless their tag equals `capture`.
    fn next_element(&self, offset: usize, capture: Option<Tag>) -> Option<Step> {
        let header = self.read_header(offset)?;
        let tag = header.tag;
        let value_start = offset + header.header_len;

        if tag.is_delimiter() {
            return Some(Step {
                element: Element::new(tag, header.vr, header.length, Vec::new()),
                next: value_start,
                truncated: false,
            });
        }

        let keep = capture == Some(tag);
        if header.length == UNDEFINED_LENGTH {
            let span = self.undefined_span(value_start);
            let value = if keep {
                self.reader
                    .slice(value_start, span.content_end.saturating_sub(value_start))
                    .to_vec()
            } else {
                Vec::new()
            };
            // Undefined length only occurs on sequences and encapsulated data.
            let vr = if header.vr == Vr::UN { Vr::SQ } else { header.vr };
            return Some(Step {
                element: Element::new(tag, vr, header.length, value),
                next: span.next,
                truncated: span.truncated,
            });
        }

        let length = header.length as usize;
        let available = self.reader.remaining(value_start);
        let truncated = length > available;
        if truncated {
            warn!(
                "{} declares {} bytes at offset {} but only {} remain, truncating",
                tag, length, offset, available
            );
        }
        let value = if header.vr != Vr::SQ || keep {
            self.reader.slice(value_start, length).to_vec()
        } else {
            Vec::new()
        };
        Some(Step {
            element: Element::new(tag, header.vr, header.length, value),
            next: value_start.saturating_add(length).min(self.reader.len()),
            truncated,
        })
    }

    /// Finds the end of an undefined-length value starting at `start`,
    /// tracking nesting across item and sequence delimiters.
    fn undefined_span(&self, start: usize) -> Span {
        let mut depth = 1usize;
        let mut pos = start;
        while let Some(header) = self.read_header(pos) {
            let body = pos + header.header_len;
            let closes = header.tag == tags::ITEM_DELIMITATION_ITEM
                || header.tag == tags::SEQUENCE_DELIMITATION_ITEM;
            if closes {
                depth -= 1;
                if depth == 0 {
                    return Span {
                        content_end: pos,
                        next: body,
                        truncated: false,
                    };
                }
                pos = body;
            } else if header.length == UNDEFINED_LENGTH {
                // Undefined-length items and nested sequences open a level.
                depth += 1;
                pos = body;
            } else {
                pos = body.saturating_add(header.length as usize);
            }
        }
        warn!(
            "undefined-length value at offset {} is not terminated before end of buffer",
            start
        );
        Span {
            content_end: self.reader.len(),
            next: self.reader.len(),
            truncated: true,
        }
    }

    /// Offset of the top level Pixel Data element, or the buffer end.
    fn pixel_data_offset(&self, from: usize) -> usize {
        let mut offset = from;
        while let Some(step) = self.next_element(offset, None) {
            if step.element.tag == tags::PIXEL_DATA {
                return offset;
            }
            if step.truncated {
                break;
            }
            offset = step.next;
        }
        self.reader.len()
    }

    /// Byte-pattern search for `tag` between `from` and the top level pixel
    /// data, for tags nested inside sequences.
    fn scan_for_nested(&self, from: usize, tag: Tag) -> Option<Element> {
        let end = self.pixel_data_offset(from);
        (from..=end.saturating_sub(8)).find_map(|pos| {
            if self.read_tag(pos) != tag {
                return None;
            }
            // Explicit framing always carries a VR; a match without one is data.
            let vr_bytes = [self.reader.read_u8(pos + 4), self.reader.read_u8(pos + 5)];
            if self.framing == Framing::Explicit && Vr::from_bytes(vr_bytes).is_none() {
                return None;
            }
            let header = self.read_header(pos)?;
            let plausible = header.vr == Vr::SQ
                || header.length == UNDEFINED_LENGTH
                || self.reader.has(pos + header.header_len, header.length as usize);
            if !plausible {
                return None;
            }
            self.next_element(pos, Some(tag)).map(|step| step.element)
        })
    }
}

fn locate_body_start(data: &[u8]) -> Result<BodyStart, ParseError> {
    let standard = PREAMBLE_LEN + SIGNATURE.len();
    if data.get(PREAMBLE_LEN..standard) == Some(SIGNATURE.as_slice()) {
        return Ok(BodyStart {
            offset: standard,
            conformant: true,
        });
    }

    let scan_end = data.len().min(SIGNATURE_SCAN_LIMIT);
    if let Some(pos) = data[..scan_end]
        .windows(SIGNATURE.len())
        .position(|window| window == SIGNATURE)
    {
        warn!("DICM signature found at offset {} instead of {}", pos, PREAMBLE_LEN);
        return Ok(BodyStart {
            offset: pos + SIGNATURE.len(),
            conformant: false,
        });
    }

    // Datasets written without preamble and meta header still start with a
    // low-numbered group.
    let reader = ByteReader::new(data);
    let group = reader.read_u16(0, Endian::Little);
    if reader.has(0, 8) && matches!(group, 0x0002 | 0x0008) {
        warn!("no DICM signature, reading as a bare dataset");
        return Ok(BodyStart {
            offset: 0,
            conformant: false,
        });
    }

    Err(ParseError::MalformedInput("missing DICM signature".to_string()))
}

/// Reads group 0x0002, which is always explicit VR little endian.
fn read_meta_group(data: &[u8], start: usize) -> (BTreeMap<Tag, Element>, usize) {
    let parser = DatasetParser::new(data, Framing::Detect, Endian::Little);
    let mut elements = BTreeMap::new();
    let mut offset = start;
    while let Some(step) = parser.next_element(offset, None) {
        if step.element.tag.group() != 0x0002 {
            break;
        }
        offset = step.next;
        elements.insert(step.element.tag, step.element);
        if step.truncated {
            break;
        }
    }
    (elements, offset)
}

fn transfer_syntax_of(meta: &BTreeMap<Tag, Element>) -> Result<TransferSyntax, ParseError> {
    match meta.get(&tags::TRANSFER_SYNTAX_UID) {
        Some(element) => {
            let uid = element.to_str();
            TransferSyntax::from_uid(&uid).ok_or_else(|| {
                ParseError::UnsupportedEncoding(format!("transfer syntax {uid}"))
            })
        }
        None => Ok(TransferSyntax::Detected),
    }
}
