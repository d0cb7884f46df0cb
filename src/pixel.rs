use crate::byte_reader::{ByteReader, Endian};
use crate::dataset::Dataset;
use crate::dictionary::tags;
use crate::error::ParseError;

/// Raw, uncompressed single-channel pixel samples of one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    rows: usize,
    columns: usize,
    bits_allocated: u16,
    bits_stored: u16,
    signed: bool,
    endian: Endian,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wraps raw pixel bytes, rejecting unsupported depths and undersized payloads.
    pub fn new(
        rows: usize,
        columns: usize,
        bits_allocated: u16,
        bits_stored: u16,
        signed: bool,
        endian: Endian,
        data: Vec<u8>,
    ) -> Result<Self, ParseError> {
        if !matches!(bits_allocated, 8 | 16) {
            return Err(ParseError::UnsupportedEncoding(format!(
                "{bits_allocated} bits allocated"
            )));
        }
        if rows == 0 || columns == 0 {
            return Err(ParseError::MissingRequiredField("Rows/Columns"));
        }
        let needed = rows * columns * (bits_allocated as usize / 8);
        if data.len() < needed {
            return Err(ParseError::MissingRequiredField("PixelData"));
        }
        Ok(Self {
            rows,
            columns,
            bits_allocated,
            bits_stored: bits_stored.clamp(1, bits_allocated),
            signed,
            endian,
            data,
        })
    }

    /// Extracts the first frame of the pixel data element of `dataset`.
    pub fn from_dataset(dataset: &Dataset) -> Result<Self, ParseError> {
        let rows = dataset
            .u16(tags::ROWS)
            .ok_or(ParseError::MissingRequiredField("Rows"))?;
        let columns = dataset
            .u16(tags::COLUMNS)
            .ok_or(ParseError::MissingRequiredField("Columns"))?;
        let samples_per_pixel = dataset.u16(tags::SAMPLES_PER_PIXEL).unwrap_or(1);
        if samples_per_pixel != 1 {
            return Err(ParseError::UnsupportedEncoding(format!(
                "{samples_per_pixel} samples per pixel"
            )));
        }
        let bits_allocated = dataset.u16(tags::BITS_ALLOCATED).unwrap_or(16);
        let bits_stored = dataset.u16(tags::BITS_STORED).unwrap_or(bits_allocated);
        let signed = dataset.u16(tags::PIXEL_REPRESENTATION).unwrap_or(0) == 1;

        let element = dataset
            .element(tags::PIXEL_DATA)
            .ok_or(ParseError::MissingRequiredField("PixelData"))?;
        if element.is_undefined_length() {
            return Err(ParseError::UnsupportedEncoding(
                "encapsulated pixel data".to_string(),
            ));
        }

        let frame_len = rows as usize * columns as usize * (bits_allocated as usize / 8);
        let data = element.value[..element.value.len().min(frame_len)].to_vec();
        Self::new(
            rows as usize,
            columns as usize,
            bits_allocated,
            bits_stored,
            signed,
            dataset.endian_of(tags::PIXEL_DATA),
            data,
        )
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn bits_allocated(&self) -> u16 {
        self.bits_allocated
    }

    pub fn bits_stored(&self) -> u16 {
        self.bits_stored
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn len(&self) -> usize {
        self.rows * self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn raw(&self) -> &[u8] {
        &self.data
    }

    fn stored_mask(&self) -> u16 {
        if self.bits_stored >= 16 {
            u16::MAX
        } else {
            (1u16 << self.bits_stored) - 1
        }
    }

    /// Samples as unsigned values with bits above `bits_stored` cleared.
    pub fn samples_u16(&self) -> Vec<u16> {
        let mask = self.stored_mask();
        match self.bits_allocated {
            8 => self.data[..self.len()]
                .iter()
                .map(|&b| b as u16 & mask)
                .collect(),
            _ => {
                let reader = ByteReader::new(&self.data);
                (0..self.len())
                    .map(|i| reader.read_u16(i * 2, self.endian) & mask)
                    .collect()
            }
        }
    }

    /// Samples as signed values.
    ///
    /// Signed data is sign-extended from `bits_stored`. Unsigned values above
    /// `i16::MAX` saturate instead of wrapping.
    pub fn samples_i16(&self) -> Vec<i16> {
        let samples = self.samples_u16();
        if self.signed {
            let sign_bit = 1u16 << (self.bits_stored - 1);
            let extend = !self.stored_mask();
            samples
                .into_iter()
                .map(|v| {
                    if v & sign_bit != 0 {
                        (v | extend) as i16
                    } else {
                        v as i16
                    }
                })
                .collect()
        } else {
            samples
                .into_iter()
                .map(|v| v.min(i16::MAX as u16) as i16)
                .collect()
        }
    }
}
