use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Byte order of multi-byte values in a buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

/// Lenient primitive reader over a byte buffer.
///
/// Reads that would span past the end of the buffer yield zero instead of
/// failing. Callers that need strictness check lengths with [`ByteReader::has`]
/// first.
#[derive(Clone, Copy, Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether `len` bytes starting at `offset` are inside the buffer.
    pub fn has(&self, offset: usize, len: usize) -> bool {
        offset
            .checked_add(len)
            .is_some_and(|end| end <= self.data.len())
    }

    pub fn remaining(&self, offset: usize) -> usize {
        self.data.len().saturating_sub(offset)
    }

    /// Up to `len` bytes from `offset`, truncated at the buffer end.
    pub fn slice(&self, offset: usize, len: usize) -> &'a [u8] {
        let start = offset.min(self.data.len());
        let end = start.saturating_add(len).min(self.data.len());
        &self.data[start..end]
    }

    #[inline]
    fn bytes(&self, offset: usize, len: usize) -> Option<&'a [u8]> {
        self.has(offset, len).then(|| &self.data[offset..offset + len])
    }

    pub fn read_u8(&self, offset: usize) -> u8 {
        self.data.get(offset).copied().unwrap_or(0)
    }

    pub fn read_u16(&self, offset: usize, endian: Endian) -> u16 {
        self.bytes(offset, 2).map_or(0, |b| match endian {
            Endian::Little => LittleEndian::read_u16(b),
            Endian::Big => BigEndian::read_u16(b),
        })
    }

    pub fn read_u32(&self, offset: usize, endian: Endian) -> u32 {
        self.bytes(offset, 4).map_or(0, |b| match endian {
            Endian::Little => LittleEndian::read_u32(b),
            Endian::Big => BigEndian::read_u32(b),
        })
    }

    pub fn read_i16(&self, offset: usize, endian: Endian) -> i16 {
        self.bytes(offset, 2).map_or(0, |b| match endian {
            Endian::Little => LittleEndian::read_i16(b),
            Endian::Big => BigEndian::read_i16(b),
        })
    }

    pub fn read_i32(&self, offset: usize, endian: Endian) -> i32 {
        self.bytes(offset, 4).map_or(0, |b| match endian {
            Endian::Little => LittleEndian::read_i32(b),
            Endian::Big => BigEndian::read_i32(b),
        })
    }

    pub fn read_f32(&self, offset: usize, endian: Endian) -> f32 {
        self.bytes(offset, 4).map_or(0.0, |b| match endian {
            Endian::Little => LittleEndian::read_f32(b),
            Endian::Big => BigEndian::read_f32(b),
        })
    }

    pub fn read_f64(&self, offset: usize, endian: Endian) -> f64 {
        self.bytes(offset, 8).map_or(0.0, |b| match endian {
            Endian::Little => LittleEndian::read_f64(b),
            Endian::Big => BigEndian::read_f64(b),
        })
    }
}
