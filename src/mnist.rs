//! IDX dataset file reading
//!
//! This module reads the IDX binary format used by the MNIST dataset: a
//! four-byte header (two zero bytes, an element type byte, a dimension count),
//! big-endian u32 dimensions, then the raw unsigned-byte payload. Only the
//! unsigned-byte element type (0x08) is supported, which covers both the
//! image files (3 dimensions) and the label files (1 dimension).
//!
//! Malformed or truncated files are reported as recoverable errors; the
//! driver decides whether to abort.

use std::error::Error;
use std::fs;

/// Element type tag for unsigned bytes in an IDX header.
const IDX_TYPE_U8: u8 = 0x08;

/// An IDX file loaded fully into memory.
#[derive(Debug)]
pub struct IdxFile {
    dims: Vec<usize>,
    data: Vec<u8>,
}

fn invalid_data(message: String) -> Box<dyn Error> {
    Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        message,
    ))
}

// Read a big-endian u32 and advance the byte offset (IDX format uses BE).
fn read_be_u32(data: &[u8], offset: &mut usize) -> u32 {
    let b0 = (data[*offset] as u32) << 24;
    let b1 = (data[*offset + 1] as u32) << 16;
    let b2 = (data[*offset + 2] as u32) << 8;
    let b3 = data[*offset + 3] as u32;
    *offset += 4;
    b0 | b1 | b2 | b3
}

impl IdxFile {
    /// Parse an IDX file from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the magic bytes or element type are wrong, the
    /// dimension count is zero, or the payload is shorter than the header's
    /// dimensions promise.
    pub fn parse(bytes: &[u8]) -> Result<Self, Box<dyn Error>> {
        if bytes.len() < 4 {
            return Err(invalid_data("IDX header is truncated".to_string()));
        }
        if bytes[0] != 0 || bytes[1] != 0 {
            return Err(invalid_data(format!(
                "bad IDX magic bytes: {:#04x} {:#04x}",
                bytes[0], bytes[1]
            )));
        }
        if bytes[2] != IDX_TYPE_U8 {
            return Err(invalid_data(format!(
                "unsupported IDX element type {:#04x} (only unsigned byte is supported)",
                bytes[2]
            )));
        }
        let ndims = bytes[3] as usize;
        if ndims == 0 {
            return Err(invalid_data("IDX dimension count is zero".to_string()));
        }

        let mut offset = 4usize;
        if bytes.len() < offset + 4 * ndims {
            return Err(invalid_data("IDX dimension list is truncated".to_string()));
        }
        let mut dims = Vec::with_capacity(ndims);
        let mut nbytes = 1usize;
        for _ in 0..ndims {
            let size = read_be_u32(bytes, &mut offset) as usize;
            nbytes *= size;
            dims.push(size);
        }

        if bytes.len() < offset + nbytes {
            return Err(invalid_data(format!(
                "IDX payload is truncated: expected {} bytes, found {}",
                nbytes,
                bytes.len() - offset
            )));
        }

        Ok(Self {
            dims,
            data: bytes[offset..offset + nbytes].to_vec(),
        })
    }

    /// Read and parse an IDX file from disk.
    pub fn open(path: &str) -> Result<Self, Box<dyn Error>> {
        let bytes = fs::read(path)?;
        Self::parse(&bytes)
    }

    /// Get the number of dimensions.
    pub fn ndims(&self) -> usize {
        self.dims.len()
    }

    /// Get the size of dimension `i`.
    pub fn dim(&self, i: usize) -> usize {
        self.dims[i]
    }

    /// Get the number of records (the size of the first dimension).
    pub fn num_records(&self) -> usize {
        self.dims[0]
    }

    /// Get the flattened length of one record (product of the remaining
    /// dimensions; 1 for a label file).
    pub fn record_len(&self) -> usize {
        self.dims[1..].iter().product()
    }

    /// Get the i-th record of a one-dimensional (label) file.
    pub fn label(&self, i: usize) -> u8 {
        assert_eq!(self.ndims(), 1, "label() requires a one-dimensional file");
        self.data[i]
    }

    /// Get the i-th record of a multi-dimensional file as a flat byte slice.
    pub fn record(&self, i: usize) -> &[u8] {
        assert!(
            self.ndims() >= 2,
            "record() requires a multi-dimensional file"
        );
        let n = self.record_len();
        &self.data[i * n..(i + 1) * n]
    }

    /// Copy the i-th record into `out` as floats normalized to [0, 1].
    pub fn record_normalized(&self, i: usize, out: &mut [f64]) {
        let record = self.record(i);
        assert_eq!(
            out.len(),
            record.len(),
            "output buffer length must match the record length"
        );
        for (value, &byte) in out.iter_mut().zip(record.iter()) {
            *value = byte as f64 / 255.0;
        }
    }
}
