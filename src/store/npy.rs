//! NumPy `.npy` (format version 1.0) encoding and decoding.
//!
//! Only what the embedding pair needs is supported: C-ordered,
//! little-endian `<i8`/`<i4` integer vectors and `<f4`/`<f8` float vectors or
//! matrices. Files written here load with `numpy.load` unchanged.

use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use memmap2::Mmap;
use regex::Regex;

use crate::error::{PokembedError, Result};

const MAGIC: &[u8; 6] = b"\x93NUMPY";
/// Header block (magic + version + length + dict) is padded to this many bytes.
const HEADER_ALIGN: usize = 64;

/// Element type of an array on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    Int32,
    Int64,
    Float32,
    Float64,
}

impl Dtype {
    fn descr(self) -> &'static str {
        match self {
            Dtype::Int32 => "<i4",
            Dtype::Int64 => "<i8",
            Dtype::Float32 => "<f4",
            Dtype::Float64 => "<f8",
        }
    }

    fn from_descr(descr: &str) -> Result<Self> {
        match descr {
            "<i4" => Ok(Dtype::Int32),
            "<i8" => Ok(Dtype::Int64),
            "<f4" => Ok(Dtype::Float32),
            "<f8" => Ok(Dtype::Float64),
            other => Err(PokembedError::format(format!(
                "unsupported npy dtype {other:?}"
            ))),
        }
    }

    fn size(self) -> usize {
        match self {
            Dtype::Int32 | Dtype::Float32 => 4,
            Dtype::Int64 | Dtype::Float64 => 8,
        }
    }
}

/// Decoded array payload.
#[derive(Debug, Clone, PartialEq)]
pub enum NpyData {
    Int(Vec<i64>),
    Float(Vec<f32>),
}

/// A decoded array with its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub dtype: Dtype,
    pub data: NpyData,
}

impl NpyArray {
    /// The payload as integers, widening `<i4`.
    pub fn into_ints(self) -> Result<Vec<i64>> {
        match self.data {
            NpyData::Int(values) => Ok(values),
            NpyData::Float(_) => Err(PokembedError::format(format!(
                "expected an integer array, found {}",
                self.dtype.descr()
            ))),
        }
    }

    /// The payload as `f32`, narrowing `<f8`.
    pub fn into_floats(self) -> Result<Vec<f32>> {
        match self.data {
            NpyData::Float(values) => Ok(values),
            NpyData::Int(_) => Err(PokembedError::format(format!(
                "expected a float array, found {}",
                self.dtype.descr()
            ))),
        }
    }
}

fn header_text(dtype: Dtype, shape: &[usize]) -> String {
    let dims = match shape {
        [n] => format!("({n},)"),
        _ => format!(
            "({})",
            shape
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    };
    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        dtype.descr(),
        dims
    );

    // magic(6) + version(2) + header length(2) + header + '\n'
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    header.extend(std::iter::repeat_n(' ', padding));
    header.push('\n');
    header
}

fn write_header<W: Write>(out: &mut W, dtype: Dtype, shape: &[usize]) -> Result<()> {
    let header = header_text(dtype, shape);
    let len = u16::try_from(header.len())
        .map_err(|_| PokembedError::format("npy header too long"))?;
    out.write_all(MAGIC)?;
    out.write_all(&[1, 0])?;
    out.write_u16::<LittleEndian>(len)?;
    out.write_all(header.as_bytes())?;
    Ok(())
}

/// Encode a 1-D `<i8` array.
pub fn encode_ids(ids: &[i64]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(HEADER_ALIGN * 2 + ids.len() * 8);
    write_header(&mut out, Dtype::Int64, &[ids.len()])?;
    for id in ids {
        out.write_i64::<LittleEndian>(*id)?;
    }
    Ok(out)
}

/// Encode a row-major 2-D `<f4` array of shape `rows x cols`.
pub fn encode_matrix(rows: usize, cols: usize, values: &[f32]) -> Result<Vec<u8>> {
    if rows * cols != values.len() {
        return Err(PokembedError::format(format!(
            "shape ({rows}, {cols}) does not match {} values",
            values.len()
        )));
    }
    let mut out = Vec::with_capacity(HEADER_ALIGN * 2 + values.len() * 4);
    write_header(&mut out, Dtype::Float32, &[rows, cols])?;
    for value in values {
        out.write_f32::<LittleEndian>(*value)?;
    }
    Ok(out)
}

struct Header {
    dtype: Dtype,
    shape: Vec<usize>,
}

fn parse_header(text: &str) -> Result<Header> {
    let descr = Regex::new(r"'descr'\s*:\s*'([^']+)'")
        .map_err(|e| PokembedError::other(e.to_string()))?;
    let fortran = Regex::new(r"'fortran_order'\s*:\s*(True|False)")
        .map_err(|e| PokembedError::other(e.to_string()))?;
    let shape = Regex::new(r"'shape'\s*:\s*\(([^)]*)\)")
        .map_err(|e| PokembedError::other(e.to_string()))?;

    let dtype = descr
        .captures(text)
        .ok_or_else(|| PokembedError::format("npy header has no descr"))?;
    let dtype = Dtype::from_descr(&dtype[1])?;

    match fortran.captures(text) {
        Some(caps) if &caps[1] == "False" => {}
        Some(_) => return Err(PokembedError::format("fortran-ordered arrays are not supported")),
        None => return Err(PokembedError::format("npy header has no fortran_order")),
    }

    let dims = shape
        .captures(text)
        .ok_or_else(|| PokembedError::format("npy header has no shape"))?;
    let shape = dims[1]
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| {
            d.parse::<usize>()
                .map_err(|e| PokembedError::format(format!("bad npy dimension {d:?}: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Header { dtype, shape })
}

/// Decode an in-memory `.npy` file.
pub fn decode(bytes: &[u8]) -> Result<NpyArray> {
    let mut cursor = Cursor::new(bytes);

    let mut magic = [0u8; 6];
    cursor
        .read_exact(&mut magic)
        .map_err(|_| PokembedError::format("file too short for npy magic"))?;
    if &magic != MAGIC {
        return Err(PokembedError::format("not an npy file"));
    }

    let major = cursor.read_u8()?;
    let _minor = cursor.read_u8()?;
    let header_len = match major {
        1 => cursor.read_u16::<LittleEndian>()? as usize,
        2 | 3 => cursor.read_u32::<LittleEndian>()? as usize,
        other => {
            return Err(PokembedError::format(format!(
                "unsupported npy version {other}"
            )));
        }
    };

    let start = cursor.position() as usize;
    let end = start.saturating_add(header_len);
    if end > bytes.len() {
        return Err(PokembedError::format("truncated npy header"));
    }
    let text = std::str::from_utf8(&bytes[start..end])
        .map_err(|e| PokembedError::format(format!("npy header is not UTF-8: {e}")))?;
    let header = parse_header(text)?;

    let count = header
        .shape
        .iter()
        .try_fold(1usize, |acc, dim| acc.checked_mul(*dim));
    let needed = count.and_then(|count| count.checked_mul(header.dtype.size()));
    let (Some(count), Some(needed)) = (count, needed) else {
        return Err(PokembedError::format(format!(
            "npy shape {:?} is too large",
            header.shape
        )));
    };
    let payload = &bytes[end..];
    if payload.len() != needed {
        return Err(PokembedError::format(format!(
            "npy payload holds {} bytes, shape {:?} needs {needed}",
            payload.len(),
            header.shape
        )));
    }

    let mut reader = Cursor::new(payload);
    let data = match header.dtype {
        Dtype::Int32 => NpyData::Int(
            (0..count)
                .map(|_| reader.read_i32::<LittleEndian>().map(i64::from))
                .collect::<std::io::Result<_>>()?,
        ),
        Dtype::Int64 => NpyData::Int(
            (0..count)
                .map(|_| reader.read_i64::<LittleEndian>())
                .collect::<std::io::Result<_>>()?,
        ),
        Dtype::Float32 => NpyData::Float(
            (0..count)
                .map(|_| reader.read_f32::<LittleEndian>())
                .collect::<std::io::Result<_>>()?,
        ),
        Dtype::Float64 => NpyData::Float(
            (0..count)
                .map(|_| reader.read_f64::<LittleEndian>().map(|v| v as f32))
                .collect::<std::io::Result<_>>()?,
        ),
    };

    Ok(NpyArray {
        shape: header.shape,
        dtype: header.dtype,
        data,
    })
}

/// Memory-map and decode a `.npy` file.
pub fn read<P: AsRef<Path>>(path: P) -> Result<NpyArray> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PokembedError::not_found(path),
        _ => PokembedError::Io(e),
    })?;

    if file.metadata()?.len() == 0 {
        return Err(PokembedError::format(format!("{} is empty", path.display())));
    }

    // SAFETY: the map is read-only and dropped before this function returns
    let mmap = unsafe { Mmap::map(&file)? };
    decode(&mmap)
}
