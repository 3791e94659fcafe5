//! Storage units of grid values and the scale/offset transform between stored and logical values.

use std::ops::Range;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::codec::WriteReport;
use crate::endian::Endianness;
use crate::header::GridHeader;

/// How a single grid value is laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// 4-byte IEEE float.
    Float32(Endianness),
    /// 2-byte two's complement integer.
    Int16(Endianness),
    /// 1-byte unsigned integer.
    UInt8,
    /// One bit per value, first value in the most significant bit.
    Bit,
}

impl Storage {
    /// Bits occupied by one value.
    pub fn bits(&self) -> usize {
        match self {
            Storage::Float32(_) => 32,
            Storage::Int16(_) => 16,
            Storage::UInt8 => 8,
            Storage::Bit => 1,
        }
    }

    /// Bytes needed to hold `values` consecutive values, rounded up to a whole byte.
    pub fn row_bytes(&self, values: usize) -> usize {
        (values * self.bits()).div_ceil(8)
    }

    /// Byte range within a row covering values `first..first + count`.
    pub fn byte_range(&self, first: usize, count: usize) -> Range<usize> {
        let bits = self.bits();
        (first * bits / 8)..((first + count) * bits).div_ceil(8)
    }

    /// Index of the first value stored in the byte at `byte_offset`.
    pub fn first_value_at(&self, byte_offset: usize) -> usize {
        byte_offset * 8 / self.bits()
    }

    /// Smallest and largest storable raw value, `None` for floating-point storage.
    pub fn limits(&self) -> Option<(f64, f64)> {
        match self {
            Storage::Float32(_) => None,
            Storage::Int16(_) => Some((i16::MIN as f64, i16::MAX as f64)),
            Storage::UInt8 => Some((0.0, u8::MAX as f64)),
            Storage::Bit => Some((0.0, 1.0)),
        }
    }

    /// Round-trip `raw` through the storage type, so sentinels compare at storage precision.
    pub fn normalize(&self, raw: f64) -> f64 {
        match self {
            Storage::Float32(_) => raw as f32 as f64,
            _ => match self.limits() {
                Some((lo, hi)) => raw.round().clamp(lo, hi),
                None => raw,
            },
        }
    }

    /// Read value `index` from `bytes`, where `bytes` starts at value 0 (or at the byte
    /// returned by [`byte_range`][Self::byte_range] with the index rebased accordingly).
    ///
    /// Panics if `bytes` is too short; callers size buffers with [`row_bytes`][Self::row_bytes].
    pub fn get(&self, bytes: &[u8], index: usize) -> f64 {
        match self {
            Storage::Float32(Endianness::LittleEndian) => {
                LittleEndian::read_f32(&bytes[index * 4..][..4]) as f64
            }
            Storage::Float32(Endianness::BigEndian) => {
                BigEndian::read_f32(&bytes[index * 4..][..4]) as f64
            }
            Storage::Int16(Endianness::LittleEndian) => {
                LittleEndian::read_i16(&bytes[index * 2..][..2]) as f64
            }
            Storage::Int16(Endianness::BigEndian) => {
                BigEndian::read_i16(&bytes[index * 2..][..2]) as f64
            }
            Storage::UInt8 => bytes[index] as f64,
            Storage::Bit => ((bytes[index / 8] >> (7 - index % 8)) & 1) as f64,
        }
    }

    /// Store raw value `raw` (already rounded and clamped for integer storage) at `index`.
    pub fn put(&self, bytes: &mut [u8], index: usize, raw: f64) {
        match self {
            Storage::Float32(Endianness::LittleEndian) => {
                LittleEndian::write_f32(&mut bytes[index * 4..][..4], raw as f32)
            }
            Storage::Float32(Endianness::BigEndian) => {
                BigEndian::write_f32(&mut bytes[index * 4..][..4], raw as f32)
            }
            Storage::Int16(Endianness::LittleEndian) => {
                LittleEndian::write_i16(&mut bytes[index * 2..][..2], raw as i16)
            }
            Storage::Int16(Endianness::BigEndian) => {
                BigEndian::write_i16(&mut bytes[index * 2..][..2], raw as i16)
            }
            Storage::UInt8 => bytes[index] = raw as u8,
            Storage::Bit => {
                let mask = 1u8 << (7 - index % 8);
                if raw != 0.0 {
                    bytes[index / 8] |= mask;
                } else {
                    bytes[index / 8] &= !mask;
                }
            }
        }
    }
}

/// Converts between stored raw values and logical `f32` values.
#[derive(Debug, Clone, Copy)]
pub struct Quantizer {
    scale: f64,
    offset: f64,
    nan: Option<f64>,
    limits: Option<(f64, f64)>,
}

impl Quantizer {
    /// Transform described by `header`, stored as `storage`.
    pub fn new(header: &GridHeader, storage: Storage) -> Self {
        let nan = header.nan_value.filter(|n| !n.is_nan()).map(|n| storage.normalize(n));
        // keep clamped values away from the sentinel so they never read back as missing
        let limits = storage.limits().map(|(mut lo, mut hi)| {
            if nan == Some(lo) && hi > lo {
                lo += 1.0;
            }
            if nan == Some(hi) && hi > lo {
                hi -= 1.0;
            }
            (lo, hi)
        });
        Self {
            scale: header.scale_factor,
            offset: header.add_offset,
            nan,
            limits,
        }
    }

    /// Representable raw range after excluding the sentinel.
    pub fn limits(&self) -> Option<(f64, f64)> {
        self.limits
    }

    /// Stored value to logical value; the sentinel and NaN become NaN.
    pub fn decode(&self, raw: f64) -> f32 {
        if raw.is_nan() || self.nan == Some(raw) {
            f32::NAN
        } else {
            (raw * self.scale + self.offset) as f32
        }
    }

    /// Logical value to stored value, counting clamped values in `report`.
    pub fn encode(&self, value: f32, report: &mut WriteReport) -> f64 {
        if value.is_nan() {
            return match (self.nan, self.limits) {
                (Some(nan), _) => nan,
                (None, None) => f64::NAN,
                (None, Some((lo, hi))) => {
                    report.missing_without_sentinel += 1;
                    0f64.clamp(lo, hi)
                }
            };
        }
        let raw = (value as f64 - self.offset) / self.scale;
        match self.limits {
            None => raw,
            Some((lo, hi)) => {
                let raw = raw.round();
                if raw < lo {
                    report.clamped += 1;
                    lo
                } else if raw > hi {
                    report.clamped += 1;
                    hi
                } else if self.nan == Some(raw) {
                    // limits exclude an end-of-range sentinel, so this one is below `hi`
                    report.sentinel_collisions += 1;
                    raw + 1.0
                } else {
                    raw
                }
            }
        }
    }
}
