//! Grids with the native binary header: 4-byte float, 2-byte short, 1-byte and 1-bit storage.
//!
//! Layout, in the file's byte order:
//!
//! | Offset | Field |
//! |---|---|
//! | 0 | `nx`, `ny`, `registration` as `i32` |
//! | 12 | `x_min`, `x_max`, `y_min`, `y_max`, `x_inc`, `y_inc`, `z_min`, `z_max`, `scale_factor`, `add_offset` as `f64` |
//! | 92 | `x_units`, `y_units`, `z_units`, `title` (80 bytes each), `command` (320), `remark` (160), NUL padded |
//! | 892 | flags as `i32`: bit 0 sentinel present, bit 1 complex |
//! | 896 | sentinel in the storage type, 4-byte slot |
//! | 900 | rows of values, south to north, each row padded to a whole byte |
//!
//! Byte order is not recorded; readers accept whichever order decodes to a valid header.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::buffer::GridBuffer;
use crate::codec::{read_rows, write_rows, GridCodec, RowLayout, WriteReport};
use crate::config::GridIoConfig;
use crate::endian::{EndianAwareReader, EndianAwareWriter, Endianness};
use crate::error::{FormatError, GridResult};
use crate::format::FormatId;
use crate::header::{GridHeader, Registration};
use crate::region::RegionMap;
use crate::storage::{Quantizer, Storage};

const STR_UNITS: usize = 80;
const STR_TITLE: usize = 80;
const STR_COMMAND: usize = 320;
const STR_REMARK: usize = 160;

/// Size of the header fields preceding the trailer.
const RECORD_LEN: usize = 12 + 10 * 8 + 3 * STR_UNITS + STR_TITLE + STR_COMMAND + STR_REMARK;
/// Offset of the first data row.
pub const HEADER_LEN: usize = RECORD_LEN + 8;

const FLAG_NAN: i32 = 1;
const FLAG_COMPLEX: i32 = 2;

/// Sentinel used by 2-byte grids that do not name one.
pub const SHORT_DEFAULT_NAN: f64 = i16::MIN as f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Float,
    Short,
    Byte,
    Bit,
}

/// Codec for one of the native-header formats.
#[derive(Debug, Clone)]
pub struct NativeCodec {
    format: FormatId,
    unit: Unit,
}

impl NativeCodec {
    /// 4-byte float grids (format 1).
    pub fn float() -> Self {
        Self {
            format: FormatId::NativeFloat,
            unit: Unit::Float,
        }
    }

    /// Scaled 2-byte integer grids (format 2).
    pub fn short() -> Self {
        Self {
            format: FormatId::ScaledShort,
            unit: Unit::Short,
        }
    }

    /// 1-byte unsigned grids (format 4).
    pub fn unsigned_byte() -> Self {
        Self {
            format: FormatId::UnsignedByte,
            unit: Unit::Byte,
        }
    }

    /// Bit-packed grids (format 5).
    pub fn bit() -> Self {
        Self {
            format: FormatId::BitPacked,
            unit: Unit::Bit,
        }
    }

    fn storage(&self, endianness: Endianness) -> Storage {
        match self.unit {
            Unit::Float => Storage::Float32(endianness),
            Unit::Short => Storage::Int16(endianness),
            Unit::Byte => Storage::UInt8,
            Unit::Bit => Storage::Bit,
        }
    }

    /// The sentinel in effect for `header`.
    fn nan_value(&self, header: &GridHeader) -> Option<f64> {
        match (self.unit, header.nan_value) {
            (Unit::Short, None) => Some(SHORT_DEFAULT_NAN),
            (_, nan) => nan,
        }
    }

    fn quantizer(&self, header: &GridHeader, storage: Storage) -> Quantizer {
        let header = GridHeader {
            nan_value: self.nan_value(header),
            ..header.clone()
        };
        Quantizer::new(&header, storage)
    }

    fn layout(&self, header: &GridHeader, endianness: Endianness) -> RowLayout {
        RowLayout::packed(
            self.storage(endianness),
            HEADER_LEN as u64,
            header.values_per_row(),
            header.ny,
        )
    }

    fn encode_header(&self, header: &GridHeader, endianness: Endianness) -> GridResult<Vec<u8>> {
        header.validate()?;
        let storage = self.storage(endianness);
        let mut w = EndianAwareWriter::with_capacity(HEADER_LEN, endianness);
        w.put_i32(header.nx as i32);
        w.put_i32(header.ny as i32);
        w.put_i32(header.registration.into());
        for v in [
            header.x_min,
            header.x_max,
            header.y_min,
            header.y_max,
            header.x_inc,
            header.y_inc,
            header.z_min,
            header.z_max,
            header.scale_factor,
            header.add_offset,
        ] {
            w.put_f64(v);
        }
        w.put_fixed_str(&header.x_units, STR_UNITS);
        w.put_fixed_str(&header.y_units, STR_UNITS);
        w.put_fixed_str(&header.z_units, STR_UNITS);
        w.put_fixed_str(&header.title, STR_TITLE);
        w.put_fixed_str(&header.command, STR_COMMAND);
        w.put_fixed_str(&header.remark, STR_REMARK);
        debug_assert_eq!(w.len(), RECORD_LEN);

        let nan = self.nan_value(header).filter(|n| !n.is_nan());
        let mut flags = 0;
        let mut slot = [0u8; 4];
        if let Some(nan) = nan {
            flags |= FLAG_NAN;
            storage.put(&mut slot, 0, storage.normalize(nan));
        }
        if header.complex {
            flags |= FLAG_COMPLEX;
        }
        w.put_i32(flags);
        w.put_slice(&slot);
        Ok(w.freeze().to_vec())
    }

    fn decode_header(&self, bytes: &[u8], endianness: Endianness) -> GridResult<GridHeader> {
        let mut r = EndianAwareReader::new(bytes, endianness);
        let nx = r.read_i32()?;
        let ny = r.read_i32()?;
        if nx <= 0 || ny <= 0 {
            return Err(FormatError::InvalidDimensions(nx as i64, ny as i64).into());
        }
        let registration = r.read_i32()?;
        let registration = Registration::try_from(registration).map_err(|_| {
            FormatError::UnrecognizedHeader(format!("registration {registration}"))
        })?;
        let mut v = [0f64; 10];
        for slot in v.iter_mut() {
            *slot = r.read_f64()?;
        }
        let x_units = r.read_fixed_str(STR_UNITS)?;
        let y_units = r.read_fixed_str(STR_UNITS)?;
        let z_units = r.read_fixed_str(STR_UNITS)?;
        let title = r.read_fixed_str(STR_TITLE)?;
        let command = r.read_fixed_str(STR_COMMAND)?;
        let remark = r.read_fixed_str(STR_REMARK)?;
        let flags = r.read_i32()?;
        if flags & !(FLAG_NAN | FLAG_COMPLEX) != 0 {
            return Err(FormatError::UnrecognizedHeader(format!("flags {flags:#x}")).into());
        }
        let slot = r.read_bytes(4)?;
        let storage = self.storage(endianness);

        let header = GridHeader {
            nx: nx as usize,
            ny: ny as usize,
            registration,
            x_min: v[0],
            x_max: v[1],
            y_min: v[2],
            y_max: v[3],
            x_inc: v[4],
            y_inc: v[5],
            z_min: v[6],
            z_max: v[7],
            scale_factor: v[8],
            add_offset: v[9],
            nan_value: (flags & FLAG_NAN != 0).then(|| storage.get(&slot, 0)),
            format: self.format,
            complex: flags & FLAG_COMPLEX != 0,
            x_units,
            y_units,
            z_units,
            title,
            command,
            remark,
        };
        header.validate()?;
        Ok(header)
    }

    /// Decode the header in whichever byte order yields a valid one.
    ///
    /// When both orders do, the one whose data length matches `file_len` wins, then the
    /// host order.
    fn detect(&self, bytes: &[u8], file_len: u64) -> GridResult<(GridHeader, Endianness)> {
        let native = Endianness::native();
        let swapped = native.swapped();
        let fits = |header: &GridHeader, order| self.layout(header, order).file_len() == file_len;
        match (
            self.decode_header(bytes, native),
            self.decode_header(bytes, swapped),
        ) {
            (Ok(a), Ok(b)) if !fits(&a, native) && fits(&b, swapped) => Ok((b, swapped)),
            (Ok(a), _) => Ok((a, native)),
            (Err(_), Ok(b)) => Ok((b, swapped)),
            (Err(e), Err(_)) => Err(e),
        }
    }

    /// Read the header record and detect the byte order of the file at `path`.
    fn open(&self, path: &Path) -> GridResult<(File, GridHeader, Endianness, u64)> {
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();
        if file_len < HEADER_LEN as u64 {
            return Err(FormatError::UnrecognizedHeader(format!(
                "{file_len} bytes is shorter than the {HEADER_LEN} byte header"
            ))
            .into());
        }
        let mut bytes = vec![0u8; HEADER_LEN];
        file.read_exact(&mut bytes)?;
        let (header, endianness) = self.detect(&bytes, file_len)?;
        tracing::debug!(path = %path.display(), format = ?self.format, ?endianness, "opened grid");
        Ok((file, header, endianness, file_len))
    }
}

impl GridCodec for NativeCodec {
    fn format(&self) -> FormatId {
        self.format
    }

    fn supports_complex(&self) -> bool {
        true
    }

    fn read_header(&self, path: &Path, _config: &GridIoConfig) -> GridResult<GridHeader> {
        let (_, header, endianness, file_len) = self.open(path)?;
        let expected = self.layout(&header, endianness).file_len();
        if file_len != HEADER_LEN as u64 && file_len != expected {
            return Err(FormatError::RecordCountMismatch {
                expected,
                actual: file_len,
            }
            .into());
        }
        Ok(header)
    }

    fn write_header(
        &self,
        path: &Path,
        header: &GridHeader,
        config: &GridIoConfig,
    ) -> GridResult<()> {
        let bytes = self.encode_header(header, config.byte_order)?;
        let mut file = File::create(path)?;
        file.write_all(&bytes)?;
        Ok(())
    }

    fn read_grid(
        &self,
        path: &Path,
        header: &GridHeader,
        map: &RegionMap,
        buffer: &mut GridBuffer,
        _config: &GridIoConfig,
    ) -> GridResult<()> {
        let (mut file, stored, endianness, file_len) = self.open(path)?;
        if (stored.nx, stored.ny) != (header.nx, header.ny) || stored.complex != header.complex {
            return Err(
                FormatError::HeaderMismatch(header.nx, header.ny, stored.nx, stored.ny).into(),
            );
        }
        buffer.check_region(map, header.complex)?;
        let layout = self.layout(&stored, endianness);
        let quantizer = self.quantizer(header, layout.storage);
        read_rows(&mut file, file_len, &layout, &quantizer, map, buffer)
    }

    fn write_grid(
        &self,
        path: &Path,
        out_header: &GridHeader,
        buffer: &GridBuffer,
        map: &RegionMap,
        config: &GridIoConfig,
    ) -> GridResult<WriteReport> {
        let bytes = self.encode_header(out_header, config.byte_order)?;
        let layout = self.layout(out_header, config.byte_order);
        let quantizer = self.quantizer(out_header, layout.storage);

        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&bytes)?;
        let report = write_rows(&mut writer, &layout, &quantizer, map, buffer)?;
        writer.flush()?;
        tracing::debug!(
            path = %path.display(),
            format = ?self.format,
            byte_order = ?config.byte_order,
            cells = report.cells_written,
            "wrote grid"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn header() -> GridHeader {
        GridHeader {
            title: "test grid".into(),
            z_units: "m".into(),
            ..GridHeader::new(Registration::Pixel, (-10.0, 10.0, 0.0, 5.0), 2.0, 1.0).unwrap()
        }
    }

    #[test]
    fn test_header_layout() {
        assert_eq!(RECORD_LEN, 892);
        assert_eq!(HEADER_LEN, 900);

        let codec = NativeCodec::float();
        let bytes = codec
            .encode_header(&header(), Endianness::BigEndian)
            .unwrap();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(&bytes[..4], &[0, 0, 0, 10]);
        assert_eq!(&bytes[8..12], &[0, 0, 0, 1]);
        // no sentinel for float grids unless named
        assert_eq!(&bytes[892..900], &[0; 8]);
    }

    #[test]
    fn test_header_round_trip_both_orders() {
        let codec = NativeCodec::short();
        let h = header();
        for order in [Endianness::LittleEndian, Endianness::BigEndian] {
            let bytes = codec.encode_header(&h, order).unwrap();
            let file_len = (HEADER_LEN + 10 * 5 * 2) as u64;
            let (decoded, detected) = codec.detect(&bytes, file_len).unwrap();
            assert_eq!(detected, order);
            assert_eq!(
                decoded,
                GridHeader {
                    nan_value: Some(SHORT_DEFAULT_NAN),
                    format: FormatId::ScaledShort,
                    ..h.clone()
                }
            );
        }
    }

    #[test]
    fn test_sentinel_slot_uses_storage_type() {
        let h = GridHeader {
            nan_value: Some(255.0),
            complex: true,
            ..header()
        };
        let bytes = NativeCodec::unsigned_byte()
            .encode_header(&h, Endianness::LittleEndian)
            .unwrap();
        assert_eq!(&bytes[892..900], &[3, 0, 0, 0, 255, 0, 0, 0]);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let bytes = vec![0xffu8; HEADER_LEN];
        assert!(NativeCodec::float().detect(&bytes, 900).is_err());
    }
}
