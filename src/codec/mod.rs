//! The four-operation codec contract and the row transfer engine shared by the binary formats.

pub mod native;
pub mod raster;
pub mod surfer;

use std::fmt::Debug;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::buffer::GridBuffer;
use crate::config::GridIoConfig;
use crate::error::{FormatError, GridError, GridResult};
use crate::format::FormatId;
use crate::header::GridHeader;
use crate::region::RegionMap;
use crate::storage::{Quantizer, Storage};

/// Reads and writes one grid file format.
///
/// Codecs are stateless; everything a call needs travels in its arguments.
pub trait GridCodec: Debug + Send + Sync {
    /// The format this codec implements.
    fn format(&self) -> FormatId;

    /// Whether interleaved real/imaginary grids can be stored.
    fn supports_complex(&self) -> bool {
        false
    }

    /// Read and validate the header of the grid at `path`.
    fn read_header(&self, path: &Path, config: &GridIoConfig) -> GridResult<GridHeader>;

    /// Create or truncate `path` and write `header` to it, with no data.
    fn write_header(&self, path: &Path, header: &GridHeader, config: &GridIoConfig)
        -> GridResult<()>;

    /// Fill the cells of `buffer` that `map` transfers from the grid at `path`.
    ///
    /// `header` supplies the value transform and must match the file's dimensions.
    /// Cells outside the transfer are left untouched.
    fn read_grid(
        &self,
        path: &Path,
        header: &GridHeader,
        map: &RegionMap,
        buffer: &mut GridBuffer,
        config: &GridIoConfig,
    ) -> GridResult<()>;

    /// Create `path` holding the cells of `buffer` that `map` selects.
    ///
    /// `map` is computed against the header describing the whole buffer; `out_header`
    /// describes the written cells (see [`written_header`]).
    fn write_grid(
        &self,
        path: &Path,
        out_header: &GridHeader,
        buffer: &GridBuffer,
        map: &RegionMap,
        config: &GridIoConfig,
    ) -> GridResult<WriteReport>;
}

/// Outcome of a grid write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteReport {
    /// Cells written.
    pub cells_written: usize,
    /// Values that fell outside the storable range and were clamped.
    pub clamped: usize,
    /// Missing values written to an integer format that has no sentinel.
    pub missing_without_sentinel: usize,
    /// Valid values whose stored code equaled the sentinel, moved to the neighboring code.
    pub sentinel_collisions: usize,
    /// Storable raw range, for integer formats.
    pub limits: Option<(f64, f64)>,
}

impl WriteReport {
    /// Turn clamped values into [`GridError::ValueOutOfRange`].
    pub fn into_result(self) -> GridResult<Self> {
        if self.clamped > 0 {
            let (min, max) = self.limits.unwrap_or((f64::NAN, f64::NAN));
            return Err(GridError::ValueOutOfRange {
                count: self.clamped,
                min,
                max,
            });
        }
        Ok(self)
    }

    pub(crate) fn log(&self, path: &Path) {
        if self.clamped > 0 {
            tracing::warn!(
                path = %path.display(),
                clamped = self.clamped,
                limits = ?self.limits,
                "values clamped to the storable range"
            );
        }
        if self.missing_without_sentinel > 0 {
            tracing::warn!(
                path = %path.display(),
                count = self.missing_without_sentinel,
                "missing values written without a no-data sentinel"
            );
        }
        if self.sentinel_collisions > 0 {
            tracing::warn!(
                path = %path.display(),
                count = self.sentinel_collisions,
                "values equal to the no-data sentinel moved to the next stored code"
            );
        }
    }
}

/// Header of the file that writing `map` out of `buffer` produces.
///
/// Bounds and counts shrink to the transferred cells and `z_min`/`z_max` are recomputed
/// over them, ignoring `NaN`.
pub fn written_header(header: &GridHeader, buffer: &GridBuffer, map: &RegionMap) -> GridHeader {
    let mut out = map.transfer_header(header);
    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for_each_out_row(buffer, map, false, |values| {
        for v in values.iter().filter(|v| !v.is_nan()) {
            lo = lo.min(*v as f64);
            hi = hi.max(*v as f64);
        }
        Ok(())
    })
    .ok();
    if lo <= hi {
        (out.z_min, out.z_max) = (lo, hi);
    } else {
        (out.z_min, out.z_max) = (f64::NAN, f64::NAN);
    }
    out
}

/// On-disk arrangement of the data rows of a binary grid.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RowLayout {
    pub storage: Storage,
    /// Byte offset of the first stored row.
    pub data_offset: u64,
    /// Bytes per stored row, including any row padding.
    pub row_bytes: usize,
    /// Values per row (two per cell for complex grids).
    pub values_per_row: usize,
    /// Rows in the file.
    pub rows: usize,
    /// Whether the first stored row is the northernmost.
    pub north_first: bool,
}

impl RowLayout {
    /// Rows of `values_per_row` values, packed to whole bytes, south first.
    pub fn packed(storage: Storage, data_offset: u64, values_per_row: usize, rows: usize) -> Self {
        Self {
            storage,
            data_offset,
            row_bytes: storage.row_bytes(values_per_row),
            values_per_row,
            rows,
            north_first: false,
        }
    }

    /// Bytes a complete file with this layout holds.
    pub fn file_len(&self) -> u64 {
        self.data_offset + (self.rows * self.row_bytes) as u64
    }

    /// Byte offset of row `row`, counted from the south.
    fn row_offset(&self, row: usize) -> u64 {
        let stored = if self.north_first {
            self.rows - 1 - row
        } else {
            row
        };
        self.data_offset + (stored * self.row_bytes) as u64
    }
}

/// Read the rows and column spans of `map` from `reader` into `buffer`.
///
/// Only the bytes covering each span are read.
pub(crate) fn read_rows<R: Read + Seek>(
    reader: &mut R,
    file_len: u64,
    layout: &RowLayout,
    quantizer: &Quantizer,
    map: &RegionMap,
    buffer: &mut GridBuffer,
) -> GridResult<()> {
    if file_len < layout.file_len() {
        return Err(FormatError::TruncatedData {
            expected: layout.file_len(),
            actual: file_len,
        }
        .into());
    }
    let components = buffer.components();
    let rows = map.rows();
    let storage = layout.storage;
    let mut bytes = Vec::new();
    for span in map.columns() {
        let first = span.file_start * components;
        let count = span.len * components;
        let range = storage.byte_range(first, count);
        let skip = first - storage.first_value_at(range.start);
        tracing::trace!(
            columns = ?span.file_range(),
            rows = ?rows.file_range(),
            bytes = range.len(),
            "reading span"
        );
        bytes.resize(range.len(), 0);
        for (i, row) in rows.file_range().enumerate() {
            reader.seek(SeekFrom::Start(layout.row_offset(row) + range.start as u64))?;
            reader.read_exact(&mut bytes)?;
            let dest = &mut buffer.row_mut(rows.dest_start + i)
                [span.dest_start * components..][..count];
            for (j, value) in dest.iter_mut().enumerate() {
                *value = quantizer.decode(storage.get(&bytes, skip + j));
            }
        }
    }
    Ok(())
}

/// Call `f` with the logical values of every written row, in file order.
///
/// Buffer cell `(col, row)` of the header's grid sits at `pad + (col, row)`.
pub(crate) fn for_each_out_row<F>(
    buffer: &GridBuffer,
    map: &RegionMap,
    north_first: bool,
    mut f: F,
) -> GridResult<()>
where
    F: FnMut(&[f32]) -> GridResult<()>,
{
    let components = buffer.components();
    let pad = buffer.pad();
    let rows = map.rows();
    let mut values = Vec::with_capacity(map.transfer_width() * components);
    let mut emit = |row: usize| {
        values.clear();
        let src = buffer.row(pad.bottom + row);
        for span in map.columns() {
            let start = (pad.left + span.file_start) * components;
            values.extend_from_slice(&src[start..][..span.len * components]);
        }
        f(&values)
    };
    if north_first {
        rows.file_range().rev().try_for_each(&mut emit)
    } else {
        rows.file_range().try_for_each(&mut emit)
    }
}

/// Encode and write the rows `map` selects out of `buffer`.
pub(crate) fn write_rows<W: Write>(
    writer: &mut W,
    layout: &RowLayout,
    quantizer: &Quantizer,
    map: &RegionMap,
    buffer: &GridBuffer,
) -> GridResult<WriteReport> {
    let mut report = WriteReport {
        limits: quantizer.limits(),
        ..Default::default()
    };
    let mut bytes = vec![0u8; layout.row_bytes];
    for_each_out_row(buffer, map, layout.north_first, |values| {
        bytes.fill(0);
        for (i, value) in values.iter().enumerate() {
            layout
                .storage
                .put(&mut bytes, i, quantizer.encode(*value, &mut report));
        }
        writer.write_all(&bytes)?;
        Ok(())
    })?;
    report.cells_written = map.transfer_cells();
    Ok(report)
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;
    use crate::endian::Endianness;
    use crate::header::Registration;
    use crate::region::{Pad, Window};

    fn header() -> GridHeader {
        GridHeader::new(Registration::Pixel, (0.0, 4.0, 0.0, 3.0), 1.0, 1.0).unwrap()
    }

    #[test]
    fn test_rows_round_trip_through_layout() {
        let header = header();
        let values: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let buffer = GridBuffer::from_vec(values.clone(), 4, 3, Pad::default(), false).unwrap();
        let map = RegionMap::new(&header, &Window::full(&header), Pad::default(), true).unwrap();
        let storage = Storage::Int16(Endianness::BigEndian);
        let mut layout = RowLayout::packed(storage, 2, 4, 3);
        layout.north_first = true;
        let quantizer = Quantizer::new(&header, storage);

        let mut file = Cursor::new(vec![0xaa, 0xbb]);
        file.set_position(2);
        let report = write_rows(&mut file, &layout, &quantizer, &map, &buffer).unwrap();
        assert_eq!(report.cells_written, 12);
        // north row first
        assert_eq!(&file.get_ref()[2..4], &[0, 8]);

        let window = Window::new(1.0, 3.0, 1.0, 3.0);
        let sub = RegionMap::new(&header, &window, Pad::uniform(1), true).unwrap();
        let mut out = GridBuffer::for_region(&sub, false);
        let len = file.get_ref().len() as u64;
        read_rows(&mut file, len, &layout, &quantizer, &sub, &mut out).unwrap();
        assert_eq!(out.interior(), vec![5.0, 6.0, 9.0, 10.0]);
        assert!(out.get(0, 0).is_nan());
    }

    #[test]
    fn test_truncated_rows() {
        let header = header();
        let map = RegionMap::new(&header, &Window::full(&header), Pad::default(), true).unwrap();
        let layout = RowLayout::packed(Storage::UInt8, 0, 4, 3);
        let quantizer = Quantizer::new(&header, Storage::UInt8);
        let mut buffer = GridBuffer::for_region(&map, false);
        let mut file = Cursor::new(vec![0u8; 11]);
        assert!(matches!(
            read_rows(&mut file, 11, &layout, &quantizer, &map, &mut buffer),
            Err(GridError::Format(FormatError::TruncatedData {
                expected: 12,
                actual: 11
            }))
        ));
    }

    #[test]
    fn test_report_into_result() {
        let report = WriteReport {
            clamped: 3,
            limits: Some((0.0, 255.0)),
            ..Default::default()
        };
        assert!(matches!(
            report.into_result(),
            Err(GridError::ValueOutOfRange {
                count: 3,
                min,
                max
            }) if min == 0.0 && max == 255.0
        ));
        assert!(WriteReport::default().into_result().is_ok());
    }

    #[test]
    fn test_written_header_recomputes_range() {
        let header = header();
        let mut values: Vec<f32> = (0..12).map(|v| v as f32).collect();
        values[5] = f32::NAN;
        let buffer = GridBuffer::from_vec(values, 4, 3, Pad::default(), false).unwrap();
        let window = Window::new(1.0, 3.0, 1.0, 2.0);
        let map = RegionMap::new(&header, &window, Pad::default(), true).unwrap();
        let out = written_header(&header, &buffer, &map);
        assert_eq!((out.nx, out.ny), (2, 1));
        assert_eq!((out.x_min, out.x_max, out.y_min, out.y_max), (1.0, 3.0, 1.0, 2.0));
        assert_eq!((out.z_min, out.z_max), (6.0, 6.0));
    }
}
