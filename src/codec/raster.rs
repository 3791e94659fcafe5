//! 8-bit Sun rasterfiles.
//!
//! A 32-byte big-endian header (`magic`, `width`, `height`, `depth`, `length`, `type`,
//! `maptype`, `maplength`) is followed by `maplength` colormap bytes and then the
//! image rows, top row first, each padded to an even number of bytes.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
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

const RAS_MAGIC: u32 = 0x59a6_6a95;
const HEADER_LEN: usize = 32;

const RT_OLD: u32 = 0;
const RT_STANDARD: u32 = 1;
const RT_BYTE_ENCODED: u32 = 2;

const RMT_NONE: u32 = 0;
const RMT_EQUAL_RGB: u32 = 1;
/// Red, green and blue ramps of 256 entries each.
const GRAY_MAP_LEN: u32 = 3 * 256;

/// The fields of a rasterfile header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RasterHeader {
    width: u32,
    height: u32,
    depth: u32,
    length: u32,
    kind: u32,
    maptype: u32,
    maplength: u32,
}

impl RasterHeader {
    fn for_grid(header: &GridHeader) -> GridResult<Self> {
        let (width, height) = match (u32::try_from(header.nx), u32::try_from(header.ny)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err(
                    FormatError::InvalidDimensions(header.nx as i64, header.ny as i64).into(),
                )
            }
        };
        let mut raster = Self {
            width,
            height,
            depth: 8,
            length: 0,
            kind: RT_STANDARD,
            maptype: RMT_EQUAL_RGB,
            maplength: GRAY_MAP_LEN,
        };
        raster.length = (raster.row_bytes() * height as usize) as u32;
        Ok(raster)
    }

    fn read(reader: impl std::io::Read) -> GridResult<Self> {
        let mut r = EndianAwareReader::new(reader, Endianness::BigEndian);
        let magic = r.read_u32()?;
        if magic != RAS_MAGIC {
            return Err(
                FormatError::UnrecognizedHeader(format!("raster magic {magic:#010x}")).into(),
            );
        }
        let raster = Self {
            width: r.read_u32()?,
            height: r.read_u32()?,
            depth: r.read_u32()?,
            length: r.read_u32()?,
            kind: r.read_u32()?,
            maptype: r.read_u32()?,
            maplength: r.read_u32()?,
        };
        if raster.width == 0 || raster.height == 0 || raster.width > i32::MAX as u32 {
            return Err(FormatError::InvalidDimensions(
                raster.width as i64,
                raster.height as i64,
            )
            .into());
        }
        if raster.depth != 8 {
            return Err(
                FormatError::Unsupported(format!("{}-bit rasterfile", raster.depth)).into(),
            );
        }
        match raster.kind {
            RT_OLD | RT_STANDARD => {}
            RT_BYTE_ENCODED => {
                return Err(FormatError::Unsupported("run-length encoded rasterfile".into()).into())
            }
            other => {
                return Err(FormatError::Unsupported(format!("rasterfile type {other}")).into())
            }
        }
        if raster.maptype == RMT_NONE && raster.maplength != 0 {
            return Err(FormatError::UnrecognizedHeader(format!(
                "colormap of {} bytes without a map type",
                raster.maplength
            ))
            .into());
        }
        Ok(raster)
    }

    fn write(&self) -> Vec<u8> {
        let mut w = EndianAwareWriter::with_capacity(
            HEADER_LEN + self.maplength as usize,
            Endianness::BigEndian,
        );
        for v in [
            RAS_MAGIC,
            self.width,
            self.height,
            self.depth,
            self.length,
            self.kind,
            self.maptype,
            self.maplength,
        ] {
            w.put_u32(v);
        }
        if self.maptype == RMT_EQUAL_RGB {
            for _ in 0..3 {
                for level in 0..=u8::MAX {
                    w.put_u8(level);
                }
            }
        }
        w.freeze().to_vec()
    }

    /// Stored row length, padded to 16 bits.
    fn row_bytes(&self) -> usize {
        (self.width as usize + 1) & !1
    }

    fn layout(&self) -> RowLayout {
        RowLayout {
            storage: Storage::UInt8,
            data_offset: (HEADER_LEN + self.maplength as usize) as u64,
            row_bytes: self.row_bytes(),
            values_per_row: self.width as usize,
            rows: self.height as usize,
            north_first: true,
        }
    }

    /// Pixel-registered grid of unit cells with the origin at the lower left corner.
    fn grid_header(&self) -> GridResult<GridHeader> {
        let (w, h) = (self.width as f64, self.height as f64);
        Ok(GridHeader {
            format: FormatId::SunRaster,
            z_min: 0.0,
            z_max: 255.0,
            ..GridHeader::new(Registration::Pixel, (0.0, w, 0.0, h), 1.0, 1.0)?
        })
    }
}

/// Codec for 8-bit Sun rasterfiles (format 3).
///
/// Only the image dimensions survive a round trip; the format has no geographic fields.
#[derive(Debug, Clone)]
pub struct SunRasterCodec;

impl SunRasterCodec {
    fn open(path: &Path) -> GridResult<(File, RasterHeader, u64)> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let raster = RasterHeader::read(&mut reader)?;
        tracing::debug!(
            path = %path.display(),
            width = raster.width,
            height = raster.height,
            maplength = raster.maplength,
            "opened rasterfile"
        );
        Ok((reader.into_inner(), raster, file_len))
    }
}

impl GridCodec for SunRasterCodec {
    fn format(&self) -> FormatId {
        FormatId::SunRaster
    }

    fn read_header(&self, path: &Path, _config: &GridIoConfig) -> GridResult<GridHeader> {
        let (_, raster, file_len) = Self::open(path)?;
        let layout = raster.layout();
        if file_len != layout.data_offset && file_len < layout.file_len() {
            return Err(FormatError::RecordCountMismatch {
                expected: layout.file_len(),
                actual: file_len,
            }
            .into());
        }
        raster.grid_header()
    }

    fn write_header(
        &self,
        path: &Path,
        header: &GridHeader,
        _config: &GridIoConfig,
    ) -> GridResult<()> {
        let bytes = RasterHeader::for_grid(header)?.write();
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
        let (mut file, raster, file_len) = Self::open(path)?;
        let (nx, ny) = (raster.width as usize, raster.height as usize);
        if (nx, ny) != (header.nx, header.ny) || header.complex {
            return Err(FormatError::HeaderMismatch(header.nx, header.ny, nx, ny).into());
        }
        buffer.check_region(map, false)?;
        let layout = raster.layout();
        let quantizer = Quantizer::new(header, layout.storage);
        read_rows(&mut file, file_len, &layout, &quantizer, map, buffer)
    }

    fn write_grid(
        &self,
        path: &Path,
        out_header: &GridHeader,
        buffer: &GridBuffer,
        map: &RegionMap,
        _config: &GridIoConfig,
    ) -> GridResult<WriteReport> {
        if out_header.complex {
            return Err(FormatError::Unsupported("complex rasterfile".into()).into());
        }
        let raster = RasterHeader::for_grid(out_header)?;
        let layout = raster.layout();
        let quantizer = Quantizer::new(out_header, layout.storage);

        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&raster.write())?;
        let report = write_rows(&mut writer, &layout, &quantizer, map, buffer)?;
        writer.flush()?;
        tracing::debug!(path = %path.display(), cells = report.cells_written, "wrote rasterfile");
        Ok(report)
    }
}
