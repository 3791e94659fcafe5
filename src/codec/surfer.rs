//! Golden Software Surfer grids, version 6 binary (`DSBB`) and ASCII (`DSAA`).
//!
//! Both store node counts, the node bounds and the value range, then the values row by
//! row from the south. Missing nodes hold [`SURFER_BLANK`].

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::buffer::GridBuffer;
use crate::codec::{for_each_out_row, read_rows, write_rows, GridCodec, RowLayout, WriteReport};
use crate::config::GridIoConfig;
use crate::endian::{EndianAwareReader, EndianAwareWriter, Endianness};
use crate::error::{FormatError, GridResult};
use crate::format::FormatId;
use crate::header::{GridHeader, Registration};
use crate::region::RegionMap;
use crate::storage::{Quantizer, Storage};

/// Value Surfer uses for blanked nodes.
pub const SURFER_BLANK: f64 = 1.70141e38;

const BINARY_ID: &[u8; 4] = b"DSBB";
const ASCII_ID: &[u8; 4] = b"DSAA";
/// `id`, two `i16` counts and six `f64` bounds.
const BINARY_HEADER_LEN: usize = 4 + 2 * 2 + 6 * 8;
/// Values per line when writing text grids.
const ASCII_VALUES_PER_LINE: usize = 10;

const STORAGE: Storage = Storage::Float32(Endianness::LittleEndian);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    Binary,
    Ascii,
}

/// Codec for Surfer grids (format 6).
///
/// Reading accepts both variants; [`GridIoConfig::surfer_ascii`] picks the one written.
#[derive(Debug, Clone)]
pub struct SurferCodec;

/// Node counts and bounds as Surfer stores them.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SurferHeader {
    nx: i64,
    ny: i64,
    bounds: [f64; 6],
}

impl SurferHeader {
    /// Node bounds of `header`, which may be pixel registered.
    fn for_grid(header: &GridHeader) -> GridResult<Self> {
        let (nx, ny) = (header.nx, header.ny);
        // the increment is derived from the node bounds on read
        if nx < 2 || ny < 2 {
            return Err(FormatError::Unsupported(format!(
                "{nx}x{ny} grid: Surfer needs at least two nodes per axis"
            ))
            .into());
        }
        if nx > i16::MAX as usize || ny > i16::MAX as usize {
            return Err(FormatError::Unsupported(format!(
                "{nx}x{ny} exceeds the Surfer limit of {} nodes per axis",
                i16::MAX
            ))
            .into());
        }
        Ok(Self {
            nx: nx as i64,
            ny: ny as i64,
            bounds: [
                header.x_at(0),
                header.x_at(nx - 1),
                header.y_at(0),
                header.y_at(ny - 1),
                header.z_min,
                header.z_max,
            ],
        })
    }

    fn grid_header(&self) -> GridResult<GridHeader> {
        if self.nx <= 0 || self.ny <= 0 {
            return Err(FormatError::InvalidDimensions(self.nx, self.ny).into());
        }
        let [x_min, x_max, y_min, y_max, z_min, z_max] = self.bounds;
        let mut header = GridHeader {
            nx: self.nx as usize,
            ny: self.ny as usize,
            registration: Registration::GridLine,
            x_min,
            x_max,
            y_min,
            y_max,
            z_min,
            z_max,
            nan_value: Some(SURFER_BLANK),
            format: FormatId::Surfer,
            ..Default::default()
        };
        header.derive_increments()?;
        header.validate()?;
        Ok(header)
    }

    fn layout(&self) -> RowLayout {
        RowLayout::packed(
            STORAGE,
            BINARY_HEADER_LEN as u64,
            self.nx as usize,
            self.ny as usize,
        )
    }

    fn read_binary(bytes: &[u8]) -> GridResult<Self> {
        let mut r = EndianAwareReader::new(bytes, Endianness::LittleEndian);
        r.skip(BINARY_ID.len() as u64)?;
        let nx = r.read_i16()? as i64;
        let ny = r.read_i16()? as i64;
        let mut bounds = [0f64; 6];
        for v in bounds.iter_mut() {
            *v = r.read_f64()?;
        }
        Ok(Self { nx, ny, bounds })
    }

    fn write_binary(&self) -> Vec<u8> {
        let mut w = EndianAwareWriter::with_capacity(BINARY_HEADER_LEN, Endianness::LittleEndian);
        w.put_slice(BINARY_ID);
        w.put_i16(self.nx as i16);
        w.put_i16(self.ny as i16);
        for v in self.bounds {
            w.put_f64(v);
        }
        w.freeze().to_vec()
    }

    /// Parse the header of a text grid, leaving `tokens` at the first value.
    fn read_ascii<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> GridResult<Self> {
        match tokens.next() {
            Some("DSAA") => {}
            other => {
                return Err(FormatError::UnrecognizedHeader(format!(
                    "expected DSAA, found {other:?}"
                ))
                .into())
            }
        }
        let nx = parse_token(tokens.next())?;
        let ny = parse_token(tokens.next())?;
        let mut bounds = [0f64; 6];
        for v in bounds.iter_mut() {
            *v = parse_token(tokens.next())?;
        }
        Ok(Self { nx, ny, bounds })
    }

    fn write_ascii(&self, out: &mut impl Write) -> std::io::Result<()> {
        let [x_min, x_max, y_min, y_max, z_min, z_max] = self.bounds;
        writeln!(out, "DSAA")?;
        writeln!(out, "{} {}", self.nx, self.ny)?;
        writeln!(out, "{x_min} {x_max}")?;
        writeln!(out, "{y_min} {y_max}")?;
        writeln!(out, "{z_min} {z_max}")
    }
}

fn parse_token<T: std::str::FromStr>(token: Option<&str>) -> GridResult<T> {
    let token = token.ok_or_else(|| {
        FormatError::UnrecognizedHeader("text grid header ends early".into())
    })?;
    token
        .parse()
        .map_err(|_| FormatError::InvalidText(token.to_string()).into())
}

impl SurferCodec {
    fn sniff(path: &Path) -> GridResult<(Variant, u64)> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut id = [0u8; 4];
        BufReader::new(file).read_exact(&mut id)?;
        let variant = match &id {
            BINARY_ID => Variant::Binary,
            ASCII_ID => Variant::Ascii,
            b"DSRB" => {
                return Err(FormatError::Unsupported("Surfer 7 grid".into()).into());
            }
            _ => {
                return Err(FormatError::UnrecognizedHeader(format!(
                    "Surfer id {:?}",
                    String::from_utf8_lossy(&id)
                ))
                .into())
            }
        };
        tracing::debug!(path = %path.display(), ?variant, "opened Surfer grid");
        Ok((variant, file_len))
    }

    fn read_binary_header(path: &Path) -> GridResult<(File, SurferHeader)> {
        let mut file = File::open(path)?;
        let mut bytes = [0u8; BINARY_HEADER_LEN];
        file.read_exact(&mut bytes)?;
        Ok((file, SurferHeader::read_binary(&bytes)?))
    }

    /// Quantizer for `header`, which always has a blank value.
    fn quantizer(header: &GridHeader) -> Quantizer {
        let header = GridHeader {
            nan_value: Some(header.nan_value.unwrap_or(SURFER_BLANK)),
            ..header.clone()
        };
        Quantizer::new(&header, STORAGE)
    }

    fn read_ascii_grid(
        path: &Path,
        header: &GridHeader,
        map: &RegionMap,
        buffer: &mut GridBuffer,
    ) -> GridResult<()> {
        let text = fs::read_to_string(path)?;
        let mut tokens = text.split_ascii_whitespace();
        let stored = SurferHeader::read_ascii(&mut tokens)?;
        check_dims(header, &stored)?;

        // every row up to the last requested one has to be parsed
        let rows = map.rows();
        let nx = header.nx;
        let needed = rows.file_range().end * nx;
        let mut values = Vec::with_capacity(needed);
        for token in tokens.take(needed) {
            values.push(parse_token::<f32>(Some(token))?);
        }
        if values.len() < needed {
            return Err(FormatError::TruncatedData {
                expected: (nx * header.ny) as u64,
                actual: values.len() as u64,
            }
            .into());
        }

        let quantizer = Self::quantizer(header);
        for (i, row) in rows.file_range().enumerate() {
            let src = &values[row * nx..][..nx];
            let dest = buffer.row_mut(rows.dest_start + i);
            for span in map.columns() {
                for (d, s) in dest[span.dest_range()].iter_mut().zip(&src[span.file_range()]) {
                    *d = quantizer.decode(*s as f64);
                }
            }
        }
        Ok(())
    }

    fn write_ascii_grid(
        out: &mut impl Write,
        surfer: &SurferHeader,
        quantizer: &Quantizer,
        buffer: &GridBuffer,
        map: &RegionMap,
    ) -> GridResult<WriteReport> {
        let mut report = WriteReport::default();
        surfer.write_ascii(out)?;
        for_each_out_row(buffer, map, false, |values| {
            for line in values.chunks(ASCII_VALUES_PER_LINE) {
                let mut sep = "";
                for value in line {
                    let raw = quantizer.encode(*value, &mut report) as f32;
                    if raw != 0.0 && !(1e-5..1e7).contains(&raw.abs()) {
                        write!(out, "{sep}{raw:e}")?;
                    } else {
                        write!(out, "{sep}{raw}")?;
                    }
                    sep = " ";
                }
                writeln!(out)?;
            }
            writeln!(out)?;
            Ok(())
        })?;
        report.cells_written = map.transfer_cells();
        Ok(report)
    }
}

fn check_dims(header: &GridHeader, stored: &SurferHeader) -> GridResult<()> {
    if (stored.nx, stored.ny) != (header.nx as i64, header.ny as i64) || header.complex {
        return Err(FormatError::HeaderMismatch(
            header.nx,
            header.ny,
            stored.nx.max(0) as usize,
            stored.ny.max(0) as usize,
        )
        .into());
    }
    Ok(())
}

impl GridCodec for SurferCodec {
    fn format(&self) -> FormatId {
        FormatId::Surfer
    }

    fn read_header(&self, path: &Path, _config: &GridIoConfig) -> GridResult<GridHeader> {
        match Self::sniff(path)? {
            (Variant::Binary, file_len) => {
                let (_, surfer) = Self::read_binary_header(path)?;
                let header = surfer.grid_header()?;
                let expected = surfer.layout().file_len();
                if file_len != BINARY_HEADER_LEN as u64 && file_len != expected {
                    return Err(FormatError::RecordCountMismatch {
                        expected,
                        actual: file_len,
                    }
                    .into());
                }
                Ok(header)
            }
            (Variant::Ascii, _) => {
                let text = fs::read_to_string(path)?;
                let mut tokens = text.split_ascii_whitespace();
                let header = SurferHeader::read_ascii(&mut tokens)?.grid_header()?;
                // header-only text grids are accepted like binary ones
                let expected = header.nx * header.ny;
                let found = tokens.count();
                if found != 0 && found < expected {
                    return Err(FormatError::TruncatedData {
                        expected: expected as u64,
                        actual: found as u64,
                    }
                    .into());
                }
                Ok(header)
            }
        }
    }

    fn write_header(
        &self,
        path: &Path,
        header: &GridHeader,
        config: &GridIoConfig,
    ) -> GridResult<()> {
        header.validate()?;
        let surfer = SurferHeader::for_grid(header)?;
        let mut file = BufWriter::new(File::create(path)?);
        if config.surfer_ascii {
            surfer.write_ascii(&mut file)?;
        } else {
            file.write_all(&surfer.write_binary())?;
        }
        file.flush()?;
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
        buffer.check_region(map, false)?;
        let (variant, file_len) = Self::sniff(path)?;
        if variant == Variant::Ascii {
            return Self::read_ascii_grid(path, header, map, buffer);
        }
        let (mut file, stored) = Self::read_binary_header(path)?;
        check_dims(header, &stored)?;
        let layout = stored.layout();
        read_rows(&mut file, file_len, &layout, &Self::quantizer(header), map, buffer)
    }

    fn write_grid(
        &self,
        path: &Path,
        out_header: &GridHeader,
        buffer: &GridBuffer,
        map: &RegionMap,
        config: &GridIoConfig,
    ) -> GridResult<WriteReport> {
        if out_header.complex {
            return Err(FormatError::Unsupported("complex Surfer grid".into()).into());
        }
        out_header.validate()?;
        let surfer = SurferHeader::for_grid(out_header)?;
        let quantizer = Self::quantizer(out_header);

        let mut writer = BufWriter::new(File::create(path)?);
        let report = if config.surfer_ascii {
            Self::write_ascii_grid(&mut writer, &surfer, &quantizer, buffer, map)?
        } else {
            writer.write_all(&surfer.write_binary())?;
            write_rows(&mut writer, &surfer.layout(), &quantizer, map, buffer)?
        };
        writer.flush()?;
        tracing::debug!(
            path = %path.display(),
            ascii = config.surfer_ascii,
            cells = report.cells_written,
            "wrote Surfer grid"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_binary_header_bytes() {
        let surfer = SurferHeader {
            nx: 3,
            ny: 2,
            bounds: [0.0, 2.0, 10.0, 11.0, -1.0, 1.0],
        };
        let bytes = surfer.write_binary();
        assert_eq!(bytes.len(), 56);
        assert_eq!(&bytes[..8], b"DSBB\x03\x00\x02\x00");
        assert_eq!(SurferHeader::read_binary(&bytes).unwrap(), surfer);

        let header = surfer.grid_header().unwrap();
        assert_eq!((header.x_inc, header.y_inc), (1.0, 1.0));
        assert_eq!(header.registration, Registration::GridLine);
        assert_eq!(header.nan_value, Some(SURFER_BLANK));
    }

    #[test]
    fn test_ascii_header() {
        let text = "DSAA\n 3 2\n0 2\n10 11\n-1 1\n1 2 3\n";
        let mut tokens = text.split_ascii_whitespace();
        let surfer = SurferHeader::read_ascii(&mut tokens).unwrap();
        assert_eq!((surfer.nx, surfer.ny), (3, 2));
        assert_eq!(tokens.next(), Some("1"));

        let mut out = Vec::new();
        surfer.write_ascii(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "DSAA\n3 2\n0 2\n10 11\n-1 1\n");

        let mut tokens = "DSAA 3 x".split_ascii_whitespace();
        assert!(matches!(
            SurferHeader::read_ascii(&mut tokens),
            Err(crate::error::GridError::Format(FormatError::InvalidText(t))) if t == "x"
        ));
    }

    #[test]
    fn test_pixel_grid_is_stored_by_nodes() {
        let header =
            GridHeader::new(Registration::Pixel, (0.0, 4.0, 0.0, 2.0), 1.0, 1.0).unwrap();
        let surfer = SurferHeader::for_grid(&header).unwrap();
        assert_eq!(&surfer.bounds[..4], &[0.5, 3.5, 0.5, 1.5]);
        let back = surfer.grid_header().unwrap();
        assert_eq!((back.nx, back.ny, back.x_inc), (4, 2, 1.0));
    }

    #[test]
    fn test_single_node_axis_is_rejected() {
        for (x, y) in [((0.0, 1.0), (0.0, 3.0)), ((0.0, 3.0), (0.0, 1.0))] {
            let header =
                GridHeader::new(Registration::Pixel, (x.0, x.1, y.0, y.1), 1.0, 1.0).unwrap();
            assert!(matches!(
                SurferHeader::for_grid(&header),
                Err(crate::error::GridError::Format(FormatError::Unsupported(_)))
            ));
        }
    }
}
