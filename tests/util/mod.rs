#![allow(dead_code)]

use grdio::{GridBuffer, GridFile, GridHeader, Pad, Registration};
use tempfile::TempDir;

pub(crate) fn pixel_header(x: (f64, f64), y: (f64, f64), inc: f64) -> GridHeader {
    GridHeader::new(Registration::Pixel, (x.0, x.1, y.0, y.1), inc, inc).unwrap()
}

pub(crate) fn gridline_header(x: (f64, f64), y: (f64, f64), inc: f64) -> GridHeader {
    GridHeader::new(Registration::GridLine, (x.0, x.1, y.0, y.1), inc, inc).unwrap()
}

/// A buffer holding `f(col, row)` for every cell of `header`, with a `NaN` halo.
pub(crate) fn ramp(header: &GridHeader, pad: Pad, f: impl Fn(usize, usize) -> f32) -> GridBuffer {
    let mut buffer = GridBuffer::for_header(header, pad);
    for row in 0..header.ny {
        for col in 0..header.nx {
            buffer.set(pad.left + col, pad.bottom + row, f(col, row));
        }
    }
    buffer
}

/// `name` (optionally followed by `=id/...`) inside `dir`.
pub(crate) fn grid_file(dir: &TempDir, name: &str) -> GridFile {
    format!("{}/{}", dir.path().display(), name)
        .parse()
        .unwrap()
}

/// Every cell of an unpadded buffer as `(col, row, value)`.
pub(crate) fn cells(buffer: &GridBuffer) -> Vec<(usize, usize, f32)> {
    let pad = buffer.pad();
    let mut out = Vec::new();
    for row in 0..buffer.height() {
        for col in 0..buffer.width() {
            out.push((col, row, buffer.get(pad.left + col, pad.bottom + row)));
        }
    }
    out
}
