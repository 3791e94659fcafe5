//! Mapping of a requested geographic window onto file rows/columns and buffer offsets.
//!
//! All index ranges are half-open. Columns count from the west edge of the file, rows
//! from the south edge. A [`RegionMap`] is computed without touching the file, so an
//! empty request fails before any I/O happens.

use std::ops::Range;

use crate::error::{GridError, GridResult};
use crate::header::{GridHeader, Registration};

/// Fraction of a cell absorbed when snapping coordinates to indices.
const INDEX_SLOP: f64 = 1e-6;

/// A geographic sub-window in the grid's native units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    /// West bound.
    pub west: f64,
    /// East bound.
    pub east: f64,
    /// South bound.
    pub south: f64,
    /// North bound.
    pub north: f64,
}

impl Window {
    /// A window from its four bounds.
    pub fn new(west: f64, east: f64, south: f64, north: f64) -> Self {
        Self {
            west,
            east,
            south,
            north,
        }
    }

    /// The full extent of `header`.
    pub fn full(header: &GridHeader) -> Self {
        Self::new(header.x_min, header.x_max, header.y_min, header.y_max)
    }
}

/// Halo cells reserved around the window in the destination buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pad {
    /// Columns west of the window.
    pub left: usize,
    /// Columns east of the window.
    pub right: usize,
    /// Rows south of the window.
    pub bottom: usize,
    /// Rows north of the window.
    pub top: usize,
}

impl Pad {
    /// The same halo on all four sides.
    pub fn uniform(n: usize) -> Self {
        Self {
            left: n,
            right: n,
            bottom: n,
            top: n,
        }
    }
}

/// A contiguous run of file cells and where it lands in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// First file index.
    pub file_start: usize,
    /// Number of cells.
    pub len: usize,
    /// First buffer index, padding included.
    pub dest_start: usize,
}

impl Span {
    /// File indices covered.
    pub fn file_range(&self) -> Range<usize> {
        self.file_start..self.file_start + self.len
    }

    /// Buffer indices covered.
    pub fn dest_range(&self) -> Range<usize> {
        self.dest_start..self.dest_start + self.len
    }
}

/// Requested cells along one axis, in file index space (may lie outside the file).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AxisRequest {
    first: i64,
    count: usize,
}

impl AxisRequest {
    /// Cells requested by `lo..hi` on an axis of `n` cells starting at `min`.
    ///
    /// Requests may reach at most one grid size past either edge, or two turns past
    /// the start when the axis repeats every `period` cells. Anything further is cut.
    fn new(
        registration: Registration,
        (min, inc): (f64, f64),
        (lo, hi): (f64, f64),
        n: usize,
        period: Option<usize>,
    ) -> Option<Self> {
        if !(lo.is_finite() && hi.is_finite()) || lo > hi {
            return None;
        }
        let mut a = (lo - min) / inc;
        let mut b = (hi - min) / inc;
        match period.map(|p| p as f64) {
            Some(p) => {
                if !(-p..=p).contains(&a) {
                    let shift = (a / p).floor() * p;
                    a -= shift;
                    b -= shift;
                }
                b = b.min(a + 2.0 * p);
            }
            None => {
                let (low, high) = (-(n as f64), 2.0 * n as f64);
                a = a.clamp(low, high);
                b = b.clamp(low, high);
            }
        }
        let (first, end) = match registration {
            Registration::GridLine => (a.round() as i64, b.round() as i64 + 1),
            Registration::Pixel => (
                (a + INDEX_SLOP).floor() as i64,
                (b - INDEX_SLOP).ceil() as i64,
            ),
        };
        (end > first).then(|| Self {
            first,
            count: (end - first) as usize,
        })
    }

    /// The part inside `0..n`.
    fn clip(&self, n: usize, pad: usize) -> Option<Span> {
        let start = self.first.max(0);
        let end = (self.first + self.count as i64).min(n as i64);
        (end > start).then(|| Span {
            file_start: start as usize,
            len: (end - start) as usize,
            dest_start: pad + (start - self.first) as usize,
        })
    }

    /// Split into file spans when columns repeat every `period` (`n` is `period` or
    /// `period + 1` for grid-line registration, whose last column repeats the first).
    fn wrap(&self, n: usize, period: usize, pad: usize) -> Vec<Span> {
        let mut spans = Vec::with_capacity(2);
        let mut pos = self.first.rem_euclid(period as i64) as usize;
        let mut remaining = self.count;
        let mut dest = pad;
        while remaining > 0 {
            let len = if remaining <= n - pos {
                remaining
            } else {
                period - pos
            };
            spans.push(Span {
                file_start: pos,
                len,
                dest_start: dest,
            });
            dest += len;
            remaining -= len;
            pos = (pos + len) % period;
        }
        spans
    }
}

/// Placement of a window's intersection with a grid, in file and buffer coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMap {
    columns: Vec<Span>,
    rows: Span,
    width: usize,
    height: usize,
    pad: Pad,
    /// Unwrapped file index of the first transferred column.
    col_origin: i64,
}

impl RegionMap {
    /// Intersect `window` with the grid described by `header`.
    ///
    /// When `wrap_longitude` is set and the grid covers a full 360° turn in x, columns
    /// are taken modulo the turn instead of being clipped.
    pub fn new(
        header: &GridHeader,
        window: &Window,
        pad: Pad,
        wrap_longitude: bool,
    ) -> GridResult<Self> {
        let empty = || GridError::EmptyRegion {
            west: window.west,
            east: window.east,
            south: window.south,
            north: window.north,
        };
        let reg = header.registration;
        let period = header.x_period().filter(|_| wrap_longitude);
        let x = AxisRequest::new(
            reg,
            (header.x_min, header.x_inc),
            (window.west, window.east),
            header.nx,
            period,
        )
        .ok_or_else(empty)?;
        let y = AxisRequest::new(
            reg,
            (header.y_min, header.y_inc),
            (window.south, window.north),
            header.ny,
            None,
        )
        .ok_or_else(empty)?;

        let rows = y.clip(header.ny, pad.bottom).ok_or_else(empty)?;
        let (columns, col_origin) = match period {
            Some(period) => (x.wrap(header.nx, period, pad.left), x.first),
            None => {
                let span = x.clip(header.nx, pad.left).ok_or_else(empty)?;
                (vec![span], span.file_start as i64)
            }
        };

        let map = Self {
            columns,
            rows,
            width: x.count,
            height: y.count,
            pad,
            col_origin,
        };
        tracing::debug!(
            width = map.width,
            height = map.height,
            spans = map.columns.len(),
            rows = ?map.rows.file_range(),
            "mapped region"
        );
        Ok(map)
    }

    /// Column spans, west to east in buffer order. More than one when the window wraps.
    pub fn columns(&self) -> &[Span] {
        &self.columns
    }

    /// Row span, south to north.
    pub fn rows(&self) -> Span {
        self.rows
    }

    /// Requested columns, excluding padding.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Requested rows, excluding padding.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Halo sizes.
    pub fn pad(&self) -> Pad {
        self.pad
    }

    /// Buffer columns, padding included.
    pub fn padded_width(&self) -> usize {
        self.width + self.pad.left + self.pad.right
    }

    /// Buffer rows, padding included.
    pub fn padded_height(&self) -> usize {
        self.height + self.pad.bottom + self.pad.top
    }

    /// Number of columns transferred per row.
    pub fn transfer_width(&self) -> usize {
        self.columns.iter().map(|s| s.len).sum()
    }

    /// Number of cells transferred.
    pub fn transfer_cells(&self) -> usize {
        self.transfer_width() * self.rows.len
    }

    /// Whether the window crosses the longitude seam of a global grid.
    pub fn is_wrapped(&self) -> bool {
        self.columns.len() > 1
    }

    /// Header describing just the transferred cells of `header`, in transfer order.
    ///
    /// Units, title, format and value transform are copied; `z_min`/`z_max` are left
    /// for the caller to recompute.
    pub fn transfer_header(&self, header: &GridHeader) -> GridHeader {
        let nx = self.transfer_width();
        let ny = self.rows.len;
        let extent = |origin: f64, first: i64, n: usize, inc: f64| {
            let lo = origin + first as f64 * inc;
            let hi = match header.registration {
                Registration::GridLine => lo + (n as f64 - 1.0) * inc,
                Registration::Pixel => lo + n as f64 * inc,
            };
            (lo, hi)
        };
        let (x_min, x_max) = extent(header.x_min, self.col_origin, nx, header.x_inc);
        let (y_min, y_max) = extent(header.y_min, self.rows.file_start as i64, ny, header.y_inc);
        GridHeader {
            nx,
            ny,
            x_min,
            x_max,
            y_min,
            y_max,
            ..header.clone()
        }
    }
}
