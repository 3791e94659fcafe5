//! Caller-owned grid buffers and the halo fill that follows every read.

use crate::error::{GridError, GridResult};
use crate::header::GridHeader;
use crate::region::{Pad, RegionMap};

/// A row-major block of logical `f32` values with a padding halo.
///
/// Row 0 is the southernmost row of the bottom halo. Complex buffers hold a
/// real/imaginary pair per cell. Missing values are `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct GridBuffer {
    data: Vec<f32>,
    width: usize,
    height: usize,
    pad: Pad,
    complex: bool,
}

impl GridBuffer {
    /// A buffer of `width` × `height` cells plus `pad`, filled with `NaN`.
    pub fn new(width: usize, height: usize, pad: Pad, complex: bool) -> Self {
        let components = if complex { 2 } else { 1 };
        let len = (width + pad.left + pad.right) * (height + pad.bottom + pad.top) * components;
        Self {
            data: vec![f32::NAN; len],
            width,
            height,
            pad,
            complex,
        }
    }

    /// A buffer sized for `map`.
    pub fn for_region(map: &RegionMap, complex: bool) -> Self {
        Self::new(map.width(), map.height(), map.pad(), complex)
    }

    /// A buffer holding exactly the cells of `header` plus `pad`, for writing.
    pub fn for_header(header: &GridHeader, pad: Pad) -> Self {
        Self::new(header.nx, header.ny, pad, header.complex)
    }

    /// Wrap existing values, checking the length.
    pub fn from_vec(
        data: Vec<f32>,
        width: usize,
        height: usize,
        pad: Pad,
        complex: bool,
    ) -> GridResult<Self> {
        let buffer = Self {
            data: Vec::new(),
            width,
            height,
            pad,
            complex,
        };
        let expected = buffer.stride() * buffer.padded_height();
        if data.len() != expected {
            return Err(GridError::BufferShape {
                expected: (buffer.stride(), buffer.padded_height()),
                actual: (data.len(), 1),
            });
        }
        Ok(Self { data, ..buffer })
    }

    /// Cells per row, excluding padding.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Rows, excluding padding.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Halo sizes.
    pub fn pad(&self) -> Pad {
        self.pad
    }

    /// Whether each cell holds a real/imaginary pair.
    pub fn is_complex(&self) -> bool {
        self.complex
    }

    /// Values per cell.
    pub fn components(&self) -> usize {
        if self.complex {
            2
        } else {
            1
        }
    }

    /// Rows including padding.
    pub fn padded_height(&self) -> usize {
        self.height + self.pad.bottom + self.pad.top
    }

    /// Cells per row including padding.
    pub fn padded_width(&self) -> usize {
        self.width + self.pad.left + self.pad.right
    }

    /// Values per row including padding.
    pub fn stride(&self) -> usize {
        self.padded_width() * self.components()
    }

    /// All values.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// All values, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consume the buffer, returning its values.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Values of padded row `row`.
    pub fn row(&self, row: usize) -> &[f32] {
        let stride = self.stride();
        &self.data[row * stride..][..stride]
    }

    /// Values of padded row `row`, mutably.
    pub fn row_mut(&mut self, row: usize) -> &mut [f32] {
        let stride = self.stride();
        &mut self.data[row * stride..][..stride]
    }

    /// Value at padded cell (`col`, `row`); the real part for complex buffers.
    pub fn get(&self, col: usize, row: usize) -> f32 {
        self.row(row)[col * self.components()]
    }

    /// Set padded cell (`col`, `row`); the real part for complex buffers.
    pub fn set(&mut self, col: usize, row: usize, value: f32) {
        let components = self.components();
        self.row_mut(row)[col * components] = value;
    }

    /// Values of the window without padding, row by row.
    pub fn interior(&self) -> Vec<f32> {
        let components = self.components();
        let start = self.pad.left * components;
        let len = self.width * components;
        (self.pad.bottom..self.pad.bottom + self.height)
            .flat_map(|row| self.row(row)[start..start + len].iter().copied())
            .collect()
    }

    /// Fail unless the buffer has the padded shape `map` needs.
    pub fn check_region(&self, map: &RegionMap, complex: bool) -> GridResult<()> {
        let expected = (map.padded_width(), map.padded_height());
        let actual = (self.padded_width(), self.padded_height());
        if expected != actual || self.pad != map.pad() || self.complex != complex {
            return Err(GridError::BufferShape { expected, actual });
        }
        Ok(())
    }

    /// Fail unless the buffer holds exactly the cells of `header`.
    pub fn check_header(&self, header: &GridHeader) -> GridResult<()> {
        let expected = (header.nx, header.ny);
        let actual = (self.width, self.height);
        if expected != actual || self.complex != header.complex {
            return Err(GridError::BufferShape { expected, actual });
        }
        Ok(())
    }

    /// Set every value outside the transferred cells of `map` to `NaN`.
    ///
    /// Covers the halo as well as any part of the window that lies beyond the file.
    pub fn fill_outside(&mut self, map: &RegionMap) {
        let components = self.components();
        let mut inside = vec![false; self.padded_width()];
        for span in map.columns() {
            inside[span.dest_range()].fill(true);
        }
        let rows = map.rows().dest_range();
        for row in 0..self.padded_height() {
            let values = self.row_mut(row);
            if !rows.contains(&row) {
                values.fill(f32::NAN);
                continue;
            }
            for (cell, _) in inside.iter().enumerate().filter(|(_, inside)| !**inside) {
                values[cell * components..][..components].fill(f32::NAN);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::header::Registration;
    use crate::region::Window;

    #[test]
    fn test_fill_outside_keeps_only_intersection() {
        let header =
            GridHeader::new(Registration::GridLine, (0.0, 4.0, 0.0, 4.0), 1.0, 1.0).unwrap();
        let map =
            RegionMap::new(&header, &Window::new(2.0, 6.0, -1.0, 1.0), Pad::uniform(1), true)
                .unwrap();
        let mut buffer = GridBuffer::for_region(&map, false);
        buffer.as_mut_slice().fill(7.0);
        buffer.fill_outside(&map);

        // window: 5 columns x 3 rows, file covers columns 2..=4 and rows 0..=1
        for row in 0..buffer.padded_height() {
            for col in 0..buffer.padded_width() {
                let expect_data = (2..4).contains(&row) && (1..4).contains(&col);
                assert_eq!(!buffer.get(col, row).is_nan(), expect_data, "({col}, {row})");
            }
        }
    }

    #[test]
    fn test_complex_layout() {
        let mut buffer = GridBuffer::new(2, 1, Pad::default(), true);
        assert_eq!(buffer.stride(), 4);
        buffer.as_mut_slice().copy_from_slice(&[1.0, -1.0, 2.0, -2.0]);
        assert_eq!(buffer.get(1, 0), 2.0);
        assert_eq!(buffer.interior(), vec![1.0, -1.0, 2.0, -2.0]);
    }

    #[test]
    fn test_from_vec_checks_len() {
        assert!(GridBuffer::from_vec(vec![0.0; 6], 2, 3, Pad::default(), false).is_ok());
        assert!(matches!(
            GridBuffer::from_vec(vec![0.0; 5], 2, 3, Pad::default(), false),
            Err(GridError::BufferShape { .. })
        ));
    }
}
