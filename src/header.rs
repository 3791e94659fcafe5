//! The grid header: dimensions, extent, registration and value transform of one stored grid.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::{FormatError, GridResult};
use crate::format::FormatId;

/// Tolerance, in cells, when checking counts against extent and increment.
const DIMENSION_SLOP: f64 = 0.01;

/// Whether node coordinates refer to grid-line intersections or to cell centers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(i32)]
pub enum Registration {
    /// Nodes sit on the bounds; `nx = (x_max - x_min) / x_inc + 1`.
    GridLine = 0,
    /// Nodes are cell centers, half a cell inside the bounds; `nx = (x_max - x_min) / x_inc`.
    Pixel = 1,
}

// not derived: num_enum takes `#[default]` as the catch-all for unknown values
impl Default for Registration {
    fn default() -> Self {
        Registration::GridLine
    }
}

impl Registration {
    /// Number of nodes implied by an extent of `span` sampled every `inc`.
    pub fn count(self, span: f64, inc: f64) -> f64 {
        match self {
            Registration::GridLine => span / inc + 1.0,
            Registration::Pixel => span / inc,
        }
    }

    /// Cell size implied by an extent of `span` holding `n` nodes.
    pub fn increment(self, span: f64, n: usize) -> f64 {
        match self {
            Registration::GridLine => span / (n as f64 - 1.0),
            Registration::Pixel => span / n as f64,
        }
    }

    /// Offset of node 0 from the lower bound, in cells.
    pub fn node_offset(self) -> f64 {
        match self {
            Registration::GridLine => 0.0,
            Registration::Pixel => 0.5,
        }
    }
}

/// Metadata of one stored grid.
///
/// Rows are counted from the south (`y_min`) and columns from the west (`x_min`).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridHeader {
    /// Number of columns.
    pub nx: usize,
    /// Number of rows.
    pub ny: usize,
    /// Node registration.
    pub registration: Registration,
    /// West bound.
    pub x_min: f64,
    /// East bound.
    pub x_max: f64,
    /// South bound.
    pub y_min: f64,
    /// North bound.
    pub y_max: f64,
    /// Cell width.
    pub x_inc: f64,
    /// Cell height.
    pub y_inc: f64,
    /// Smallest data value (advisory).
    pub z_min: f64,
    /// Largest data value (advisory).
    pub z_max: f64,
    /// Multiplier from stored to logical values.
    pub scale_factor: f64,
    /// Offset from stored to logical values.
    pub add_offset: f64,
    /// Stored value meaning "no data", if any.
    pub nan_value: Option<f64>,
    /// Storage format of the file.
    pub format: FormatId,
    /// Whether each cell holds an interleaved real/imaginary pair.
    pub complex: bool,
    /// Units of x.
    pub x_units: String,
    /// Units of y.
    pub y_units: String,
    /// Units of z.
    pub z_units: String,
    /// Free-form title.
    pub title: String,
    /// Command that produced the grid.
    pub command: String,
    /// Free-form remark.
    pub remark: String,
}

impl GridHeader {
    /// Build a header from an extent and increments, deriving `nx`/`ny`.
    pub fn new(
        registration: Registration,
        (x_min, x_max, y_min, y_max): (f64, f64, f64, f64),
        x_inc: f64,
        y_inc: f64,
    ) -> GridResult<Self> {
        if !(x_inc > 0.0 && y_inc > 0.0) {
            return Err(FormatError::NonPositiveIncrement(x_inc, y_inc).into());
        }
        let header = Self {
            nx: registration.count(x_max - x_min, x_inc).round().max(0.0) as usize,
            ny: registration.count(y_max - y_min, y_inc).round().max(0.0) as usize,
            registration,
            x_min,
            x_max,
            y_min,
            y_max,
            x_inc,
            y_inc,
            ..Self::default()
        };
        header.validate()?;
        Ok(header)
    }

    /// Number of cells.
    pub fn cells(&self) -> usize {
        self.nx * self.ny
    }

    /// Stored values per row (two per cell for complex grids).
    pub fn values_per_row(&self) -> usize {
        self.nx * self.components()
    }

    /// Values per cell.
    pub fn components(&self) -> usize {
        if self.complex {
            2
        } else {
            1
        }
    }

    /// x coordinate of column `col`.
    pub fn x_at(&self, col: usize) -> f64 {
        self.x_min + (col as f64 + self.registration.node_offset()) * self.x_inc
    }

    /// y coordinate of row `row` (row 0 is the southernmost).
    pub fn y_at(&self, row: usize) -> f64 {
        self.y_min + (row as f64 + self.registration.node_offset()) * self.y_inc
    }

    /// Fill `x_inc`/`y_inc` from bounds and counts, for formats that do not store them.
    pub fn derive_increments(&mut self) -> GridResult<()> {
        self.x_inc = self
            .registration
            .increment(self.x_max - self.x_min, self.nx);
        self.y_inc = self
            .registration
            .increment(self.y_max - self.y_min, self.ny);
        if !(self.x_inc.is_finite() && self.x_inc > 0.0 && self.y_inc.is_finite() && self.y_inc > 0.0)
        {
            return Err(FormatError::NonPositiveIncrement(self.x_inc, self.y_inc).into());
        }
        Ok(())
    }

    /// Check the structural invariants of the header.
    pub fn validate(&self) -> GridResult<()> {
        if self.nx == 0 || self.ny == 0 || self.nx > i32::MAX as usize || self.ny > i32::MAX as usize
        {
            return Err(FormatError::InvalidDimensions(self.nx as i64, self.ny as i64).into());
        }
        let finite = [self.x_min, self.x_max, self.y_min, self.y_max]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.x_min >= self.x_max || self.y_min >= self.y_max {
            return Err(
                FormatError::InvalidExtent(self.x_min, self.x_max, self.y_min, self.y_max).into(),
            );
        }
        if !(self.x_inc.is_finite() && self.x_inc > 0.0 && self.y_inc.is_finite() && self.y_inc > 0.0)
        {
            return Err(FormatError::NonPositiveIncrement(self.x_inc, self.y_inc).into());
        }
        for (axis, declared, span, inc) in [
            ('x', self.nx, self.x_max - self.x_min, self.x_inc),
            ('y', self.ny, self.y_max - self.y_min, self.y_inc),
        ] {
            let computed = self.registration.count(span, inc);
            if (computed - declared as f64).abs() > DIMENSION_SLOP {
                return Err(FormatError::InconsistentDimensions {
                    axis,
                    declared,
                    computed,
                }
                .into());
            }
        }
        if !(self.scale_factor.is_finite() && self.scale_factor != 0.0)
            || !self.add_offset.is_finite()
        {
            return Err(FormatError::InvalidScale(self.scale_factor).into());
        }
        Ok(())
    }

    /// Number of columns in one 360° turn, when the grid wraps around in longitude.
    pub fn x_period(&self) -> Option<usize> {
        let span = self.x_max - self.x_min;
        if (span - 360.0).abs() > self.x_inc * 1e-3 {
            return None;
        }
        let period = (360.0 / self.x_inc).round() as usize;
        let expected = match self.registration {
            Registration::GridLine => period + 1,
            Registration::Pixel => period,
        };
        (period > 0 && expected == self.nx).then_some(period)
    }
}

impl Default for GridHeader {
    fn default() -> Self {
        Self {
            nx: 0,
            ny: 0,
            registration: Registration::GridLine,
            x_min: 0.0,
            x_max: 0.0,
            y_min: 0.0,
            y_max: 0.0,
            x_inc: 0.0,
            y_inc: 0.0,
            z_min: 0.0,
            z_max: 0.0,
            scale_factor: 1.0,
            add_offset: 0.0,
            nan_value: None,
            format: FormatId::NativeFloat,
            complex: false,
            x_units: String::new(),
            y_units: String::new(),
            z_units: String::new(),
            title: String::new(),
            command: String::new(),
            remark: String::new(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::GridError;

    #[test]
    fn test_new_derives_counts() {
        let h = GridHeader::new(Registration::GridLine, (0.0, 10.0, -5.0, 5.0), 0.5, 1.0).unwrap();
        assert_eq!((h.nx, h.ny), (21, 11));
        assert_eq!(h.x_at(20), 10.0);
        assert_eq!(h.y_at(0), -5.0);

        let h = GridHeader::new(Registration::Pixel, (0.0, 10.0, -5.0, 5.0), 0.5, 1.0).unwrap();
        assert_eq!((h.nx, h.ny), (20, 10));
        assert_eq!(h.x_at(0), 0.25);
        assert_eq!(h.y_at(9), 4.5);
    }

    #[test]
    fn test_derive_increments() {
        let mut h = GridHeader {
            nx: 5,
            ny: 3,
            x_min: 0.0,
            x_max: 4.0,
            y_min: 0.0,
            y_max: 1.0,
            ..Default::default()
        };
        h.derive_increments().unwrap();
        assert_eq!((h.x_inc, h.y_inc), (1.0, 0.5));
        h.validate().unwrap();

        // a single grid-line node cannot span an extent
        h.nx = 1;
        assert!(matches!(
            h.derive_increments(),
            Err(GridError::Format(FormatError::NonPositiveIncrement(..)))
        ));
    }

    #[test]
    fn test_validate_rejects_inconsistent() {
        let mut h = GridHeader::new(Registration::Pixel, (0.0, 4.0, 0.0, 2.0), 1.0, 1.0).unwrap();
        h.nx = 5;
        assert!(matches!(
            h.validate(),
            Err(GridError::Format(FormatError::InconsistentDimensions { axis: 'x', .. }))
        ));
        h.nx = 4;
        h.scale_factor = 0.0;
        assert!(matches!(
            h.validate(),
            Err(GridError::Format(FormatError::InvalidScale(_)))
        ));
        h.scale_factor = 1.0;
        h.y_max = -1.0;
        assert!(matches!(
            h.validate(),
            Err(GridError::Format(FormatError::InvalidExtent(..)))
        ));
    }

    #[test]
    fn test_x_period() {
        let h = GridHeader::new(Registration::Pixel, (0.0, 360.0, -90.0, 90.0), 1.0, 1.0).unwrap();
        assert_eq!(h.x_period(), Some(360));
        let h = GridHeader::new(Registration::GridLine, (-180.0, 180.0, -90.0, 90.0), 0.5, 0.5)
            .unwrap();
        assert_eq!(h.x_period(), Some(720));
        let h = GridHeader::new(Registration::GridLine, (0.0, 350.0, 0.0, 1.0), 1.0, 1.0).unwrap();
        assert_eq!(h.x_period(), None);
    }

    #[test]
    fn test_registration_from_raw() {
        assert_eq!(Registration::try_from(1).unwrap(), Registration::Pixel);
        assert!(Registration::try_from(2).is_err());
        assert_eq!(i32::from(Registration::GridLine), 0);
    }
}
