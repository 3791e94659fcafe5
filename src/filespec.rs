//! Grid file arguments of the form `name=id/scale/offset/nan` and the suffix table that
//! supplies defaults for them.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{GridError, GridResult};
use crate::format::FormatId;
use crate::header::GridHeader;

/// Header values a file argument replaces.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Overrides {
    /// Replacement `scale_factor`.
    pub scale_factor: Option<f64>,
    /// Replacement `add_offset`.
    pub add_offset: Option<f64>,
    /// Replacement sentinel; `Some(None)` removes it.
    pub nan_value: Option<Option<f64>>,
}

impl Overrides {
    /// Fields set here, falling back to `other` for the rest.
    pub fn or(self, other: Overrides) -> Overrides {
        Overrides {
            scale_factor: self.scale_factor.or(other.scale_factor),
            add_offset: self.add_offset.or(other.add_offset),
            nan_value: self.nan_value.or(other.nan_value),
        }
    }

    /// Whether nothing is overridden.
    pub fn is_empty(&self) -> bool {
        *self == Overrides::default()
    }

    /// Write the overridden fields into `header`.
    pub fn apply(&self, header: &mut GridHeader) {
        if let Some(scale) = self.scale_factor {
            header.scale_factor = scale;
        }
        if let Some(offset) = self.add_offset {
            header.add_offset = offset;
        }
        if let Some(nan) = self.nan_value {
            header.nan_value = nan;
        }
    }
}

/// A parsed grid file argument.
#[derive(Debug, Clone, PartialEq)]
pub struct GridFile {
    /// File to open.
    pub path: PathBuf,
    /// Format given after `=`, if any.
    pub format: Option<FormatId>,
    /// Scale, offset and sentinel given after the format id.
    pub overrides: Overrides,
}

impl GridFile {
    /// A plain path with nothing overridden.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: None,
            overrides: Overrides::default(),
        }
    }

    /// The same file stored as `format`.
    pub fn with_format(mut self, format: FormatId) -> Self {
        self.format = Some(format);
        self
    }
}

impl From<&Path> for GridFile {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl FromStr for GridFile {
    type Err = GridError;

    fn from_str(s: &str) -> GridResult<Self> {
        let invalid = |why: &str| GridError::InvalidFileSpec(format!("{s:?}: {why}"));
        let (name, suffix) = match s.split_once('=') {
            Some((name, suffix)) => (name, Some(suffix)),
            None => (s, None),
        };
        if name.is_empty() {
            return Err(invalid("missing file name"));
        }
        let mut file = GridFile::new(name);
        let Some(suffix) = suffix else {
            return Ok(file);
        };

        let fields: Vec<&str> = suffix.split('/').collect();
        if fields.len() > 4 {
            return Err(invalid("expected at most id/scale/offset/nan"));
        }
        let id: i32 = fields[0]
            .trim()
            .parse()
            .map_err(|_| invalid("format id is not an integer"))?;
        file.format = Some(FormatId::from_id(id)?);

        let number = |field: Option<&&str>, what: &str| -> GridResult<Option<f64>> {
            match field.map(|f| f.trim()).filter(|f| !f.is_empty()) {
                None => Ok(None),
                Some(f) => f
                    .parse()
                    .map(Some)
                    .map_err(|_| invalid(&format!("{what} {f:?} is not a number"))),
            }
        };
        file.overrides.scale_factor = number(fields.get(1), "scale")?;
        if file.overrides.scale_factor == Some(0.0) {
            return Err(invalid("scale must be non-zero"));
        }
        file.overrides.add_offset = number(fields.get(2), "offset")?;
        file.overrides.nan_value = match fields.get(3).map(|f| f.trim()) {
            Some(f) if f.eq_ignore_ascii_case("nan") => Some(None),
            other => number(other.as_ref(), "nan")?.map(Some),
        };
        Ok(file)
    }
}

/// One line of a [`SuffixTable`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SuffixEntry {
    /// File name suffix, without the leading dot.
    pub suffix: String,
    /// Format of files carrying the suffix.
    pub format: FormatId,
    /// Default overrides for those files.
    pub overrides: Overrides,
}

/// Maps file name suffixes to formats and default overrides.
///
/// The text form has one entry per line, `suffix id scale offset nan`, with trailing
/// fields optional, `-` for "not given", `nan` for "no sentinel", and `#` starting a
/// comment:
///
/// ```text
/// # suffix  id  scale  offset  nan
/// i2        2   0.5    1000    -32768
/// ras       3
/// bit       5   -      -       nan
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SuffixTable(Vec<SuffixEntry>);

impl SuffixTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, replacing one with the same suffix.
    pub fn insert(&mut self, entry: SuffixEntry) {
        self.0.retain(|e| e.suffix != entry.suffix);
        self.0.push(entry);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The entry with the longest suffix matching the file name of `path`.
    pub fn lookup(&self, path: &Path) -> Option<&SuffixEntry> {
        let name = path.file_name()?.to_str()?;
        self.0
            .iter()
            .filter(|e| {
                name.len() > e.suffix.len() + 1
                    && name.ends_with(e.suffix.as_str())
                    && name.as_bytes()[name.len() - e.suffix.len() - 1] == b'.'
            })
            .max_by_key(|e| e.suffix.len())
    }

    /// Read a table in text form from `path`.
    pub fn load(path: &Path) -> GridResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| GridError::from(e).with_path(path))?;
        text.parse()
    }
}

impl FromStr for SuffixTable {
    type Err = GridError;

    fn from_str(s: &str) -> GridResult<Self> {
        let mut table = SuffixTable::new();
        for (lineno, line) in s.lines().enumerate() {
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 2 || fields.len() > 5 {
                return Err(GridError::InvalidFileSpec(format!(
                    "suffix table line {}: expected `suffix id [scale offset nan]`",
                    lineno + 1
                )));
            }
            // same grammar as the part after `=` in a file argument
            let spec = fields[1..]
                .iter()
                .map(|f| if *f == "-" { "" } else { f })
                .collect::<Vec<_>>()
                .join("/");
            let parsed: GridFile = format!("x={spec}").parse().map_err(|e| match e {
                GridError::InvalidFileSpec(msg) => {
                    GridError::InvalidFileSpec(format!("suffix table line {}: {msg}", lineno + 1))
                }
                other => other,
            })?;
            let Some(format) = parsed.format else {
                continue;
            };
            table.insert(SuffixEntry {
                suffix: fields[0].trim_start_matches('.').to_string(),
                format,
                overrides: parsed.overrides,
            });
        }
        Ok(table)
    }
}
