//! Configuration for grid I/O.

use std::path::PathBuf;

use crate::endian::Endianness;
use crate::filespec::SuffixTable;
use crate::format::FormatId;

/// Settings shared by every grid operation.
///
/// The value is passed explicitly to each call and never changed by it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GridIoConfig {
    /// Byte order used when writing native-header grids.
    pub byte_order: Endianness,

    /// Format of files whose name and suffix do not say otherwise.
    pub default_format: FormatId,

    /// Take columns modulo 360° on global grids instead of clipping.
    pub wrap_longitude: bool,

    /// Write Surfer grids as `DSAA` text instead of `DSBB` binary.
    pub surfer_ascii: bool,

    /// Formats and overrides selected by file name suffix.
    pub suffixes: SuffixTable,
}

impl Default for GridIoConfig {
    fn default() -> Self {
        Self {
            byte_order: Endianness::native(),
            default_format: FormatId::NativeFloat,
            wrap_longitude: true,
            surfer_ascii: false,
            suffixes: SuffixTable::default(),
        }
    }
}

impl GridIoConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `GRDIO_BYTE_ORDER` | `little`, `big` or `native` |
    /// | `GRDIO_DEFAULT_FORMAT` | numeric format id |
    /// | `GRDIO_WRAP_LONGITUDE` | `true`/`false` |
    /// | `GRDIO_SURFER_ASCII` | `true`/`false` |
    /// | `GRDIO_SUFFIX_FILE` | path of a suffix table |
    ///
    /// Unset variables keep their defaults; unparsable ones are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("GRDIO_BYTE_ORDER") {
            match parse_byte_order(&val) {
                Some(order) => config.byte_order = order,
                None => tracing::warn!(value = %val, "ignoring GRDIO_BYTE_ORDER"),
            }
        }

        if let Ok(val) = std::env::var("GRDIO_DEFAULT_FORMAT") {
            match val.trim().parse().ok().and_then(|id| FormatId::from_id(id).ok()) {
                Some(format) => config.default_format = format,
                None => tracing::warn!(value = %val, "ignoring GRDIO_DEFAULT_FORMAT"),
            }
        }

        if let Some(wrap) = env_flag("GRDIO_WRAP_LONGITUDE") {
            config.wrap_longitude = wrap;
        }

        if let Some(ascii) = env_flag("GRDIO_SURFER_ASCII") {
            config.surfer_ascii = ascii;
        }

        if let Ok(val) = std::env::var("GRDIO_SUFFIX_FILE") {
            let path = PathBuf::from(val);
            match SuffixTable::load(&path) {
                Ok(table) => config.suffixes = table,
                Err(err) => tracing::warn!(%err, "ignoring GRDIO_SUFFIX_FILE"),
            }
        }

        config
    }
}

fn parse_byte_order(val: &str) -> Option<Endianness> {
    match val.trim().to_lowercase().as_str() {
        "little" | "le" => Some(Endianness::LittleEndian),
        "big" | "be" => Some(Endianness::BigEndian),
        "native" => Some(Endianness::native()),
        _ => None,
    }
}

fn env_flag(key: &str) -> Option<bool> {
    let val = std::env::var(key).ok()?;
    let flag = match val.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    };
    if flag.is_none() {
        tracing::warn!(key, value = %val, "ignoring unparsable flag");
    }
    flag
}
