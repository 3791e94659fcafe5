#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

mod buffer;
pub mod codec;
pub mod config;
pub mod endian;
pub mod error;
pub mod filespec;
pub mod format;
mod grid;
pub mod header;
pub mod region;
pub mod storage;

pub use buffer::GridBuffer;
pub use codec::{GridCodec, WriteReport};
pub use config::GridIoConfig;
pub use endian::Endianness;
pub use error::{FormatError, GridError, GridResult};
pub use filespec::{GridFile, Overrides, SuffixTable};
pub use format::{FormatId, FormatRegistry};
pub use grid::{read_header, GridIo};
pub use header::{GridHeader, Registration};
pub use region::{Pad, RegionMap, Span, Window};
