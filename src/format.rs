//! Format identifiers and the registry resolving them to codecs.

use std::collections::HashMap;
use std::sync::OnceLock;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::codec::native::NativeCodec;
use crate::codec::raster::SunRasterCodec;
use crate::codec::surfer::SurferCodec;
use crate::codec::GridCodec;
use crate::error::{GridError, GridResult};

/// Numeric identifiers of the supported grid file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(i32)]
pub enum FormatId {
    /// Native binary header, 4-byte floats.
    NativeFloat = 1,
    /// Native binary header, 2-byte signed integers.
    ScaledShort = 2,
    /// 8-bit Sun rasterfile.
    SunRaster = 3,
    /// Native binary header, 1-byte unsigned integers.
    UnsignedByte = 4,
    /// Native binary header, one bit per node.
    BitPacked = 5,
    /// Golden Software Surfer grid, ASCII or binary.
    Surfer = 6,
}

impl FormatId {
    /// All registered formats.
    pub const ALL: [FormatId; 6] = [
        FormatId::NativeFloat,
        FormatId::ScaledShort,
        FormatId::SunRaster,
        FormatId::UnsignedByte,
        FormatId::BitPacked,
        FormatId::Surfer,
    ];

    /// Parse a raw numeric id.
    pub fn from_id(id: i32) -> GridResult<Self> {
        Self::try_from(id).map_err(|_| GridError::UnknownFormat(id))
    }

    /// The numeric id.
    pub fn id(self) -> i32 {
        self.into()
    }
}

/// A registry of grid codecs, one per [`FormatId`].
///
/// The registry is filled once and then only read from.
#[derive(Debug)]
pub struct FormatRegistry(HashMap<FormatId, Box<dyn GridCodec>>);

impl FormatRegistry {
    /// The process-wide registry holding every built-in codec.
    pub fn shared() -> &'static FormatRegistry {
        static REGISTRY: OnceLock<FormatRegistry> = OnceLock::new();
        REGISTRY.get_or_init(FormatRegistry::default)
    }

    /// Look up the codec for a raw numeric format id.
    pub fn resolve(&self, id: i32) -> GridResult<&dyn GridCodec> {
        self.get(FormatId::from_id(id)?)
    }

    /// Look up the codec for `format`.
    pub fn get(&self, format: FormatId) -> GridResult<&dyn GridCodec> {
        self.0
            .get(&format)
            .map(|codec| codec.as_ref())
            .ok_or(GridError::UnknownFormat(format.id()))
    }
}

impl AsRef<HashMap<FormatId, Box<dyn GridCodec>>> for FormatRegistry {
    fn as_ref(&self) -> &HashMap<FormatId, Box<dyn GridCodec>> {
        &self.0
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        let mut registry = HashMap::with_capacity(FormatId::ALL.len());
        registry.insert(FormatId::NativeFloat, Box::new(NativeCodec::float()) as _);
        registry.insert(FormatId::ScaledShort, Box::new(NativeCodec::short()) as _);
        registry.insert(FormatId::SunRaster, Box::new(SunRasterCodec) as _);
        registry.insert(FormatId::UnsignedByte, Box::new(NativeCodec::unsigned_byte()) as _);
        registry.insert(FormatId::BitPacked, Box::new(NativeCodec::bit()) as _);
        registry.insert(FormatId::Surfer, Box::new(SurferCodec) as _);
        Self(registry)
    }
}
