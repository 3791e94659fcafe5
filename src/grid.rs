//! Format-agnostic entry point: resolve the codec, map the region, transfer, fill the halo.

use std::path::Path;

use crate::buffer::GridBuffer;
use crate::codec::{written_header, GridCodec, WriteReport};
use crate::config::GridIoConfig;
use crate::error::{FormatError, GridResult};
use crate::filespec::{GridFile, Overrides};
use crate::format::{FormatId, FormatRegistry};
use crate::header::GridHeader;
use crate::region::{Pad, RegionMap, Window};

/// Reads and writes grids in any registered format.
///
/// ```no_run
/// use grdio::{GridFile, GridIo, GridIoConfig, Pad, Window};
///
/// let io = GridIo::new(GridIoConfig::from_env());
/// let file: GridFile = "topo.i2=2/0.5/0/-32768".parse()?;
/// let header = io.read_header(&file)?;
/// let window = Window::new(350.0, 370.0, -10.0, 10.0);
/// let buffer = io.read_grid(&file, &header, &window, Pad::uniform(2))?;
/// # Ok::<(), grdio::GridError>(())
/// ```
#[derive(Debug)]
pub struct GridIo {
    config: GridIoConfig,
    registry: &'static FormatRegistry,
}

impl Default for GridIo {
    fn default() -> Self {
        Self::new(GridIoConfig::default())
    }
}

impl GridIo {
    /// An I/O front end using `config` and the built-in codecs.
    pub fn new(config: GridIoConfig) -> Self {
        Self {
            config,
            registry: FormatRegistry::shared(),
        }
    }

    /// The configuration every call uses.
    pub fn config(&self) -> &GridIoConfig {
        &self.config
    }

    /// Format and overrides for `file`: its explicit `=id` first, then the suffix table,
    /// then the configured default.
    pub fn resolve(&self, file: &GridFile) -> (FormatId, Overrides) {
        if let Some(format) = file.format {
            return (format, file.overrides);
        }
        match self.config.suffixes.lookup(&file.path) {
            Some(entry) => (entry.format, file.overrides.or(entry.overrides)),
            None => (self.config.default_format, file.overrides),
        }
    }

    fn codec(&self, file: &GridFile) -> GridResult<(&dyn GridCodec, Overrides)> {
        let (format, overrides) = self.resolve(file);
        let codec = self.registry.get(format)?;
        tracing::debug!(path = %file.path.display(), ?format, "resolved grid format");
        Ok((codec, overrides))
    }

    fn check_complex(codec: &dyn GridCodec, header: &GridHeader) -> GridResult<()> {
        if header.complex && !codec.supports_complex() {
            return Err(FormatError::Unsupported(format!(
                "complex grids in format {}",
                codec.format().id()
            ))
            .into());
        }
        Ok(())
    }

    /// Read the header of `file`, with the file argument's overrides applied.
    pub fn read_header(&self, file: &GridFile) -> GridResult<GridHeader> {
        let (codec, overrides) = self.codec(file)?;
        let path = file.path.as_path();
        let mut header = codec
            .read_header(path, &self.config)
            .map_err(|e| e.with_path(path))?;
        overrides.apply(&mut header);
        header.validate()?;
        Ok(header)
    }

    /// Create `file` holding only `header`, with the file argument's overrides applied.
    pub fn write_header(&self, file: &GridFile, header: &GridHeader) -> GridResult<()> {
        let (codec, overrides) = self.codec(file)?;
        let mut header = header.clone();
        overrides.apply(&mut header);
        header.format = codec.format();
        Self::check_complex(codec, &header)?;
        let path = file.path.as_path();
        codec
            .write_header(path, &header, &self.config)
            .map_err(|e| e.with_path(path))
    }

    /// Intersect `window` with the grid of `header`. Touches no file.
    pub fn map_region(&self, header: &GridHeader, window: &Window, pad: Pad) -> GridResult<RegionMap> {
        RegionMap::new(header, window, pad, self.config.wrap_longitude)
    }

    /// Map `window` and allocate a `NaN`-filled buffer for it.
    pub fn allocate(
        &self,
        header: &GridHeader,
        window: &Window,
        pad: Pad,
    ) -> GridResult<(RegionMap, GridBuffer)> {
        let map = self.map_region(header, window, pad)?;
        let buffer = GridBuffer::for_region(&map, header.complex);
        Ok((map, buffer))
    }

    /// Read `window` of `file` into a new buffer with `pad` halo cells on each side.
    ///
    /// `header` is the one [`read_header`][Self::read_header] returned. Cells outside
    /// the grid are `NaN`. An empty intersection fails before the file is opened.
    pub fn read_grid(
        &self,
        file: &GridFile,
        header: &GridHeader,
        window: &Window,
        pad: Pad,
    ) -> GridResult<GridBuffer> {
        let (map, mut buffer) = self.allocate(header, window, pad)?;
        self.read_grid_into(file, header, &map, &mut buffer)?;
        Ok(buffer)
    }

    /// Read the cells of `map` into a caller-owned `buffer`, then `NaN` the rest.
    pub fn read_grid_into(
        &self,
        file: &GridFile,
        header: &GridHeader,
        map: &RegionMap,
        buffer: &mut GridBuffer,
    ) -> GridResult<()> {
        let (codec, _) = self.codec(file)?;
        Self::check_complex(codec, header)?;
        let path = file.path.as_path();
        codec
            .read_grid(path, header, map, buffer, &self.config)
            .map_err(|e| e.with_path(path))?;
        buffer.fill_outside(map);
        Ok(())
    }

    /// Write `window` of `buffer` to `file`.
    ///
    /// `header` describes the whole buffer without its halo. The file's header covers
    /// only the written cells, with `z_min`/`z_max` recomputed and the file argument's
    /// overrides applied. Clamped values are reported, not fatal; see
    /// [`WriteReport::into_result`].
    pub fn write_grid(
        &self,
        file: &GridFile,
        header: &GridHeader,
        buffer: &GridBuffer,
        window: &Window,
    ) -> GridResult<WriteReport> {
        header.validate()?;
        buffer.check_header(header)?;
        let (codec, overrides) = self.codec(file)?;
        Self::check_complex(codec, header)?;
        let map = self.map_region(header, window, buffer.pad())?;

        let mut out = written_header(header, buffer, &map);
        overrides.apply(&mut out);
        out.format = codec.format();

        let path = file.path.as_path();
        let report = codec
            .write_grid(path, &out, buffer, &map, &self.config)
            .map_err(|e| e.with_path(path))?;
        report.log(path);
        Ok(report)
    }

    /// Write all of `buffer` to `file`.
    pub fn write_full(
        &self,
        file: &GridFile,
        header: &GridHeader,
        buffer: &GridBuffer,
    ) -> GridResult<WriteReport> {
        self.write_grid(file, header, buffer, &Window::full(header))
    }
}

/// Read the header of the grid at `path` with the default configuration.
pub fn read_header(path: impl AsRef<Path>) -> GridResult<GridHeader> {
    GridIo::default().read_header(&GridFile::new(path.as_ref()))
}
