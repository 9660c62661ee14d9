use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::Path;

use tracing::debug;

use crate::dtype::{convert_bytes, ElementType};
use crate::error::{Error, Result};
use crate::options::checked_bytes;
use crate::source::{ImageSource, SourceOpener};

/// Geometry of a headerless raw planar file.
///
/// The file holds every plane back to back, each `width * height` elements of
/// `stored`, native endian, row-major. Channel `i` starts at byte
/// `i * width * height * stored.size()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPlanarLayout {
    pub width: usize,
    pub height: usize,
    pub stored: ElementType,
    pub channel_names: Vec<String>,
}

impl RawPlanarLayout {
    // Only called once `file_len` has succeeded for this layout.
    fn plane_bytes(&self) -> usize {
        self.width * self.height * self.stored.size()
    }

    fn row_bytes(&self) -> usize {
        self.width * self.stored.size()
    }

    /// Expected file length in bytes, or [`Error::InvalidConfig`] if the
    /// layout is too large to address.
    pub fn file_len(&self) -> Result<usize> {
        checked_bytes(self.stored, self.width, 1)?;
        checked_bytes(self.stored, self.width, self.height)?
            .checked_mul(self.channel_names.len())
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "{} planes of {}x{} {} do not fit in memory",
                    self.channel_names.len(),
                    self.width,
                    self.height,
                    self.stored
                ))
            })
    }
}

/// Opens raw planar files described by a fixed [`RawPlanarLayout`].
#[derive(Debug, Clone)]
pub struct RawPlanarOpener {
    layout: RawPlanarLayout,
}

impl RawPlanarOpener {
    pub fn new(layout: RawPlanarLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &RawPlanarLayout {
        &self.layout
    }
}

impl SourceOpener for RawPlanarOpener {
    type Source = RawPlanarSource;

    fn open(&self, path: &Path, subimage: usize) -> Result<RawPlanarSource> {
        if subimage != 0 {
            return Err(Error::index("subimage", subimage, 1));
        }
        let expected = self.layout.file_len()? as u64;
        let file = File::open(path)?;
        let actual = file.metadata()?.len();
        if actual != expected {
            return Err(Error::Source(format!(
                "{} is {} bytes but {} channels of {}x{} {} need {}",
                path.display(),
                actual,
                self.layout.channel_names.len(),
                self.layout.width,
                self.layout.height,
                self.layout.stored,
                expected
            )));
        }
        debug!(path = %path.display(), bytes = actual, "opened raw planar file");

        let mut metadata = BTreeMap::new();
        metadata.insert("source.path".to_string(), path.display().to_string());
        metadata.insert("source.dtype".to_string(), self.layout.stored.to_string());
        Ok(RawPlanarSource {
            file,
            layout: self.layout.clone(),
            metadata,
        })
    }
}

pub struct RawPlanarSource {
    file: File,
    layout: RawPlanarLayout,
    metadata: BTreeMap<String, String>,
}

impl ImageSource for RawPlanarSource {
    fn width(&self) -> usize {
        self.layout.width
    }

    fn height(&self) -> usize {
        self.layout.height
    }

    fn channel_count(&self) -> usize {
        self.layout.channel_names.len()
    }

    fn channel_name(&self, index: usize) -> Option<&str> {
        self.layout.channel_names.get(index).map(String::as_str)
    }

    fn read_rows(&mut self, channel: usize, rows: Range<usize>, dtype: ElementType) -> Result<Vec<u8>> {
        if channel >= self.channel_count() {
            return Err(Error::index("channel", channel, self.channel_count()));
        }
        if rows.start > rows.end || rows.end > self.layout.height {
            return Err(Error::Source(format!(
                "row range {}..{} outside of {} rows",
                rows.start, rows.end, self.layout.height
            )));
        }
        let row_bytes = self.layout.row_bytes();
        let offset = channel * self.layout.plane_bytes() + rows.start * row_bytes;
        let mut raw = vec![0u8; rows.len() * row_bytes];
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.read_exact(&mut raw)?;
        Ok(convert_bytes(&raw, self.layout.stored, dtype))
    }

    fn metadata(&self) -> BTreeMap<String, String> {
        self.metadata.clone()
    }
}
