//! Row sources that [`Image::read`](crate::Image::read) ingests from.
//!
//! The core never parses image file formats itself. A [`SourceOpener`] turns a
//! path into an [`ImageSource`], which only has to report its geometry and
//! channel names and hand out rows of one channel at a time.

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use crate::dtype::{as_bytes, encode_f64, ElementType};
use crate::error::{Error, Result};

/// An opened, readable image.
pub trait ImageSource {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    fn channel_count(&self) -> usize;

    /// Name of channel `index`, or `None` when out of range.
    fn channel_name(&self, index: usize) -> Option<&str>;

    /// Read `rows` of channel `channel` as native-endian bytes of `dtype`.
    fn read_rows(&mut self, channel: usize, rows: Range<usize>, dtype: ElementType) -> Result<Vec<u8>>;

    /// Image-level metadata carried by the source.
    fn metadata(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

/// Opens a path (and subimage) as an [`ImageSource`].
pub trait SourceOpener {
    type Source: ImageSource;

    fn open(&self, path: &Path, subimage: usize) -> Result<Self::Source>;
}

/// One in-memory subimage: named `f32` planes of equal size.
#[derive(Debug, Clone)]
pub struct MemoryImage {
    width: usize,
    height: usize,
    names: Vec<String>,
    planes: Vec<Vec<f32>>,
    metadata: BTreeMap<String, String>,
}

impl MemoryImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            names: Vec::new(),
            planes: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Append a plane of `width * height` values.
    pub fn with_channel(mut self, name: impl Into<String>, plane: Vec<f32>) -> Result<Self> {
        if plane.len() != self.width * self.height {
            return Err(Error::shape(
                format!("{} values ({} x {})", self.width * self.height, self.height, self.width),
                format!("{} values", plane.len()),
            ));
        }
        self.names.push(name.into());
        self.planes.push(plane);
        Ok(self)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Serves [`MemoryImage`]s as subimages; the path is ignored.
#[derive(Debug, Clone, Default)]
pub struct MemoryOpener {
    subimages: Arc<Vec<MemoryImage>>,
}

impl MemoryOpener {
    pub fn new(subimages: Vec<MemoryImage>) -> Self {
        Self {
            subimages: Arc::new(subimages),
        }
    }
}

impl SourceOpener for MemoryOpener {
    type Source = MemorySource;

    fn open(&self, _path: &Path, subimage: usize) -> Result<MemorySource> {
        if subimage >= self.subimages.len() {
            return Err(Error::index("subimage", subimage, self.subimages.len()));
        }
        Ok(MemorySource {
            subimages: Arc::clone(&self.subimages),
            index: subimage,
        })
    }
}

pub struct MemorySource {
    subimages: Arc<Vec<MemoryImage>>,
    index: usize,
}

impl MemorySource {
    fn image(&self) -> &MemoryImage {
        &self.subimages[self.index]
    }
}

impl ImageSource for MemorySource {
    fn width(&self) -> usize {
        self.image().width
    }

    fn height(&self) -> usize {
        self.image().height
    }

    fn channel_count(&self) -> usize {
        self.image().planes.len()
    }

    fn channel_name(&self, index: usize) -> Option<&str> {
        self.image().names.get(index).map(String::as_str)
    }

    fn read_rows(&mut self, channel: usize, rows: Range<usize>, dtype: ElementType) -> Result<Vec<u8>> {
        let image = self.image();
        let plane = image
            .planes
            .get(channel)
            .ok_or_else(|| Error::index("channel", channel, image.planes.len()))?;
        if rows.start > rows.end || rows.end > image.height {
            return Err(Error::Source(format!(
                "row range {}..{} outside of {} rows",
                rows.start, rows.end, image.height
            )));
        }
        let values = &plane[rows.start * image.width..rows.end * image.width];
        if dtype == ElementType::F32 {
            return Ok(as_bytes(values).to_vec());
        }
        let wide: Vec<f64> = values.iter().map(|&v| f64::from(v)).collect();
        Ok(encode_f64(&wide, dtype))
    }

    fn metadata(&self) -> BTreeMap<String, String> {
        self.image().metadata.clone()
    }
}
