use std::collections::BTreeMap;
use std::fmt;

/// A snapshot of an image's size and compression figures.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageStatistics {
    pub width: usize,
    pub height: usize,
    pub channel_names: Vec<String>,
    /// Bytes held by all chunks of all channels.
    pub compressed_size: usize,
    /// Bytes all channels would occupy decompressed.
    pub uncompressed_size: usize,
    pub num_chunks: usize,
    pub num_lazy_chunks: usize,
    pub metadata: BTreeMap<String, String>,
}

impl ImageStatistics {
    pub fn num_channels(&self) -> usize {
        self.channel_names.len()
    }

    pub fn compression_ratio(&self) -> f64 {
        if self.compressed_size == 0 {
            return 1.0;
        }
        self.uncompressed_size as f64 / self.compressed_size as f64
    }
}

impl fmt::Display for ImageStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Statistics for image buffer:")?;
        writeln!(f, " Width:             {}", self.width)?;
        writeln!(f, " Height:            {}", self.height)?;
        writeln!(f, " Channels:          {}", self.num_channels())?;
        writeln!(f, " Channel names:     [{}]", self.channel_names.join(", "))?;
        writeln!(f, " --------------")?;
        writeln!(f, " Compressed size:   {} bytes", self.compressed_size)?;
        writeln!(f, " Uncompressed size: {} bytes", self.uncompressed_size)?;
        writeln!(f, " Compression ratio: {:.2}x", self.compression_ratio())?;
        writeln!(f, " Chunks:            {} ({} lazy)", self.num_chunks, self.num_lazy_chunks)?;
        write!(f, " Metadata:")?;
        if self.metadata.is_empty() {
            return writeln!(f, "          {{}}");
        }
        writeln!(f)?;
        for (key, value) in &self.metadata {
            writeln!(f, "    {:?}: {:?}", key, value)?;
        }
        Ok(())
    }
}
