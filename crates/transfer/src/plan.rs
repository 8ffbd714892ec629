/// One contiguous byte range of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    /// Zero-based chunk index.
    pub index: u64,
    pub offset: u64,
    pub len: u64,
}

impl ChunkRange {
    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }
}

/// Division of a file into fixed-size chunks. The last chunk may be short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    file_size: u64,
    chunk_size: u64,
}

impl ChunkPlan {
    /// A `chunk_size` of zero is treated as one byte.
    pub fn new(file_size: u64, chunk_size: u64) -> Self {
        Self {
            file_size,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Number of chunks; zero for an empty file.
    pub fn total_chunks(&self) -> u64 {
        self.file_size.div_ceil(self.chunk_size)
    }

    /// Returns the range of chunk `index`, or `None` past the end.
    pub fn chunk(&self, index: u64) -> Option<ChunkRange> {
        if index >= self.total_chunks() {
            return None;
        }
        let offset = index * self.chunk_size;
        let len = self.chunk_size.min(self.file_size - offset);
        Some(ChunkRange { index, offset, len })
    }

    pub fn chunks(&self) -> impl Iterator<Item = ChunkRange> + '_ {
        (0..self.total_chunks()).filter_map(move |i| self.chunk(i))
    }

    /// Bytes represented by `percent` of the file, clamped to `[0, file_size]`.
    pub fn bytes_at_percent(&self, percent: f64) -> u64 {
        if !percent.is_finite() || percent <= 0.0 {
            return 0;
        }
        let fraction = (percent / 100.0).min(1.0);
        (self.file_size as f64 * fraction).round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_chunks_rounds_up() {
        assert_eq!(ChunkPlan::new(10, 4).total_chunks(), 3);
        assert_eq!(ChunkPlan::new(8, 4).total_chunks(), 2);
        assert_eq!(ChunkPlan::new(1, 4).total_chunks(), 1);
        assert_eq!(ChunkPlan::new(0, 4).total_chunks(), 0);
    }

    #[test]
    fn zero_chunk_size_is_one_byte() {
        let plan = ChunkPlan::new(3, 0);
        assert_eq!(plan.chunk_size(), 1);
        assert_eq!(plan.total_chunks(), 3);
    }

    #[test]
    fn last_chunk_is_short() {
        let plan = ChunkPlan::new(10, 4);
        let ranges: Vec<_> = plan.chunks().collect();
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0], ChunkRange { index: 0, offset: 0, len: 4 });
        assert_eq!(ranges[2], ChunkRange { index: 2, offset: 8, len: 2 });
        assert_eq!(ranges[2].end(), 10);
        assert!(plan.chunk(3).is_none());
    }

    #[test]
    fn bytes_at_percent() {
        let plan = ChunkPlan::new(1000, 100);
        assert_eq!(plan.bytes_at_percent(0.0), 0);
        assert_eq!(plan.bytes_at_percent(42.0), 420);
        assert_eq!(plan.bytes_at_percent(100.0), 1000);
        assert_eq!(plan.bytes_at_percent(150.0), 1000);
        assert_eq!(plan.bytes_at_percent(f64::NAN), 0);
    }

    #[test]
    fn large_file_plan() {
        let mib = chunkwise_protocol::constants::MIB;
        let plan = ChunkPlan::new(2 * 1024 * mib + 1, 5 * mib);
        assert_eq!(plan.total_chunks(), 410);
        assert_eq!(plan.chunk(409).unwrap().len, 3 * mib + 1);
    }
}
