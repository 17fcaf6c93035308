use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitStats {
    pub source_size: u64,
    pub transformed_size: u64,
    pub data_chunks: usize,
    /// `transformed_size / source_size`; 0.0 for an empty source.
    pub compression_ratio: f64,
}

impl SplitStats {
    pub fn new(source_size: u64, transformed_size: u64, data_chunks: usize) -> Self {
        let compression_ratio = if source_size == 0 {
            0.0
        } else {
            transformed_size as f64 / source_size as f64
        };
        Self {
            source_size,
            transformed_size,
            data_chunks,
            compression_ratio,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombineReport {
    pub bytes_written: u64,
    pub data_chunks: usize,
    /// Hex BLAKE3 of the reconstructed bytes.
    pub blake3: String,
    pub repaired: bool,
}
