//! # Hasher Module
//!
//! Computes perceptual hashes from drive thumbnails.
//!
//! ## How It Works
//! 1. Decode the thumbnail bytes returned by the drive
//! 2. Shrink and convert to grayscale, apply a DCT
//! 3. Keep one bit per low-frequency coefficient (above/below the median)
//! 4. Store the bits as a fixed-width hex string in the catalog
//!
//! Hashes are compared with Hamming distance.
//!
//! ## Example
//! ```rust,ignore
//! use drive_dedup::core::hasher::HasherConfig;
//!
//! let hasher = HasherConfig::new().hash_size(16).build();
//! let hash = hasher.hash_bytes(&thumbnail)?;
//! ```

mod perceptual;
mod traits;

pub use perceptual::PerceptualHasher;
pub use traits::{ImageHashValue, PerceptualHash};

/// Default hash edge; 16 × 16 = 256 bits, 64 hex characters
pub const DEFAULT_HASH_SIZE: u32 = 16;

/// Configuration builder for hashers
#[derive(Debug, Clone)]
pub struct HasherConfig {
    /// Hash edge length (8, 16, or 32)
    hash_size: u32,
}

impl HasherConfig {
    /// Create a new hasher configuration with defaults
    pub fn new() -> Self {
        Self {
            hash_size: DEFAULT_HASH_SIZE,
        }
    }

    /// Set the hash edge length (8, 16, or 32)
    ///
    /// - 8: 64 bits
    /// - 16: 256 bits, the catalog default
    /// - 32: 1024 bits
    pub fn hash_size(mut self, size: u32) -> Self {
        self.hash_size = size;
        self
    }

    /// Build the hasher
    pub fn build(self) -> PerceptualHasher {
        PerceptualHasher::new(self.hash_size)
    }
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self::new()
    }
}
