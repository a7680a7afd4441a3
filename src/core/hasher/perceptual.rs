//! Perceptual Hash (pHash) implementation.
//!
//! pHash uses the Discrete Cosine Transform (DCT) to extract
//! frequency information from the image, which makes it robust to the
//! rescaling and recompression a drive applies when it renders
//! thumbnails.
//!
//! The DCT and bit extraction come from the image_hasher crate.

use super::traits::ImageHashValue;
use crate::error::HashError;
use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig as ImageHasherConfig};

/// Perceptual Hash (pHash) implementation using DCT
pub struct PerceptualHasher {
    hash_size: u32,
    hasher: image_hasher::Hasher,
}

impl PerceptualHasher {
    /// Create a new pHash hasher producing `hash_size × hash_size` bits
    pub fn new(hash_size: u32) -> Self {
        let hasher = ImageHasherConfig::new()
            .hash_size(hash_size, hash_size)
            .hash_alg(HashAlg::Median)
            .preproc_dct()
            .to_hasher();

        Self { hash_size, hasher }
    }

    /// Number of bits in every hash this hasher produces
    pub fn bit_count(&self) -> u32 {
        self.hash_size * self.hash_size
    }

    /// Hash an already-decoded image
    pub fn hash_image(&self, image: &DynamicImage) -> Result<ImageHashValue, HashError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(HashError::EmptyImage);
        }

        let hash = self.hasher.hash_image(image);
        let bytes = hash.as_bytes().to_vec();
        if bytes.is_empty() {
            return Err(HashError::ComputationFailed(
                "hasher returned no bits".to_string(),
            ));
        }

        Ok(ImageHashValue::new(bytes))
    }

    /// Decode encoded thumbnail bytes (JPEG, PNG, ...) and hash them
    pub fn hash_bytes(&self, bytes: &[u8]) -> Result<ImageHashValue, HashError> {
        if bytes.is_empty() {
            return Err(HashError::EmptyImage);
        }

        let image = image::load_from_memory(bytes).map_err(|e| HashError::DecodeError {
            reason: e.to_string(),
        })?;

        self.hash_image(&image)
    }
}
