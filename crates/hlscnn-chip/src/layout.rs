//! Network I/O dimensions baked into the synthesized core.

/// Number of Q16.16 words in the weight staging buffer.
pub const WEIGHTS_LEN: usize = 5738;

/// Input image side length.
pub const IMAGE_SIDE: usize = 28;

/// Number of Q16.16 words in the image staging buffer (28×28, row-major).
pub const IMAGE_LEN: usize = IMAGE_SIDE * IMAGE_SIDE;

/// Digit classes the network was trained on.
pub const NUM_CLASSES: usize = 10;

/// Test images embedded in the board application.
pub const DEFAULT_TEST_IMAGES: usize = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_is_mnist_sized() {
        assert_eq!(IMAGE_LEN, 784);
    }

    #[test]
    fn buffers_fit_bram_with_unit_stride() {
        use crate::map::{BRAM_WINDOW, ELEMENT_STRIDE};
        // The last element is a full 32-bit store starting at (len - 1) * stride.
        let weights_end = (WEIGHTS_LEN as u64 - 1) * ELEMENT_STRIDE + 4;
        let image_end = (IMAGE_LEN as u64 - 1) * ELEMENT_STRIDE + 4;
        assert!(weights_end <= BRAM_WINDOW);
        assert!(image_end <= BRAM_WINDOW);
    }
}
