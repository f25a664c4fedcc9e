use ndarray::ArrayViewMut3;
use rand::Rng;

use super::cifar::{IMAGE_SIDE, Split};

/// Per channel mean of the CIFAR training images.
pub const MEAN: [f32; 3] = [0.4914, 0.4822, 0.4465];
/// Per channel standard deviation of the CIFAR training images.
pub const STD: [f32; 3] = [0.2023, 0.1994, 0.2010];

/// Border added twice to training images, first reflected and then zeroed.
const PAD: usize = 4;
/// Side of the zero padded image a crop is taken from.
const PADDED_SIDE: usize = IMAGE_SIDE + 4 * PAD;

/// The window of the padded image that ends up in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crop {
    pub top: usize,
    pub left: usize,
    pub flip: bool,
}

impl Crop {
    /// The window that gives back the original image.
    pub const CENTER: Self = Self {
        top: 2 * PAD,
        left: 2 * PAD,
        flip: false,
    };

    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let max = PADDED_SIDE - IMAGE_SIDE;
        Self {
            top: rng.random_range(0..=max),
            left: rng.random_range(0..=max),
            flip: rng.random_bool(0.5),
        }
    }

    /// Maps an output coordinate to the original image, `None` if it lands on the zero border.
    fn source(&self, y: usize, x: usize) -> Option<(usize, usize)> {
        let x = if self.flip { IMAGE_SIDE - 1 - x } else { x };
        let row = reflect(self.top + y)?;
        let col = reflect(self.left + x)?;
        Some((row, col))
    }
}

/// Resolves a coordinate of the padded image.
fn reflect(padded: usize) -> Option<usize> {
    let inner = padded.checked_sub(PAD).filter(|&p| p < IMAGE_SIDE + 2 * PAD)?;
    let last = (IMAGE_SIDE - 1) as isize;
    let p = inner as isize - PAD as isize;

    let p = if p < 0 {
        -p
    } else if p > last {
        2 * last - p
    } else {
        p
    };

    Some(p as usize)
}

/// How raw pixels become a network input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Random crop with reflect and zero padding, random horizontal flip, then normalization.
    Train,
    /// Normalization only.
    Test,
}

impl Transform {
    pub fn for_split(split: Split) -> Self {
        match split {
            Split::Train => Transform::Train,
            Split::Test => Transform::Test,
        }
    }

    /// Writes the transformed image into `out`.
    ///
    /// # Arguments
    /// * `pixels` - The raw channel major image.
    /// * `out` - The `(channels, height, width)` destination.
    /// * `rng` - Drives the augmentation, untouched by `Test`.
    pub fn apply<R: Rng>(&self, pixels: &[u8], out: ArrayViewMut3<f32>, rng: &mut R) {
        let crop = match self {
            Transform::Train => Crop::random(rng),
            Transform::Test => Crop::CENTER,
        };

        write_crop(pixels, crop, out);
    }
}

/// Crops, scales to `[0, 1]` and normalizes an image.
pub fn write_crop(pixels: &[u8], crop: Crop, mut out: ArrayViewMut3<f32>) {
    let plane = IMAGE_SIDE * IMAGE_SIDE;

    for ((c, y, x), value) in out.indexed_iter_mut() {
        let raw = match crop.source(y, x) {
            Some((row, col)) => pixels[c * plane + row * IMAGE_SIDE + col],
            None => 0,
        };

        *value = (raw as f32 / 255. - MEAN[c]) / STD[c];
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array3;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::data::cifar::{CHANNELS, IMAGE_BYTES};

    /// Pixel `(c, y, x)` holds `(y * 32 + x) % 250 + c`.
    fn gradient_image() -> Vec<u8> {
        (0..IMAGE_BYTES)
            .map(|i| {
                let c = i / (IMAGE_SIDE * IMAGE_SIDE);
                let yx = i % (IMAGE_SIDE * IMAGE_SIDE);
                ((yx % 250) + c) as u8
            })
            .collect()
    }

    fn normalized(raw: u8, c: usize) -> f32 {
        (raw as f32 / 255. - MEAN[c]) / STD[c]
    }

    fn output() -> Array3<f32> {
        Array3::zeros((CHANNELS, IMAGE_SIDE, IMAGE_SIDE))
    }

    #[test]
    fn test_transform_only_normalizes() {
        let pixels = gradient_image();
        let mut out = output();
        let mut rng = StdRng::seed_from_u64(0);

        Transform::Test.apply(&pixels, out.view_mut(), &mut rng);

        for ((c, y, x), &value) in out.indexed_iter() {
            let raw = pixels[c * 1024 + y * 32 + x];
            assert!((value - normalized(raw, c)).abs() < 1e-6);
        }
    }

    #[test]
    fn white_pixels_normalize_per_channel() {
        let mut out = output();
        write_crop(&vec![255; IMAGE_BYTES], Crop::CENTER, out.view_mut());

        assert!((out[[0, 0, 0]] - (1. - 0.4914) / 0.2023).abs() < 1e-6);
        assert!((out[[2, 31, 31]] - (1. - 0.4465) / 0.2010).abs() < 1e-6);
    }

    #[test]
    fn corner_crop_hits_zero_then_reflected_border() {
        let pixels = gradient_image();
        let mut out = output();
        let crop = Crop {
            top: 0,
            left: 0,
            flip: false,
        };

        write_crop(&pixels, crop, out.view_mut());

        assert!((out[[0, 3, 3]] - normalized(0, 0)).abs() < 1e-6);
        assert!((out[[1, 0, 10]] - normalized(0, 1)).abs() < 1e-6);
        // output (4, 4) reflects back onto (4, 4)
        assert!((out[[0, 4, 4]] - normalized(pixels[4 * 32 + 4], 0)).abs() < 1e-6);
        // (5, 8) reflects to (3, 0)
        assert!((out[[0, 5, 8]] - normalized(pixels[3 * 32], 0)).abs() < 1e-6);
        assert!((out[[0, 8, 8]] - normalized(pixels[0], 0)).abs() < 1e-6);
    }

    #[test]
    fn far_corner_reflects_the_last_row() {
        let pixels = gradient_image();
        let mut out = output();
        let crop = Crop {
            top: 16,
            left: 16,
            flip: false,
        };

        write_crop(&pixels, crop, out.view_mut());

        // output 24 is original 32, reflected onto 30
        assert!((out[[0, 24, 0]] - normalized(pixels[30 * 32 + 8], 0)).abs() < 1e-6);
        assert!((out[[0, 28, 0]] - normalized(0, 0)).abs() < 1e-6);
    }

    #[test]
    fn flip_mirrors_columns() {
        let pixels = gradient_image();
        let mut plain = output();
        let mut flipped = output();

        write_crop(&pixels, Crop::CENTER, plain.view_mut());
        write_crop(
            &pixels,
            Crop {
                flip: true,
                ..Crop::CENTER
            },
            flipped.view_mut(),
        );

        for x in 0..IMAGE_SIDE {
            assert_eq!(flipped[[2, 7, x]], plain[[2, 7, IMAGE_SIDE - 1 - x]]);
        }
    }

    #[test]
    fn random_crops_stay_in_range_and_are_seeded() {
        let mut a = StdRng::seed_from_u64(3);
        let mut b = StdRng::seed_from_u64(3);

        for _ in 0..100 {
            let crop = Crop::random(&mut a);
            assert!(crop.top <= 16 && crop.left <= 16);
            assert_eq!(crop, Crop::random(&mut b));
        }
    }
}
