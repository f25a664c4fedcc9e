use crate::arch::{
    Sequential,
    layers::{Conv2d, Layer},
};

/// A convolution width, or `None` for a 2x2 max pool.
pub type Cfg = &'static [Option<usize>];

#[rustfmt::skip]
pub const VGG11: Cfg = &[
    Some(64), None,
    Some(128), None,
    Some(256), Some(256), None,
    Some(512), Some(512), None,
    Some(512), Some(512), None,
];
#[rustfmt::skip]
pub const VGG13: Cfg = &[
    Some(64), Some(64), None,
    Some(128), Some(128), None,
    Some(256), Some(256), None,
    Some(512), Some(512), None,
    Some(512), Some(512), None,
];
#[rustfmt::skip]
pub const VGG16: Cfg = &[
    Some(64), Some(64), None,
    Some(128), Some(128), None,
    Some(256), Some(256), Some(256), None,
    Some(512), Some(512), Some(512), None,
    Some(512), Some(512), Some(512), None,
];
#[rustfmt::skip]
pub const VGG19: Cfg = &[
    Some(64), Some(64), None,
    Some(128), Some(128), None,
    Some(256), Some(256), Some(256), Some(256), None,
    Some(512), Some(512), Some(512), Some(512), None,
    Some(512), Some(512), Some(512), Some(512), None,
];

/// A batch normalized VGG for 32x32 inputs, the last stage must end with 512 channels.
///
/// # Arguments
/// * `cfg` - The layout of the convolutions and pools.
/// * `num_classes` - The amount of classes.
pub fn vgg(cfg: Cfg, num_classes: usize) -> Sequential {
    let mut arch = Sequential::default();
    let mut in_channels = 3;
    for entry in cfg {
        match *entry {
            Some(out) => {
                arch.push(Layer::Conv2d(
                    Conv2d::new(in_channels, out, 3, 1, 1).with_bias(),
                ));
                arch.push(Layer::batch_norm(out));
                arch.push(Layer::relu());
                in_channels = out;
            }
            None => arch.push(Layer::max_pool(2)),
        }
    }

    arch.push(Layer::flatten());
    arch.push(Layer::dense((512, num_classes)));
    arch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_pools_reduce_to_a_single_pixel() {
        for cfg in [VGG11, VGG13, VGG16, VGG19] {
            assert_eq!(cfg.iter().filter(|entry| entry.is_none()).count(), 5);
            assert_eq!(cfg.iter().rev().flatten().next(), Some(&512));
        }
    }
}
