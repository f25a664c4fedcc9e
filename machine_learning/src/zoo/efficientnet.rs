use crate::arch::{
    Sequential,
    activations::ActFn,
    layers::{Conv2d, Layer},
};

/// `(expansion, out channels, blocks, stride)` of every stage.
const STAGES: [(usize, usize, usize, usize); 7] = [
    (1, 16, 1, 2),
    (6, 24, 2, 1),
    (6, 40, 2, 2),
    (6, 80, 3, 2),
    (6, 112, 3, 1),
    (6, 192, 4, 2),
    (6, 320, 1, 2),
];

/// Expansion, depthwise convolution, projection and squeeze-excitation.
fn mb_conv(in_channels: usize, out: usize, expansion: usize, stride: usize) -> Vec<Layer> {
    let planes = expansion * in_channels;

    vec![
        Layer::conv(in_channels, planes, 1, 1, 0),
        Layer::batch_norm(planes),
        Layer::swish(),
        Layer::Conv2d(Conv2d::new(planes, planes, 3, stride, 1).with_groups(planes)),
        Layer::batch_norm(planes),
        Layer::swish(),
        Layer::conv(planes, out, 1, 1, 0),
        Layer::batch_norm(out),
        Layer::squeeze_excite(out, out / 16),
    ]
}

/// EfficientNet-B0 laid out for 32x32 inputs.
pub fn efficientnet(num_classes: usize) -> Sequential {
    let mut arch = Sequential::new([
        Layer::conv(3, 32, 3, 1, 1),
        Layer::batch_norm(32),
        Layer::swish(),
    ]);

    let mut in_channels = 32;
    for (expansion, out, blocks, first_stride) in STAGES {
        for i in 0..blocks {
            let stride = if i == 0 { first_stride } else { 1 };
            let block = mb_conv(in_channels, out, expansion, stride);

            if stride == 1 {
                let shortcut = if in_channels != out {
                    Sequential::new([
                        Layer::conv(in_channels, out, 1, 1, 0),
                        Layer::batch_norm(out),
                    ])
                } else {
                    Sequential::default()
                };

                arch.push(Layer::residual(Sequential::new(block), shortcut, None));
            } else {
                block.into_iter().for_each(|layer| arch.push(layer));
            }

            in_channels = out;
        }
    }

    arch.push(Layer::global_avg_pool());
    arch.push(Layer::dense((in_channels, num_classes)));
    arch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strided_blocks_have_no_residual() {
        let arch = efficientnet(10);
        let residuals = arch
            .layers()
            .iter()
            .filter(|layer| matches!(layer, Layer::Residual(_)))
            .count();

        // 16 blocks, 5 of them strided.
        assert_eq!(residuals, 11);
        assert!(matches!(arch.layers()[2], Layer::Activation(ref a) if a.act_fn() == ActFn::Swish));
    }
}
