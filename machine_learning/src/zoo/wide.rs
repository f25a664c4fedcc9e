use crate::arch::{Sequential, layers::Layer};

/// A pre-activation block, the 1x1 shortcut (without normalization) reads the activated input
/// when the width changes.
fn wide_block(in_channels: usize, out: usize, stride: usize) -> Vec<Layer> {
    let residual = |pre: Vec<Layer>| {
        let mut body = pre;
        body.extend([
            Layer::conv(in_channels, out, 3, stride, 1),
            Layer::batch_norm(out),
            Layer::relu(),
            Layer::conv(out, out, 3, 1, 1),
        ]);
        body
    };

    if in_channels == out && stride == 1 {
        let body = residual(vec![Layer::batch_norm(in_channels), Layer::relu()]);
        return vec![Layer::residual(
            Sequential::new(body),
            Sequential::default(),
            None,
        )];
    }

    let shortcut = Sequential::new([Layer::conv(in_channels, out, 1, stride, 0)]);
    vec![
        Layer::batch_norm(in_channels),
        Layer::relu(),
        Layer::residual(Sequential::new(residual(Vec::new())), shortcut, None),
    ]
}

/// A wide resnet `WRN-depth-k`.
///
/// # Arguments
/// * `depth` - `6n + 4`, where `n` is the amount of blocks per stage.
/// * `widen` - The width multiplier `k` of the 16, 32 and 64 base widths.
/// * `num_classes` - The amount of classes.
pub fn wide_resnet(depth: usize, widen: usize, num_classes: usize) -> Sequential {
    let per_stage = (depth - 4) / 6;
    let mut arch = Sequential::new([Layer::conv(3, 16, 3, 1, 1)]);

    let mut in_channels = 16;
    for (stage, base) in [16, 32, 64].into_iter().enumerate() {
        let out = base * widen;
        for i in 0..per_stage {
            let stride = if stage > 0 && i == 0 { 2 } else { 1 };
            wide_block(in_channels, out, stride)
                .into_iter()
                .for_each(|layer| arch.push(layer));
            in_channels = out;
        }
    }

    arch.push(Layer::batch_norm(in_channels));
    arch.push(Layer::relu());
    arch.push(Layer::global_avg_pool());
    arch.push(Layer::dense((in_channels, num_classes)));
    arch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_widths_use_identity_shortcuts() {
        assert_eq!(wide_block(32, 32, 1).len(), 1);
        assert_eq!(wide_block(16, 32, 1).len(), 3);
        assert_eq!(wide_block(32, 32, 2).len(), 3);
    }
}
