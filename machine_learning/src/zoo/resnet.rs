use crate::arch::{Sequential, activations::ActFn, layers::Layer};

/// The kind of residual block a resnet stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    /// Two 3x3 convolutions.
    Basic,
    /// 1x1 reduction, 3x3 and 1x1 expansion by 4.
    Bottleneck,
}

impl Block {
    pub fn expansion(&self) -> usize {
        match self {
            Block::Basic => 1,
            Block::Bottleneck => 4,
        }
    }

    /// Builds a block with a projection shortcut whenever the shape changes.
    ///
    /// # Arguments
    /// * `in_channels` - The amount of channels of the input.
    /// * `planes` - The width of the block, its output has `planes * expansion` channels.
    /// * `stride` - The stride of the first spatial convolution.
    pub fn build(&self, in_channels: usize, planes: usize, stride: usize) -> Layer {
        let out = planes * self.expansion();
        let body = match self {
            Block::Basic => vec![
                Layer::conv(in_channels, planes, 3, stride, 1),
                Layer::batch_norm(planes),
                Layer::relu(),
                Layer::conv(planes, planes, 3, 1, 1),
                Layer::batch_norm(planes),
            ],
            Block::Bottleneck => vec![
                Layer::conv(in_channels, planes, 1, 1, 0),
                Layer::batch_norm(planes),
                Layer::relu(),
                Layer::conv(planes, planes, 3, stride, 1),
                Layer::batch_norm(planes),
                Layer::relu(),
                Layer::conv(planes, out, 1, 1, 0),
                Layer::batch_norm(out),
            ],
        };

        let shortcut = if stride != 1 || in_channels != out {
            Sequential::new([
                Layer::conv(in_channels, out, 1, stride, 0),
                Layer::batch_norm(out),
            ])
        } else {
            Sequential::default()
        };

        Layer::residual(Sequential::new(body), shortcut, Some(ActFn::Relu))
    }
}

/// Appends `blocks[i]` blocks of width `widths[i]` for every stage, only the first stage keeps
/// the resolution.
///
/// # Returns
/// The amount of channels of the last stage.
fn push_stages(
    arch: &mut Sequential,
    block: Block,
    mut in_channels: usize,
    widths: &[usize],
    blocks: &[usize],
) -> usize {
    for (stage, (&planes, &n)) in widths.iter().zip(blocks).enumerate() {
        for i in 0..n {
            let stride = if stage > 0 && i == 0 { 2 } else { 1 };
            arch.push(block.build(in_channels, planes, stride));
            in_channels = planes * block.expansion();
        }
    }

    in_channels
}

fn stem(out: usize) -> Sequential {
    Sequential::new([
        Layer::conv(3, out, 3, 1, 1),
        Layer::batch_norm(out),
        Layer::relu(),
    ])
}

/// The small CIFAR resnets: three stages of 16, 32 and 64 planes over a 16 channel stem.
///
/// # Arguments
/// * `depth` - `6n + 2` for basic blocks or `9n + 2` for bottleneck ones.
/// * `block` - The kind of block.
/// * `num_classes` - The amount of classes.
pub fn resnet_sm(depth: usize, block: Block, num_classes: usize) -> Sequential {
    let per_stage = match block {
        Block::Basic => (depth - 2) / 6,
        Block::Bottleneck => (depth - 2) / 9,
    };

    let mut arch = stem(16);
    let channels = push_stages(&mut arch, block, 16, &[16, 32, 64], &[per_stage; 3]);
    arch.push(Layer::global_avg_pool());
    arch.push(Layer::dense((channels, num_classes)));
    arch
}

/// The CIFAR resnets over a 64 channel stem, ending on a 4x4 average pool of a 32x32 input.
///
/// # Arguments
/// * `widths` - The planes of every stage.
/// * `blocks` - The amount of blocks of every stage.
/// * `block` - The kind of block.
/// * `num_classes` - The amount of classes.
pub fn resnet(widths: &[usize], blocks: &[usize], block: Block, num_classes: usize) -> Sequential {
    let mut arch = stem(64);
    let channels = push_stages(&mut arch, block, 64, widths, blocks);

    // 32x32 inputs get halved on every stage but the first one.
    let side = 32 >> widths.len().saturating_sub(1);
    let pooled = side / 4;

    arch.push(Layer::avg_pool(4));
    arch.push(Layer::flatten());
    arch.push(Layer::dense((channels * pooled * pooled, num_classes)));
    arch
}
