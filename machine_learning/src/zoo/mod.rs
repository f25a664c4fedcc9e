//! The architectures every builtin model name maps to, all of them for 3x32x32 inputs.

mod efficientnet;
mod resnet;
mod vgg;
mod wide;

pub use efficientnet::efficientnet;
pub use resnet::{Block, resnet, resnet_sm};
pub use vgg::{Cfg as VggCfg, VGG11, VGG13, VGG16, VGG19, vgg};
pub use wide::wide_resnet;

use crate::registry::Constructor;

const WIDTHS: [usize; 4] = [64, 128, 256, 512];

/// Returns every builtin model along with its constructor.
pub fn builtin() -> Vec<(&'static str, Constructor)> {
    use Block::{Basic, Bottleneck};

    let models: [(&'static str, Constructor); 34] = [
        ("WRN10_4", |c| wide_resnet(10, 4, c)),
        ("WRN16_1", |c| wide_resnet(16, 1, c)),
        ("WRN16_2", |c| wide_resnet(16, 2, c)),
        ("WRN16_4", |c| wide_resnet(16, 4, c)),
        ("WRN16_8", |c| wide_resnet(16, 8, c)),
        ("WRN28_2", |c| wide_resnet(28, 2, c)),
        ("WRN22_4", |c| wide_resnet(22, 4, c)),
        ("WRN22_8", |c| wide_resnet(22, 8, c)),
        ("WRN28_1", |c| wide_resnet(28, 1, c)),
        ("WRN10_1", |c| wide_resnet(10, 1, c)),
        ("WRN40_1", |c| wide_resnet(40, 1, c)),
        ("WRN40_4", |c| wide_resnet(40, 4, c)),
        ("resnet8_sm", |c| resnet_sm(8, Basic, c)),
        ("resnet14_sm", |c| resnet_sm(14, Basic, c)),
        ("resnet20_sm", |c| resnet_sm(20, Basic, c)),
        ("resnet32_sm", |c| resnet_sm(32, Basic, c)),
        ("resnet44_sm", |c| resnet_sm(44, Basic, c)),
        ("resnet56_sm", |c| resnet_sm(56, Basic, c)),
        ("resnet110_sm", |c| resnet_sm(110, Basic, c)),
        ("resnet1202_sm", |c| resnet_sm(1202, Basic, c)),
        ("resnet164_sm", |c| resnet_sm(164, Bottleneck, c)),
        ("resnet1001_sm", |c| resnet_sm(1001, Bottleneck, c)),
        ("resnet8", |c| resnet(&[16, 32, 64], &[1, 1, 1], Basic, c)),
        ("resnet10", |c| resnet(&WIDTHS, &[1, 1, 1, 1], Basic, c)),
        ("resnet18", |c| resnet(&WIDTHS, &[2, 2, 2, 2], Basic, c)),
        ("resnet34", |c| resnet(&WIDTHS, &[3, 4, 6, 3], Basic, c)),
        ("resnet50", |c| resnet(&WIDTHS, &[3, 4, 6, 3], Bottleneck, c)),
        ("resnet101", |c| resnet(&WIDTHS, &[3, 4, 23, 3], Bottleneck, c)),
        ("resnet152", |c| resnet(&WIDTHS, &[3, 8, 36, 3], Bottleneck, c)),
        ("vgg11", |c| vgg(VGG11, c)),
        ("vgg13", |c| vgg(VGG13, c)),
        ("vgg16", |c| vgg(VGG16, c)),
        ("vgg19", |c| vgg(VGG19, c)),
        ("efficientnet", efficientnet),
    ];

    models.into()
}
