/// Element-wise activation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActFn {
    Relu,
    Sigmoid,
    /// `z * sigmoid(z)`, also known as SiLU.
    Swish,
}
use ActFn::*;

fn sigmoid(z: f32) -> f32 {
    1. / (1. + (-z).exp())
}

impl ActFn {
    pub fn f(&self, z: f32) -> f32 {
        match self {
            Relu => z.max(0.),
            Sigmoid => sigmoid(z),
            Swish => z * sigmoid(z),
        }
    }

    /// The derivative evaluated at the pre-activation `z`.
    pub fn df(&self, z: f32) -> f32 {
        match self {
            Relu => {
                if z > 0. {
                    1.
                } else {
                    0.
                }
            }
            Sigmoid => {
                let s = sigmoid(z);
                s * (1. - s)
            }
            Swish => {
                let s = sigmoid(z);
                s + z * s * (1. - s)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relu_clamps_negatives() {
        assert_eq!(Relu.f(-2.), 0.);
        assert_eq!(Relu.f(3.), 3.);
        assert_eq!(Relu.df(-2.), 0.);
        assert_eq!(Relu.df(3.), 1.);
    }

    #[test]
    fn derivatives_match_finite_differences() {
        const H: f32 = 1e-3;

        for act_fn in [Sigmoid, Swish] {
            for z in [-2.5, -0.3, 0.0, 0.7, 3.1] {
                let numeric = (act_fn.f(z + H) - act_fn.f(z - H)) / (2. * H);
                assert!(
                    (numeric - act_fn.df(z)).abs() < 1e-3,
                    "{act_fn:?} at {z}: {numeric} vs {}",
                    act_fn.df(z)
                );
            }
        }
    }
}
