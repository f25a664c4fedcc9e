use std::{fmt, str::FromStr};

use crate::{MlErr, Result};

/// Where a model's parameters live and its computations run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Device {
    #[default]
    Cpu,
}

impl Device {
    /// Returns the amount of parallel compute units of this device.
    pub fn parallelism(&self) -> usize {
        match self {
            Device::Cpu => rayon::current_num_threads(),
        }
    }
}

impl FromStr for Device {
    type Err = MlErr;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            _ => Err(MlErr::UnsupportedDevice {
                device: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cpu_only() {
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("CPU".parse::<Device>().unwrap(), Device::Cpu);

        for device in ["cuda", "cuda:0", "mps"] {
            assert!(matches!(
                device.parse::<Device>(),
                Err(MlErr::UnsupportedDevice { .. })
            ));
        }
    }

    #[test]
    fn has_at_least_one_compute_unit() {
        assert!(Device::Cpu.parallelism() >= 1);
    }
}
