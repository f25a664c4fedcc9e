use std::collections::{BTreeMap, btree_map::Entry};

use log::info;
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    MlErr, Result,
    arch::{DataParallel, Model, Network, Sequential},
    device::Device,
    zoo,
};

/// Builds the architecture of a model for the given amount of classes.
pub type Constructor = fn(usize) -> Sequential;

/// A freshly built model along with its amount of trainable parameters.
#[derive(Debug)]
pub struct CreatedModel {
    pub model: DataParallel<Network>,
    pub num_params: usize,
}

/// Maps model names to the constructors of their architectures.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    constructors: BTreeMap<String, Constructor>,
    seed: Option<u64>,
}

impl ModelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every model of the zoo.
    pub fn builtin() -> Self {
        let constructors = zoo::builtin()
            .into_iter()
            .map(|(name, constructor)| (name.to_string(), constructor))
            .collect();

        Self {
            constructors,
            seed: None,
        }
    }

    /// Makes the parameter initialization of every created model reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Registers a new model.
    ///
    /// # Arguments
    /// * `name` - The unique name of the model.
    /// * `constructor` - Builds the architecture for a given amount of classes.
    ///
    /// # Returns
    /// An error if `name` is already taken, in which case the registry is left untouched.
    pub fn register(&mut self, name: impl Into<String>, constructor: Constructor) -> Result<()> {
        match self.constructors.entry(name.into()) {
            Entry::Occupied(entry) => Err(MlErr::DuplicateName {
                name: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(constructor);
                Ok(())
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Returns the registered names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    fn constructor(&self, name: &str) -> Result<Constructor> {
        self.constructors
            .get(name)
            .copied()
            .ok_or_else(|| MlErr::NotFound {
                name: name.to_string(),
            })
    }

    /// Returns the amount of trainable parameters of a model without allocating them.
    pub fn num_params(&self, name: &str, num_classes: usize) -> Result<usize> {
        Ok(self.constructor(name)?(num_classes).size())
    }

    /// Builds, initializes and places a registered model.
    ///
    /// # Arguments
    /// * `name` - The name of the model.
    /// * `num_classes` - The amount of classes the model predicts.
    /// * `device` - Where the model is placed.
    ///
    /// # Returns
    /// The data parallel model along with its amount of parameters, or an error if there's no
    /// such model.
    pub fn create(&self, name: &str, num_classes: usize, device: Device) -> Result<CreatedModel> {
        let constructor = self.constructor(name)?;
        info!("building model {name}");

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let network = Network::new(constructor(num_classes), &mut rng)?;
        let num_params = network.num_params();
        info!("{name} total parameters: {num_params}");

        Ok(CreatedModel {
            model: DataParallel::new(network, device),
            num_params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::layers::Layer;

    fn tiny(num_classes: usize) -> Sequential {
        Sequential::new([Layer::flatten(), Layer::dense((3 * 4 * 4, num_classes))])
    }

    #[test]
    fn builtin_counts() {
        let expected = [
            ("WRN10_4", 1198810),
            ("WRN16_1", 175066),
            ("WRN16_2", 691674),
            ("WRN16_4", 2748890),
            ("WRN16_8", 10961370),
            ("WRN28_2", 1467610),
            ("WRN22_4", 4298970),
            ("WRN22_8", 17158106),
            ("WRN28_1", 369498),
            ("WRN10_1", 77850),
            ("WRN40_1", 563930),
            ("WRN40_4", 8949210),
            ("resnet8_sm", 78042),
            ("resnet14_sm", 175258),
            ("resnet20_sm", 272474),
            ("resnet32_sm", 466906),
            ("resnet44_sm", 661338),
            ("resnet56_sm", 855770),
            ("resnet110_sm", 1730714),
            ("resnet1202_sm", 19424026),
            ("resnet164_sm", 1704154),
            ("resnet1001_sm", 10328602),
            ("resnet8", 89322),
            ("resnet10", 4903242),
            ("resnet18", 11173962),
            ("resnet34", 21282122),
            ("resnet50", 23520842),
            ("resnet101", 42512970),
            ("resnet152", 58156618),
            ("vgg11", 9231114),
            ("vgg13", 9416010),
            ("vgg16", 14728266),
            ("vgg19", 20040522),
            ("efficientnet", 2912089),
        ];

        let registry = ModelRegistry::builtin();
        assert_eq!(registry.len(), expected.len());

        for (name, count) in expected {
            assert_eq!(registry.num_params(name, 10).unwrap(), count, "{name}");
        }
    }

    #[test]
    fn head_follows_num_classes() {
        let registry = ModelRegistry::builtin();
        let ten = registry.num_params("resnet20_sm", 10).unwrap();
        let hundred = registry.num_params("resnet20_sm", 100).unwrap();

        assert_eq!(hundred - ten, 90 * (64 + 1));
    }

    #[test]
    fn create_reports_the_count() {
        let registry = ModelRegistry::builtin().with_seed(0);
        let created = registry.create("resnet8_sm", 10, Device::Cpu).unwrap();

        assert_eq!(created.num_params, 78042);
        assert_eq!(created.model.num_params(), 78042);
        assert!(created.model.device_count() >= 1);
    }

    #[test]
    fn seeded_creation_is_deterministic() {
        let mut registry = ModelRegistry::new().with_seed(42);
        registry.register("tiny", tiny).unwrap();

        let a = registry.create("tiny", 10, Device::Cpu).unwrap();
        let b = registry.create("tiny", 10, Device::Cpu).unwrap();

        assert_eq!(a.model.module().params(), b.model.module().params());
    }

    #[test]
    fn unknown_names_are_not_found() {
        let registry = ModelRegistry::new();

        assert!(matches!(
            registry.create("vgg11", 10, Device::Cpu),
            Err(MlErr::NotFound { name }) if name == "vgg11"
        ));
        assert!(matches!(
            ModelRegistry::builtin().num_params("resnet110", 10),
            Err(MlErr::NotFound { .. })
        ));
    }

    #[test]
    fn duplicates_leave_the_registry_unchanged() {
        let mut registry = ModelRegistry::new();
        registry.register("tiny", tiny).unwrap();

        let err = registry
            .register("tiny", |c| Sequential::new([Layer::dense((1, c))]))
            .unwrap_err();

        assert!(matches!(err, MlErr::DuplicateName { .. }));
        assert_eq!(registry.names().collect::<Vec<_>>(), ["tiny"]);
        assert_eq!(registry.num_params("tiny", 2).unwrap(), 49 * 2);
    }

    #[test]
    fn names_are_sorted() {
        let registry = ModelRegistry::builtin();
        let names: Vec<_> = registry.names().collect();

        assert!(names.windows(2).all(|w| w[0] < w[1]));
        assert!(names.contains(&"efficientnet"));
    }
}
