use log::{debug, info};
use ndarray::{Array2, ArrayView4};

use super::RunningAccuracy;
use crate::{
    MlErr, Result,
    arch::{
        DataParallel, Model, Network,
        loss::{CrossEntropy, LossFn, LossKind},
    },
    dataset::Batch,
    device::Device,
    optimization::{Adam, Optimizer, OptimizerKind, ReduceLrOnPlateau, Sgd},
    registry::ModelRegistry,
};

/// The outcome of a training step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainStep {
    pub loss: f32,
    /// Cumulative since the last `epoch_end`, not of this batch alone.
    pub train_accuracy: f64,
}

/// The outcome of a validation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValStep {
    pub val_loss: f32,
}

/// The outcome of an epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochSummary {
    pub avg_val_loss: f32,
    pub val_accuracy: f64,
    /// The learning rate for the next epoch, if an optimizer is configured.
    pub learning_rate: Option<f32>,
}

/// Drives a model through training and validation steps, keeping the running accuracy of both
/// phases until the end of the epoch.
pub struct Session<M: Model = DataParallel<Network>> {
    model: M,
    loss_fn: CrossEntropy,
    train_acc: RunningAccuracy,
    val_acc: RunningAccuracy,
    optimizer: Option<Box<dyn Optimizer + Send>>,
    scheduler: Option<ReduceLrOnPlateau>,
}

impl Session {
    /// Creates a new `Session` over a model from the registry.
    ///
    /// # Arguments
    /// * `registry` - The registry the model is looked up in.
    /// * `model_name` - The name the model is registered as.
    /// * `num_classes` - The amount of classes the model predicts.
    /// * `device` - Where the model is placed.
    /// * `loss` - The loss function to train with.
    ///
    /// # Returns
    /// A new `Session` or an error if the model couldn't be created.
    pub fn new(
        registry: &ModelRegistry,
        model_name: &str,
        num_classes: usize,
        device: Device,
        loss: LossKind,
    ) -> Result<Self> {
        let created = registry.create(model_name, num_classes, device)?;
        Ok(Self::from_model(created.model, loss))
    }
}

impl<M: Model> Session<M> {
    pub fn from_model(model: M, loss: LossKind) -> Self {
        let loss_fn = match loss {
            LossKind::CrossEntropy => CrossEntropy::new(),
        };

        Self {
            model,
            loss_fn,
            train_acc: RunningAccuracy::new(),
            val_acc: RunningAccuracy::new(),
            optimizer: None,
            scheduler: None,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn train_accuracy(&self) -> &RunningAccuracy {
        &self.train_acc
    }

    pub fn val_accuracy(&self) -> &RunningAccuracy {
        &self.val_acc
    }

    pub fn optimizer(&self) -> Option<&dyn Optimizer> {
        self.optimizer.as_deref().map(|o| o as &dyn Optimizer)
    }

    pub fn scheduler(&self) -> Option<&ReduceLrOnPlateau> {
        self.scheduler.as_ref()
    }

    /// Computes the logits of a batch of images with the model in its current mode.
    pub fn forward(&mut self, x: ArrayView4<f32>) -> Result<Array2<f32>> {
        self.model.forward(x)
    }

    /// Runs a batch in training mode, accumulating the gradient of its loss in the model.
    ///
    /// # Arguments
    /// * `batch` - The images and labels.
    ///
    /// # Returns
    /// The loss of the batch along with the cumulative training accuracy.
    pub fn training_step(&mut self, batch: Batch) -> Result<TrainStep> {
        self.model.set_training(true);
        let logits = self.model.forward(batch.x)?;
        let loss = self.loss_fn.loss(logits.view(), batch.y)?;
        let d = self.loss_fn.loss_prime(logits.view(), batch.y)?;

        self.model.backward(d.view())?;
        self.train_acc.record(logits.view(), batch.y)?;

        Ok(TrainStep {
            loss,
            train_accuracy: self.train_acc.percentage()?,
        })
    }

    /// Runs a batch in evaluation mode, only the validation counters are updated.
    pub fn validation_step(&mut self, batch: Batch) -> Result<ValStep> {
        self.model.set_training(false);
        let logits = self.model.forward(batch.x)?;
        let val_loss = self.loss_fn.loss(logits.view(), batch.y)?;

        self.val_acc.record(logits.view(), batch.y)?;
        Ok(ValStep { val_loss })
    }

    /// Closes the epoch: averages the validation losses, steps the learning rate policy and resets
    /// every counter.
    ///
    /// # Arguments
    /// * `val_losses` - The loss of every validation step of the epoch.
    ///
    /// # Returns
    /// The summary of the epoch or an error if there was no validation step, in which case no
    /// counter is reset.
    pub fn epoch_end(&mut self, val_losses: &[f32]) -> Result<EpochSummary> {
        if val_losses.is_empty() {
            return Err(MlErr::DivisionByZero {
                what: "average validation loss",
            });
        }

        let val_accuracy = self.val_acc.percentage()?;
        let avg_val_loss = val_losses.iter().sum::<f32>() / val_losses.len() as f32;
        let signal = (avg_val_loss * 100.).round_ties_even() / 100.;

        let learning_rate = match (self.optimizer.as_mut(), self.scheduler.as_mut()) {
            (Some(optimizer), Some(scheduler)) => {
                let lr = scheduler.step(signal, optimizer.learning_rate());
                optimizer.set_learning_rate(lr);
                Some(lr)
            }
            (optimizer, _) => {
                debug!("no learning rate policy configured, skipping scheduling");
                optimizer.map(|o| o.learning_rate())
            }
        };

        self.train_acc.reset();
        self.val_acc.reset();

        Ok(EpochSummary {
            avg_val_loss,
            val_accuracy,
            learning_rate,
        })
    }

    /// Replaces the optimizer and attaches a fresh reduce on plateau policy to it.
    ///
    /// # Arguments
    /// * `kind` - Either `adam` or `sgd`.
    /// * `learning_rate` - The initial learning rate.
    /// * `momentum` - The momentum, only used by `sgd`.
    /// * `weight_decay` - The L2 penalty, only used by `sgd`.
    ///
    /// # Returns
    /// The configured optimizer or an error if the kind isn't supported.
    pub fn configure_optimizer(
        &mut self,
        kind: &str,
        learning_rate: f32,
        momentum: f32,
        weight_decay: f32,
    ) -> Result<&dyn Optimizer> {
        let len = self.model.num_params();
        let optimizer: Box<dyn Optimizer + Send> = match kind.parse::<OptimizerKind>()? {
            OptimizerKind::Adam => Box::new(Adam::with_defaults(len, learning_rate)),
            OptimizerKind::Sgd => Box::new(Sgd::new(len, learning_rate, momentum, weight_decay)),
        };

        info!(
            "using {} with learning rate {learning_rate}, momentum {momentum} and weight decay {weight_decay}",
            optimizer.name()
        );

        self.scheduler = Some(ReduceLrOnPlateau::default());
        let optimizer: &dyn Optimizer = &**self.optimizer.insert(optimizer);
        Ok(optimizer)
    }

    /// Applies the accumulated gradient to the parameters and zeroes it.
    pub fn optimizer_step(&mut self) -> Result<()> {
        let optimizer = self
            .optimizer
            .as_mut()
            .ok_or(MlErr::OptimizerNotConfigured)?;

        let (params, grad) = self.model.params_and_grad();
        optimizer.update_params(params, grad)?;
        self.model.zero_grad();
        Ok(())
    }
}
