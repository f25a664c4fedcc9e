use std::io;

use clap::Parser;
use log::info;
use machine_learning::ModelRegistry;

use trainer::{Cli, fit};

fn main() -> io::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let list_models = cli.list_models;
    let config = cli.into_config()?;

    let registry = match config.seed {
        Some(seed) => ModelRegistry::builtin().with_seed(seed),
        None => ModelRegistry::builtin(),
    };

    if list_models {
        let num_classes = config.dataset.num_classes();
        for (name, num_params) in fit::list_models(&registry, num_classes)? {
            println!("{name:<24} {num_params:>12}");
        }
        return Ok(());
    }

    info!("starting run with {config:?}");
    let report = fit::run(&config, &registry)?;

    if let Some(last) = report.epochs.last() {
        info!(
            "last epoch: val loss {:.4}, val accuracy {:.2}%",
            last.avg_val_loss, last.val_accuracy
        );
    }

    Ok(())
}
