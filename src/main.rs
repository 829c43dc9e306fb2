use std::{env, future, path::Path, sync::Arc};

use anyhow::Context;
use log::{info, warn};
use tokio::signal;

use tiered_predictor::{
    backend::NdarrayBackend, notify::LogNotifier, source::FileSource, Predictor, PredictorConfig,
};

const USAGE: &str = "usage: predictor <history-file> [config.json]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let history = args.next().context(USAGE)?;
    let config_path = args.next();

    let config = PredictorConfig::load(config_path.as_deref().map(Path::new))
        .context("loading the configuration")?;
    let backend = NdarrayBackend::with_file_store(&config.store_dir)
        .with_context(|| format!("opening the model store at {}", config.store_dir.display()))?;
    let period = config.train_period();

    let predictor = Predictor::new(Arc::new(backend), Arc::new(LogNotifier), config)?;
    predictor.start().await;

    if let Some(period) = period {
        info!("training every {}s, press Ctrl-C to stop and predict", period.as_secs());
    }

    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl-C"),
            Err(e) => {
                warn!("cannot listen for Ctrl-C: {e}");
                future::pending::<()>().await;
            }
        }
    };

    let prediction = predictor
        .run_until(FileSource::new(&history), period, ctrl_c)
        .await
        .with_context(|| format!("predicting from {history}"))?;
    println!("{}", prediction.digit);

    predictor.shutdown();
    Ok(())
}
