use std::sync::Arc;

use ylb_core::{
    config::Config,
    ports::{ShortenerGateway, StateStore},
    store::JsonFileStore,
};
use ylb_yourls::YourlsClient;

#[tokio::main]
async fn main() -> Result<(), ylb_core::Error> {
    ylb_core::logging::init("ylb")?;

    let cfg = Arc::new(Config::load()?);

    let gateway: Arc<dyn ShortenerGateway> = Arc::new(YourlsClient::new(
        cfg.yourls_url.clone(),
        cfg.yourls_signature.clone(),
        cfg.timestamped_signature,
        cfg.http_timeout,
    )?);
    let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::open(cfg.state_file.clone())?);

    tracing::info!(state_file = %cfg.state_file.display(), "state store opened");

    ylb_telegram::router::run_polling(cfg, gateway, store)
        .await
        .map_err(|e| ylb_core::Error::External(format!("telegram bot failed: {e:#}")))?;

    Ok(())
}
