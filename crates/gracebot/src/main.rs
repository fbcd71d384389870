use std::sync::Arc;

use gracebot_connector::ConnectorClient;
use gracebot_luis::LuisClient;

use gracebot_core::{
    app::{BotApp, Replies},
    config::Config,
    definition::DefinitionLookup,
    filter::WordListFilter,
    persistence::{ActivityStore, JsonFileStore, MemoryStore, PersistenceManager},
};

#[tokio::main]
async fn main() -> Result<(), gracebot_core::Error> {
    gracebot_core::logging::init("gracebot")?;

    let cfg = Config::load()?;

    let filter = Arc::new(WordListFilter::from_file(&cfg.bad_words_path)?);
    let definitions = Arc::new(DefinitionLookup::from_json_file(&cfg.dictionary_path)?);
    tracing::info!(
        bad_words = filter.len(),
        definitions = definitions.len(),
        "static resources loaded"
    );

    let store: Arc<dyn ActivityStore> = match &cfg.store_path {
        Some(path) => Arc::new(JsonFileStore::open(path).await?),
        None => {
            tracing::warn!("GRACEBOT_STORE_PATH is not set; history is kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let transport = Arc::new(ConnectorClient::new(
        cfg.connector_token.clone(),
        cfg.http_timeout,
    )?);

    let mut app = BotApp::new(
        filter,
        definitions,
        PersistenceManager::new(store),
        transport,
        Replies::from(&cfg),
    );
    if let Some(luis) = &cfg.luis {
        let classifier = Arc::new(LuisClient::new(luis.clone(), cfg.http_timeout)?);
        app = app.with_classifier(classifier, luis.min_score);
        tracing::info!(app_id = %luis.app_id, "intent classification enabled");
    }

    gracebot_connector::router::serve(&cfg.listen_addr, Arc::new(app))
        .await
        .map_err(|e| gracebot_core::Error::External(format!("webhook server failed: {e}")))?;

    Ok(())
}
