use serde::Serialize;

use danci_srs::config::Config;
use danci_srs::content::ContentContext;
use danci_srs::logging;
use danci_srs::srs::Dashboard;
use danci_srs::words::WordIdentity;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary {
    context: ContentContext,
    credentials_configured: bool,
    dashboard: Dashboard,
    next_to_learn: Vec<WordIdentity>,
    due_for_review: Vec<WordIdentity>,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = logging::init_tracing(&config.log_level, config.log_file_dir.as_deref());

    let store = match danci_srs::open_store(&config).await {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(error = %err, path = %config.storage_path().display(), "failed to open vocabulary store");
            std::process::exit(1);
        }
    };

    if !store.has_credentials() {
        tracing::warn!("LLM_API_KEY not set, word details and evaluation are unavailable");
    }

    let summary = Summary {
        context: store.context(),
        credentials_configured: store.has_credentials(),
        dashboard: store.dashboard(),
        next_to_learn: store
            .words_to_learn()
            .into_iter()
            .take(config.learn_batch_size)
            .collect(),
        due_for_review: store.words_to_review(),
    };

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            tracing::error!(error = %err, "failed to render summary");
            std::process::exit(1);
        }
    }
}
