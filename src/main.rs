//! Résumé Ranker: binary entrypoint
//! Boots the Axum HTTP server with shared state, routes, and middleware.

use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    // This enables RANKER_CONFIG_PATH / OPENAI_API_KEY from .env.
    let _ = dotenvy::dotenv();

    resume_ranker::telemetry::init_tracing();

    let router = resume_ranker::app().await?;
    Ok(router.into())
}
