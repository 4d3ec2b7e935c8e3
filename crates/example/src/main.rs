//! Example blog client CLI.
//!
//! Hydrates a JSON:API document into domain objects and prints a summary of
//! every article, fetching missing authors and comments on demand.
//!
//! # Usage
//!
//! ```bash
//! blog [document.json]
//! ```
//!
//! Without an argument the built-in sample document is used. The base URL for
//! resource links is read from `APIARY_BASE_URL`; logging is configured with
//! `APIARY_LOG` and `APIARY_LOG_FORMAT`. All three may be set in a `.env` file.

use apiary_core::TracingSetup;
use apiary_upsert::client::ClientResourceUpsert;
use apiary_upsert::proxy::FetchingProxyFactory;
use example::{BlogError, CannedFetcher, SAMPLE_DOCUMENT, blog_registry, describe_article, parse_document};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    match TracingSetup::from_env() {
        Ok(setup) => setup.init(),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }

    let json = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path).unwrap_or_else(|e| {
            eprintln!("Error: cannot read {path}: {e}");
            std::process::exit(1);
        }),
        None => SAMPLE_DOCUMENT.to_string(),
    };

    if let Err(e) = run(&json).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(json: &str) -> Result<(), BlogError> {
    let base_url = std::env::var("APIARY_BASE_URL").ok();
    let registry = blog_registry(base_url)?;
    let upsert = ClientResourceUpsert::new(
        registry.clone(),
        FetchingProxyFactory::new(CannedFetcher),
    );

    let document = parse_document(json)?;
    let articles = upsert.hydrate(&document).await?;
    tracing::info!(count = articles.len(), "hydrated articles");

    for article in &articles {
        let summary = describe_article(&registry, article).await?;
        tracing::info!(%summary, "article");
    }
    Ok(())
}
