use anyhow::{Context, Result};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use veloce_inventory::{
    cars_api::{build_http_client, ApiClient},
    config::Settings,
    routes,
    session::{HttpAuth, Session},
    store::CarStore,
    token_store::FileTokenStore,
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first. Ignore errors (e.g., file not found)
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "veloce_inventory=info,tower_http=info".into()))
        .with(fmt::layer())
        .init();

    tracing::info!("Initializing Veloce inventory server...");

    let settings = match Settings::new() {
        Ok(s) => {
            tracing::info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };
    let settings = Arc::new(settings);
    tracing::info!("Backend API at {} (page size {})", settings.api_base_url, settings.page_size);

    let http_client = build_http_client(&settings)?;

    // Tokens survive restarts in a small JSON file
    let tokens = Arc::new(
        FileTokenStore::open(&settings.token_store_path)
            .with_context(|| format!("Failed to open token store at {}", settings.token_store_path))?,
    );
    let auth = Arc::new(HttpAuth::new(http_client.clone(), &settings.api_base_url));
    let session = Arc::new(Session::new(auth, tokens));
    if session.is_authenticated() {
        tracing::info!("Restored saved session");
    }

    let backend = Arc::new(ApiClient::new(http_client, &settings.api_base_url, session.clone()));
    let app_state = AppState {
        settings: settings.clone(),
        store: Arc::new(CarStore::new(backend)),
        session,
    };

    let app = routes::create_router(app_state)
        .nest_service("/static", ServeDir::new(&settings.static_dir))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = settings
        .server_address
        .parse()
        .with_context(|| format!("Invalid server address format: {}", settings.server_address))?;

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address {}", addr))?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
