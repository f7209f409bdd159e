mod logging;
mod routes;

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Instant,
};

use overturned_agent::GeminiBackend;
use overturned_core::{
    agent::ModelBackend,
    chat::ChatPanel,
    config::Config,
    dispatch::{Dispatcher, Profiles},
    evidence::EvidencePanel,
    types::CaseContext,
};
use tokio::sync::{broadcast, RwLock};
use tracing::info;
use tracing_subscriber::prelude::*;

use crate::logging::{BroadcastLayer, LogRing};

// ── AppState ──────────────────────────────────────────────────────────────

pub struct AppState {
    pub config: Arc<Config>,
    pub start_time: Instant,
    pub log_tx: broadcast::Sender<String>,
    pub log_ring: LogRing,
    pub dispatcher: Arc<Dispatcher>,
    /// Shared by every panel; read at dispatch time.
    pub case: RwLock<CaseContext>,
    pub active_tab: RwLock<String>,
    /// One panel per chat tab, keyed by tab slug.
    pub panels: HashMap<String, Arc<ChatPanel>>,
    pub evidence: Arc<EvidencePanel>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        backend: Arc<dyn ModelBackend>,
        log_tx: broadcast::Sender<String>,
        log_ring: LogRing,
    ) -> Self {
        let dispatcher = Dispatcher::new(backend, Profiles::from_config(&config));
        let panels = overturned_domains::all_tabs()
            .iter()
            .filter(|tab| tab.is_chat())
            .map(|tab| (tab.name.clone(), Arc::new(ChatPanel::new(tab))))
            .collect();
        Self {
            config,
            start_time: Instant::now(),
            log_tx,
            log_ring,
            dispatcher: Arc::new(dispatcher),
            case: RwLock::new(CaseContext::default()),
            active_tab: RwLock::new(overturned_domains::legal::case_overview_tab().name),
            panels,
            evidence: Arc::new(EvidencePanel::new()),
        }
    }

    /// Chat panel for a tab slug, label or alias.
    pub fn panel(&self, tab: &str) -> Option<Arc<ChatPanel>> {
        let tab = overturned_domains::get_tab(tab)?;
        self.panels.get(&tab.name).cloned()
    }
}

// ── main ──────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (log_tx, _) = broadcast::channel::<String>(1024);
    let log_ring: LogRing = Arc::new(std::sync::Mutex::new(VecDeque::with_capacity(
        logging::RING_CAPACITY,
    )));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "overturned_server=info,overturned_core=info,overturned_agent=info,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(BroadcastLayer {
            tx: log_tx.clone(),
            ring: Arc::clone(&log_ring),
        })
        .init();

    let config = Arc::new(Config::from_env()?);
    let backend: Arc<dyn ModelBackend> = Arc::new(GeminiBackend::from_config(&config));
    info!(
        backend = backend.name(),
        search_model = %config.search_model,
        thinking_model = %config.thinking_model,
        evidence_model = %config.evidence_model,
        "model backend ready"
    );

    let state = Arc::new(AppState::new(
        Arc::clone(&config),
        backend,
        log_tx,
        log_ring,
    ));
    let app = routes::router(Arc::clone(&state), &config.dashboard_dist_dir);

    let addr = format!("{}:{}", config.web_bind, config.web_port);
    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
