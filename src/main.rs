/// WATI journey sync service
///
/// - Webhook appends each WATI event to `{log_dir}/{YYYY-MM-DD}.log`
/// - Scheduler re-reads recent logs, extracts journeys and pushes them to
///   Zoho CRM (update only) and optionally Google Sheets

use anyhow::{anyhow, Context};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use wati_journey_sync::auth::{OAuth2Config, TokenManager};
use wati_journey_sync::config::{FieldMapping, Settings};
use wati_journey_sync::services::{
    CrmTarget, GoogleSheetGateway, JourneyExtractor, LogWriter, PipelineConfig, SheetTarget, SyncDispatcher,
    SyncPipeline, SyncScheduler, ZohoCrmGateway,
};
use wati_journey_sync::utils::logging::*;
use wati_journey_sync::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present; in production variables come from the environment
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if dotenv_loaded {
        tracing::info!("✅ .env file loaded");
    } else {
        tracing::debug!(".env file not found - using system environment");
    }

    let settings = Settings::new().context("Failed to load settings")?;
    settings
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {}", e))?;
    log_config_loaded(&settings.server.environment);

    // Rules and mapping are checked against each other before anything runs
    let extractor = JourneyExtractor::load(&settings.journey.rules_path)
        .await
        .context("Failed to load journey rules")?;
    let mapping = FieldMapping::load(&settings.journey.field_mapping_path)
        .await
        .context("Failed to load field mapping")?;
    mapping
        .validate(&extractor.produced_fields())
        .context("Field mapping does not match journey rules")?;
    log_info(&format!("🧭 {} journey rules loaded", extractor.rule_count()));
    if !mapping.has_crm_fields() {
        log_warning("⚠️ Field mapping has no CRM targets - Zoho leads will not be updated");
    }

    let crm = build_crm_target(&settings)?;
    let sheet = if settings.sheets.enabled {
        Some(build_sheet_target(&settings)?)
    } else {
        log_info("ℹ️ Google Sheets mirror disabled");
        None
    };

    let dispatcher = Arc::new(SyncDispatcher::new(crm, sheet, Arc::new(mapping)));
    let pipeline = SyncPipeline::new(
        PipelineConfig {
            log_dir: settings.logs.dir.clone().into(),
            lookback_days: settings.scheduler.lookback_days,
            quiet_period: chrono::Duration::minutes(settings.scheduler.quiet_period_minutes as i64),
            ledger_path: Some(settings.logs.ledger_path()),
        },
        Arc::new(extractor),
        dispatcher,
    );

    let scheduler = SyncScheduler::new(Arc::new(pipeline), settings.scheduler.interval_seconds);
    let log_writer = LogWriter::new(settings.logs.dir.clone());
    log_writer
        .ensure_dir()
        .await
        .with_context(|| format!("Log directory {} is not usable", settings.logs.dir))?;

    if settings.scheduler.enabled {
        scheduler.start().await;
    } else {
        log_warning("⚠️ Scheduler disabled - runs only via POST /admin/sync/run");
    }

    let app_state = Arc::new(AppState {
        settings: settings.clone(),
        log_writer,
        scheduler: scheduler.clone(),
    });
    let app = build_router(app_state);

    // PORT is honoured through the settings overrides
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    log_server_startup(settings.server.port);
    log_server_ready(settings.server.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    log_info("🛑 Server shut down gracefully");

    Ok(())
}

fn build_crm_target(settings: &Settings) -> anyhow::Result<CrmTarget> {
    let oauth = OAuth2Config::zoho(settings);
    oauth.validate().map_err(|e| anyhow!(e))?;
    let tokens = TokenManager::new(oauth).context("Failed to initialize Zoho token manager")?;

    let client = zoho_crm::ZohoClient::with_timeouts(
        settings.zoho.api_domain.clone(),
        settings.http.timeout_seconds,
        settings.http.connect_timeout_seconds,
    )
    .context("Failed to create Zoho CRM client")?;
    log_info(&format!("⚡ Zoho CRM client configured ({})", client.api_domain()));

    Ok(CrmTarget {
        gateway: Arc::new(ZohoCrmGateway::new(client)),
        tokens: Arc::new(tokens),
        lead_source: settings.zoho.lead_source.clone(),
    })
}

fn build_sheet_target(settings: &Settings) -> anyhow::Result<SheetTarget> {
    let oauth = OAuth2Config::google(settings);
    oauth.validate().map_err(|e| anyhow!(e))?;
    let tokens = TokenManager::new(oauth).context("Failed to initialize Google token manager")?;

    let client = google_sheets::SheetsClient::with_base_url(
        settings.sheets.base_url.clone(),
        settings.sheets.spreadsheet_id.clone(),
        settings.http.timeout_seconds,
        settings.http.connect_timeout_seconds,
    )
    .context("Failed to create Google Sheets client")?;
    log_info(&format!(
        "📄 Google Sheets mirror enabled (sheet '{}')",
        settings.sheets.sheet_name
    ));

    Ok(SheetTarget {
        gateway: Arc::new(GoogleSheetGateway::new(client, settings.sheets.sheet_name.clone())),
        tokens: Arc::new(tokens),
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log_error(&format!("Failed to install Ctrl+C handler: {}", e));
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log_error(&format!("Failed to install SIGTERM handler: {}", e));
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log_info("🛑 Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            log_info("🛑 Received SIGTERM, shutting down gracefully...");
        }
    }
}
