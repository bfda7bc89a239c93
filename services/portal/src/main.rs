use anyhow::Result;
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

mod approval;
mod call_session;
mod config;
mod error;
mod gateway;
mod middleware;
mod models;
mod otp;
mod permission;
mod rate_limiter;
mod routes;
mod session;
mod snapshot;
mod twiml;
mod validation;
mod voice;

use common::rowstore::{MemoryRowStore, RowStore, SheetsConfig, SheetsRowStore};

use crate::approval::ApprovalStore;
use crate::call_session::CallSessionStore;
use crate::config::PortalConfig;
use crate::gateway::{
    ConsoleSmsGateway, ConsoleVoiceGateway, NetgsmConfig, NetgsmGateway, SmsGateway, TwilioConfig,
    TwilioVoiceGateway, VoiceGateway,
};
use crate::otp::OtpStore;
use crate::rate_limiter::{RateLimiter, RateLimiterConfig};
use crate::session::SessionStore;
use crate::snapshot::Snapshot;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: PortalConfig,
    pub row_store: Arc<dyn RowStore>,
    pub sms_gateway: Arc<dyn SmsGateway>,
    pub voice_gateway: Arc<dyn VoiceGateway>,
    pub rate_limiter: RateLimiter,
    pub otp_store: OtpStore,
    pub session_store: SessionStore,
    pub approval_store: ApprovalStore,
    pub call_sessions: CallSessionStore,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting portal service");

    let config = PortalConfig::from_env()?;

    // Row store: the spreadsheet when configured, memory otherwise
    let row_store: Arc<dyn RowStore> = match SheetsConfig::from_env() {
        Ok(sheets_config) => Arc::new(SheetsRowStore::new(sheets_config)),
        Err(err) => {
            warn!("Row store not configured ({}), using in-memory store", err);
            Arc::new(MemoryRowStore::new())
        }
    };

    // Gateways fall back to console mode when credentials are absent
    let sms_gateway: Arc<dyn SmsGateway> = match NetgsmConfig::from_env() {
        Ok(netgsm_config) => Arc::new(NetgsmGateway::new(netgsm_config)),
        Err(err) => {
            warn!("SMS gateway not configured ({}), using console mode", err);
            Arc::new(ConsoleSmsGateway)
        }
    };

    let voice_gateway: Arc<dyn VoiceGateway> = match TwilioConfig::from_env() {
        Ok(twilio_config) => Arc::new(TwilioVoiceGateway::new(twilio_config)),
        Err(err) => {
            warn!("Voice gateway not configured ({}), using console mode", err);
            Arc::new(ConsoleVoiceGateway)
        }
    };

    let (otp_store, session_store, approval_store, call_sessions) = match &config.snapshot_dir {
        Some(dir) => {
            info!("Store snapshots enabled under {}", dir.display());
            (
                OtpStore::with_snapshot(Snapshot::new(dir, "otp-codes.json")),
                SessionStore::with_snapshot(Snapshot::new(dir, "sessions.json")),
                ApprovalStore::with_snapshot(Snapshot::new(dir, "approval-codes.json")),
                CallSessionStore::with_snapshot(Snapshot::new(dir, "call-sessions.json")),
            )
        }
        None => (
            OtpStore::new(),
            SessionStore::new(),
            ApprovalStore::new(),
            CallSessionStore::new(),
        ),
    };

    let bind_addr = config.bind_addr.clone();

    let app_state = AppState {
        config,
        row_store,
        sms_gateway,
        voice_gateway,
        rate_limiter: RateLimiter::new(RateLimiterConfig::default()),
        otp_store,
        session_store,
        approval_store,
        call_sessions,
    };

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Portal service listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
