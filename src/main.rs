//! Onboarding wizard state service.
//!
//! Serves the state an account-opening wizard needs between screens:
//! - time-boxed sessions with sliding expiry
//! - versioned step-by-step drafts
//! - OTP challenges with attempt counting and lockout

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use tokio::signal;
use tracing::{info, warn};

use api::{router, AppState, RateLimitConfig, RetentionConfig};
use telemetry::init_tracing_from_env;
use wizard_core::{
    limits::{OTP_CODE_TTL_SECS, OTP_COOLDOWN_SECS, OTP_MAX_ATTEMPTS, SESSION_TTL_SECS},
    Clock, Draft, DraftStore, FixedCode, InMemoryStore, OtpAttemptState, OtpAttemptTracker,
    OtpCodeSource, OtpPolicy, RandomCode, Session, SessionStore, SystemClock,
};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    #[serde(default)]
    session: SessionConfig,

    #[serde(default)]
    otp: OtpConfig,

    #[serde(default)]
    draft: DraftConfig,

    #[serde(default)]
    retention: RetentionConfig,

    #[serde(default)]
    throttle: RateLimitConfig,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct SessionConfig {
    ttl_secs: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: SESSION_TTL_SECS,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct OtpConfig {
    max_attempts: u32,
    cooldown_secs: i64,
    code_ttl_secs: i64,
    /// Issue this code instead of a random one. Development only.
    fixed_code: Option<String>,
    /// Log every issued code at debug level. Development only.
    log_codes: bool,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            max_attempts: OTP_MAX_ATTEMPTS,
            cooldown_secs: OTP_COOLDOWN_SECS,
            code_ttl_secs: OTP_CODE_TTL_SECS,
            fixed_code: None,
            log_codes: false,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct DraftConfig {
    /// Saving a step without a draft creates one
    create_on_save: bool,
    /// Draft writes require a live session
    require_live_session: bool,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            create_on_save: true,
            require_live_session: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            session: SessionConfig::default(),
            otp: OtpConfig::default(),
            draft: DraftConfig::default(),
            retention: RetentionConfig::default(),
            throttle: RateLimitConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env().context("Failed to initialize tracing")?;

    info!("Starting wizard state service v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    info!(
        session_ttl_secs = config.session.ttl_secs,
        otp_max_attempts = config.otp.max_attempts,
        otp_cooldown_secs = config.otp.cooldown_secs,
        create_on_save = config.draft.create_on_save,
        require_live_session = config.draft.require_live_session,
        "Loaded configuration"
    );

    let state = build_state(&config);

    if !state.check_store() {
        warn!("Record store probe failed at startup");
    }

    let _sweeper = state.start_retention_sweeper(&config.retention);
    let _throttle_cleanup = state.start_rate_limiter_cleanup();

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

/// Wire the stores against the system clock and in-memory tables.
fn build_state(config: &Config) -> AppState {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let codes: Arc<dyn OtpCodeSource> = match &config.otp.fixed_code {
        Some(code) => {
            warn!("OTP fixed code enabled; do not use in production");
            Arc::new(FixedCode(code.clone()))
        }
        None => {
            if !config.otp.log_codes {
                warn!(
                    "No OTP delivery channel; set WIZARD_OTP_FIXED_CODE or WIZARD_OTP__LOG_CODES=true so codes can be verified"
                );
            }
            Arc::new(RandomCode)
        }
    };

    let sessions = SessionStore::new(Arc::new(InMemoryStore::<Session>::new()), clock.clone())
        .with_ttl(Duration::seconds(config.session.ttl_secs));

    let drafts = DraftStore::new(Arc::new(InMemoryStore::<Draft>::new()), clock.clone())
        .with_create_on_save(config.draft.create_on_save);

    let otp = OtpAttemptTracker::new(
        Arc::new(InMemoryStore::<OtpAttemptState>::new()),
        clock,
        codes,
    )
    .with_policy(OtpPolicy {
        max_attempts: config.otp.max_attempts,
        cooldown: Duration::seconds(config.otp.cooldown_secs),
        code_ttl: Duration::seconds(config.otp.code_ttl_secs),
    });

    AppState::new(sessions, drafts, otp)
        .with_rate_limit(config.throttle.clone())
        .with_live_session_requirement(config.draft.require_live_session)
        .with_otp_code_logging(config.otp.log_codes)
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // WIZARD_PORT, WIZARD_SESSION__TTL_SECS, ...
        .add_source(
            config::Environment::with_prefix("WIZARD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Flat spelling for the most commonly set nested value
    if let Ok(code) = std::env::var("WIZARD_OTP_FIXED_CODE") {
        if !code.trim().is_empty() {
            config.otp.fixed_code = Some(code.trim().to_string());
        }
    }

    Ok(config)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
