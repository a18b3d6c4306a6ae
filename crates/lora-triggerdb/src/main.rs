use std::path::PathBuf;

use anyhow::Context;
use env_flags::env_flags;

use lora_triggerdb::config::{
    DEFAULT_METADATA_MAX_BYTES, Settings, UserConfig, default_triggers_file, expand_home, layered,
    load_user_config, resolve_home, split_dirs,
};
use lora_triggerdb::http::{AppState, router};
use lora_triggerdb::loader::LoraLoader;
use lora_triggerdb::logging::{LogFormat, LoggingOptions, init_tracing};

env_flags! {
    /// Service home directory. Defaults to $HOME/.lora-triggerdb
    LORA_TRIGGERDB_HOME: &str = "";
    /// Tracing filter, e.g. "info", "debug", or targets format.
    RUST_LOG: &str = "info";
    /// Preferred filter env (alias). If set, overrides RUST_LOG.
    TRACING_FILTER: &str = "";
    /// Pretty formatting for logs (ignored if TRACING_JSON or TRACING_COMPACT is true)
    TRACING_PRETTY: bool = false;
    /// Compact single-line formatting for logs (ignored if TRACING_JSON=true)
    TRACING_COMPACT: bool = true;
    /// JSON formatting for logs
    TRACING_JSON: bool = false;
    /// If true, also log to a daily file under <home>/logs or LOG_DIR
    LOG_TO_FILE: bool = false;
    /// Optional explicit log directory. Defaults to <home>/logs
    LOG_DIR: &str = "";
    /// Bind host for the HTTP endpoints
    HOST: &str = "127.0.0.1";
    /// Bind port for the HTTP endpoints
    PORT: u16 = 8189;
    /// LoRA folders (comma-separated). The first one also holds triggers.json.
    LORA_DIRS: &str = "";
    /// Explicit trigger store path; overrides the folder-derived default
    TRIGGERS_FILE: &str = "";
    /// Adapter files above this size are not opened for metadata
    METADATA_MAX_BYTES: u64 = DEFAULT_METADATA_MAX_BYTES;
}

fn env_set(key: &str) -> bool {
    std::env::var_os(key).is_some()
}

fn logging_options(home: &std::path::Path, user_cfg: Option<&UserConfig>) -> LoggingOptions {
    let cfg = user_cfg.and_then(|c| c.logging.as_ref());

    let env_filter = if !(*TRACING_FILTER).is_empty() {
        (*TRACING_FILTER).to_string()
    } else {
        (*RUST_LOG).to_string()
    };
    let filter = layered(
        env_set("TRACING_FILTER") || env_set("RUST_LOG"),
        env_filter,
        cfg.and_then(|l| l.level.clone()),
    );
    let json = layered(env_set("TRACING_JSON"), *TRACING_JSON, cfg.and_then(|l| l.json));
    let compact = layered(
        env_set("TRACING_COMPACT"),
        *TRACING_COMPACT,
        cfg.and_then(|l| l.compact),
    );
    let pretty = layered(
        env_set("TRACING_PRETTY"),
        *TRACING_PRETTY,
        cfg.and_then(|l| l.pretty),
    );
    let to_file = layered(env_set("LOG_TO_FILE"), *LOG_TO_FILE, cfg.and_then(|l| l.to_file));
    let dir = if !(*LOG_DIR).is_empty() {
        expand_home(*LOG_DIR)
    } else {
        cfg.and_then(|l| l.dir.as_deref())
            .map(expand_home)
            .unwrap_or_else(|| home.join("logs"))
    };

    LoggingOptions {
        filter,
        format: LogFormat::from_flags(json, compact, pretty),
        to_file,
        dir,
    }
}

fn settings(home: PathBuf, user_cfg: Option<&UserConfig>) -> Settings {
    let server = user_cfg.and_then(|c| c.server.as_ref());
    let store = user_cfg.and_then(|c| c.store.as_ref());

    let host = layered(
        env_set("HOST"),
        (*HOST).to_string(),
        server.and_then(|s| s.host.clone()),
    );
    let port = layered(env_set("PORT"), *PORT, server.and_then(|s| s.port));

    let lora_dirs: Vec<PathBuf> = if env_set("LORA_DIRS") {
        split_dirs(*LORA_DIRS)
    } else {
        store
            .and_then(|s| s.lora_dirs.as_ref())
            .map(|dirs| dirs.iter().map(|d| expand_home(d)).collect())
            .unwrap_or_default()
    };

    let triggers_file = if !(*TRIGGERS_FILE).is_empty() {
        expand_home(*TRIGGERS_FILE)
    } else if let Some(file) = store.and_then(|s| s.file.as_deref()) {
        expand_home(file)
    } else {
        default_triggers_file(&lora_dirs, &home)
    };

    let metadata_max_bytes = layered(
        env_set("METADATA_MAX_BYTES"),
        *METADATA_MAX_BYTES,
        store.and_then(|s| s.metadata_max_bytes),
    );

    Settings {
        home,
        host,
        port,
        lora_dirs,
        triggers_file,
        metadata_max_bytes,
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let home = resolve_home(*LORA_TRIGGERDB_HOME);
    let (user_cfg, cfg_error) = match load_user_config(&home) {
        Ok(cfg) => (cfg, None),
        Err(e) => (None, Some(e)),
    };

    init_tracing(&logging_options(&home, user_cfg.as_ref()));
    if let Some(e) = cfg_error {
        tracing::warn!("ignoring user config: {:#}", e);
    }

    let settings = settings(home, user_cfg.as_ref());
    tracing::info!("home={}", settings.home.display());
    tracing::info!("trigger store={}", settings.triggers_file.display());
    if settings.lora_dirs.is_empty() {
        tracing::warn!("no LoRA folders configured; set LORA_DIRS to enable loading and metadata");
    } else {
        tracing::debug!(
            "lora dirs: {}",
            settings
                .lora_dirs
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let app = router(AppState::new(LoraLoader::from_settings(&settings)));
    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("serving trigger endpoints on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;
    tracing::info!("server stopped");
    Ok(())
}
