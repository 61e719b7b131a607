mod dispatch;
mod logging;
mod plugins;
mod transport;

use core::time::Duration;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context as _, Result};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use tracing::info;

use crate::dispatch::Dispatcher;
use crate::logging::{LogFormat, init_tracing};
use crate::transport::{HttpTransport, MqttTransport, Transport};
use plugin_core::{Plugin, PluginSpec};
use plugin_trakt::{Trakt, TraktClient, TraktConfig, UserStore};

#[derive(Parser, Debug)]
#[command(
    name = "gowon-trakt",
    version,
    about = "gowon module reporting what a user last watched on Trakt"
)]
struct Args {
    /// Command prefix used when the host forwards raw lines
    #[arg(short = 'P', long, env = "GOWON_PREFIX", default_value = ".")]
    prefix: String,

    /// Trakt API client id, sent as `trakt-api-key`
    #[arg(short = 'k', long, env = "GOWON_TRAKT_API_KEY", hide_env_values = true)]
    api_key: String,

    /// SQLite file holding nick to Trakt user mappings
    #[arg(short = 'K', long, env = "GOWON_TRAKT_KV_PATH", default_value = "kv.db")]
    kv_path: PathBuf,

    /// How messages reach the module
    #[arg(long, env = "GOWON_TRANSPORT", value_enum, default_value_t = TransportKind::Http)]
    transport: TransportKind,

    /// Address the HTTP transport listens on
    #[arg(long, env = "GOWON_HTTP_LISTEN", default_value = "0.0.0.0:8080")]
    listen: String,

    /// MQTT broker, `host[:port]`
    #[arg(short = 'H', long, env = "GOWON_BROKER", default_value = "localhost:1883")]
    broker: String,

    /// MQTT client id
    #[arg(long, env = "GOWON_MQTT_CLIENT_ID", default_value = "trakt")]
    client_id: String,

    /// Trakt API base URL
    #[arg(long, env = "GOWON_TRAKT_API_URL", default_value = plugin_trakt::DEFAULT_BASE_URL)]
    trakt_url: String,

    /// Timeout for each Trakt request, in seconds
    #[arg(long, env = "GOWON_TRAKT_TIMEOUT_SECS", default_value_t = 10)]
    timeout_secs: u64,

    /// Optional YAML file with per-plugin overrides
    #[arg(long, env = "GOWON_CONFIG", default_value = "./config.yaml")]
    config: PathBuf,

    /// Log line format; `RUST_LOG` sets the level filter
    #[arg(long, env = "RUST_LOG_MODE", value_enum, ignore_case = true, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportKind {
    Http,
    Mqtt,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub(crate) struct BotConfig {
    #[serde(default, alias = "tools")]
    pub(crate) plugins: Vec<PluginSpec>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present so clap can pick up env vars.
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    init_tracing(args.log_format);

    let config = load_config(&args.config)?;

    let store = UserStore::open(&args.kv_path)
        .with_context(|| format!("opening user store at {}", args.kv_path.display()))?;
    let client = TraktClient::new(TraktConfig {
        api_key: args.api_key,
        base_url: args.trakt_url,
        timeout: Duration::from_secs(args.timeout_secs),
    })
    .context("building trakt client")?;
    let trakt: Arc<dyn Plugin> = Arc::new(Trakt::new(client, store));

    let registry = plugins::build_registry(&config, vec![trakt]).await;
    for (id, entry) in registry.entries().await {
        info!(plugin = %id, enabled = entry.spec.enabled, commands = ?entry.spec.triggers.commands, "Registered plugin");
    }

    let mut dispatcher = Dispatcher::new(registry, args.prefix);
    let transport: Box<dyn Transport> = match args.transport {
        TransportKind::Http => {
            // the host posts to this module's endpoint, so bare envelopes are ours
            dispatcher = dispatcher.with_fallback(plugin_trakt::MODULE);
            Box::new(HttpTransport::new(args.listen))
        }
        TransportKind::Mqtt => Box::new(MqttTransport::new(&args.broker, args.client_id)?),
    };

    info!(transport = transport.name(), "Starting gowon-trakt");
    transport.serve(Arc::new(dispatcher)).await?;
    info!("Shut down");
    Ok(())
}

fn load_config(path: &Path) -> Result<BotConfig> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No config file; using plugin defaults");
            return Ok(BotConfig::default());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("reading config at {}", path.display()));
        }
    };
    serde_yaml::from_str(&raw).with_context(|| format!("parsing config at {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("config.yaml")).unwrap();
        assert!(config.plugins.is_empty());
    }

    #[test]
    fn reads_plugin_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "tools:\n  - id: trakt\n    triggers:\n      commands: [tv, film]\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.plugins.len(), 1);
        let spec = &config.plugins[0];
        assert_eq!(spec.id, "trakt");
        assert!(spec.enabled);
        assert_eq!(spec.triggers.commands, ["tv", "film"]);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "plugins: [unclosed").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn args_defaults() {
        let args = Args::try_parse_from(["gowon-trakt", "--api-key", "abc"]).unwrap();
        assert_eq!(args.prefix, ".");
        assert_eq!(args.kv_path, PathBuf::from("kv.db"));
        assert_eq!(args.transport, TransportKind::Http);
        assert_eq!(args.timeout_secs, 10);

        let args =
            Args::try_parse_from(["gowon-trakt", "-k", "abc", "--transport", "mqtt", "-H", "mq:1884"])
                .unwrap();
        assert_eq!(args.transport, TransportKind::Mqtt);
        assert_eq!(args.broker, "mq:1884");

        let args =
            Args::try_parse_from(["gowon-trakt", "-k", "abc", "--log-format", "JSON"]).unwrap();
        assert_eq!(args.log_format, LogFormat::Json);
    }
}
