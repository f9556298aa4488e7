pub mod run;
pub mod status;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use nrtk_core::ConfigLayer;
use nrtk_daemon::RotatingLog;

/// Settings shared by every subcommand. Flags win over environment
/// variables, which win over the `--config` file.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// NRTK API endpoint for this instance.
    #[arg(long, global = true, env = "NRTK_API_URL")]
    pub api_url: Option<String>,

    /// API token sent in the Authorization header.
    #[arg(long, global = true, env = "NRTK_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Authorization scheme placed before the token [default: Token].
    #[arg(long, global = true, env = "NRTK_AUTH_SCHEME")]
    pub auth_scheme: Option<String>,

    /// HTTP timeout in seconds [default: 20].
    #[arg(long = "timeout", global = true, env = "NRTK_TIMEOUT", value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Directory holding `www/` and `.nrtk/` [default: .].
    #[arg(long, global = true, env = "NRTK_BASE_DIR")]
    pub base_dir: Option<PathBuf>,

    /// Content directory [default: <base>/www].
    #[arg(long, global = true, env = "NRTK_WWW_DIR")]
    pub www_dir: Option<PathBuf>,

    /// Archive directory [default: <base>/.nrtk/bin].
    #[arg(long, global = true, env = "NRTK_BIN_DIR")]
    pub bin_dir: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace, a legacy name or number
    /// (WARNING, 10..50), or a tracing directive.
    #[arg(short = 'l', long, global = true, env = "LOGLEVEL")]
    pub log_level: Option<String>,

    /// Also append logs to this file (rotated at 10 MiB).
    #[arg(long, global = true, env = "NRTK_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// YAML file with defaults for any of the settings above.
    #[arg(short = 'c', long, global = true, env = "NRTK_CONFIG")]
    pub config: Option<PathBuf>,
}

impl GlobalArgs {
    fn flag_layer(&self) -> ConfigLayer {
        ConfigLayer {
            api_url: self.api_url.clone(),
            api_token: self.api_token.clone(),
            auth_scheme: self.auth_scheme.clone(),
            timeout_secs: self.timeout_secs,
            base_dir: self.base_dir.clone(),
            www_dir: self.www_dir.clone(),
            bin_dir: self.bin_dir.clone(),
            log_level: self.log_level.clone(),
            log_file: self.log_file.clone(),
            interval_secs: None,
        }
    }

    /// Flags and environment merged over the config file, if any.
    pub fn layer(&self) -> Result<ConfigLayer> {
        let flags = self.flag_layer();
        match &self.config {
            Some(path) => {
                let file = ConfigLayer::load(path)
                    .with_context(|| format!("failed to load config {}", path.display()))?;
                Ok(flags.or(file))
            }
            None => Ok(flags),
        }
    }
}

/// Install the tracing subscriber for `layer`'s log settings.
pub fn init_logging(layer: &ConfigLayer) -> Result<Option<Arc<RotatingLog>>> {
    nrtk_daemon::init_tracing(layer.log_level.as_deref(), layer.log_file.as_deref())
        .context("failed to initialise logging")
}
