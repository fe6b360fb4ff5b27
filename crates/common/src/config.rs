// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;

/// Process-wide configuration, parsed once from the environment.
///
/// Both the supervisor and every worker parse the same struct: the
/// supervisor reads `tokens` to know how many workers to fork, and each
/// worker (forked with `BOT_TOKEN`/`BOT_INDEX` set in its environment)
/// inherits every other key from the parent's environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "fleet", about = "Chat-driven PTY fleet runtime")]
pub struct Config {
    /// Comma-separated bot credentials. Count determines worker count.
    #[arg(long, env = "TELEGRAM_BOT_TOKENS", value_delimiter = ',')]
    pub tokens: Vec<String>,

    /// This process's bot token, set by the supervisor at fork time.
    #[arg(long, env = "BOT_TOKEN")]
    pub bot_token: Option<String>,

    /// This process's bot index (0-based), set by the supervisor at fork time.
    #[arg(long, env = "BOT_INDEX")]
    pub bot_index: Option<usize>,

    /// Authorised chat user ids. The first entry is the admin for notifications.
    #[arg(long, env = "ALLOWED_USER_IDS", value_delimiter = ',')]
    pub allowed_user_ids: Vec<i64>,

    /// Terminate the worker on an unauthorised update.
    #[arg(long, env = "AUTO_KILL")]
    pub auto_kill: bool,

    /// Ring buffer capacity, in PTY output chunks.
    #[arg(long, env = "XTERM_MAX_OUTPUT_LINES", default_value = "500")]
    pub max_output_lines: usize,

    /// Session idle timeout in milliseconds.
    #[arg(long, env = "XTERM_SESSION_TIMEOUT", default_value = "1800000")]
    pub session_timeout_ms: u64,

    /// PTY rows.
    #[arg(long, env = "XTERM_TERMINAL_ROWS", default_value = "30")]
    pub rows: u16,

    /// PTY columns.
    #[arg(long, env = "XTERM_TERMINAL_COLS", default_value = "100")]
    pub cols: u16,

    /// Rendered screenshot font size, in points.
    #[arg(long, env = "XTERM_FONT_SIZE", default_value = "14")]
    pub font_size: u16,

    /// Shell binary spawned for `/xterm` sessions.
    #[arg(long, env = "XTERM_SHELL_PATH", default_value = "/bin/bash")]
    pub shell_path: String,

    /// Working directory new PTYs are spawned in. Falls back to `$HOME`,
    /// then `/`, when unset.
    #[arg(long, env = "XTERM_HOME_DIR")]
    pub home_dir: Option<PathBuf>,

    /// Base URL of the headless-browser rendering sidecar (spec §4.2).
    #[arg(long, env = "RENDERER_URL", default_value = "http://127.0.0.1:4000")]
    pub renderer_url: String,

    /// Root directory watched for inbound media, one subdirectory per bot.
    #[arg(long, env = "MEDIA_TMP_LOCATION", default_value = "./media")]
    pub media_root: PathBuf,

    /// Recursively wipe `{mediaRoot}/{botId}/` on worker startup.
    #[arg(long, env = "CLEAN_UP_MEDIADIR")]
    pub clean_media_on_start: bool,

    /// Auto-delete transient confirmation messages after this many
    /// milliseconds. Zero disables auto-delete.
    #[arg(long, env = "MESSAGE_DELETE_TIMEOUT", default_value = "0")]
    pub message_delete_timeout_ms: u64,

    /// Auto-refresh tick interval, in milliseconds.
    #[arg(long, env = "SCREEN_REFRESH_INTERVAL", default_value = "2000")]
    pub screen_refresh_interval_ms: u64,

    /// Maximum auto-refresh ticks per `requestRefresh` call.
    #[arg(long, env = "SCREEN_REFRESH_MAX_COUNT", default_value = "10")]
    pub screen_refresh_max_count: u32,

    /// Supervisor token-list reconciliation period, in milliseconds.
    /// Zero disables reconciliation.
    #[arg(long, env = "BOT_TOKEN_MONITOR_INTERVAL", default_value = "0")]
    pub token_monitor_interval_ms: u64,

    /// Admin control-bot token (separate chat bot, supervisor-owned).
    #[arg(long, env = "CONTROL_BOT_TOKEN")]
    pub control_bot_token: Option<String>,

    /// User ids authorised to issue control-bot commands.
    #[arg(long, env = "CONTROL_BOT_ADMIN_IDS", value_delimiter = ',')]
    pub control_admin_ids: Vec<i64>,

    /// Forward worker child stdio to the supervisor's own console.
    #[arg(long, env = "VERBOSE_LOGGING")]
    pub verbose_logging: bool,

    /// Speech-to-text API key. Provider is auto-detected by prefix:
    /// `sk-` selects an OpenAI-compatible endpoint, anything else a
    /// Google-compatible one.
    #[arg(long, env = "TTS_API_KEY")]
    pub tts_api_key: Option<String>,

    #[arg(long, env = "M0")]
    pub m0: Option<String>,
    #[arg(long, env = "M1")]
    pub m1: Option<String>,
    #[arg(long, env = "M2")]
    pub m2: Option<String>,
    #[arg(long, env = "M3")]
    pub m3: Option<String>,
    #[arg(long, env = "M4")]
    pub m4: Option<String>,
    #[arg(long, env = "M5")]
    pub m5: Option<String>,
    #[arg(long, env = "M6")]
    pub m6: Option<String>,
    #[arg(long, env = "M7")]
    pub m7: Option<String>,
    #[arg(long, env = "M8")]
    pub m8: Option<String>,
    #[arg(long, env = "M9")]
    pub m9: Option<String>,

    /// Log format (json or text).
    #[arg(long, env = "LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Environment file the supervisor persists `addbot`/`removebot`/`reload`
    /// changes to. Must be the same file originally loaded.
    #[arg(long, env = "FLEET_ENV_FILE", default_value = ".env")]
    pub env_file: PathBuf,

    /// Path to the `fleet-worker` binary the supervisor forks. Defaults
    /// to a sibling of the supervisor's own executable.
    #[arg(long, env = "FLEET_WORKER_BINARY")]
    pub worker_binary: Option<PathBuf>,
}

/// Speech-to-text providers, selected by [`Config::tts_provider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsProvider {
    OpenAiCompatible,
    GoogleCompatible,
}

impl Config {
    /// Validate the configuration after parsing. Fatal at supervisor init.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tokens.is_empty() && self.bot_token.is_none() {
            anyhow::bail!("no bot tokens configured: set TELEGRAM_BOT_TOKENS");
        }
        if self.allowed_user_ids.is_empty() {
            anyhow::bail!("no allowed user ids configured: set ALLOWED_USER_IDS");
        }
        if self.max_output_lines == 0 {
            anyhow::bail!("XTERM_MAX_OUTPUT_LINES must be greater than zero");
        }
        Ok(())
    }

    /// The admin user id: the first entry of `allowed_user_ids`.
    pub fn admin_user_id(&self) -> Option<i64> {
        self.allowed_user_ids.first().copied()
    }

    /// Look up the `[mN]` placeholder value for `n` in `0..=9`.
    pub fn placeholder(&self, n: u8) -> Option<&str> {
        let value = match n {
            0 => &self.m0,
            1 => &self.m1,
            2 => &self.m2,
            3 => &self.m3,
            4 => &self.m4,
            5 => &self.m5,
            6 => &self.m6,
            7 => &self.m7,
            8 => &self.m8,
            9 => &self.m9,
            _ => return None,
        };
        value.as_deref()
    }

    /// Auto-detect the transcription provider from the configured key's prefix.
    pub fn tts_provider(&self) -> Option<TtsProvider> {
        let key = self.tts_api_key.as_deref()?;
        Some(if key.starts_with("sk-") {
            TtsProvider::OpenAiCompatible
        } else {
            TtsProvider::GoogleCompatible
        })
    }

    /// Stable bot-id for a given 0-based worker index.
    pub fn bot_id(index: usize) -> String {
        format!("bot-{index}")
    }

    /// This process's bot-id, derived from `bot_index`.
    pub fn own_bot_id(&self) -> Option<String> {
        self.bot_index.map(Self::bot_id)
    }

    /// Per-bot media directory: `{mediaRoot}/{botId}/`.
    pub fn media_dir(&self, bot_id: &str) -> PathBuf {
        self.media_root.join(bot_id)
    }

    /// Working directory new PTYs are spawned in: `home_dir` if set,
    /// else `$HOME`, else `/`.
    pub fn resolved_home_dir(&self) -> PathBuf {
        self.home_dir
            .clone()
            .or_else(|| std::env::var_os("HOME").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("/"))
    }
}

/// Mask a bot token for logs and admin-facing status displays, keeping
/// only enough of the tail to disambiguate.
pub fn mask_token(token: &str) -> String {
    let tail_len = 4.min(token.len());
    let tail = &token[token.len() - tail_len..];
    format!("***{tail}")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
