use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chatrelay_core::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "store.url",
        &config.store.url,
        field_source(
            "store.url",
            Some("CHATRELAY_STORE_URL"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "store.max_connections",
        &config.store.max_connections.to_string(),
        field_source(
            "store.max_connections",
            Some("CHATRELAY_STORE_MAX_CONNECTIONS"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "store.timeout_secs",
        &config.store.timeout_secs.to_string(),
        field_source(
            "store.timeout_secs",
            Some("CHATRELAY_STORE_TIMEOUT_SECS"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    let app_token = redact_token(config.slack.app_token.expose_secret());
    let bot_token = redact_token(config.slack.bot_token.expose_secret());
    lines.push(render_line(
        "slack.app_token",
        &app_token,
        field_source(
            "slack.app_token",
            Some("CHATRELAY_SLACK_APP_TOKEN"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "slack.bot_token",
        &bot_token,
        field_source(
            "slack.bot_token",
            Some("CHATRELAY_SLACK_BOT_TOKEN"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    lines.push(render_line(
        "provider.base_url",
        &config.provider.base_url,
        field_source(
            "provider.base_url",
            Some("CHATRELAY_PROVIDER_BASE_URL"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    let default_api_key =
        if config.provider.default_api_key.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line(
        "provider.default_api_key",
        default_api_key,
        field_source(
            "provider.default_api_key",
            Some("CHATRELAY_PROVIDER_API_KEY"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "provider.default_model",
        &config.provider.default_model,
        field_source(
            "provider.default_model",
            Some("CHATRELAY_PROVIDER_DEFAULT_MODEL"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "provider.prompt_override_enabled",
        &config.provider.prompt_override_enabled.to_string(),
        field_source(
            "provider.prompt_override_enabled",
            Some("CHATRELAY_PROVIDER_PROMPT_OVERRIDE"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "provider.timeout_secs",
        &config.provider.timeout_secs.to_string(),
        field_source(
            "provider.timeout_secs",
            Some("CHATRELAY_PROVIDER_TIMEOUT_SECS"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        field_source(
            "server.bind_address",
            Some("CHATRELAY_SERVER_BIND_ADDRESS"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
        field_source(
            "server.health_check_port",
            Some("CHATRELAY_SERVER_HEALTH_CHECK_PORT"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        field_source(
            "logging.level",
            Some("CHATRELAY_LOGGING_LEVEL"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        field_source(
            "logging.format",
            Some("CHATRELAY_LOGGING_FORMAT"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("chatrelay.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/chatrelay.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
