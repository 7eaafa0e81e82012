//! Where settings come from.
//!
//! [`load_settings`] starts from [`GremlinSettings::default()`], overlays
//! `~/.gremlin/settings.json` when it exists, then applies `GREMLIN_*`
//! environment variables. A file only needs the keys it changes:
//!
//! ```json
//! { "connection": { "host": "graph.internal", "ssl": true } }
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{AuthSettings, GremlinSettings};

/// `~/.gremlin/settings.json` (falls back to `/tmp` without `HOME`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);
    home.join(".gremlin").join("settings.json")
}

/// [`load_settings_from_path`] on [`settings_path`].
pub fn load_settings() -> Result<GremlinSettings> {
    load_settings_from_path(&settings_path())
}

/// Defaults, then the file at `path` (if any), then the environment.
///
/// A missing file is not an error. An unreadable or malformed one is.
pub fn load_settings_from_path(path: &Path) -> Result<GremlinSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

fn load_file_layer(path: &Path) -> Result<GremlinSettings> {
    let defaults = serde_json::to_value(GremlinSettings::default())?;
    let layered = match std::fs::read_to_string(path) {
        Ok(text) => {
            debug!(path = %path.display(), "applying settings file");
            deep_merge(defaults, serde_json::from_str(&text)?)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file");
            defaults
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_value(layered)?)
}

/// Overlay `source` on `target` and return the result.
///
/// Objects merge key by key, `null` in `source` leaves the target value
/// alone, and anything else in `source` (arrays included) replaces it.
pub fn deep_merge(mut target: Value, source: Value) -> Value {
    merge_into(&mut target, source);
    target
}

fn merge_into(target: &mut Value, source: Value) {
    match (target, source) {
        (_, Value::Null) => {}
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_into(slot, value),
                    None if value.is_null() => {}
                    None => {
                        let _ = base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Apply `GREMLIN_*` environment variable overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut GremlinSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup` instead of the process environment.
///
/// Each variable has strict parsing rules:
/// - Ports must be integers in `1..=65535`
/// - Booleans accept: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`
/// - Empty or invalid values are ignored (fall back to file/default)
///
/// Setting either `GREMLIN_USER` or `GREMLIN_PASSWORD` enables SASL
/// credentials; the other half keeps its file value (or empty).
pub fn apply_overrides_from<F>(settings: &mut GremlinSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Connection ──────────────────────────────────────────────────
    if let Some(v) = env.string("GREMLIN_HOST") {
        settings.connection.host = v;
    }
    if let Some(v) = env.port("GREMLIN_PORT") {
        settings.connection.port = v;
    }
    if let Some(v) = env.string("GREMLIN_PATH") {
        settings.connection.path = v;
    }
    if let Some(v) = env.bool("GREMLIN_SSL") {
        settings.connection.ssl = v;
    }

    // ── Request ─────────────────────────────────────────────────────
    if let Some(v) = env.string("GREMLIN_PROCESSOR") {
        settings.request.processor = v;
    }
    if let Some(v) = env.string("GREMLIN_LANGUAGE") {
        settings.request.language = v;
    }

    // ── Auth ────────────────────────────────────────────────────────
    let user = env.string("GREMLIN_USER");
    let password = env.string("GREMLIN_PASSWORD");
    if user.is_some() || password.is_some() {
        let auth = settings.auth.get_or_insert_with(AuthSettings::default);
        if let Some(v) = user {
            auth.user = v;
        }
        if let Some(v) = password {
            auth.password = v;
        }
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("GREMLIN_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`, any case.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// A `u16` in `min..=max`.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    val.trim().parse().ok().filter(|n| (min..=max).contains(n))
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        let raw = self.string(name)?;
        let parsed = parse(&raw);
        if parsed.is_none() {
            warn!(var = name, value = %raw, "ignoring unparseable environment override");
        }
        parsed
    }

    fn bool(&self, name: &str) -> Option<bool> {
        self.parsed(name, parse_bool)
    }

    fn port(&self, name: &str) -> Option<u16> {
        self.parsed(name, |raw| parse_u16_range(raw, 1, u16::MAX))
    }
}
