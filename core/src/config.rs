use std::time::Duration;

use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use color_eyre::eyre::{bail, Context, Result};
use serde::Deserialize;

use crate::{
    auth::AuthSettings,
    notify::{HubKind, HubOptions},
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct TomlApi {
    base_url: String,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct TomlHubs {
    structure_path: Option<String>,
    average_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct TomlSession {
    path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct TomlNotifications {
    throttle_secs: Option<u64>,
    reconnect_schedule_secs: Option<Vec<u64>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct TomlAuth {
    redirect_delay_ms: Option<u64>,
    login_redirect: Option<String>,
    signup_redirect: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct TomlConfig {
    #[serde(rename = "Api")]
    pub api: TomlApi,
    #[serde(rename = "Hubs")]
    pub hubs: Option<TomlHubs>,
    #[serde(rename = "Session")]
    pub session: Option<TomlSession>,
    #[serde(rename = "Notifications")]
    pub notifications: Option<TomlNotifications>,
    #[serde(rename = "Auth")]
    pub auth: Option<TomlAuth>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Versioned API root, without a trailing slash.
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubsConfig {
    pub structure_path: String,
    pub average_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationsConfig {
    pub throttle: Duration,
    pub reconnect_schedule: Vec<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api: ApiConfig,
    pub hubs: HubsConfig,
    pub session_path: PathBuf,
    pub notifications: NotificationsConfig,
    pub auth: AuthSettings,
}

impl Config {
    pub fn hub_url(&self, hub: HubKind) -> String {
        let path = match hub {
            HubKind::Structure => &self.hubs.structure_path,
            HubKind::Average => &self.hubs.average_path,
        };
        format!("{}/{}", self.api.base_url, path.trim_start_matches('/'))
    }

    /// Initial connects are retried once per throttle window.
    pub fn hub_options(&self) -> HubOptions {
        HubOptions {
            retry_delay: self.notifications.throttle,
            reconnect_schedule: self.notifications.reconnect_schedule.clone(),
        }
    }
}

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_THROTTLE_SECS: u64 = 20;
const DEFAULT_RECONNECT_SCHEDULE_SECS: [u64; 5] = [0, 2, 5, 10, 30];
const DEFAULT_SESSION_FILE: &str = "session.json";

/// Reads the config at `path`. Relative session paths are resolved against
/// the directory of the config file.
pub async fn read_config(path: &Path) -> Result<Config> {
    let toml_str = tokio::fs::read_to_string(path)
        .await
        .context(format!("Error reading config file {}", path))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse_config(&toml_str, base_dir)
}

pub fn parse_config(toml_str: &str, base_dir: &Path) -> Result<Config> {
    let toml_config: TomlConfig = toml::from_str(toml_str).context("Error parsing config file")?;

    let base_url = toml_config.api.base_url.trim().trim_end_matches('/').to_owned();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        bail!("Api.base_url must be an http(s) URL, got {:?}", base_url);
    }
    let timeout_secs = toml_config.api.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
    if timeout_secs == 0 {
        bail!("Api.timeout_secs must be positive");
    }

    let hubs = toml_config.hubs.map_or_else(
        || HubsConfig {
            structure_path: "hubs/structure".to_owned(),
            average_path: "hubs/average".to_owned(),
        },
        |hubs| HubsConfig {
            structure_path: hubs.structure_path.unwrap_or_else(|| "hubs/structure".to_owned()),
            average_path: hubs.average_path.unwrap_or_else(|| "hubs/average".to_owned()),
        },
    );

    let session_path: PathBuf = {
        let path = toml_config
            .session
            .map(|session| PathBuf::from(session.path))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE));
        if path.is_absolute() {
            path
        } else {
            base_dir.join(path)
        }
    };

    let notifications = {
        let toml_notifications = toml_config.notifications;
        let throttle_secs = toml_notifications
            .as_ref()
            .and_then(|n| n.throttle_secs)
            .unwrap_or(DEFAULT_THROTTLE_SECS);
        let schedule = toml_notifications
            .and_then(|n| n.reconnect_schedule_secs)
            .unwrap_or_else(|| DEFAULT_RECONNECT_SCHEDULE_SECS.to_vec());
        NotificationsConfig {
            throttle: Duration::from_secs(throttle_secs),
            reconnect_schedule: schedule.into_iter().map(Duration::from_secs).collect(),
        }
    };

    let auth = {
        let defaults = AuthSettings::default();
        match toml_config.auth {
            Some(auth) => AuthSettings {
                redirect_delay: auth
                    .redirect_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.redirect_delay),
                login_redirect: auth.login_redirect.unwrap_or(defaults.login_redirect),
                signup_redirect: auth.signup_redirect.unwrap_or(defaults.signup_redirect),
            },
            None => defaults,
        }
    };

    Ok(Config {
        api: ApiConfig {
            base_url,
            timeout: Duration::from_secs(timeout_secs),
        },
        hubs,
        session_path,
        notifications,
        auth,
    })
}
