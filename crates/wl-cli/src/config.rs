//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variables read without a prefix, matching the field names.
const RAW_ENV_KEYS: &[&str] = &[
    "TOGGL_API_TOKEN",
    "GITHUB_TOKEN",
    "GITHUB_REPO",
    "GITHUB_WORKLOG_PATH",
    "GITHUB_BRANCH",
    "TIMEZONE",
    "SENDGRID_API_KEY",
    "NOTIFICATION_EMAIL_FROM",
    "NOTIFICATION_EMAIL_TO",
    "SYNC_INTERVAL_MINUTES",
    "LOG_LEVEL",
    "LOG_FILE",
];

const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";
const DEFAULT_SYNC_INTERVAL_MINUTES: u64 = 60;

/// Configuration problems that prevent startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} is required (set it in config.toml or via {env})")]
    Missing {
        field: &'static str,
        env: &'static str,
    },
    #[error("unknown timezone {0:?}")]
    InvalidTimezone(String),
    #[error("sync_interval_minutes must be greater than zero")]
    InvalidInterval,
}

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub toggl_api_token: Option<String>,
    pub github_token: Option<String>,
    /// Repository holding the worklog, as `owner/name`.
    pub github_repo: Option<String>,
    /// Path of the worklog file inside the repository.
    pub github_worklog_path: Option<String>,
    /// Branch to commit to; the repository default when unset.
    pub github_branch: Option<String>,
    /// IANA timezone that defines "today".
    pub timezone: String,
    pub sendgrid_api_key: Option<String>,
    pub notification_email_from: Option<String>,
    pub notification_email_to: Option<String>,
    pub sync_interval_minutes: u64,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Write logs here instead of stderr.
    pub log_file: Option<PathBuf>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(value: Option<&String>) -> Option<&'static str> {
            value.map(|_| "[REDACTED]")
        }

        f.debug_struct("Config")
            .field("toggl_api_token", &redact(self.toggl_api_token.as_ref()))
            .field("github_token", &redact(self.github_token.as_ref()))
            .field("github_repo", &self.github_repo)
            .field("github_worklog_path", &self.github_worklog_path)
            .field("github_branch", &self.github_branch)
            .field("timezone", &self.timezone)
            .field("sendgrid_api_key", &redact(self.sendgrid_api_key.as_ref()))
            .field("notification_email_from", &self.notification_email_from)
            .field("notification_email_to", &self.notification_email_to)
            .field("sync_interval_minutes", &self.sync_interval_minutes)
            .field("log_level", &self.log_level)
            .field("log_file", &self.log_file)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            toggl_api_token: None,
            github_token: None,
            github_repo: None,
            github_worklog_path: None,
            github_branch: None,
            timezone: DEFAULT_TIMEZONE.to_string(),
            sendgrid_api_key: None,
            notification_email_from: None,
            notification_email_to: None,
            sync_interval_minutes: DEFAULT_SYNC_INTERVAL_MINUTES,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

/// Settings for the GitHub-hosted worklog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubSettings<'a> {
    pub token: &'a str,
    pub repo: &'a str,
    pub path: &'a str,
    pub branch: Option<&'a str>,
}

/// Settings for failure emails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSettings<'a> {
    pub api_key: &'a str,
    pub from: &'a str,
    pub to: &'a str,
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Plain variables (TOGGL_API_TOKEN, ...), then WL_* overrides
        figment = figment
            .merge(Env::raw().only(RAW_ENV_KEYS))
            .merge(Env::prefixed("WL_"));

        figment.extract()
    }

    pub fn toggl_api_token(&self) -> Result<&str, ConfigError> {
        required(
            self.toggl_api_token.as_deref(),
            "toggl_api_token",
            "TOGGL_API_TOKEN",
        )
    }

    pub fn github(&self) -> Result<GitHubSettings<'_>, ConfigError> {
        Ok(GitHubSettings {
            token: required(self.github_token.as_deref(), "github_token", "GITHUB_TOKEN")?,
            repo: required(self.github_repo.as_deref(), "github_repo", "GITHUB_REPO")?,
            path: required(
                self.github_worklog_path.as_deref(),
                "github_worklog_path",
                "GITHUB_WORKLOG_PATH",
            )?,
            branch: self.github_branch.as_deref().filter(|b| !b.trim().is_empty()),
        })
    }

    /// Notification settings, present only when all three fields are set.
    pub fn notification(&self) -> Option<NotificationSettings<'_>> {
        fn present(value: Option<&String>) -> Option<&str> {
            value.map(|value| value.trim()).filter(|value| !value.is_empty())
        }

        Some(NotificationSettings {
            api_key: present(self.sendgrid_api_key.as_ref())?,
            from: present(self.notification_email_from.as_ref())?,
            to: present(self.notification_email_to.as_ref())?,
        })
    }

    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(self.timezone.clone()))
    }

    pub fn sync_interval(&self) -> Result<Duration, ConfigError> {
        if self.sync_interval_minutes == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        Ok(Duration::from_secs(
            self.sync_interval_minutes.saturating_mul(60),
        ))
    }
}

fn required<'a>(
    value: Option<&'a str>,
    field: &'static str,
    env: &'static str,
) -> Result<&'a str, ConfigError> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::Missing { field, env })
}

/// Returns the platform-specific config directory.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("worklog-sync"))
}

/// Returns the platform-specific state directory.
///
/// On Linux: `~/.local/state/worklog-sync`
pub fn dirs_state_path() -> Option<PathBuf> {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|p| p.join("worklog-sync"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use figment::Jail;

    fn complete() -> Config {
        Config {
            toggl_api_token: Some("toggl".to_string()),
            github_token: Some("ghp".to_string()),
            github_repo: Some("octo/notes".to_string()),
            github_worklog_path: Some("worklog.md".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.timezone, "America/Los_Angeles");
        assert_eq!(config.sync_interval_minutes, 60);
        assert_eq!(config.log_level, "info");
        assert!(config.toggl_api_token.is_none());
    }

    #[test]
    fn dirs_state_path_ends_with_app_name() {
        let path = dirs_state_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "worklog-sync");
    }

    #[test]
    fn loads_file_then_environment() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "wl.toml",
                r#"
                    toggl_api_token = "from-file"
                    github_repo = "octo/notes"
                    timezone = "Europe/Berlin"
                    sync_interval_minutes = 15
                "#,
            )?;
            jail.set_env("TOGGL_API_TOKEN", "from-env");
            jail.set_env("WL_GITHUB_WORKLOG_PATH", "logs/worklog.md");

            let config = Config::load_from(Some(Path::new("wl.toml")))?;
            assert_eq!(config.toggl_api_token.as_deref(), Some("from-env"));
            assert_eq!(config.github_repo.as_deref(), Some("octo/notes"));
            assert_eq!(config.github_worklog_path.as_deref(), Some("logs/worklog.md"));
            assert_eq!(config.timezone, "Europe/Berlin");
            assert_eq!(config.sync_interval_minutes, 15);
            Ok(())
        });
    }

    #[test]
    fn prefixed_env_overrides_raw_env() {
        Jail::expect_with(|jail| {
            jail.set_env("TIMEZONE", "Asia/Tokyo");
            jail.set_env("WL_TIMEZONE", "Europe/Paris");
            let config = Config::load_from(None)?;
            assert_eq!(config.timezone, "Europe/Paris");
            Ok(())
        });
    }

    #[test]
    fn missing_credentials_name_the_variable() {
        let mut config = complete();
        config.github_token = Some("   ".to_string());
        assert_eq!(
            config.github().unwrap_err(),
            ConfigError::Missing {
                field: "github_token",
                env: "GITHUB_TOKEN"
            }
        );

        let config = Config::default();
        let err = config.toggl_api_token().unwrap_err();
        assert_eq!(
            err.to_string(),
            "toggl_api_token is required (set it in config.toml or via TOGGL_API_TOKEN)"
        );
    }

    #[test]
    fn github_settings_ignore_blank_branch() {
        let mut config = complete();
        config.github_branch = Some(String::new());
        let github = config.github().unwrap();
        assert_eq!(github.repo, "octo/notes");
        assert_eq!(github.branch, None);
    }

    #[test]
    fn notification_requires_all_fields() {
        let mut config = complete();
        assert!(config.notification().is_none());
        config.sendgrid_api_key = Some("SG.key".to_string());
        config.notification_email_from = Some("bot@example.com".to_string());
        assert!(config.notification().is_none());
        config.notification_email_to = Some("me@example.com".to_string());
        let notification = config.notification().unwrap();
        assert_eq!(notification.to, "me@example.com");
    }

    #[test]
    fn notification_trims_and_rejects_blank_fields() {
        let mut config = complete();
        config.sendgrid_api_key = Some(" SG.key ".to_string());
        config.notification_email_from = Some("bot@example.com".to_string());
        config.notification_email_to = Some("  ".to_string());
        assert!(config.notification().is_none());

        config.notification_email_to = Some(" me@example.com\n".to_string());
        assert_eq!(
            config.notification(),
            Some(NotificationSettings {
                api_key: "SG.key",
                from: "bot@example.com",
                to: "me@example.com",
            })
        );
    }

    #[test]
    fn timezone_is_validated() {
        let mut config = complete();
        assert_eq!(config.timezone().unwrap(), chrono_tz::America::Los_Angeles);
        config.timezone = "Mars/Olympus".to_string();
        assert_eq!(
            config.timezone().unwrap_err(),
            ConfigError::InvalidTimezone("Mars/Olympus".to_string())
        );
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut config = complete();
        assert_eq!(config.sync_interval().unwrap(), Duration::from_secs(3600));
        config.sync_interval_minutes = 0;
        assert_eq!(config.sync_interval().unwrap_err(), ConfigError::InvalidInterval);
    }

    #[test]
    fn debug_redacts_secrets() {
        let debug = format!("{:?}", complete());
        assert!(!debug.contains("ghp"));
        assert!(!debug.contains("\"toggl\""));
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("octo/notes"));
    }
}
