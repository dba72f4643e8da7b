//! Process configuration, read once from the environment (after `.env`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::db::DatabaseTarget;

pub const DEFAULT_DATABASE: &str = "data/imobiliaria.sqlite3";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_LOG_FILTER: &str = "imobiliaria=info,tower_http=info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub from: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// A value that could not be parsed and was replaced by its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseTarget,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// `false` when no `JWT_SECRET` was configured and a random one was generated.
    pub jwt_secret_configured: bool,
    pub admin_emails: Vec<String>,
    pub smtp: Option<SmtpConfig>,
    pub leads_notify_email: Option<String>,
    pub cloudinary: Option<CloudinaryConfig>,
    pub upload_dir: PathBuf,
    pub public_base_url: Option<String>,
    pub cors_origins: Vec<String>,
    pub log_format: LogFormat,
    pub log_dir: Option<PathBuf>,
    pub log_filter: String,
    /// Collected while loading; emitted by `log_warnings` once logging is up.
    pub warnings: Vec<ConfigWarning>,
}

/// Source of raw values; the process environment in production, a map in tests.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl<F> EnvSource for F
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        self(key)
    }
}

fn value(env: &impl EnvSource, key: &str) -> Option<String> {
    env.get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn list(env: &impl EnvSource, key: &str) -> Vec<String> {
    value(env, key)
        .map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn parsed<T: std::str::FromStr>(
    env: &impl EnvSource,
    key: &str,
    default: T,
    warnings: &mut Vec<ConfigWarning>,
) -> T {
    match value(env, key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warnings.push(ConfigWarning {
                key: key.to_string(),
                value: raw,
            });
            default
        }),
        None => default,
    }
}

fn random_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

impl Config {
    /// Load `.env` (if present) and read the process environment.
    pub fn load() -> Self {
        dotenv::dotenv().ok();
        Self::from_env(&ProcessEnv)
    }

    pub fn from_env(env: &impl EnvSource) -> Self {
        let mut warnings = Vec::new();
        let (jwt_secret, jwt_secret_configured) = match value(env, "JWT_SECRET") {
            Some(secret) => (secret, true),
            None => (random_secret(), false),
        };

        let smtp = value(env, "SMTP_HOST").map(|host| {
            let user = value(env, "SMTP_USER");
            SmtpConfig {
                port: parsed(env, "SMTP_PORT", 587, &mut warnings),
                from: value(env, "SMTP_FROM")
                    .or_else(|| user.clone())
                    .unwrap_or_else(|| format!("no-reply@{host}")),
                pass: value(env, "SMTP_PASS"),
                user,
                timeout: Duration::from_secs(parsed(env, "MAIL_TIMEOUT_SECS", 10, &mut warnings)),
                host,
            }
        });

        let cloudinary = match (
            value(env, "CLOUDINARY_CLOUD_NAME"),
            value(env, "CLOUDINARY_API_KEY"),
            value(env, "CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
                folder: value(env, "CLOUDINARY_FOLDER"),
            }),
            _ => None,
        };

        let port = parsed(env, "PORT", DEFAULT_PORT, &mut warnings);

        let log_format = match value(env, "LOG_FORMAT").as_deref() {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Config {
            database: DatabaseTarget::parse(
                &value(env, "DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            ),
            host: value(env, "HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            jwt_secret,
            jwt_secret_configured,
            admin_emails: list(env, "ADMIN_EMAILS")
                .into_iter()
                .map(|e| e.to_lowercase())
                .collect(),
            smtp,
            leads_notify_email: value(env, "LEADS_NOTIFY_EMAIL"),
            cloudinary,
            upload_dir: PathBuf::from(
                value(env, "UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string()),
            ),
            public_base_url: value(env, "PUBLIC_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string()),
            cors_origins: list(env, "CORS_ORIGINS"),
            log_format,
            log_dir: value(env, "LOG_DIR").map(PathBuf::from),
            log_filter: value(env, "RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            warnings,
        }
    }

    /// Report values that fell back to defaults. Call after `logging::init`.
    pub fn log_warnings(&self) {
        for warning in &self.warnings {
            tracing::warn!(
                target: "imobiliaria",
                event = "config_invalid_value",
                key = %warning.key,
                value = %warning.value,
            );
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    /// Recipient of lead notifications: the configured address, else the first admin.
    pub fn lead_recipient(&self) -> Option<String> {
        self.leads_notify_email
            .clone()
            .or_else(|| self.admin_emails.first().cloned())
    }

    /// Base for URLs of locally stored uploads.
    pub fn public_base(&self) -> String {
        self.public_base_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.port))
    }
}
