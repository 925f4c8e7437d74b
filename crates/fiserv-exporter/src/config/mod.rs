//! Configuration loading and resolution.
//!
//! Values come from built-in defaults, then an optional `<env>.env.json`
//! file, then `FFL_*` environment variables, each layer overriding the last.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fiserv_session::client::{ClientSettings, DEFAULT_USER_AGENT};
use fiserv_session::institution::{DEFAULT_REMOTE_HOST, DEFAULT_THEME_NUMBER};
use fiserv_session::{ConfigError, Institution, SecurityAnswerKind, SecurityAnswerRegistry};
use serde::{Deserialize, Serialize};

pub const ENV_VAR: &str = "FFL_ENV";
pub const ENABLE_TTY_VAR: &str = "FFL_ENABLE_TTY";
pub const INSTITUTION_URL_VAR: &str = "FFL_INSTITUTION_URL";
pub const USERNAME_VAR: &str = "FFL_USERNAME";
pub const PASSWORD_VAR: &str = "FFL_PASSWORD";
pub const SEC_SPORT_VAR: &str = "FFL_SEC_SPORT";
pub const SEC_EMPLOYER_VAR: &str = "FFL_SEC_EMPLOYER";
pub const SEC_CAR_VAR: &str = "FFL_SEC_CAR";
pub const USER_AGENT_VAR: &str = "FFL_USERAGENT";
pub const ENABLE_DNT_VAR: &str = "FFL_ENABLE_DNT";
pub const STATUS_HOST_VAR: &str = "FFL_STATUS_SERVER_HOST";
pub const STATUS_PORT_VAR: &str = "FFL_STATUS_SERVER_PORT";
pub const OUTPUT_DIR_VAR: &str = "FFL_OUTPUT_DIR";
pub const REQUEST_TIMEOUT_VAR: &str = "FFL_REQUEST_TIMEOUT_MS";

const DEFAULT_STATUS_HOST: &str = "127.0.0.1";
const DEFAULT_STATUS_PORT: u16 = 8080;
const DEFAULT_OUTPUT_DIR: &str = "./output";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

/// Deployment environment. Selects the config file and console logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Development,
    Test,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
            Self::Test => "test",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "production" => Some(Self::Production),
            "development" => Some(Self::Development),
            "test" => Some(Self::Test),
            _ => None,
        }
    }
}

/// Errors raised while reading configuration sources.
#[derive(thiserror::Error, Debug)]
pub enum ConfigLoadError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {var}: {value:?}, expected {expected}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Raw settings as written in the config file.
#[derive(Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ExporterConfig {
    pub env: Environment,
    pub enable_tty: bool,
    pub url: String,
    pub username: String,
    pub password: String,
    pub sec_sport: String,
    pub sec_employer: String,
    pub sec_car: String,
    pub user_agent: String,
    pub enable_dnt: bool,
    pub status_host: String,
    pub status_port: u16,
    pub output_dir: PathBuf,
    pub request_timeout_ms: u64,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            env: Environment::Development,
            enable_tty: false,
            url: String::new(),
            username: String::new(),
            password: String::new(),
            sec_sport: String::new(),
            sec_employer: String::new(),
            sec_car: String::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            enable_dnt: true,
            status_host: DEFAULT_STATUS_HOST.to_string(),
            status_port: DEFAULT_STATUS_PORT,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl fmt::Debug for ExporterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ExporterConfig");
        for (key, value) in self.entries() {
            s.field(key, &value);
        }
        s.finish()
    }
}

impl ExporterConfig {
    /// Load from the process environment, looking for the config file in `dir`.
    pub fn load(dir: &Path) -> Result<Self, ConfigLoadError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::load_with(dir, &vars)
    }

    /// Load with an explicit variable set.
    pub fn load_with(dir: &Path, vars: &HashMap<String, String>) -> Result<Self, ConfigLoadError> {
        let env = match vars.get(ENV_VAR) {
            Some(raw) => Environment::parse(raw).ok_or_else(|| ConfigLoadError::InvalidEnv {
                var: ENV_VAR,
                value: raw.clone(),
                expected: "one of production, development, test",
            })?,
            None => Environment::Development,
        };

        let path = dir.join(format!("{}.env.json", env.as_str()));
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.env = env;
        config.apply_env(vars)?;
        Ok(config)
    }

    /// Parse a JSON config file. Unknown keys are rejected.
    pub fn from_file(path: &Path) -> Result<Self, ConfigLoadError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigLoadError::File {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env(&mut self, vars: &HashMap<String, String>) -> Result<(), ConfigLoadError> {
        let string = |name: &str| vars.get(name).map(|v| v.trim().to_string());

        if let Some(v) = read_env_bool(vars, ENABLE_TTY_VAR)? {
            self.enable_tty = v;
        }
        if let Some(v) = string(INSTITUTION_URL_VAR) {
            self.url = v;
        }
        if let Some(v) = string(USERNAME_VAR) {
            self.username = v;
        }
        // Secrets are taken verbatim.
        if let Some(v) = vars.get(PASSWORD_VAR) {
            self.password = v.clone();
        }
        if let Some(v) = vars.get(SEC_SPORT_VAR) {
            self.sec_sport = v.clone();
        }
        if let Some(v) = vars.get(SEC_EMPLOYER_VAR) {
            self.sec_employer = v.clone();
        }
        if let Some(v) = vars.get(SEC_CAR_VAR) {
            self.sec_car = v.clone();
        }
        if let Some(v) = string(USER_AGENT_VAR) {
            self.user_agent = v;
        }
        if let Some(v) = read_env_bool(vars, ENABLE_DNT_VAR)? {
            self.enable_dnt = v;
        }
        if let Some(v) = string(STATUS_HOST_VAR) {
            self.status_host = v;
        }
        if let Some(v) = read_env_number::<u16>(vars, STATUS_PORT_VAR)? {
            self.status_port = v;
        }
        if let Some(v) = string(OUTPUT_DIR_VAR) {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = read_env_number::<u64>(vars, REQUEST_TIMEOUT_VAR)? {
            self.request_timeout_ms = v;
        }
        Ok(())
    }

    /// Every setting as a printable pair, secrets redacted.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("env", self.env.as_str().to_string()),
            ("enableTty", self.enable_tty.to_string()),
            ("url", self.url.clone()),
            ("username", redact(&self.username).to_string()),
            ("password", redact(&self.password).to_string()),
            ("secSport", redact(&self.sec_sport).to_string()),
            ("secEmployer", redact(&self.sec_employer).to_string()),
            ("secCar", redact(&self.sec_car).to_string()),
            ("userAgent", self.user_agent.clone()),
            ("enableDnt", self.enable_dnt.to_string()),
            ("statusHost", self.status_host.clone()),
            ("statusPort", self.status_port.to_string()),
            ("outputDir", self.output_dir.display().to_string()),
            ("requestTimeoutMs", self.request_timeout_ms.to_string()),
        ]
    }

    /// Validate and turn into what the exporter runs with.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        let institution = *Institution::from_homepage(&self.url)?;
        if self.username.is_empty() {
            return Err(ConfigError::MissingUsername);
        }
        if self.password.is_empty() {
            return Err(ConfigError::MissingPassword);
        }

        let mut answers = SecurityAnswerRegistry::new();
        answers.register([
            (SecurityAnswerKind::Sport, self.sec_sport.clone()),
            (SecurityAnswerKind::Employer, self.sec_employer.clone()),
            (SecurityAnswerKind::Car, self.sec_car.clone()),
        ]);

        let user_agent = if self.user_agent.is_empty() {
            DEFAULT_USER_AGENT.to_string()
        } else {
            self.user_agent.clone()
        };

        Ok(ResolvedConfig {
            env: self.env,
            enable_tty: self.enable_tty,
            institution,
            username: self.username.clone(),
            password: self.password.clone(),
            answers,
            client: ClientSettings {
                remote_host: DEFAULT_REMOTE_HOST.to_string(),
                theme_number: DEFAULT_THEME_NUMBER,
                user_agent,
                enable_dnt: self.enable_dnt,
            },
            status_host: self.status_host.clone(),
            status_port: self.status_port,
            output_dir: self.output_dir.clone(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        })
    }
}

/// Validated configuration.
#[derive(Clone)]
pub struct ResolvedConfig {
    pub env: Environment,
    pub enable_tty: bool,
    pub institution: Institution,
    pub username: String,
    pub password: String,
    pub answers: SecurityAnswerRegistry,
    pub client: ClientSettings,
    pub status_host: String,
    pub status_port: u16,
    pub output_dir: PathBuf,
    pub request_timeout: Duration,
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("env", &self.env)
            .field("institution", &self.institution.name)
            .field("answers", &self.answers)
            .field("client", &self.client)
            .field("status_host", &self.status_host)
            .field("status_port", &self.status_port)
            .field("output_dir", &self.output_dir)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

fn read_env_bool(
    vars: &HashMap<String, String>,
    name: &'static str,
) -> Result<Option<bool>, ConfigLoadError> {
    match vars.get(name) {
        None => Ok(None),
        Some(raw) => match raw.trim() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            _ => Err(ConfigLoadError::InvalidEnv {
                var: name,
                value: raw.clone(),
                expected: "true or false",
            }),
        },
    }
}

fn read_env_number<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    name: &'static str,
) -> Result<Option<T>, ConfigLoadError> {
    match vars.get(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigLoadError::InvalidEnv {
                var: name,
                value: raw.clone(),
                expected: "a number",
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiserv_session::SecurityQuestion;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_without_sources() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExporterConfig::load_with(dir.path(), &HashMap::new()).unwrap();
        assert_eq!(config, ExporterConfig::default());
        assert_eq!(config.status_port, 8080);
        assert_eq!(config.request_timeout_ms, 5000);
        assert!(config.enable_dnt);
    }

    #[test]
    fn environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("production.env.json")).unwrap();
        write!(
            file,
            r#"{{"url": "https://www.ffl.net/", "username": "file-user", "statusPort": 9000}}"#
        )
        .unwrap();

        let config = ExporterConfig::load_with(
            dir.path(),
            &vars(&[
                (ENV_VAR, "production"),
                (USERNAME_VAR, "env-user"),
                (ENABLE_DNT_VAR, "false"),
            ]),
        )
        .unwrap();
        assert_eq!(config.env, Environment::Production);
        assert_eq!(config.url, "https://www.ffl.net/");
        assert_eq!(config.username, "env-user");
        assert_eq!(config.status_port, 9000);
        assert!(!config.enable_dnt);
    }

    #[test]
    fn file_for_other_environment_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("test.env.json"), r#"{"username": "x"}"#).unwrap();
        let config = ExporterConfig::load_with(dir.path(), &HashMap::new()).unwrap();
        assert_eq!(config.username, "");
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("development.env.json"),
            r#"{"username": "x", "favouriteColour": "blue"}"#,
        )
        .unwrap();
        let err = ExporterConfig::load_with(dir.path(), &HashMap::new()).unwrap_err();
        assert!(matches!(err, ConfigLoadError::File { .. }));
    }

    #[test]
    fn malformed_environment_values_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            ExporterConfig::load_with(dir.path(), &vars(&[(STATUS_PORT_VAR, "eighty")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigLoadError::InvalidEnv {
                var: STATUS_PORT_VAR,
                ..
            }
        ));
        let err =
            ExporterConfig::load_with(dir.path(), &vars(&[(ENABLE_TTY_VAR, "yes")])).unwrap_err();
        assert!(err.to_string().contains("FFL_ENABLE_TTY"));
        let err = ExporterConfig::load_with(dir.path(), &vars(&[(ENV_VAR, "staging")])).unwrap_err();
        assert!(matches!(err, ConfigLoadError::InvalidEnv { var: ENV_VAR, .. }));
    }

    fn complete() -> ExporterConfig {
        ExporterConfig {
            url: "https://www.warsawfederal.com".to_string(),
            username: "jane".to_string(),
            password: "hunter2".to_string(),
            sec_sport: "Cubs".to_string(),
            ..ExporterConfig::default()
        }
    }

    #[test]
    fn resolves_institution_and_answers() {
        let resolved = complete().resolve().unwrap();
        assert_eq!(resolved.institution.routing_number, "242071855");
        assert_eq!(resolved.request_timeout, Duration::from_secs(5));
        assert_eq!(resolved.client.remote_host, "retailonline.fiservapps.com");
        assert_eq!(
            resolved.answers.answer_for(SecurityQuestion::Sport).unwrap(),
            "Cubs"
        );
        assert!(resolved.answers.answer_for(SecurityQuestion::Car).is_err());
    }

    #[test]
    fn resolution_failures() {
        let mut config = complete();
        config.url = "https://bank.example.com".to_string();
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::UnknownInstitution(_))
        ));

        let mut config = complete();
        config.username.clear();
        assert_eq!(
            config.resolve().unwrap_err().to_string(),
            "failed to parse username, no username set"
        );

        let mut config = complete();
        config.password.clear();
        assert_eq!(config.resolve().unwrap_err(), ConfigError::MissingPassword);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let rendered = format!("{:?}", complete());
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("Cubs"));
        assert!(rendered.contains("<redacted>"));
        assert!(rendered.contains("warsawfederal"));
        let resolved = format!("{:?}", complete().resolve().unwrap());
        assert!(!resolved.contains("hunter2"));
    }
}
