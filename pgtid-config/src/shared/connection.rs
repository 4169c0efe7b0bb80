use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::mysql::{MySqlConnectOptions, MySqlSslMode};

use crate::shared::ValidationError;

/// Default MySQL port used when none is configured.
const DEFAULT_MYSQL_PORT: u16 = 3306;

fn default_port() -> u16 {
    DEFAULT_MYSQL_PORT
}

/// Configuration for connecting to a MySQL server whose logs are scanned.
///
/// No database name is configured: every statement issued against the server is a
/// server-level `SHOW` statement.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MySqlConnectionConfig {
    /// Hostname or IP address of the server.
    pub host: String,
    /// Port the server listens on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// User name, needs `REPLICATION CLIENT` and `REPLICATION SLAVE` privileges.
    pub username: String,
    /// Password for [`MySqlConnectionConfig::username`]. Redacted in debug output.
    pub password: Option<SecretString>,
    /// TLS configuration for the connection.
    #[serde(default = "TlsConfig::disabled")]
    pub tls: TlsConfig,
}

impl MySqlConnectionConfig {
    /// Validates the connection configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.trim().is_empty() {
            return Err(ValidationError::EmptyField("host"));
        }
        if self.username.trim().is_empty() {
            return Err(ValidationError::EmptyField("username"));
        }

        self.tls.validate()
    }
}

/// TLS settings for MySQL connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TlsConfig {
    /// PEM-encoded trusted root certificates.
    pub trusted_root_certs: String,
    /// Whether TLS is enabled for the connection.
    pub enabled: bool,
}

impl TlsConfig {
    /// Returns a TLS configuration with TLS turned off.
    pub fn disabled() -> Self {
        Self {
            trusted_root_certs: String::new(),
            enabled: false,
        }
    }

    /// Validates the [`TlsConfig`].
    ///
    /// Returns [`ValidationError::MissingTrustedRootCerts`] if TLS is enabled but no
    /// certificates are provided.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.enabled && self.trusted_root_certs.is_empty() {
            return Err(ValidationError::MissingTrustedRootCerts);
        }

        Ok(())
    }
}

/// Converts a connection configuration into driver specific connect options.
pub trait IntoConnectOptions<Output> {
    /// Creates connect options for a server-level session.
    fn to_connect_options(&self) -> Output;
}

impl IntoConnectOptions<MySqlConnectOptions> for MySqlConnectionConfig {
    fn to_connect_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username);

        if let Some(password) = &self.password {
            options = options.password(password.expose_secret());
        }

        if self.tls.enabled {
            options = options
                .ssl_mode(MySqlSslMode::VerifyIdentity)
                .ssl_ca_from_pem(self.tls.trusted_root_certs.clone().into_bytes());
        } else {
            options = options.ssl_mode(MySqlSslMode::Preferred);
        }

        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MySqlConnectionConfig {
        MySqlConnectionConfig {
            host: "db-1.local".to_string(),
            port: 3306,
            username: "matcher".to_string(),
            password: None,
            tls: TlsConfig::disabled(),
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn empty_host_is_rejected() {
        let mut config = config();
        config.host = "  ".to_string();

        assert!(matches!(
            config.validate(),
            Err(ValidationError::EmptyField("host"))
        ));
    }

    #[test]
    fn tls_without_certs_is_rejected() {
        let mut config = config();
        config.tls.enabled = true;

        assert!(matches!(
            config.validate(),
            Err(ValidationError::MissingTrustedRootCerts)
        ));
    }

    #[test]
    fn port_defaults_when_missing() {
        let config: MySqlConnectionConfig =
            serde_json::from_str(r#"{"host": "db", "username": "u"}"#).unwrap();

        assert_eq!(config.port, 3306);
        assert!(!config.tls.enabled);
    }
}
