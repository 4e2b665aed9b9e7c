use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::fmt;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub otp: OtpConfig,
    pub smtp: SmtpConfig,
    pub security: SecurityConfig,
    pub swagger: SwaggerConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Clone, Deserialize)]
pub struct SessionConfig {
    /// HMAC key for HS256 session tokens. Never leaves the server.
    pub secret: String,
    pub ttl_days: i64,
    pub issuer: String,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"[REDACTED]")
            .field("ttl_days", &self.ttl_days)
            .field("issuer", &self.issuer)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    pub length: usize,
    pub ttl_minutes: i64,
    /// Codes one address may request per `send_window_minutes`; 0 disables the cap.
    pub max_sends_per_window: u32,
    pub send_window_minutes: i64,
    /// Mark older pending codes consumed when a new one is sent.
    pub invalidate_previous: bool,
    pub sweep_interval_seconds: u64,
}

#[derive(Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from_email: String,
    pub tls: bool,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("from_email", &self.from_email)
            .field("tls", &self.tls)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwaggerConfig {
    pub enabled: SwaggerMode,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SwaggerMode {
    Public,
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub send_code_attempts: u32,
    pub send_code_window_seconds: u64,
    pub verify_code_attempts: u32,
    pub verify_code_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = AuthConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("otp-auth-service"), false)?,
            service_version: get_env(
                "SERVICE_VERSION",
                Some(env!("CARGO_PKG_VERSION")),
                false,
            )?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", false)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", false)?,
            },
            session: SessionConfig {
                secret: get_env("SESSION_SECRET", None, is_prod)?,
                ttl_days: parse_env("SESSION_TTL_DAYS", "30", false)?,
                issuer: get_env("SESSION_ISSUER", Some("otp-auth-service"), false)?,
            },
            otp: OtpConfig {
                length: parse_env("OTP_LENGTH", "6", false)?,
                ttl_minutes: parse_env("OTP_TTL_MINUTES", "10", false)?,
                max_sends_per_window: parse_env("OTP_MAX_SENDS_PER_WINDOW", "5", false)?,
                send_window_minutes: parse_env("OTP_SEND_WINDOW_MINUTES", "15", false)?,
                invalidate_previous: parse_env("OTP_INVALIDATE_PREVIOUS", "false", false)?,
                sweep_interval_seconds: parse_env("OTP_SWEEP_INTERVAL_SECONDS", "300", false)?,
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", None, is_prod)?,
                port: parse_env("SMTP_PORT", "587", false)?,
                user: get_env("SMTP_USER", Some(""), is_prod)?,
                password: get_env("SMTP_PASSWORD", Some(""), is_prod)?,
                from_email: get_env("SMTP_FROM_EMAIL", None, is_prod)?,
                tls: parse_env("SMTP_TLS", "true", false)?,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000,http://localhost:8080"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
            swagger: SwaggerConfig {
                enabled: get_env("ENABLE_SWAGGER", Some("public"), false)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            },
            rate_limit: RateLimitConfig {
                send_code_attempts: parse_env("RATE_LIMIT_SEND_CODE_ATTEMPTS", "5", false)?,
                send_code_window_seconds: parse_env(
                    "RATE_LIMIT_SEND_CODE_WINDOW_SECONDS",
                    "900",
                    false,
                )?,
                verify_code_attempts: parse_env("RATE_LIMIT_VERIFY_CODE_ATTEMPTS", "10", false)?,
                verify_code_window_seconds: parse_env(
                    "RATE_LIMIT_VERIFY_CODE_WINDOW_SECONDS",
                    "900",
                    false,
                )?,
                global_ip_limit: parse_env("RATE_LIMIT_GLOBAL_IP_LIMIT", "100", false)?,
                global_ip_window_seconds: parse_env(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    "60",
                    false,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(config_error("PORT must be greater than 0"));
        }

        if !(4..=10).contains(&self.otp.length) {
            return Err(config_error("OTP_LENGTH must be between 4 and 10"));
        }

        if self.otp.ttl_minutes <= 0 {
            return Err(config_error("OTP_TTL_MINUTES must be positive"));
        }

        if self.otp.max_sends_per_window > 0 && self.otp.send_window_minutes <= 0 {
            return Err(config_error("OTP_SEND_WINDOW_MINUTES must be positive"));
        }

        if self.otp.sweep_interval_seconds == 0 {
            return Err(config_error("OTP_SWEEP_INTERVAL_SECONDS must be positive"));
        }

        if self.session.ttl_days <= 0 {
            return Err(config_error("SESSION_TTL_DAYS must be positive"));
        }

        if self.session.secret.len() < 32 {
            return Err(config_error("SESSION_SECRET must be at least 32 bytes"));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(config_error(
                "DATABASE_MIN_CONNECTIONS must not exceed DATABASE_MAX_CONNECTIONS",
            ));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(config_error(
                    "Wildcard CORS origin not allowed in production",
                ));
            }

            if self.swagger.enabled == SwaggerMode::Public {
                tracing::warn!("Swagger UI is publicly accessible in production");
            }
        }

        Ok(())
    }

    pub fn swagger_enabled(&self) -> bool {
        match self.environment {
            Environment::Dev => true,
            Environment::Prod => self.swagger.enabled == SwaggerMode::Public,
        }
    }
}

fn config_error(msg: &str) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(msg.to_string()))
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .trim()
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{} is invalid: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "prod" | "production" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for SwaggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(SwaggerMode::Public),
            "disabled" => Ok(SwaggerMode::Disabled),
            _ => Err(format!("Invalid swagger mode: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AuthConfig {
        AuthConfig {
            common: core_config::Config::default(),
            environment: Environment::Dev,
            service_name: "otp-auth-service".to_string(),
            service_version: "0.1.0".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: "postgres://localhost/otp_auth".to_string(),
                max_connections: 5,
                min_connections: 1,
            },
            session: SessionConfig {
                secret: "0123456789abcdef0123456789abcdef".to_string(),
                ttl_days: 30,
                issuer: "otp-auth-service".to_string(),
            },
            otp: OtpConfig {
                length: 6,
                ttl_minutes: 10,
                max_sends_per_window: 5,
                send_window_minutes: 15,
                invalidate_previous: false,
                sweep_interval_seconds: 300,
            },
            smtp: SmtpConfig {
                host: "localhost".to_string(),
                port: 1025,
                user: String::new(),
                password: "hunter2".to_string(),
                from_email: "no-reply@example.com".to_string(),
                tls: false,
            },
            security: SecurityConfig {
                allowed_origins: vec!["http://localhost:3000".to_string()],
            },
            swagger: SwaggerConfig {
                enabled: SwaggerMode::Public,
            },
            rate_limit: RateLimitConfig {
                send_code_attempts: 5,
                send_code_window_seconds: 900,
                verify_code_attempts: 10,
                verify_code_window_seconds: 900,
                global_ip_limit: 100,
                global_ip_window_seconds: 60,
            },
        }
    }

    #[test]
    fn sample_config_is_valid() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn rejects_short_session_secret() {
        let mut config = sample();
        config.session.secret = "too-short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_otp_length() {
        let mut config = sample();
        config.otp.length = 3;
        assert!(config.validate().is_err());
        config.otp.length = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_wildcard_origin_in_prod() {
        let mut config = sample();
        config.environment = Environment::Prod;
        config.security.allowed_origins = vec!["*".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn swagger_follows_environment() {
        let mut config = sample();
        config.swagger.enabled = SwaggerMode::Disabled;
        assert!(config.swagger_enabled());
        config.environment = Environment::Prod;
        assert!(!config.swagger_enabled());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("0123456789abcdef"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn parses_environment_aliases() {
        assert_eq!("production".parse::<Environment>(), Ok(Environment::Prod));
        assert_eq!("DEV".parse::<Environment>(), Ok(Environment::Dev));
        assert!("staging".parse::<Environment>().is_err());
    }
}
