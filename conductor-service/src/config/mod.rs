use secrecy::{ExposeSecret, SecretString};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

/// Minimum length of the session signing secret in production.
pub const MIN_SESSION_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct ConductorConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub mongodb: MongoConfig,
    pub session: SessionConfig,
    pub org: OrgConfig,
    pub sso: SsoConfig,
    pub smtp: SmtpConfig,
    pub workbench: WorkbenchConfig,
    pub invitations: InvitationConfig,
    pub frontend_url: String,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: SecretString,
    pub expiry_seconds: i64,
    pub cookie_prefix: String,
    pub cookie_domain: Option<String>,
}

impl SessionConfig {
    pub fn access_cookie(&self) -> String {
        format!("{}_access", self.cookie_prefix)
    }

    pub fn signed_cookie(&self) -> String {
        format!("{}_signed", self.cookie_prefix)
    }

    pub fn sso_state_cookie(&self) -> String {
        format!("{}_sso_state", self.cookie_prefix)
    }
}

/// Organization identities the role overrides are evaluated against.
#[derive(Debug, Clone)]
pub struct OrgConfig {
    /// Organization this deployment serves.
    pub org_id: String,
    /// Organization whose super-admins are global.
    pub global_org_id: String,
}

#[derive(Debug, Clone)]
pub struct SsoConfig {
    /// Path segment of the callback route (`/oauth/:provider`).
    pub provider: String,
    pub authorize_url: String,
    pub token_url: String,
    pub profile_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub from_email: String,
}

#[derive(Debug, Clone)]
pub struct WorkbenchConfig {
    pub api_url: Option<String>,
    pub api_token: Option<SecretString>,
}

#[derive(Debug, Clone)]
pub struct InvitationConfig {
    pub expiry_days: i64,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
}

impl ConductorConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup: &lookup };

        let environment: Environment = env
            .get("ENVIRONMENT", Some("dev"), false)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;
        let is_prod = environment == Environment::Prod;

        let config = ConductorConfig {
            common,
            environment: environment.clone(),
            service_name: env.get("SERVICE_NAME", Some("conductor-service"), is_prod)?,
            service_version: env.get("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), false)?,
            log_level: env.get("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env.optional("OTLP_ENDPOINT"),
            mongodb: MongoConfig {
                uri: env.get("MONGODB_URI", Some("mongodb://localhost:27017"), is_prod)?,
                database: env.get("MONGODB_DATABASE", Some("conductor"), is_prod)?,
            },
            session: SessionConfig {
                secret: SecretString::new(env.get("SESSION_SECRET", None, is_prod)?),
                expiry_seconds: env.parsed("SESSION_EXPIRY_SECONDS", "86400", is_prod)?,
                cookie_prefix: env.get("COOKIE_PREFIX", Some("conductor"), is_prod)?,
                cookie_domain: env.optional("COOKIE_DOMAIN"),
            },
            org: OrgConfig {
                org_id: env.get("ORG_ID", None, is_prod)?,
                global_org_id: env.get("GLOBAL_ORG_ID", Some("libretexts"), is_prod)?,
            },
            sso: SsoConfig {
                provider: env.get("SSO_PROVIDER", Some("libreone"), is_prod)?,
                authorize_url: env.get("SSO_AUTHORIZE_URL", Some("http://localhost:8081/authorize"), is_prod)?,
                token_url: env.get("SSO_TOKEN_URL", Some("http://localhost:8081/token"), is_prod)?,
                profile_url: env.get("SSO_PROFILE_URL", Some("http://localhost:8081/userinfo"), is_prod)?,
                client_id: env.get("SSO_CLIENT_ID", Some("conductor-dev"), is_prod)?,
                client_secret: SecretString::new(env.get("SSO_CLIENT_SECRET", Some(""), is_prod)?),
                redirect_uri: env.get(
                    "SSO_REDIRECT_URI",
                    Some("http://localhost:8080/oauth/libreone"),
                    is_prod,
                )?,
            },
            smtp: SmtpConfig {
                host: env.get("SMTP_HOST", Some("localhost"), is_prod)?,
                port: env.parsed("SMTP_PORT", "587", is_prod)?,
                user: env.get("SMTP_USER", Some(""), is_prod)?,
                password: SecretString::new(env.get("SMTP_PASSWORD", Some(""), is_prod)?),
                from_email: env.get("SMTP_FROM_EMAIL", Some("conductor@localhost"), is_prod)?,
            },
            workbench: WorkbenchConfig {
                api_url: env.optional("WORKBENCH_API_URL"),
                api_token: env.optional("WORKBENCH_API_TOKEN").map(SecretString::new),
            },
            invitations: InvitationConfig {
                expiry_days: env.parsed("INVITATION_EXPIRY_DAYS", "30", is_prod)?,
            },
            frontend_url: env.get("FRONTEND_URL", Some("http://localhost:3000"), is_prod)?,
            security: SecurityConfig {
                allowed_origins: env
                    .get("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            rate_limit: RateLimitConfig {
                login_attempts: env.parsed("RATE_LIMIT_LOGIN_ATTEMPTS", "5", is_prod)?,
                login_window_seconds: env.parsed("RATE_LIMIT_LOGIN_WINDOW_SECONDS", "900", is_prod)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn is_prod(&self) -> bool {
        self.environment == Environment::Prod
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(config_error("PORT must be greater than 0"));
        }

        if self.session.expiry_seconds <= 0 {
            return Err(config_error("SESSION_EXPIRY_SECONDS must be positive"));
        }

        if self.invitations.expiry_days <= 0 {
            return Err(config_error("INVITATION_EXPIRY_DAYS must be positive"));
        }

        if self.rate_limit.login_attempts == 0 || self.rate_limit.login_window_seconds == 0 {
            return Err(config_error("Login rate limit must allow at least one attempt per window"));
        }

        if self.session.secret.expose_secret().is_empty() {
            return Err(config_error("SESSION_SECRET must not be empty"));
        }

        if self.environment == Environment::Prod {
            if self.session.secret.expose_secret().len() < MIN_SESSION_SECRET_LEN {
                return Err(config_error(&format!(
                    "SESSION_SECRET must be at least {} characters in production",
                    MIN_SESSION_SECRET_LEN
                )));
            }

            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(config_error("Wildcard CORS origin not allowed in production"));
            }
        }

        Ok(())
    }
}

fn config_error(msg: &str) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(msg.to_string()))
}

struct Env<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn get(&self, key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
        match (self.lookup)(key) {
            Some(val) => Ok(val),
            None => {
                if is_prod {
                    Err(config_error(&format!(
                        "{} is required in production but not set",
                        key
                    )))
                } else if let Some(def) = default {
                    Ok(def.to_string())
                } else {
                    Err(config_error(&format!("{} is required but not set", key)))
                }
            }
        }
    }

    fn parsed<T>(&self, key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key, Some(default), is_prod)?
            .parse()
            .map_err(|e: T::Err| config_error(&format!("{} is invalid: {}", key, e)))
    }

    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.is_empty())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ConductorConfig, AppError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConductorConfig::from_lookup(core_config::Config::default(), |key| map.get(key).cloned())
    }

    fn prod_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("ENVIRONMENT", "prod"),
            ("SERVICE_NAME", "conductor-service"),
            ("LOG_LEVEL", "info"),
            ("MONGODB_URI", "mongodb://db:27017"),
            ("MONGODB_DATABASE", "conductor"),
            ("SESSION_SECRET", "0123456789abcdef0123456789abcdef"),
            ("SESSION_EXPIRY_SECONDS", "86400"),
            ("COOKIE_PREFIX", "conductor"),
            ("ORG_ID", "campus"),
            ("GLOBAL_ORG_ID", "libretexts"),
            ("SSO_PROVIDER", "libreone"),
            ("SSO_AUTHORIZE_URL", "https://sso.example.com/authorize"),
            ("SSO_TOKEN_URL", "https://sso.example.com/token"),
            ("SSO_PROFILE_URL", "https://sso.example.com/userinfo"),
            ("SSO_CLIENT_ID", "conductor"),
            ("SSO_CLIENT_SECRET", "shh"),
            ("SSO_REDIRECT_URI", "https://conductor.example.com/oauth/libreone"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "587"),
            ("SMTP_USER", "mailer"),
            ("SMTP_PASSWORD", "pw"),
            ("SMTP_FROM_EMAIL", "conductor@example.com"),
            ("INVITATION_EXPIRY_DAYS", "30"),
            ("FRONTEND_URL", "https://conductor.example.com"),
            ("ALLOWED_ORIGINS", "https://conductor.example.com"),
            ("RATE_LIMIT_LOGIN_ATTEMPTS", "5"),
            ("RATE_LIMIT_LOGIN_WINDOW_SECONDS", "900"),
        ]
    }

    #[test]
    fn test_dev_defaults() {
        let config = load(&[("SESSION_SECRET", "dev-secret"), ("ORG_ID", "campus")]).unwrap();

        assert_eq!(config.environment, Environment::Dev);
        assert_eq!(config.session.expiry_seconds, 86_400);
        assert_eq!(config.session.access_cookie(), "conductor_access");
        assert_eq!(config.session.signed_cookie(), "conductor_signed");
        assert_eq!(config.org.global_org_id, "libretexts");
        assert_eq!(config.invitations.expiry_days, 30);
        assert!(config.workbench.api_url.is_none());
    }

    #[test]
    fn test_missing_secret_is_rejected() {
        assert!(load(&[("ORG_ID", "campus")]).is_err());
    }

    #[test]
    fn test_prod_accepts_complete_configuration() {
        let config = load(&prod_vars()).unwrap();
        assert!(config.is_prod());
    }

    #[test]
    fn test_prod_requires_every_value() {
        let vars: Vec<_> = prod_vars()
            .into_iter()
            .filter(|(k, _)| *k != "SMTP_HOST")
            .collect();
        let err = load(&vars).unwrap_err();
        assert!(err.to_string().contains("SMTP_HOST"));
    }

    #[test]
    fn test_prod_rejects_short_secret() {
        let mut vars = prod_vars();
        vars.retain(|(k, _)| *k != "SESSION_SECRET");
        vars.push(("SESSION_SECRET", "short"));
        assert!(load(&vars).is_err());
    }

    #[test]
    fn test_prod_rejects_wildcard_cors() {
        let mut vars = prod_vars();
        vars.retain(|(k, _)| *k != "ALLOWED_ORIGINS");
        vars.push(("ALLOWED_ORIGINS", "*"));
        assert!(load(&vars).is_err());
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let err = load(&[
            ("SESSION_SECRET", "dev-secret"),
            ("ORG_ID", "campus"),
            ("INVITATION_EXPIRY_DAYS", "thirty"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("INVITATION_EXPIRY_DAYS"));
    }
}
