use menva::FromEnv;
use std::{fmt, net::Ipv4Addr, str::FromStr};

#[derive(Debug, Clone, PartialEq)]
pub enum Env {
    Development,
    Production,
    Test,
}

impl FromStr for Env {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" => Ok(Env::Development),
            "production" => Ok(Env::Production),
            "test" => Ok(Env::Test),
            _ => Err(format!("Invalid value for enum Env: {}", s)),
        }
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Test => write!(f, "test"),
        }
    }
}

/// Everything the application reads from the environment, every variable
/// prefixed with `EVENTLY_` (`EVENTLY_DATABASE_URL`, `EVENTLY_PORT`...).
#[derive(Debug, Clone, FromEnv)]
pub struct Config {
    pub env: Env,
    ip: Ipv4Addr,
    port: u16,
    domain: String,
    pub worker_threads: usize,
    pub database_url: String,
    pub session_key: String,
    pub session_cookie_name: String,
    pub csrf_cookie_name: String,
    pub session_expiration: i64,
    pub login_redirect_to: String,
    pub email_default_sender: String,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_relay: String,
    pub logs_directory: String,
    pub sentry_dsn: String,
}

impl Config {
    pub const ENV_PREFIX: &'static str = "EVENTLY_";

    pub fn stub() -> Self {
        Self {
            env: Env::Test,
            ip: Ipv4Addr::new(127, 0, 0, 1),
            port: 8000,
            domain: "localhost".into(),
            worker_threads: 1,
            database_url: "sqlite::memory:".into(),
            session_key: "session_key".into(),
            session_cookie_name: "session_id".into(),
            csrf_cookie_name: "csrf_token".into(),
            session_expiration: 30,
            login_redirect_to: "/events".into(),
            email_default_sender: "events@example.com".into(),
            smtp_username: "smtp_username".into(),
            smtp_password: "smtp_password".into(),
            smtp_relay: "smtp_relay".into(),
            logs_directory: "./logs".into(),
            sentry_dsn: String::new(),
        }
    }

    pub fn socket_addr(&self) -> (Ipv4Addr, u16) {
        (self.ip, self.port)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn sentry_dsn(&self) -> Option<&str> {
        (!self.sentry_dsn.is_empty()).then_some(self.sentry_dsn.as_str())
    }

    pub fn secure_cookies(&self) -> bool {
        self.env == Env::Production
    }

    pub fn build_url(&self, path: &str) -> String {
        let (protocol, domain) = if self.domain.starts_with("localhost")
            || self.domain.starts_with("127.0.0.1")
            || self.domain.starts_with("0.0.0.0")
        {
            ("http", format!("{}:{}", self.domain, self.port))
        } else {
            ("https", self.domain.clone())
        };

        format!("{}://{}{}", protocol, domain, path)
    }

    pub fn print(&self) {
        tracing::info!("listening on http://{}:{}", self.ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_from_str_is_case_insensitive() {
        assert_eq!(Env::from_str("Production").unwrap(), Env::Production);
        assert_eq!(Env::from_str("test").unwrap(), Env::Test);
        assert!(Env::from_str("staging").is_err());
    }

    #[test]
    fn test_build_url_local_domain_uses_http_and_port() {
        let config = Config::stub();
        assert_eq!(
            config.build_url("/user/activate/abc"),
            "http://localhost:8000/user/activate/abc"
        );
    }

    #[test]
    fn test_build_url_public_domain_uses_https() {
        let mut config = Config::stub();
        config.domain = "events.example.com".into();
        assert_eq!(config.build_url("/"), "https://events.example.com/");
    }

    #[test]
    fn test_sentry_dsn_empty_means_disabled() {
        assert!(Config::stub().sentry_dsn().is_none());
    }
}
