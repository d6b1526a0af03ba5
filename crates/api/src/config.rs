use portal_core::lockout::LockoutPolicy;

/// Server configuration loaded from environment variables.
///
/// All fields except the secrets have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    /// Also the allow-list for CSRF Origin/Referer checks.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Whether auth cookies carry the `Secure` attribute (default: `true`;
    /// set `COOKIE_SECURE=false` for plain-HTTP local development).
    pub cookie_secure: bool,
    /// Maximum concurrent active sessions per user (default: `5`).
    pub max_sessions: usize,
    /// Brute-force lockout thresholds.
    pub lockout: LockoutPolicy,
    /// JWT token configuration (secret, expiry durations).
    pub jwt: JwtConfig,
    /// CSRF double-submit configuration.
    pub csrf: CsrfConfig,
}

/// Configuration for JWT token generation and validation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub secret: String,
    /// Access token lifetime in minutes (default: 30).
    pub access_token_expiry_mins: i64,
    /// Refresh token lifetime in days (default: 7).
    pub refresh_token_expiry_days: i64,
}

/// Configuration for the stateless CSRF guard.
#[derive(Debug, Clone)]
pub struct CsrfConfig {
    /// HMAC-SHA256 secret for signing CSRF tokens.
    pub secret: String,
    /// Token validity window in seconds (default: 1800).
    pub max_age_secs: i64,
    /// Request header carrying the double-submitted token
    /// (default: `x-csrf-token`).
    pub header_name: String,
    /// Whether Origin/Referer checking is enforced (default: `true`).
    pub check_origin: bool,
}

/// Default access token expiry in minutes.
const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 30;
/// Default refresh token expiry in days.
const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 7;
/// Default CSRF token validity in seconds.
const DEFAULT_CSRF_MAX_AGE_SECS: i64 = 1800;

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Required | Default                 |
    /// |---------------------------|----------|-------------------------|
    /// | `HOST`                    | no       | `0.0.0.0`               |
    /// | `PORT`                    | no       | `3000`                  |
    /// | `CORS_ORIGINS`            | no       | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`    | no       | `30`                    |
    /// | `COOKIE_SECURE`           | no       | `true`                  |
    /// | `MAX_SESSIONS`            | no       | `5`                     |
    /// | `MAX_FAILED_ATTEMPTS`     | no       | `5`                     |
    /// | `LOCKOUT_DURATION_MINS`   | no       | `15`                    |
    ///
    /// See [`JwtConfig::from_env`] and [`CsrfConfig::from_env`] for the
    /// secret material, which is required.
    ///
    /// # Panics
    ///
    /// Panics if a variable is present but unparsable, or a required
    /// secret is missing. Misconfiguration should fail at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let cookie_secure: bool = std::env::var("COOKIE_SECURE")
            .unwrap_or_else(|_| "true".into())
            .parse()
            .expect("COOKIE_SECURE must be true or false");

        let max_sessions: usize = std::env::var("MAX_SESSIONS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("MAX_SESSIONS must be a valid usize");

        let max_failed_attempts: i32 = std::env::var("MAX_FAILED_ATTEMPTS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("MAX_FAILED_ATTEMPTS must be a valid i32");

        let lockout_duration_mins: i64 = std::env::var("LOCKOUT_DURATION_MINS")
            .unwrap_or_else(|_| "15".into())
            .parse()
            .expect("LOCKOUT_DURATION_MINS must be a valid i64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            cookie_secure,
            max_sessions,
            lockout: LockoutPolicy {
                max_failed_attempts,
                lockout_duration_mins,
            },
            jwt: JwtConfig::from_env(),
            csrf: CsrfConfig::from_env(),
        }
    }
}

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var                    | Required | Default |
    /// |----------------------------|----------|---------|
    /// | `JWT_SECRET`               | **yes**  | --      |
    /// | `JWT_ACCESS_EXPIRY_MINS`   | no       | `30`    |
    /// | `JWT_REFRESH_EXPIRY_DAYS`  | no       | `7`     |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is not set or is empty.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "JWT_SECRET must not be empty");

        let access_token_expiry_mins: i64 = std::env::var("JWT_ACCESS_EXPIRY_MINS")
            .unwrap_or_else(|_| DEFAULT_ACCESS_EXPIRY_MINS.to_string())
            .parse()
            .expect("JWT_ACCESS_EXPIRY_MINS must be a valid i64");

        let refresh_token_expiry_days: i64 = std::env::var("JWT_REFRESH_EXPIRY_DAYS")
            .unwrap_or_else(|_| DEFAULT_REFRESH_EXPIRY_DAYS.to_string())
            .parse()
            .expect("JWT_REFRESH_EXPIRY_DAYS must be a valid i64");

        Self {
            secret,
            access_token_expiry_mins,
            refresh_token_expiry_days,
        }
    }

    /// Access token lifetime in whole seconds.
    pub fn access_ttl_secs(&self) -> i64 {
        self.access_token_expiry_mins * 60
    }

    /// Refresh token lifetime in whole seconds.
    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_token_expiry_days * 24 * 3600
    }
}

impl CsrfConfig {
    /// Load CSRF configuration from environment variables.
    ///
    /// | Env Var              | Required | Default        |
    /// |----------------------|----------|----------------|
    /// | `CSRF_SECRET`        | **yes**  | --             |
    /// | `CSRF_MAX_AGE_SECS`  | no       | `1800`         |
    /// | `CSRF_HEADER_NAME`   | no       | `x-csrf-token` |
    /// | `CSRF_CHECK_ORIGIN`  | no       | `true`         |
    ///
    /// # Panics
    ///
    /// Panics if `CSRF_SECRET` is not set or is empty.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("CSRF_SECRET").expect("CSRF_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "CSRF_SECRET must not be empty");

        let max_age_secs: i64 = std::env::var("CSRF_MAX_AGE_SECS")
            .unwrap_or_else(|_| DEFAULT_CSRF_MAX_AGE_SECS.to_string())
            .parse()
            .expect("CSRF_MAX_AGE_SECS must be a valid i64");

        let header_name = std::env::var("CSRF_HEADER_NAME")
            .unwrap_or_else(|_| "x-csrf-token".into())
            .to_lowercase();

        let check_origin: bool = std::env::var("CSRF_CHECK_ORIGIN")
            .unwrap_or_else(|_| "true".into())
            .parse()
            .expect("CSRF_CHECK_ORIGIN must be true or false");

        Self {
            secret,
            max_age_secs,
            header_name,
            check_origin,
        }
    }
}
