use std::ffi::OsString;
use std::time::Duration;

use clap::{Parser, ValueEnum};

/// Default timeout for tool operations (30 seconds).
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

/// Default idle lifetime of a streamable HTTP session (30 minutes).
const DEFAULT_SESSION_TTL_SECS: u64 = 1800;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("tool timeout must be a positive number of seconds")]
    ZeroToolTimeout,
    #[error("session TTL must be a positive number of seconds")]
    ZeroSessionTtl,
    #[error("public URL must start with http:// or https://: {0}")]
    InvalidPublicUrl(String),
    #[error("listen address must not be empty")]
    EmptyListen,
}

/// Which MCP surfaces the server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// Newline-delimited JSON-RPC over stdin/stdout.
    Stdio,
    /// Server-sent events on `/sse` with replies posted to `/messages`.
    Sse,
    /// Streamable HTTP on `/http`.
    Http,
    /// `sse` and `http` together on one port.
    Dual,
}

impl Transport {
    pub fn serves_sse(self) -> bool {
        matches!(self, Self::Sse | Self::Dual)
    }

    pub fn serves_http(self) -> bool {
        matches!(self, Self::Http | Self::Dual)
    }

    pub fn is_network(self) -> bool {
        !matches!(self, Self::Stdio)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    /// Disable logging entirely.
    None,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::None => "off",
        }
    }
}

/// Command line flags. Every flag also reads a `FAST_TIME_*` environment variable.
#[derive(Debug, Clone, Parser)]
#[command(name = "fast-time-server", version, about = "MCP time server")]
pub struct Cli {
    /// Transport to serve.
    #[arg(long, value_enum, default_value_t = Transport::Stdio, env = "FAST_TIME_TRANSPORT")]
    pub transport: Transport,

    /// TCP port for network transports.
    #[arg(long, default_value_t = DEFAULT_PORT, env = "FAST_TIME_PORT")]
    pub port: u16,

    /// Interface to listen on.
    #[arg(long, default_value = "0.0.0.0", env = "FAST_TIME_LISTEN")]
    pub listen: String,

    /// Full `host:port` bind address; overrides `listen` and `port`.
    #[arg(long, env = "FAST_TIME_ADDR")]
    pub addr: Option<String>,

    /// Externally reachable base URL advertised in the SSE endpoint event.
    #[arg(long = "public-url", env = "FAST_TIME_PUBLIC_URL")]
    pub public_url: Option<String>,

    /// Bearer token required on MCP routes.
    #[arg(long = "auth-token", env = "FAST_TIME_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,

    #[arg(long = "log-level", value_enum, default_value_t = LogLevel::Info, env = "FAST_TIME_LOG_LEVEL")]
    pub log_level: LogLevel,

    /// Emit logs as JSON lines.
    #[arg(long = "log-json", env = "FAST_TIME_LOG_JSON")]
    pub log_json: bool,

    /// Maximum seconds a single tool call may run.
    #[arg(long = "tool-timeout-secs", default_value_t = DEFAULT_TOOL_TIMEOUT_SECS, env = "FAST_TIME_TOOL_TIMEOUT_SECS")]
    pub tool_timeout_secs: u64,

    /// Seconds an idle streamable HTTP session is kept before it expires.
    #[arg(long = "session-ttl-secs", default_value_t = DEFAULT_SESSION_TTL_SECS, env = "FAST_TIME_SESSION_TTL_SECS")]
    pub session_ttl_secs: u64,
}

/// Validated server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub transport: Transport,
    pub listen: String,
    pub port: u16,
    pub addr: Option<String>,
    pub public_url: Option<String>,
    pub auth_token: Option<String>,
    pub log_level: LogLevel,
    pub log_json: bool,
    pub tool_timeout: Duration,
    pub session_ttl: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: Transport::Stdio,
            listen: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            addr: None,
            public_url: None,
            auth_token: None,
            log_level: LogLevel::Info,
            log_json: false,
            tool_timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
        }
    }
}

impl ServerConfig {
    /// Parse and validate configuration from process-style arguments.
    ///
    /// Accepts Go-style single-dash long flags (`-port=8080`) alongside
    /// `--port 8080`.
    pub fn from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let cli = Cli::try_parse_from(normalize_flags(args))?;
        Self::try_from(cli).map_err(|e| {
            clap::Error::raw(clap::error::ErrorKind::ValueValidation, format!("{e}\n"))
        })
    }

    /// Address handed to the TCP listener.
    pub fn bind_addr(&self) -> String {
        match &self.addr {
            Some(addr) => addr.clone(),
            None => format!("{}:{}", self.listen, self.port),
        }
    }
}

impl TryFrom<Cli> for ServerConfig {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        if cli.tool_timeout_secs == 0 {
            return Err(ConfigError::ZeroToolTimeout);
        }
        if cli.session_ttl_secs == 0 {
            return Err(ConfigError::ZeroSessionTtl);
        }

        let listen = cli.listen.trim().to_string();
        if listen.is_empty() {
            return Err(ConfigError::EmptyListen);
        }

        let public_url = match cli.public_url.map(|u| u.trim().to_string()) {
            Some(u) if u.is_empty() => None,
            Some(u) if u.starts_with("http://") || u.starts_with("https://") => {
                Some(u.trim_end_matches('/').to_string())
            }
            Some(u) => return Err(ConfigError::InvalidPublicUrl(u)),
            None => None,
        };

        Ok(Self {
            transport: cli.transport,
            listen,
            port: cli.port,
            addr: cli.addr.filter(|a| !a.trim().is_empty()),
            public_url,
            auth_token: cli.auth_token.filter(|t| !t.is_empty()),
            log_level: cli.log_level,
            log_json: cli.log_json,
            tool_timeout: Duration::from_secs(cli.tool_timeout_secs),
            session_ttl: Duration::from_secs(cli.session_ttl_secs),
        })
    }
}

/// Rewrite `-flag[=value]` into `--flag[=value]` so Go-style invocations parse.
///
/// The program name, single-letter flags (`-h`, `-V`) and everything after a
/// bare `--` are left untouched.
pub fn normalize_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut out = Vec::new();
    let mut passthrough = false;

    for (i, arg) in args.into_iter().enumerate() {
        let arg: OsString = arg.into();
        if i == 0 || passthrough {
            out.push(arg);
            continue;
        }

        match arg.to_str() {
            Some("--") => {
                passthrough = true;
                out.push(arg);
            }
            Some(s) if s.starts_with('-') && !s.starts_with("--") && s.len() > 2 => {
                out.push(OsString::from(format!("-{s}")));
            }
            _ => out.push(arg),
        }
    }

    out
}
