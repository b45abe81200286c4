use clap::Parser;
use std::time::Duration;

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "codegen-gateway")]
#[command(about = "Caching proxy for a code generation service")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "GATEWAY_PORT", default_value_t = 8080)]
    pub port: u16,

    // Redis connection string; in-process cache when omitted
    // Example: "redis://localhost:6379"
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    // Cache TTL in seconds
    #[arg(short, long, env = "CACHE_TTL", default_value_t = 3600)]
    pub cache_ttl: u64,

    // Generation service endpoint
    #[arg(
        short,
        long,
        env = "UPSTREAM_URL",
        default_value = "http://localhost:8000/v1/chat"
    )]
    pub upstream_url: String,

    // Bearer token for the generation service
    #[arg(long, env = "UPSTREAM_API_KEY", hide_env_values = true)]
    pub upstream_api_key: Option<String>,

    // Cache backend timeout per operation, in milliseconds
    #[arg(
        long,
        env = "CACHE_TIMEOUT_MS",
        default_value_t = 500,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub cache_timeout_ms: u64,

    // Upstream timeout in seconds
    #[arg(
        long,
        env = "UPSTREAM_TIMEOUT",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub upstream_timeout: u64,

    // Sampling temperature sent with every request
    #[arg(long, env = "UPSTREAM_TEMPERATURE", default_value_t = 0.2)]
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub temperature: f32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/v1/chat".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            temperature: 0.2,
        }
    }
}

/// Runtime configuration, independent of how it was supplied.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub redis_url: Option<String>,
    pub cache_ttl: Duration,
    pub cache_timeout: Duration,
    pub upstream: UpstreamConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            redis_url: None,
            cache_ttl: Duration::from_secs(3600),
            cache_timeout: Duration::from_millis(500),
            upstream: UpstreamConfig::default(),
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            port: args.port,
            redis_url: args.redis_url.filter(|url| !url.trim().is_empty()),
            cache_ttl: Duration::from_secs(args.cache_ttl),
            cache_timeout: Duration::from_millis(args.cache_timeout_ms),
            upstream: UpstreamConfig {
                url: args.upstream_url,
                api_key: args.upstream_api_key.filter(|key| !key.is_empty()),
                timeout: Duration::from_secs(args.upstream_timeout),
                temperature: args.temperature,
            },
        }
    }
}
