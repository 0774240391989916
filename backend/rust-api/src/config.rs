use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub redis_uri: String,
    pub mongo_database: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub cache: CacheConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub factors_ttl_secs: u64,
    pub leaderboard_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            factors_ttl_secs: 86_400,
            leaderboard_ttl_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    pub progress_interval_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            progress_interval_secs: 3600,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first, then the local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml + APP__ overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .unwrap_or_else(|_| {
                let host = env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
                let port = env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
                match env::var("REDIS_PASSWORD") {
                    Ok(password) => format!("redis://:{}@{}:{}/0", password, host, port),
                    Err(_) => format!("redis://{}:{}/0", host, port),
                }
            });

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "carbontrack".to_string());

        let jwt_secret = match settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
        {
            Ok(secret) => secret,
            Err(_) if env == "prod" => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ))
            }
            Err(_) => {
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            }
        };

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or_else(|_| "0.0.0.0:8081".to_string());

        let cache_defaults = CacheConfig::default();
        let cache = CacheConfig {
            factors_ttl_secs: read_u64(
                &settings,
                "cache.factors_ttl_secs",
                cache_defaults.factors_ttl_secs,
            )?,
            leaderboard_ttl_secs: read_u64(
                &settings,
                "cache.leaderboard_ttl_secs",
                cache_defaults.leaderboard_ttl_secs,
            )?,
        };

        let worker = WorkerConfig {
            progress_interval_secs: read_u64(
                &settings,
                "worker.progress_interval_secs",
                WorkerConfig::default().progress_interval_secs,
            )?,
        };

        Ok(Config {
            mongo_uri,
            redis_uri,
            mongo_database,
            jwt_secret,
            bind_addr,
            cache,
            worker,
        })
    }
}

fn read_u64(settings: &config::Config, key: &str, default: u64) -> Result<u64, config::ConfigError> {
    match settings.get_int(key) {
        Ok(value) => u64::try_from(value)
            .map_err(|_| config::ConfigError::Message(format!("{} must not be negative", key))),
        Err(config::ConfigError::NotFound(_)) => Ok(default),
        Err(err) => Err(err),
    }
}
