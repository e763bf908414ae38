use serde::Deserialize;
use std::env;
use std::str::FromStr;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub listing: ListingConfig,
    pub features: FeatureFlags,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

impl AppConfig {
    /// Вне development/test логи пишутся в JSON
    pub fn json_logs(&self) -> bool {
        !matches!(self.environment.as_str(), "development" | "test")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    /// Обязателен только для backend = postgres
    pub url: Option<String>,
    pub pool_size: u32,
}

// Настройки Redis (кеш страниц событий)
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub ttl_seconds: u64,
}

// Настройки JWT и учетных записей
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub expires_in_hours: i64,
    pub bcrypt_cost: u32,
    /// Эти адреса получают флаг администратора при регистрации
    pub admin_emails: Vec<String>,
}

// Настройки выдачи списка событий
#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    pub page_size: u32,
    pub featured_limit: u32,
}

// Feature flags для включения/выключения функциональности
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    pub enable_cache: bool,
    /// Уникальность брони на (event, user) и проверка вместимости при подтверждении
    pub enforce_booking_limits: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

fn var_or(name: &'static str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = var_or(name, default);
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

// "a@x.com, B@y.com" -> ["a@x.com", "b@y.com"]
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = match var_or("STORAGE", "postgres").to_lowercase().as_str() {
            "postgres" => StorageBackend::Postgres,
            "memory" => StorageBackend::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE",
                    value: other.to_string(),
                })
            }
        };

        let database_url = env::var("DATABASE_URL").ok();
        if backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let enable_cache: bool = parse_var("ENABLE_CACHE", "false")?;
        let redis_url = env::var("REDIS_URL").ok();
        if enable_cache && redis_url.is_none() {
            return Err(ConfigError::Missing("REDIS_URL"));
        }

        let page_size: u32 = parse_var("PAGE_SIZE", "9")?;
        if page_size == 0 {
            return Err(ConfigError::Invalid {
                name: "PAGE_SIZE",
                value: "0".to_string(),
            });
        }

        Ok(Config {
            app: AppConfig {
                host: var_or("HOST", "0.0.0.0"),
                port: parse_var("PORT", "8000")?,
                environment: var_or("ENVIRONMENT", "development"),
                rust_log: var_or("RUST_LOG", "event_booking=debug,tower_http=debug"),
            },
            database: DatabaseConfig {
                backend,
                url: database_url,
                pool_size: parse_var("DB_POOL_SIZE", "20")?,
            },
            redis: RedisConfig {
                url: redis_url,
                ttl_seconds: parse_var("CACHE_TTL_SECONDS", "300")?,
            },
            auth: AuthConfig {
                jwt_secret: env::var("JWT_SECRET")
                    .map_err(|_| ConfigError::Missing("JWT_SECRET"))?,
                expires_in_hours: parse_var("JWT_EXPIRES_IN_HOURS", "24")?,
                bcrypt_cost: parse_var("BCRYPT_COST", "12")?,
                admin_emails: parse_list(&var_or("ADMIN_EMAILS", "")),
            },
            listing: ListingConfig {
                page_size,
                featured_limit: parse_var("FEATURED_LIMIT", "5")?,
            },
            features: FeatureFlags {
                enable_cache,
                enforce_booking_limits: parse_var("ENFORCE_BOOKING_LIMITS", "false")?,
            },
        })
    }

    /// Конфигурация для тестов и локального запуска без внешних сервисов
    pub fn in_memory(jwt_secret: &str) -> Self {
        Config {
            app: AppConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                environment: "test".to_string(),
                rust_log: "event_booking=debug".to_string(),
            },
            database: DatabaseConfig {
                backend: StorageBackend::Memory,
                url: None,
                pool_size: 1,
            },
            redis: RedisConfig {
                url: None,
                ttl_seconds: 300,
            },
            auth: AuthConfig {
                jwt_secret: jwt_secret.to_string(),
                expires_in_hours: 24,
                // минимальная стоимость bcrypt, чтобы тесты не тормозили
                bcrypt_cost: 4,
                admin_emails: Vec::new(),
            },
            listing: ListingConfig {
                page_size: 9,
                featured_limit: 5,
            },
            features: FeatureFlags {
                enable_cache: false,
                enforce_booking_limits: false,
            },
        }
    }
}
