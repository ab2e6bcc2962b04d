use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    #[serde(default = "default_kafka_bootstrap_servers")]
    pub bootstrap_servers: String,
    #[serde(default = "default_kafka_group_id")]
    pub group_id: String,
    #[serde(default = "default_interactions_topic")]
    pub interactions_topic: String,
    /// Consumer is optional; the HTTP track endpoint works without Kafka
    #[serde(default)]
    pub enabled: bool,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: default_kafka_bootstrap_servers(),
            group_id: default_kafka_group_id(),
            interactions_topic: default_interactions_topic(),
            enabled: false,
        }
    }
}

/// Engine tuning knobs. Every value here must be adjustable at deploy time
/// via environment variables, without a code change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Weekly exponential decay rate (λ); 0.105 ≈ 10% decay per week
    pub decay_per_week: f64,
    /// Decayed affinities below this floor are treated as zero for ranking
    pub min_affinity: f64,
    /// Cap on the time-spent bonus added per interaction
    pub max_time_bonus: f64,
    /// Number of top tags kept on a rebuilt profile
    pub profile_top_tags: usize,
    /// Profile cache TTL in seconds (24h)
    pub profile_ttl_secs: u64,
    /// Feed cache TTL in seconds (1h)
    pub feed_ttl_secs: u64,
    /// Size of the fully-ranked list cached per user
    pub feed_size: usize,
    /// Per-organization cap applied by the diversity filter
    pub organization_cap: usize,
    /// Minimum shared tags before a user pair is compared
    pub min_shared_tags: usize,
    /// Minimum cosine similarity kept in the index
    pub min_similarity: f64,
    /// Neighbors kept per user in the similarity index
    pub similarity_top_k: usize,
    /// Seconds between similarity index rebuilds
    pub similarity_refresh_secs: u64,
    /// Seconds between trending snapshot rebuilds
    pub trending_refresh_secs: u64,
    /// Minimum interactions before an item can trend
    pub trending_min_interactions: usize,
    /// Minimum unique users before an item can trend
    pub trending_min_users: usize,
    /// Trending window used by the feed's trending generator
    pub trending_feed_window: String,
    /// Radius for the location generator, in kilometers
    pub location_radius_km: f64,
    /// Recency window for followed-organization content, in days
    pub followed_recency_days: i64,
    /// Candidates requested from each generator
    pub candidates_per_source: usize,
    /// Ingestion worker shards (per-user ordering is per shard)
    pub ingestion_workers: usize,
    /// Bounded capacity of each ingestion shard queue
    pub ingestion_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            decay_per_week: 0.105,
            min_affinity: 0.05,
            max_time_bonus: 0.02,
            profile_top_tags: 50,
            profile_ttl_secs: 24 * 3600,
            feed_ttl_secs: 3600,
            feed_size: 50,
            organization_cap: 2,
            min_shared_tags: 3,
            min_similarity: 0.3,
            similarity_top_k: 20,
            similarity_refresh_secs: 900,
            trending_refresh_secs: 300,
            trending_min_interactions: 5,
            trending_min_users: 3,
            trending_feed_window: "24h".to_string(),
            location_radius_km: 50.0,
            followed_recency_days: 30,
            candidates_per_source: 100,
            ingestion_workers: 4,
            ingestion_queue_capacity: 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let defaults = EngineConfig::default();

        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: std::env::var("APP_PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()?,
                log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")?,
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
            },
            redis: RedisConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            },
            kafka: KafkaConfig {
                bootstrap_servers: std::env::var("KAFKA_BOOTSTRAP_SERVERS")
                    .unwrap_or_else(|_| default_kafka_bootstrap_servers()),
                group_id: std::env::var("KAFKA_GROUP_ID")
                    .unwrap_or_else(|_| default_kafka_group_id()),
                interactions_topic: std::env::var("KAFKA_INTERACTIONS_TOPIC")
                    .unwrap_or_else(|_| default_interactions_topic()),
                enabled: std::env::var("KAFKA_ENABLED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
            },
            engine: EngineConfig {
                decay_per_week: env_parse("AFFINITY_DECAY_PER_WEEK", defaults.decay_per_week)?,
                min_affinity: env_parse("AFFINITY_MIN_SCORE", defaults.min_affinity)?,
                max_time_bonus: env_parse("AFFINITY_MAX_TIME_BONUS", defaults.max_time_bonus)?,
                profile_top_tags: env_parse("PROFILE_TOP_TAGS", defaults.profile_top_tags)?,
                profile_ttl_secs: env_parse("PROFILE_TTL_SECS", defaults.profile_ttl_secs)?,
                feed_ttl_secs: env_parse("FEED_TTL_SECS", defaults.feed_ttl_secs)?,
                feed_size: env_parse("FEED_SIZE", defaults.feed_size)?,
                organization_cap: env_parse("FEED_ORGANIZATION_CAP", defaults.organization_cap)?,
                min_shared_tags: env_parse("SIMILARITY_MIN_SHARED_TAGS", defaults.min_shared_tags)?,
                min_similarity: env_parse("SIMILARITY_THRESHOLD", defaults.min_similarity)?,
                similarity_top_k: env_parse("SIMILARITY_TOP_K", defaults.similarity_top_k)?,
                similarity_refresh_secs: env_parse(
                    "SIMILARITY_REFRESH_SECS",
                    defaults.similarity_refresh_secs,
                )?,
                trending_refresh_secs: env_parse(
                    "TRENDING_REFRESH_SECS",
                    defaults.trending_refresh_secs,
                )?,
                trending_min_interactions: env_parse(
                    "TRENDING_MIN_INTERACTIONS",
                    defaults.trending_min_interactions,
                )?,
                trending_min_users: env_parse("TRENDING_MIN_USERS", defaults.trending_min_users)?,
                trending_feed_window: std::env::var("TRENDING_FEED_WINDOW")
                    .unwrap_or(defaults.trending_feed_window),
                location_radius_km: env_parse("LOCATION_RADIUS_KM", defaults.location_radius_km)?,
                followed_recency_days: env_parse(
                    "FOLLOWED_RECENCY_DAYS",
                    defaults.followed_recency_days,
                )?,
                candidates_per_source: env_parse(
                    "CANDIDATES_PER_SOURCE",
                    defaults.candidates_per_source,
                )?,
                ingestion_workers: env_parse("INGESTION_WORKERS", defaults.ingestion_workers)?,
                ingestion_queue_capacity: env_parse(
                    "INGESTION_QUEUE_CAPACITY",
                    defaults.ingestion_queue_capacity,
                )?,
            },
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    T::Err: std::error::Error + 'static,
{
    match std::env::var(key) {
        Ok(raw) => Ok(raw.parse::<T>().map_err(Box::new)?),
        Err(_) => Ok(default),
    }
}

fn default_kafka_bootstrap_servers() -> String {
    "localhost:9092".to_string()
}

fn default_kafka_group_id() -> String {
    "feed-service-group".to_string()
}

fn default_interactions_topic() -> String {
    "causeway.interactions".to_string()
}
