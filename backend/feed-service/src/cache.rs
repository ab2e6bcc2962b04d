//! Redis-based caching layer for assembled feeds and user profiles.
//!
//! Cache keys follow the pattern:
//! - causeway:feed:{user_id} → serialized CachedFeed (one generation)
//! - causeway:profile:{user_id} → serialized UserProfile
//!
//! A cached feed carries a generation id; cursors minted against one
//! generation are rejected once the generation is replaced or expires.

use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{FeedItem, UserProfile};

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Feed cache TTL in seconds (1 hour)
    pub feed_ttl: u64,
    /// Profile cache TTL in seconds (24 hours)
    pub profile_ttl: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            feed_ttl: 3600,
            profile_ttl: 24 * 3600,
        }
    }
}

/// One fully-ranked, diversity-filtered feed generation for a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedFeed {
    pub generation: Uuid,
    pub items: Vec<FeedItem>,
    pub cold_start: bool,
    /// Experiment assignments in effect when this generation was built
    #[serde(default)]
    pub experiments: Vec<String>,
    pub built_at: DateTime<Utc>,
}

/// Feed cache layer using Redis
#[derive(Clone)]
pub struct FeedCache {
    client: Arc<ConnectionManager>,
    config: CacheConfig,
}

impl FeedCache {
    pub async fn new(redis_url: &str, config: CacheConfig) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::Cache(format!("Failed to create Redis client: {}", e)))?;

        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to create Redis connection: {}", e)))?;

        Ok(Self {
            client: Arc::new(manager),
            config,
        })
    }

    /// Ping Redis to check connection health
    pub async fn ping(&self) -> Result<()> {
        redis::cmd("PING")
            .query_async::<_, String>(&mut self.client.as_ref().clone())
            .await
            .map_err(|e| {
                warn!("Redis PING failed: {}", e);
                AppError::Cache(format!("Redis health check failed: {}", e))
            })?;
        Ok(())
    }

    pub async fn get_feed(&self, user_id: Uuid) -> Result<Option<CachedFeed>> {
        let key = feed_key(user_id);

        let value: Option<String> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut self.client.as_ref().clone())
            .await
            .map_err(|e| {
                warn!("Redis GET failed for {}: {}", key, e);
                AppError::Cache(format!("Redis error: {}", e))
            })?;

        match value {
            Some(json) => {
                let cached = serde_json::from_str::<CachedFeed>(&json)
                    .map_err(|e| AppError::Cache(format!("Cache deserialization failed: {}", e)))?;
                debug!(user_id = %user_id, generation = %cached.generation, "Feed cache hit");
                Ok(Some(cached))
            }
            None => {
                debug!(user_id = %user_id, "Feed cache miss");
                Ok(None)
            }
        }
    }

    pub async fn set_feed(&self, user_id: Uuid, feed: &CachedFeed) -> Result<()> {
        let key = feed_key(user_id);
        let json = serde_json::to_string(feed)
            .map_err(|e| AppError::Cache(format!("Cache serialization failed: {}", e)))?;

        redis::cmd("SETEX")
            .arg(&key)
            .arg(self.config.feed_ttl)
            .arg(&json)
            .query_async::<_, ()>(&mut self.client.as_ref().clone())
            .await
            .map_err(|e| {
                warn!("Redis SETEX failed for {}: {}", key, e);
                AppError::Cache(format!("Redis error: {}", e))
            })?;

        debug!(
            user_id = %user_id,
            generation = %feed.generation,
            items = feed.items.len(),
            ttl = self.config.feed_ttl,
            "Cached feed generation"
        );
        Ok(())
    }

    /// Drop the user's feed generation. All cursors minted against it
    /// become stale and surface as CursorExpired on the next page request.
    pub async fn invalidate_feed(&self, user_id: Uuid) -> Result<()> {
        let key = feed_key(user_id);
        redis::cmd("DEL")
            .arg(&key)
            .query_async::<_, ()>(&mut self.client.as_ref().clone())
            .await
            .map_err(|e| {
                warn!("Redis DEL failed for {}: {}", key, e);
                AppError::Cache(format!("Redis error: {}", e))
            })?;

        debug!(user_id = %user_id, "Invalidated feed cache");
        Ok(())
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
        let key = profile_key(user_id);

        let value: Option<String> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut self.client.as_ref().clone())
            .await
            .map_err(|e| {
                warn!("Redis GET failed for {}: {}", key, e);
                AppError::Cache(format!("Redis error: {}", e))
            })?;

        match value {
            Some(json) => {
                let profile = serde_json::from_str::<UserProfile>(&json)
                    .map_err(|e| AppError::Cache(format!("Cache deserialization failed: {}", e)))?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    pub async fn set_profile(&self, profile: &UserProfile) -> Result<()> {
        let key = profile_key(profile.user_id);
        let json = serde_json::to_string(profile)
            .map_err(|e| AppError::Cache(format!("Cache serialization failed: {}", e)))?;

        redis::cmd("SETEX")
            .arg(&key)
            .arg(self.config.profile_ttl)
            .arg(&json)
            .query_async::<_, ()>(&mut self.client.as_ref().clone())
            .await
            .map_err(|e| {
                warn!("Redis SETEX failed for {}: {}", key, e);
                AppError::Cache(format!("Redis error: {}", e))
            })?;

        Ok(())
    }

    pub async fn invalidate_profile(&self, user_id: Uuid) -> Result<()> {
        let key = profile_key(user_id);
        redis::cmd("DEL")
            .arg(&key)
            .query_async::<_, ()>(&mut self.client.as_ref().clone())
            .await
            .map_err(|e| {
                warn!("Redis DEL failed for {}: {}", key, e);
                AppError::Cache(format!("Redis error: {}", e))
            })?;

        Ok(())
    }
}

fn feed_key(user_id: Uuid) -> String {
    format!("causeway:feed:{}", user_id)
}

fn profile_key(user_id: Uuid) -> String {
    format!("causeway:profile:{}", user_id)
}
