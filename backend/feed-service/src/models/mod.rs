use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Content type for feed items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Event,
    Fundraiser,
    Organization,
}

impl ContentType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Event => "event",
            Self::Fundraiser => "fundraiser",
            Self::Organization => "organization",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "event" => Some(Self::Event),
            "fundraiser" => Some(Self::Fundraiser),
            "organization" => Some(Self::Organization),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity key for a content item across all heterogeneous types.
/// The ranking core only ever needs this pair plus the small common
/// metadata subset; type-specific fields stay with their owning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentRef {
    pub content_type: ContentType,
    pub content_id: Uuid,
}

impl ContentRef {
    pub fn new(content_type: ContentType, content_id: Uuid) -> Self {
        Self {
            content_type,
            content_id,
        }
    }
}

impl std::fmt::Display for ContentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.content_type, self.content_id)
    }
}

/// User interaction event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    View,
    ClickThrough,
    Like,
    Interest,
    Comment,
    Follow,
    Share,
    Bookmark,
    Register,
    Attend,
    Donate,
}

impl InteractionType {
    /// Base affinity weight. Calibrated so that a single view barely moves
    /// a score while a donation moves it meaningfully.
    pub fn base_weight(&self) -> f64 {
        match self {
            Self::View => 0.01,
            Self::ClickThrough => 0.02,
            Self::Like => 0.03,
            Self::Interest => 0.04,
            Self::Comment => 0.05,
            Self::Follow => 0.05,
            Self::Share => 0.06,
            Self::Bookmark => 0.07,
            Self::Register => 0.08,
            Self::Attend => 0.09,
            Self::Donate => 0.10,
        }
    }

    /// Significant interactions proactively invalidate the user's cached
    /// feed and profile instead of waiting for TTL expiry.
    pub fn is_significant(&self) -> bool {
        matches!(
            self,
            Self::Donate | Self::Attend | Self::Follow | Self::Bookmark
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::View => "view",
            Self::ClickThrough => "click_through",
            Self::Like => "like",
            Self::Interest => "interest",
            Self::Comment => "comment",
            Self::Follow => "follow",
            Self::Share => "share",
            Self::Bookmark => "bookmark",
            Self::Register => "register",
            Self::Attend => "attend",
            Self::Donate => "donate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "view" => Some(Self::View),
            "click_through" => Some(Self::ClickThrough),
            "like" => Some(Self::Like),
            "interest" => Some(Self::Interest),
            "comment" => Some(Self::Comment),
            "follow" => Some(Self::Follow),
            "share" => Some(Self::Share),
            "bookmark" => Some(Self::Bookmark),
            "register" => Some(Self::Register),
            "attend" => Some(Self::Attend),
            "donate" => Some(Self::Donate),
            _ => None,
        }
    }
}

impl std::fmt::Display for InteractionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single user interaction event. Append-only and immutable once written;
/// `id` doubles as the idempotency key for at-least-once delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInteraction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: ContentRef,
    pub interaction_type: InteractionType,
    #[serde(default)]
    pub time_spent_secs: Option<u32>,
    #[serde(default)]
    pub scroll_depth: Option<f32>,
    pub created_at: DateTime<Utc>,
}

/// Stored per-(user, tag) affinity row. The decayed score and trend are
/// derived at read time, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagAffinity {
    pub user_id: Uuid,
    pub tag_id: Uuid,
    pub score: f64,
    pub interaction_count: i64,
    pub last_interaction_at: DateTime<Utc>,
}

/// Interest trend over the recent window, display-only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AffinityTrend {
    Increasing,
    Stable,
    Decreasing,
}

/// A tag affinity as exposed on the user profile (score already decayed)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagInterest {
    pub tag_id: Uuid,
    pub score: f64,
    pub interaction_count: i64,
    pub last_interaction_at: DateTime<Utc>,
    pub trend: AffinityTrend,
}

/// Share of a user's weighted interactions per content type (sums to 1)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentTypePreference {
    pub content_type: ContentType,
    pub share: f64,
}

/// When the user is typically active
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngagementPattern {
    pub peak_hours: Vec<u8>,
    pub peak_days: Vec<u8>,
    pub avg_session_secs: f64,
    pub total_interactions: i64,
}

/// Aggregated, cacheable view of a user's interests.
/// A cold-start user gets an empty profile, never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub top_tags: Vec<TagInterest>,
    pub content_type_preferences: Vec<ContentTypePreference>,
    pub engagement: EngagementPattern,
    pub built_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn empty(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            top_tags: Vec::new(),
            content_type_preferences: Vec::new(),
            engagement: EngagementPattern::default(),
            built_at: now,
        }
    }

    pub fn is_cold_start(&self) -> bool {
        self.top_tags.is_empty()
    }

    /// Decayed affinity for a tag, zero if absent
    pub fn affinity_for(&self, tag_id: Uuid) -> f64 {
        self.top_tags
            .iter()
            .find(|t| t.tag_id == tag_id)
            .map(|t| t.score)
            .unwrap_or(0.0)
    }
}

/// Neighbor in the user similarity index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarUser {
    pub user_id: Uuid,
    pub similarity: f64,
    pub shared_tag_count: usize,
}

/// Candidate-generation strategy that produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    TagAffinity,
    Collaborative,
    Trending,
    Location,
    FollowedOrg,
    Exploration,
}

impl CandidateSource {
    pub fn as_str(&self) -> &str {
        match self {
            Self::TagAffinity => "tag_affinity",
            Self::Collaborative => "collaborative",
            Self::Trending => "trending",
            Self::Location => "location",
            Self::FollowedOrg => "followed_org",
            Self::Exploration => "exploration",
        }
    }
}

impl std::fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scored candidate emitted by a single generator. `raw_score` is
/// normalized to [0,1] within the generator; the per-source weight is
/// applied during merge.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub content: ContentRef,
    pub raw_score: f64,
    pub reasons: Vec<String>,
    pub source: CandidateSource,
}

/// Weighted tag assignment on a content item (externally owned, read-only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentTag {
    pub tag_id: Uuid,
    pub relevance: f64,
}

/// Reference tag data (externally owned)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
}

/// Publication status; only published/active content is feed-eligible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Published,
    Active,
    Draft,
    Archived,
}

impl ContentStatus {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Published | Self::Active)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "published" => Some(Self::Published),
            "active" => Some(Self::Active),
            "draft" => Some(Self::Draft),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// Geographic point (WGS84)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Common metadata subset shared by all content types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentMetadata {
    pub content: ContentRef,
    pub organization_id: Option<Uuid>,
    pub status: ContentStatus,
    pub created_at: DateTime<Utc>,
    pub starts_at: Option<DateTime<Utc>>,
    pub location: Option<GeoPoint>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub image_url: Option<String>,
}

impl ContentMetadata {
    /// Completeness of the common metadata fields, in [0,1]
    pub fn quality_score(&self) -> f64 {
        let fields = [
            self.title.is_some(),
            self.summary.is_some(),
            self.image_url.is_some(),
            self.location.is_some(),
            self.organization_id.is_some(),
        ];
        let present = fields.iter().filter(|f| **f).count();
        present as f64 / fields.len() as f64
    }
}

/// Per-factor contributions behind a feed item's final score
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub relevance: f64,
    pub diversity: f64,
    pub trending: f64,
    pub location: f64,
    pub temporal: f64,
    pub social_proof: f64,
    pub quality: f64,
}

/// A single entry of an assembled feed. Response-only; never persisted
/// beyond the response cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub content_type: ContentType,
    pub content_id: Uuid,
    pub score: f64,
    pub score_breakdown: ScoreBreakdown,
    pub reasons: Vec<String>,
    pub position: usize,
}

/// Time window for trending computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendingWindow {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "24h")]
    TwentyFourHours,
    #[serde(rename = "7d")]
    SevenDays,
}

impl TrendingWindow {
    pub const ALL: [TrendingWindow; 4] = [
        Self::OneHour,
        Self::SixHours,
        Self::TwentyFourHours,
        Self::SevenDays,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::OneHour => "1h",
            Self::SixHours => "6h",
            Self::TwentyFourHours => "24h",
            Self::SevenDays => "7d",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1h" => Some(Self::OneHour),
            "6h" => Some(Self::SixHours),
            "24h" => Some(Self::TwentyFourHours),
            "7d" => Some(Self::SevenDays),
            _ => None,
        }
    }

    pub fn hours(&self) -> i64 {
        match self {
            Self::OneHour => 1,
            Self::SixHours => 6,
            Self::TwentyFourHours => 24,
            Self::SevenDays => 168,
        }
    }
}

impl std::fmt::Display for TrendingWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_weights_ordered() {
        // A view must barely register while a donation is the strongest signal.
        assert_eq!(InteractionType::View.base_weight(), 0.01);
        assert_eq!(InteractionType::Donate.base_weight(), 0.10);
        assert!(InteractionType::Like.base_weight() < InteractionType::Share.base_weight());
    }

    #[test]
    fn test_significant_interactions() {
        assert!(InteractionType::Donate.is_significant());
        assert!(InteractionType::Bookmark.is_significant());
        assert!(!InteractionType::View.is_significant());
        assert!(!InteractionType::Comment.is_significant());
    }

    #[test]
    fn test_content_type_roundtrip() {
        for ct in [
            ContentType::Event,
            ContentType::Fundraiser,
            ContentType::Organization,
        ] {
            assert_eq!(ContentType::parse(ct.as_str()), Some(ct));
        }
        assert_eq!(ContentType::parse("video"), None);
    }

    #[test]
    fn test_quality_score_completeness() {
        let mut meta = ContentMetadata {
            content: ContentRef::new(ContentType::Event, Uuid::new_v4()),
            organization_id: None,
            status: ContentStatus::Published,
            created_at: Utc::now(),
            starts_at: None,
            location: None,
            title: None,
            summary: None,
            image_url: None,
        };
        assert_eq!(meta.quality_score(), 0.0);

        meta.title = Some("Riverside cleanup".into());
        meta.organization_id = Some(Uuid::new_v4());
        assert!((meta.quality_score() - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_trending_window_parse() {
        assert_eq!(TrendingWindow::parse("6h"), Some(TrendingWindow::SixHours));
        assert_eq!(TrendingWindow::parse("2h"), None);
        assert_eq!(TrendingWindow::SevenDays.hours(), 168);
    }

    #[test]
    fn test_empty_profile_is_cold_start() {
        let profile = UserProfile::empty(Uuid::new_v4(), Utc::now());
        assert!(profile.is_cold_start());
        assert_eq!(profile.affinity_for(Uuid::new_v4()), 0.0);
    }
}
