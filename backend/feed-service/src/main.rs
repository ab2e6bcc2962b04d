use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa_swagger_ui::SwaggerUi;

use discovery_engine::cache::{CacheConfig, FeedCache};
use discovery_engine::config::Config;
use discovery_engine::db::{
    AffinityRepo, ContentRepo, ExperimentsRepo, FollowRepo, InteractionRepo,
};
use discovery_engine::handlers::{
    get_profile, get_trending, health, metrics_endpoint, post_feed, track_interaction, AppState,
};
use discovery_engine::services::candidates::{
    CandidateGenerator, CollaborativeGenerator, ExplorationGenerator, FollowedOrgGenerator,
    LocationGenerator, TagAffinityGenerator, TrendingGenerator,
};
use discovery_engine::services::{
    AffinityService, ExperimentEngine, FeedService, IngestionService, SimilarityService,
    TrendingService,
};
use discovery_engine::{consumers, jobs, openapi};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    // Structured JSON logging with env-driven filtering
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting feed-service v{}", env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", config.app.env);

    let pool = match PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Database connection failed: {}", e);
            std::process::exit(1);
        }
    };

    let cache = match FeedCache::new(
        &config.redis.url,
        CacheConfig {
            feed_ttl: config.engine.feed_ttl_secs,
            profile_ttl: config.engine.profile_ttl_secs,
        },
    )
    .await
    {
        Ok(cache) => cache,
        Err(e) => {
            tracing::error!("Redis connection failed: {}", e);
            std::process::exit(1);
        }
    };

    // Repositories
    let interaction_repo = Arc::new(InteractionRepo::new(pool.clone()));
    let affinity_repo = Arc::new(AffinityRepo::new(pool.clone()));
    let content_repo = Arc::new(ContentRepo::new(pool.clone()));
    let follow_repo = Arc::new(FollowRepo::new(pool.clone()));
    let experiments_repo = Arc::new(ExperimentsRepo::new(pool.clone()));

    // Engine services
    let engine = config.engine.clone();
    let affinity = Arc::new(AffinityService::new(
        Arc::clone(&affinity_repo),
        Arc::clone(&interaction_repo),
        Arc::clone(&content_repo),
        cache.clone(),
        engine.clone(),
    ));
    let similarity = Arc::new(SimilarityService::new(
        Arc::clone(&affinity_repo),
        engine.clone(),
    ));
    let trending = Arc::new(TrendingService::new(
        Arc::clone(&interaction_repo),
        engine.clone(),
    ));
    let experiments = Arc::new(ExperimentEngine::new(Some(experiments_repo)));

    let generators: Vec<Arc<dyn CandidateGenerator>> = vec![
        Arc::new(TagAffinityGenerator::new(Arc::clone(&content_repo))),
        Arc::new(CollaborativeGenerator::new(
            Arc::clone(&similarity),
            Arc::clone(&interaction_repo),
            engine.clone(),
        )),
        Arc::new(TrendingGenerator::new(Arc::clone(&trending), &engine)),
        Arc::new(LocationGenerator::new(
            Arc::clone(&content_repo),
            engine.clone(),
        )),
        Arc::new(FollowedOrgGenerator::new(
            follow_repo,
            Arc::clone(&content_repo),
            engine.clone(),
        )),
        Arc::new(ExplorationGenerator::new(Arc::clone(&content_repo))),
    ];

    let feed = Arc::new(FeedService::new(
        Arc::clone(&affinity),
        Arc::clone(&interaction_repo),
        Arc::clone(&content_repo),
        generators,
        Arc::clone(&experiments),
        cache.clone(),
        engine.clone(),
    ));

    let ingestion = IngestionService::start(
        engine.ingestion_workers,
        engine.ingestion_queue_capacity,
        Arc::clone(&interaction_repo),
        Arc::clone(&affinity),
        Arc::clone(&feed),
    );

    // Background jobs: snapshot rebuilds run independently of request
    // handling and of each other.
    tokio::spawn(jobs::similarity_refresh::start(
        Arc::clone(&similarity),
        engine.similarity_refresh_secs,
    ));
    tokio::spawn(jobs::trending_refresh::start(
        Arc::clone(&trending),
        Arc::clone(&experiments),
        engine.trending_refresh_secs,
    ));

    if config.kafka.enabled {
        tokio::spawn(consumers::interaction_consumer::run(
            config.kafka.clone(),
            ingestion.clone(),
        ));
    } else {
        info!("Kafka consumer disabled; interactions arrive via HTTP only");
    }

    let state = web::Data::new(AppState {
        feed,
        affinity,
        trending,
        ingestion,
    });

    let port = config.app.port;
    info!("Listening on 0.0.0.0:{}", port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(post_feed)
            .service(track_interaction)
            .service(get_profile)
            .service(get_trending)
            .service(health)
            .service(metrics_endpoint)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi::doc()),
            )
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
