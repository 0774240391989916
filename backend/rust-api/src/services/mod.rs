use std::sync::Arc;

use crate::config::Config;
use crate::store::{ActivityStore, ChallengeStore, MongoStore, QuizStore, UserStore};
use mongodb::{Client as MongoClient, Database};
use redis::aio::ConnectionManager;

pub mod activity_service;
pub mod cache_service;
pub mod challenge_progress;
pub mod challenge_service;
pub mod dashboard_service;
pub mod emission_calculator;
pub mod onboarding_service;
pub mod progress_worker;
pub mod quiz_scoring;
pub mod quiz_service;
pub mod tree_calculator;

use activity_service::ActivityService;
use cache_service::CacheService;
use challenge_service::ChallengeService;
use dashboard_service::DashboardService;
use emission_calculator::EmissionFactors;
use onboarding_service::OnboardingService;
use quiz_service::QuizService;

/// Store handles the services are built over
#[derive(Clone)]
pub struct Stores {
    pub activities: Arc<dyn ActivityStore>,
    pub challenges: Arc<dyn ChallengeStore>,
    pub quizzes: Arc<dyn QuizStore>,
    pub users: Arc<dyn UserStore>,
}

impl Stores {
    /// Uses one backend for every collection
    pub fn single<S>(store: Arc<S>) -> Self
    where
        S: ActivityStore + ChallengeStore + QuizStore + UserStore + 'static,
    {
        Self {
            activities: store.clone(),
            challenges: store.clone(),
            quizzes: store.clone(),
            users: store,
        }
    }
}

pub struct AppState {
    pub config: Config,
    /// Set when running against MongoDB; used by the health check
    pub mongo: Option<Database>,
    pub cache: CacheService,
    pub factors: Arc<EmissionFactors>,
    pub activities: ActivityService,
    pub challenges: Arc<ChallengeService>,
    pub quizzes: QuizService,
    pub dashboard: DashboardService,
    pub onboarding: OnboardingService,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let database = mongo_client.database(&config.mongo_database);
        let mongo = MongoStore::new(database.clone());
        mongo.ensure_indexes().await?;

        tracing::info!("Attempting to connect to Redis...");

        let redis = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        let mut conn = redis.clone();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        let mut state = Self::with_stores(
            config,
            Stores::single(Arc::new(mongo)),
            CacheService::new(redis),
        );
        state.mongo = Some(database);
        Ok(state)
    }

    pub fn with_stores(config: Config, stores: Stores, cache: CacheService) -> Self {
        let factors = Arc::new(EmissionFactors::defra_2024());

        Self {
            activities: ActivityService::new(
                stores.activities.clone(),
                stores.users.clone(),
                factors.clone(),
            ),
            challenges: Arc::new(ChallengeService::new(
                stores.challenges.clone(),
                stores.activities.clone(),
                cache.clone(),
                config.cache.leaderboard_ttl_secs,
            )),
            quizzes: QuizService::new(stores.quizzes.clone()),
            dashboard: DashboardService::new(stores.activities.clone(), stores.users.clone()),
            onboarding: OnboardingService::new(stores.users),
            factors,
            cache,
            config,
            mongo: None,
        }
    }
}
