use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    agent::ReviewAgent,
    config::AppConfig,
    llm::LlmClient,
    sentiment::SentimentExtractor,
    tasks::TaskManager,
    tmdb::TmdbClient,
};

/// Shared application state: configuration, outbound clients, and the
/// task manager. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    tmdb: TmdbClient,
    tasks: TaskManager,
}

impl AppState {
    pub fn new() -> Result<Self> {
        let config = AppConfig::from_env()?;
        Self::from_config(config)
    }

    pub fn from_config(config: AppConfig) -> Result<Self> {
        let llm = LlmClient::new(config.llm.clone()).context("failed to initialize LLM client")?;
        let tmdb =
            TmdbClient::new(config.tmdb.clone()).context("failed to initialize TMDB client")?;

        let extractor =
            SentimentExtractor::new(llm.clone(), config.prompts.sentiment_system.clone());
        let agent = ReviewAgent::new(
            llm,
            tmdb.clone(),
            extractor,
            config.prompts.reviewer_system.clone(),
            config.scoring,
        );
        let tasks = TaskManager::new(Arc::new(agent), config.runtime.max_concurrent_tasks);

        Ok(Self {
            config: Arc::new(config),
            tmdb,
            tasks,
        })
    }

    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    pub fn tmdb(&self) -> &TmdbClient {
        &self.tmdb
    }

    pub fn task_retention_hours(&self) -> i64 {
        self.config.runtime.task_retention_hours
    }
}
