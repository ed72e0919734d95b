//! Status service - which backends answer and what they hold

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::ports::DataSource;
use crate::services::{BackendSummary, FallbackDataSource};

pub struct StatusService {
    source: Arc<FallbackDataSource>,
}

impl StatusService {
    pub fn new(source: Arc<FallbackDataSource>) -> Self {
        Self { source }
    }

    /// Snapshot of the backends and the data reachable through them
    pub fn get_status(&self) -> Result<StatusSummary> {
        let champions = self
            .source
            .get_all_champion_names()
            .context("Failed to count champions")?;
        let scores_available = self
            .source
            .champion_scores_available()
            .context("Failed to check champion scores")?;

        Ok(StatusSummary {
            backends: self.source.describe(),
            read_only: self.source.is_read_only(),
            total_champions: champions.len(),
            scores_available,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub backends: BackendSummary,
    pub read_only: bool,
    pub total_champions: usize,
    pub scores_available: bool,
}
