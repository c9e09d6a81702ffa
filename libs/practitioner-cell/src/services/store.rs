use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use reqwest::Method;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{Practitioner, PractitionerError};

/// Read access to the practitioner roster.
#[async_trait]
pub trait PractitionerStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Practitioner>, PractitionerError>;

    /// Active practitioners, highest rated first.
    async fn list_active(&self) -> Result<Vec<Practitioner>, PractitionerError>;

    async fn require(&self, id: Uuid) -> Result<Practitioner, PractitionerError> {
        self.get(id).await?.ok_or(PractitionerError::NotFound)
    }
}

fn sort_by_rating(practitioners: &mut [Practitioner]) {
    practitioners.sort_by(|a, b| {
        b.rating
            .partial_cmp(&a.rating)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
}

#[derive(Default)]
pub struct InMemoryPractitionerStore {
    practitioners: RwLock<HashMap<Uuid, Practitioner>>,
}

impl InMemoryPractitionerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_practitioners(practitioners: Vec<Practitioner>) -> Self {
        let map = practitioners.into_iter().map(|p| (p.id, p)).collect();
        Self { practitioners: RwLock::new(map) }
    }

    /// Loads a JSON array of practitioners.
    pub fn from_seed_file(path: impl AsRef<Path>) -> Result<Self, PractitionerError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| PractitionerError::Seed(format!("{}: {}", path.display(), e)))?;
        let practitioners: Vec<Practitioner> = serde_json::from_str(&raw)
            .map_err(|e| PractitionerError::Seed(format!("{}: {}", path.display(), e)))?;

        info!("Loaded {} practitioners from {}", practitioners.len(), path.display());
        Ok(Self::with_practitioners(practitioners))
    }

    pub async fn insert(&self, practitioner: Practitioner) {
        self.practitioners.write().await.insert(practitioner.id, practitioner);
    }
}

#[async_trait]
impl PractitionerStore for InMemoryPractitionerStore {
    async fn get(&self, id: Uuid) -> Result<Option<Practitioner>, PractitionerError> {
        Ok(self.practitioners.read().await.get(&id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<Practitioner>, PractitionerError> {
        let mut active: Vec<Practitioner> = self.practitioners
            .read()
            .await
            .values()
            .filter(|p| p.is_active)
            .cloned()
            .collect();
        sort_by_rating(&mut active);
        Ok(active)
    }
}

pub struct SupabasePractitionerStore {
    supabase: SupabaseClient,
}

impl SupabasePractitionerStore {
    pub fn new(config: &AppConfig) -> Self {
        Self { supabase: SupabaseClient::new(config) }
    }
}

#[async_trait]
impl PractitionerStore for SupabasePractitionerStore {
    async fn get(&self, id: Uuid) -> Result<Option<Practitioner>, PractitionerError> {
        debug!("Fetching practitioner: {}", id);

        let path = format!("/rest/v1/practitioners?id=eq.{}", id);
        let result: Vec<Practitioner> = self.supabase.request(Method::GET, &path, None).await?;

        Ok(result.into_iter().next())
    }

    async fn list_active(&self) -> Result<Vec<Practitioner>, PractitionerError> {
        let path = "/rest/v1/practitioners?isActive=eq.true&order=rating.desc";
        let mut result: Vec<Practitioner> = self.supabase.request(Method::GET, path, None).await?;
        sort_by_rating(&mut result);
        Ok(result)
    }
}
