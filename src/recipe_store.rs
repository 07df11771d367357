//! Recipes the user chose to keep: one record per recipe plus an index of
//! ids, newest first.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{PipelineError, Result};
use crate::recipe::Recipe;
use crate::storage::KeyValueStore;

pub const INDEX_KEY: &str = "saved_recipes";
const RECORD_PREFIX: &str = "saved_recipe_";

fn record_key(id: &str) -> String {
    format!("{RECORD_PREFIX}{id}")
}

pub struct LocalRecipeStore {
    store: Arc<dyn KeyValueStore>,
    // Serializes read-modify-write of the index.
    index_lock: Mutex<()>,
}

impl LocalRecipeStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            index_lock: Mutex::new(()),
        }
    }

    async fn read_index(&self) -> Result<Vec<String>> {
        match self.store.get(INDEX_KEY).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|err| PipelineError::Storage(format!("saved recipe index: {err}"))),
            None => Ok(Vec::new()),
        }
    }

    async fn write_index(&self, ids: &[String]) -> Result<()> {
        let raw = serde_json::to_string(ids)
            .map_err(|err| PipelineError::Storage(format!("saved recipe index: {err}")))?;
        self.store.set(INDEX_KEY, &raw).await
    }

    /// Writes the record, then puts its id at the head of the index unless
    /// it is already listed.
    pub async fn try_save(&self, recipe: &Recipe) -> Result<()> {
        if recipe.id.trim().is_empty() {
            return Err(PipelineError::InvalidInput("recipe id must not be empty".to_string()));
        }
        let raw = serde_json::to_string(recipe)
            .map_err(|err| PipelineError::Storage(format!("encode recipe: {err}")))?;
        self.store.set(&record_key(&recipe.id), &raw).await?;

        let _index = self.index_lock.lock().await;
        let mut ids = self.read_index().await?;
        if !ids.iter().any(|id| id == &recipe.id) {
            ids.insert(0, recipe.id.clone());
            self.write_index(&ids).await?;
        }
        tracing::debug!(recipe_id = %recipe.id, saved = ids.len(), "recipe saved");
        Ok(())
    }

    pub async fn save(&self, recipe: &Recipe) {
        if let Err(err) = self.try_save(recipe).await {
            tracing::warn!(recipe_id = %recipe.id, error = %err, "failed to save recipe");
        }
    }

    /// Saved recipes in index order. Entries whose record is missing or
    /// cannot be decoded are skipped.
    pub async fn try_list(&self) -> Result<Vec<Recipe>> {
        let ids = self.read_index().await?;
        let mut recipes = Vec::with_capacity(ids.len());
        for id in ids {
            match self.try_get(&id).await {
                Ok(Some(recipe)) => recipes.push(recipe),
                Ok(None) => tracing::debug!(recipe_id = %id, "indexed recipe has no record"),
                Err(err) => tracing::warn!(recipe_id = %id, error = %err, "skipping saved recipe"),
            }
        }
        Ok(recipes)
    }

    pub async fn list(&self) -> Vec<Recipe> {
        self.try_list().await.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to list saved recipes");
            Vec::new()
        })
    }

    pub async fn try_get(&self, id: &str) -> Result<Option<Recipe>> {
        match self.store.get(&record_key(id)).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|err| PipelineError::Storage(format!("decode recipe {id}: {err}"))),
            None => Ok(None),
        }
    }

    pub async fn get(&self, id: &str) -> Option<Recipe> {
        self.try_get(id).await.unwrap_or_else(|err| {
            tracing::warn!(recipe_id = %id, error = %err, "failed to read saved recipe");
            None
        })
    }

    /// Removes the record and its index entry. Returns whether the id was
    /// indexed.
    pub async fn try_delete(&self, id: &str) -> Result<bool> {
        self.store.remove(&record_key(id)).await?;

        let _index = self.index_lock.lock().await;
        let mut ids = self.read_index().await?;
        let before = ids.len();
        ids.retain(|existing| existing != id);
        let removed = ids.len() != before;
        if removed {
            self.write_index(&ids).await?;
        }
        Ok(removed)
    }

    pub async fn delete(&self, id: &str) -> bool {
        self.try_delete(id).await.unwrap_or_else(|err| {
            tracing::warn!(recipe_id = %id, error = %err, "failed to delete saved recipe");
            false
        })
    }
}
