use async_trait::async_trait;
use nd_core::{DigestRun, Error, Frequency, Preference, PreferenceStore, Result, RunId, RunStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Arena of run records indexed by run id.
#[derive(Default)]
pub struct RunArena {
    runs: HashMap<RunId, DigestRun>,
}

impl RunArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, run: &DigestRun) -> Result<()> {
        if self.runs.contains_key(&run.id) {
            return Err(Error::Storage(format!("run {} already exists", run.id)));
        }
        self.runs.insert(run.id, run.clone());
        Ok(())
    }

    pub fn save(&mut self, run: &DigestRun) -> Result<()> {
        match self.runs.get_mut(&run.id) {
            Some(existing) => {
                *existing = run.clone();
                Ok(())
            }
            None => Err(Error::RunNotFound(run.id)),
        }
    }

    pub fn get(&self, id: RunId) -> Option<DigestRun> {
        self.runs.get(&id).cloned()
    }

    pub fn list(&self) -> Vec<DigestRun> {
        let mut runs: Vec<DigestRun> = self.runs.values().cloned().collect();
        runs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        runs
    }
}

pub struct MemoryRunStore {
    arena: Arc<RwLock<RunArena>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self {
            arena: Arc::new(RwLock::new(RunArena::new())),
        }
    }
}

impl Default for MemoryRunStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn insert_run(&self, run: &DigestRun) -> Result<()> {
        let mut arena = self.arena.write().await;
        arena.insert(run)
    }

    async fn save_run(&self, run: &DigestRun) -> Result<()> {
        let mut arena = self.arena.write().await;
        arena.save(run)
    }

    async fn load_run(&self, id: RunId) -> Result<Option<DigestRun>> {
        let arena = self.arena.read().await;
        Ok(arena.get(id))
    }

    async fn list_runs(&self) -> Result<Vec<DigestRun>> {
        let arena = self.arena.read().await;
        Ok(arena.list())
    }
}

#[derive(Default)]
pub struct MemoryPreferenceStore {
    preferences: RwLock<HashMap<String, Preference>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn save_preference(&self, preference: &Preference) -> Result<()> {
        let mut preferences = self.preferences.write().await;
        preferences.insert(preference.principal.clone(), preference.clone());
        Ok(())
    }

    async fn get_preference(&self, principal: &str) -> Result<Option<Preference>> {
        let preferences = self.preferences.read().await;
        Ok(preferences.get(principal).cloned())
    }

    async fn list_by_frequency(&self, frequency: Frequency) -> Result<Vec<Preference>> {
        let preferences = self.preferences.read().await;
        let mut matching: Vec<Preference> = preferences
            .values()
            .filter(|p| p.frequency == frequency)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.principal.cmp(&b.principal));
        Ok(matching)
    }
}
