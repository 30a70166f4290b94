//! Storage collaborators: the hosted backend ([`TourStore`]) and the
//! per-browser key-value store ([`KeyValueStore`], a local-storage stand-in).

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::model::{enforce_single_active, Project, ThemeSettings, Tour};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

/// The backend the dashboard and widget talk to. Every call is a network
/// round trip in production; implementations must not hold state the caller
/// relies on across calls.
#[async_trait]
pub trait TourStore: Send + Sync {
    async fn load_project(&self, project_id: &str) -> Result<Project, StoreError>;

    /// Tours of a project, each with its steps sorted by `order`.
    async fn load_tours(&self, project_id: &str) -> Result<Vec<Tour>, StoreError>;

    /// Insert or fully replace a tour (steps included). Saving an active tour
    /// deactivates its siblings on the same page.
    async fn save_tour(&self, tour: Tour) -> Result<(), StoreError>;

    async fn delete_tour(&self, tour_id: &str) -> Result<(), StoreError>;

    async fn set_tour_active(&self, tour_id: &str, active: bool) -> Result<(), StoreError>;

    async fn save_project_theme(
        &self,
        project_id: &str,
        theme: ThemeSettings,
    ) -> Result<(), StoreError>;

    async fn record_heartbeat(&self, project_id: &str, now_ms: u64) -> Result<(), StoreError>;

    async fn current_user(&self) -> Result<Option<User>, StoreError>;
}

/// Everything a project needs, as one JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub project: Project,
    #[serde(default)]
    pub tours: Vec<Tour>,
    #[serde(default)]
    pub user: Option<User>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    projects: HashMap<String, Project>,
    tours: Vec<Tour>,
    user: Option<User>,
}

/// In-process [`TourStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_catalog(catalog: Catalog) -> Self {
        let mut projects = HashMap::new();
        projects.insert(catalog.project.id.clone(), catalog.project);
        Self {
            state: RwLock::new(MemoryState {
                projects,
                tours: catalog.tours,
                user: catalog.user,
            }),
        }
    }

    pub async fn insert_project(&self, project: Project) {
        self.state
            .write()
            .await
            .projects
            .insert(project.id.clone(), project);
    }

    pub async fn sign_in(&self, user: Option<User>) {
        self.state.write().await.user = user;
    }
}

#[async_trait]
impl TourStore for MemoryStore {
    async fn load_project(&self, project_id: &str) -> Result<Project, StoreError> {
        self.state
            .read()
            .await
            .projects
            .get(project_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "Project",
                id: project_id.to_string(),
            })
    }

    async fn load_tours(&self, project_id: &str) -> Result<Vec<Tour>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .tours
            .iter()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .map(|mut t| {
                t.steps.sort_by_key(|s| s.order);
                t
            })
            .collect())
    }

    async fn save_tour(&self, tour: Tour) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let id = tour.id.clone();
        if let Some(pos) = state.tours.iter().position(|t| t.id == id) {
            state.tours[pos] = tour;
        } else {
            state.tours.push(tour);
        }
        let switched = enforce_single_active(&mut state.tours, &id);
        if !switched.is_empty() {
            tracing::info!("Deactivated {} sibling tour(s) of {}", switched.len(), id);
        }
        Ok(())
    }

    async fn delete_tour(&self, tour_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let before = state.tours.len();
        state.tours.retain(|t| t.id != tour_id);
        if state.tours.len() == before {
            return Err(StoreError::NotFound {
                entity: "Tour",
                id: tour_id.to_string(),
            });
        }
        Ok(())
    }

    async fn set_tour_active(&self, tour_id: &str, active: bool) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let tour = state
            .tours
            .iter_mut()
            .find(|t| t.id == tour_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "Tour",
                id: tour_id.to_string(),
            })?;
        tour.is_active = active;
        enforce_single_active(&mut state.tours, tour_id);
        Ok(())
    }

    async fn save_project_theme(
        &self,
        project_id: &str,
        theme: ThemeSettings,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let project = state
            .projects
            .get_mut(project_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "Project",
                id: project_id.to_string(),
            })?;
        project.theme_settings = theme;
        Ok(())
    }

    async fn record_heartbeat(&self, project_id: &str, now_ms: u64) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let project = state
            .projects
            .get_mut(project_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "Project",
                id: project_id.to_string(),
            })?;
        project.last_seen_at = Some(now_ms);
        Ok(())
    }

    async fn current_user(&self) -> Result<Option<User>, StoreError> {
        Ok(self.state.read().await.user.clone())
    }
}

// ── Key-value store ─────────────────────────────────────────────────────

/// Per-browser persistent strings, keyed per origin.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    entries: HashMap<String, String>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// [`KeyValueStore`] persisted as one JSON object, rewritten on every change.
#[derive(Debug)]
pub struct FileKv {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileKv {
    /// Open (or start) the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, entries })
    }

    fn flush(&self) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)?;
        Ok(())
    }
}

impl KeyValueStore for FileKv {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}
