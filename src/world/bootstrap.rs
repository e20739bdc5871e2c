//! World Bootstrap
//!
//! The external collaborator that turns a logical world name into a ready
//! [`WorldInstance`]. The orchestration core only ever calls
//! [`WorldBootstrap::produce`]; materializing templates and copying instance
//! data are this module's business.
//!
//! On disk a materialized world is a directory holding one `world.json`
//! manifest:
//!
//! ```text
//! <scratch_root>/
//! ├── templates/battle/world.json     (materialized once)
//! └── 6ba7b810-.../world.json         (one copy per produced instance)
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::world::instance::{WorldInstance, WorldKey};

const MANIFEST_FILE: &str = "world.json";

/// World construction and teardown errors.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// No template exists for the logical name.
    #[error("No world template named {0}")]
    UnknownTemplate(String),

    /// No world is registered under the logical name.
    #[error("No world registered as {0}")]
    Unregistered(String),

    /// The world is not currently resident.
    #[error("World {0} is not loaded")]
    NotLoaded(String),

    /// Participants are still inside.
    #[error("World {name} still holds {players} player(s)")]
    Occupied {
        /// Logical name.
        name: String,
        /// Participants present.
        players: usize,
    },

    /// Materialized data could not be read back as a world.
    #[error("World data for {0} is unreadable")]
    Unreadable(String),

    /// Filesystem failure.
    #[error("World I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest could not be encoded or decoded.
    #[error("World manifest invalid: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Base environment a world instance is cloned from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldTemplate {
    /// Logical name.
    pub name: String,
    /// Non-player entities present in the base environment.
    pub entities: Vec<String>,
}

impl WorldTemplate {
    /// Template with the given entities.
    pub fn new<I, S>(name: &str, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_ascii_lowercase(),
            entities: entities.into_iter().map(Into::into).collect(),
        }
    }

    fn instantiate(&self, key: &WorldKey) -> WorldInstance {
        WorldInstance::new(key.clone(), self.name.clone()).with_entities(self.entities.iter().cloned())
    }
}

/// Produces ready world instances for logical names.
pub trait WorldBootstrap: Send {
    /// Make the template for `name` available on disk; returns its directory.
    fn materialize_template(&mut self, name: &str) -> Result<PathBuf, WorldError>;

    /// Read a world previously written under `source`.
    fn load_external_instance(&self, key: &WorldKey, name: &str, source: &Path) -> Option<WorldInstance>;

    /// Copy instance data from `src` into `dst`.
    fn copy_instance_data(&self, src: &Path, dst: &Path) -> Result<(), WorldError>;

    /// A ready instance for `name`, keyed by `key`.
    fn produce(&mut self, name: &str, key: &WorldKey) -> Result<WorldInstance, WorldError>;
}

// =============================================================================
// TEMPLATE BOOTSTRAP
// =============================================================================

/// Bootstrap over a fixed set of in-memory templates.
///
/// With a scratch root every produced instance gets its own copy of the
/// template data on disk; without one, instances are built straight from
/// memory.
#[derive(Debug, Clone)]
pub struct TemplateBootstrap {
    templates: BTreeMap<String, WorldTemplate>,
    scratch_root: Option<PathBuf>,
}

impl TemplateBootstrap {
    /// No templates, no scratch root.
    pub fn empty() -> Self {
        Self { templates: BTreeMap::new(), scratch_root: None }
    }

    /// The lobby and the three arenas.
    pub fn standard() -> Self {
        Self::empty()
            .with_template(WorldTemplate::new("lobby", ["armor_stand", "item_frame", "item_frame"]))
            .with_template(WorldTemplate::new("battle", ["item", "item"]))
            .with_template(WorldTemplate::new("tumble", Vec::<String>::new()))
            .with_template(WorldTemplate::new("glide", ["boat"]))
    }

    /// Add or replace a template.
    pub fn with_template(mut self, template: WorldTemplate) -> Self {
        self.templates.insert(template.name.clone(), template);
        self
    }

    /// Write materialized data under `root`.
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    /// Scratch root, if any.
    pub fn scratch_root(&self) -> Option<&Path> {
        self.scratch_root.as_deref()
    }

    fn template(&self, name: &str) -> Result<&WorldTemplate, WorldError> {
        self.templates
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| WorldError::UnknownTemplate(name.to_string()))
    }
}

impl WorldBootstrap for TemplateBootstrap {
    fn materialize_template(&mut self, name: &str) -> Result<PathBuf, WorldError> {
        let template = self.template(name)?;
        let root = self
            .scratch_root
            .as_ref()
            .ok_or_else(|| WorldError::Unreadable(name.to_string()))?;

        let dir = root.join("templates").join(&template.name);
        let manifest = dir.join(MANIFEST_FILE);
        if !manifest.exists() {
            fs::create_dir_all(&dir)?;
            fs::write(&manifest, serde_json::to_string_pretty(template)?)?;
            debug!("Materialized template {} at {}", template.name, dir.display());
        }
        Ok(dir)
    }

    fn load_external_instance(&self, key: &WorldKey, name: &str, source: &Path) -> Option<WorldInstance> {
        let text = match fs::read_to_string(source.join(MANIFEST_FILE)) {
            Ok(text) => text,
            Err(e) => {
                warn!("Cannot read world {} from {}: {}", name, source.display(), e);
                return None;
            }
        };
        match serde_json::from_str::<WorldTemplate>(&text) {
            Ok(template) => Some(template.instantiate(key).with_scratch_dir(source.to_path_buf())),
            Err(e) => {
                warn!("World manifest for {} is invalid: {}", name, e);
                None
            }
        }
    }

    fn copy_instance_data(&self, src: &Path, dst: &Path) -> Result<(), WorldError> {
        copy_dir(src, dst)?;
        Ok(())
    }

    fn produce(&mut self, name: &str, key: &WorldKey) -> Result<WorldInstance, WorldError> {
        let Some(root) = self.scratch_root.clone() else {
            return Ok(self.template(name)?.instantiate(key));
        };

        let template_dir = self.materialize_template(name)?;
        let instance_dir = root.join(Uuid::new_v4().to_string());
        self.copy_instance_data(&template_dir, &instance_dir)?;

        self.load_external_instance(key, name, &instance_dir)
            .ok_or_else(|| WorldError::Unreadable(name.to_string()))
    }
}

fn copy_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}
