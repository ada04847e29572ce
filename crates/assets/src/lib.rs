//! Resource factories: named caches for models, textures, effects and materials.
//!
//! Resources are identified by a hash of their kind and name, so the same
//! name always maps to the same id. Parsing the underlying file formats is
//! left to whoever fills a factory; the engine only relies on bulk release.
//!
//! # Invariants
//! - `unload_all` leaves a factory empty.
//! - [`ResourceFactories::unload_all`] releases models, materials, effects
//!   and textures, in that order.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// The four resource families the viewer caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Model,
    Texture,
    Effect,
    Material,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Model => "model",
            Self::Texture => "texture",
            Self::Effect => "effect",
            Self::Material => "material",
        })
    }
}

/// Name-addressed resource id, stable across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub u64);

impl AssetId {
    pub fn for_name(kind: ResourceKind, name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(kind.to_string().as_bytes());
        hasher.update([0u8]);
        hasher.update(name.as_bytes());
        let result = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&result[..8]);
        AssetId(u64::from_le_bytes(bytes))
    }
}

/// Errors from resource factory operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: ResourceKind, name: String },
    #[error("{kind} '{name}' is stored as a different type")]
    TypeMismatch { kind: ResourceKind, name: String },
    #[error("failed to create {kind} '{name}': {reason}")]
    Creation {
        kind: ResourceKind,
        name: String,
        reason: String,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

struct Entry {
    name: String,
    value: Box<dyn Any>,
}

/// Cache of one resource kind. Values are type-erased; callers read them back
/// with the type they stored.
pub struct ResourceFactory {
    kind: ResourceKind,
    entries: BTreeMap<AssetId, Entry>,
}

impl fmt::Debug for ResourceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceFactory")
            .field("kind", &self.kind)
            .field("names", &self.names())
            .finish()
    }
}

impl ResourceFactory {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Store `value` under `name`, replacing any previous resource of that name.
    pub fn insert<T: Any>(&mut self, name: &str, value: T) -> AssetId {
        let id = AssetId::for_name(self.kind, name);
        let previous = self.entries.insert(
            id,
            Entry {
                name: name.to_string(),
                value: Box::new(value),
            },
        );
        if previous.is_some() {
            tracing::debug!("replaced {} '{name}'", self.kind);
        }
        id
    }

    pub fn find(&self, name: &str) -> Option<AssetId> {
        let id = AssetId::for_name(self.kind, name);
        self.entries.contains_key(&id).then_some(id)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn get<T: Any>(&self, name: &str) -> Result<&T, AssetError> {
        let entry = self
            .entries
            .get(&AssetId::for_name(self.kind, name))
            .ok_or_else(|| AssetError::NotFound {
                kind: self.kind,
                name: name.to_string(),
            })?;
        entry
            .value
            .downcast_ref::<T>()
            .ok_or_else(|| AssetError::TypeMismatch {
                kind: self.kind,
                name: name.to_string(),
            })
    }

    /// Return the cached resource, creating and caching it on first request.
    pub fn get_or_create<T, F>(&mut self, name: &str, create: F) -> Result<&T, AssetError>
    where
        T: Any,
        F: FnOnce() -> Result<T, String>,
    {
        if !self.contains(name) {
            let value = create().map_err(|reason| AssetError::Creation {
                kind: self.kind,
                name: name.to_string(),
                reason,
            })?;
            self.insert(name, value);
        }
        self.get(name)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.entries
            .remove(&AssetId::for_name(self.kind, name))
            .is_some()
    }

    /// Names of cached resources, ordered by id.
    pub fn names(&self) -> Vec<&str> {
        self.entries.values().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release every cached resource and return how many there were.
    pub fn unload_all(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        tracing::debug!("released {count} {} resource(s)", self.kind);
        count
    }
}

/// The four factories owned by the engine's core services.
#[derive(Debug)]
pub struct ResourceFactories {
    pub models: ResourceFactory,
    pub textures: ResourceFactory,
    pub effects: ResourceFactory,
    pub materials: ResourceFactory,
}

impl Default for ResourceFactories {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceFactories {
    /// Order in which [`unload_all`](Self::unload_all) releases the factories.
    pub const UNLOAD_ORDER: [ResourceKind; 4] = [
        ResourceKind::Model,
        ResourceKind::Material,
        ResourceKind::Effect,
        ResourceKind::Texture,
    ];

    pub fn new() -> Self {
        Self {
            models: ResourceFactory::new(ResourceKind::Model),
            textures: ResourceFactory::new(ResourceKind::Texture),
            effects: ResourceFactory::new(ResourceKind::Effect),
            materials: ResourceFactory::new(ResourceKind::Material),
        }
    }

    pub fn get(&self, kind: ResourceKind) -> &ResourceFactory {
        match kind {
            ResourceKind::Model => &self.models,
            ResourceKind::Texture => &self.textures,
            ResourceKind::Effect => &self.effects,
            ResourceKind::Material => &self.materials,
        }
    }

    pub fn get_mut(&mut self, kind: ResourceKind) -> &mut ResourceFactory {
        match kind {
            ResourceKind::Model => &mut self.models,
            ResourceKind::Texture => &mut self.textures,
            ResourceKind::Effect => &mut self.effects,
            ResourceKind::Material => &mut self.materials,
        }
    }

    /// Resources cached across all four factories.
    pub fn total(&self) -> usize {
        self.models.len() + self.textures.len() + self.effects.len() + self.materials.len()
    }

    /// Release everything: models, then materials, then effects, then textures.
    pub fn unload_all(&mut self) -> usize {
        Self::UNLOAD_ORDER
            .into_iter()
            .map(|kind| self.get_mut(kind).unload_all())
            .sum()
    }

    pub fn manifest(&self) -> Manifest {
        let mut resources = BTreeMap::new();
        for kind in Self::UNLOAD_ORDER {
            let names = self.get(kind).names().into_iter().map(String::from).collect();
            resources.insert(kind, names);
        }
        Manifest { resources }
    }
}

/// Serializable listing of cached resource names per kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub resources: BTreeMap<ResourceKind, Vec<String>>,
}

impl Manifest {
    pub fn total(&self) -> usize {
        self.resources.values().map(Vec::len).sum()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AssetError> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn ids_are_stable_per_kind_and_name() {
        let a = AssetId::for_name(ResourceKind::Model, "cube");
        let b = AssetId::for_name(ResourceKind::Model, "cube");
        let c = AssetId::for_name(ResourceKind::Texture, "cube");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn insert_and_get_typed() {
        let mut models = ResourceFactory::new(ResourceKind::Model);
        let id = models.insert("cube", 36u32);
        assert_eq!(models.find("cube"), Some(id));
        assert_eq!(*models.get::<u32>("cube").unwrap(), 36);
        assert!(matches!(
            models.get::<String>("cube"),
            Err(AssetError::TypeMismatch { .. })
        ));
        assert!(matches!(
            models.get::<u32>("sphere"),
            Err(AssetError::NotFound { .. })
        ));
    }

    #[test]
    fn same_name_replaces() {
        let mut textures = ResourceFactory::new(ResourceKind::Texture);
        textures.insert("grid", 1u8);
        textures.insert("grid", 2u8);
        assert_eq!(textures.len(), 1);
        assert_eq!(*textures.get::<u8>("grid").unwrap(), 2);
    }

    #[test]
    fn get_or_create_caches_first_result() {
        let mut effects = ResourceFactory::new(ResourceKind::Effect);
        let mut calls = 0;
        for _ in 0..3 {
            let value = effects
                .get_or_create("basic", || {
                    calls += 1;
                    Ok::<_, String>("shader".to_string())
                })
                .unwrap();
            assert_eq!(value, "shader");
        }
        assert_eq!(calls, 1);

        let err = effects
            .get_or_create::<String, _>("broken", || Err("syntax error".into()))
            .unwrap_err();
        assert!(err.to_string().contains("syntax error"));
        assert!(!effects.contains("broken"));
    }

    #[test]
    fn unload_all_empties_every_factory_in_order() {
        struct Tracked(&'static str, Rc<RefCell<Vec<&'static str>>>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.1.borrow_mut().push(self.0);
            }
        }

        let dropped = Rc::new(RefCell::new(Vec::new()));
        let mut factories = ResourceFactories::new();
        factories.textures.insert("t", Tracked("texture", Rc::clone(&dropped)));
        factories.effects.insert("e", Tracked("effect", Rc::clone(&dropped)));
        factories.materials.insert("m", Tracked("material", Rc::clone(&dropped)));
        factories.models.insert("a", Tracked("model", Rc::clone(&dropped)));
        assert_eq!(factories.total(), 4);

        assert_eq!(factories.unload_all(), 4);
        assert_eq!(factories.total(), 0);
        assert_eq!(
            *dropped.borrow(),
            ["model", "material", "effect", "texture"]
        );

        assert_eq!(factories.unload_all(), 0);
    }

    #[test]
    fn manifest_round_trips_through_disk() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut factories = ResourceFactories::new();
        factories.models.insert("cube", ());
        factories.materials.insert("default", ());

        let manifest = factories.manifest();
        assert_eq!(manifest.total(), 2);
        manifest.save(tmp.path()).unwrap();

        let loaded = Manifest::load(tmp.path()).unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(loaded.resources[&ResourceKind::Model], ["cube"]);
        assert!(loaded.resources[&ResourceKind::Texture].is_empty());
    }
}
