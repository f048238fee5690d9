//! Name-to-component mapping for stages and engines.
//!
//! A [`Registry`] is immutable once built. Reconfiguration builds a new one
//! and swaps it into a [`SharedRegistry`]; sessions that already resolved
//! their components keep the snapshot they started with.

pub mod catalog;

pub use catalog::{ComponentCatalog, EngineFactory, StageFactory};

use crate::config::Config;
use crate::engine::EngineRef;
use crate::error::{AsrError, EngineError, Result};
use crate::pipeline::PipelineChain;
use crate::stage::{Capability, StageRef};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, Default)]
pub struct Registry {
    stages: BTreeMap<String, StageRef>,
    engines: BTreeMap<String, EngineRef>,
    default_engine: Option<String>,
    default_stages: Vec<String>,
}

/// What `asrcore list` prints for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentInfo {
    pub name: String,
    pub role: ComponentRole,
    pub capability: Capability,
    pub is_default: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentRole {
    Stage,
    Engine,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Build every configured component through `catalog`.
    ///
    /// Engines whose factory reports a missing model are skipped with a
    /// warning; requests naming them later fail with `EngineNotFound`. Any
    /// other construction failure aborts the whole build.
    pub fn from_config(config: &Config, catalog: &ComponentCatalog) -> Result<Self> {
        let mut builder = Self::builder();

        for (name, section) in &config.stages {
            let stage = catalog.create_stage(name, section)?;
            tracing::info!(stage = %name, kind = %section.kind, capability = %stage.capability(), "registered stage");
            builder = builder.register_stage(stage);
        }

        for (name, section) in &config.engines {
            match catalog.create_engine(name, section) {
                Ok(engine) => {
                    tracing::info!(engine = %name, kind = %section.kind, capability = %engine.capability(), "registered engine");
                    builder = builder.register_engine(engine);
                }
                Err(e) if matches!(e.engine_error(), Some(EngineError::ModelUnavailable(_))) => {
                    tracing::warn!(engine = %name, error = %e, "skipping unavailable engine");
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(engine) = &config.service.default_engine {
            builder = builder.default_engine(engine);
        }
        Ok(builder
            .default_stages(config.service.default_stages.clone())
            .build())
    }

    pub fn stage(&self, name: &str) -> Option<&StageRef> {
        self.stages.get(name)
    }

    pub fn engine(&self, name: &str) -> Option<&EngineRef> {
        self.engines.get(name)
    }

    pub fn has_stage(&self, name: &str) -> bool {
        self.stages.contains_key(name)
    }

    pub fn has_engine(&self, name: &str) -> bool {
        self.engines.contains_key(name)
    }

    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.stages.keys().map(String::as_str)
    }

    pub fn engine_names(&self) -> impl Iterator<Item = &str> {
        self.engines.keys().map(String::as_str)
    }

    pub fn default_engine(&self) -> Option<&str> {
        self.default_engine.as_deref()
    }

    pub fn default_stages(&self) -> &[String] {
        &self.default_stages
    }

    /// Resolve an engine by name, or the default one when `name` is `None`.
    pub fn resolve_engine(&self, name: Option<&str>) -> Result<EngineRef> {
        let name = name
            .or(self.default_engine.as_deref())
            .ok_or(AsrError::NoDefaultEngine)?;
        self.engines
            .get(name)
            .cloned()
            .ok_or_else(|| AsrError::EngineNotFound {
                name: name.to_string(),
            })
    }

    /// Compose a chain from stage names, in order.
    pub fn build_chain<S: AsRef<str>>(&self, names: &[S]) -> Result<PipelineChain> {
        PipelineChain::build(self, names)
    }

    /// Every registered component, stages first.
    pub fn describe(&self) -> Vec<ComponentInfo> {
        let stages = self.stages.values().map(|stage| ComponentInfo {
            name: stage.name().to_string(),
            role: ComponentRole::Stage,
            capability: stage.capability(),
            is_default: self.default_stages.iter().any(|s| s == stage.name()),
        });
        let engines = self.engines.values().map(|engine| ComponentInfo {
            name: engine.name().to_string(),
            role: ComponentRole::Engine,
            capability: engine.capability(),
            is_default: self.default_engine.as_deref() == Some(engine.name()),
        });
        stages.chain(engines).collect()
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    /// Register a stage under its own name, replacing any earlier one.
    pub fn register_stage(mut self, stage: StageRef) -> Self {
        let name = stage.name().to_string();
        if self.registry.stages.insert(name.clone(), stage).is_some() {
            tracing::warn!(stage = %name, "replacing previously registered stage");
        }
        self
    }

    /// Register an engine under its own name, replacing any earlier one.
    pub fn register_engine(mut self, engine: EngineRef) -> Self {
        let name = engine.name().to_string();
        if self.registry.engines.insert(name.clone(), engine).is_some() {
            tracing::warn!(engine = %name, "replacing previously registered engine");
        }
        self
    }

    pub fn default_engine(mut self, name: &str) -> Self {
        self.registry.default_engine = Some(name.to_string());
        self
    }

    pub fn default_stages(mut self, names: Vec<String>) -> Self {
        self.registry.default_stages = names;
        self
    }

    pub fn build(self) -> Registry {
        let registry = self.registry;
        if let Some(engine) = &registry.default_engine
            && !registry.has_engine(engine)
        {
            tracing::warn!(engine = %engine, "default engine is not registered");
        }
        for stage in &registry.default_stages {
            if !registry.has_stage(stage) {
                tracing::warn!(stage = %stage, "default stage is not registered");
            }
        }
        registry
    }
}

/// Handle to the current registry snapshot, cheap to clone and share.
#[derive(Debug, Clone)]
pub struct SharedRegistry {
    current: Arc<RwLock<Arc<Registry>>>,
}

impl SharedRegistry {
    pub fn new(registry: Registry) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(registry))),
        }
    }

    /// The registry as of now. Later swaps do not affect the returned value.
    pub fn snapshot(&self) -> Arc<Registry> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Atomically install `registry`, returning the previous snapshot.
    pub fn replace(&self, registry: Registry) -> Arc<Registry> {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, Arc::new(registry))
    }
}

impl From<Registry> for SharedRegistry {
    fn from(registry: Registry) -> Self {
        Self::new(registry)
    }
}
