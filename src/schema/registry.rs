//! Schema registry — validated-once descriptor cache
//!
//! The registry is the engine's only shared mutable state. Each entity type
//! is derived and validated at most once; the outcome is cached, including a
//! `Configuration` failure, which is replayed identically on every later
//! call rather than silently recovered from. Concurrent first use from
//! multiple tasks is resolved by idempotent overwrite: derivation is a pure
//! function of the type, so whichever writer lands last stores the same
//! result.

use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::error::OrmResult;
use crate::schema::descriptor::EntityDescriptor;

/// A persisted entity type. Implementors declare their shape once; the
/// engine derives column lists, binding, joins, and mapping from it.
pub trait Entity: Send + Sync + 'static {
    /// The entity's declared schema. Called at most once per registry;
    /// validation happens in the registry, not here.
    fn descriptor() -> EntityDescriptor;
}

/// Explicit, constructed-once descriptor cache.
///
/// Engines take a registry at construction so tests can run with independent
/// registries per case; [`SchemaRegistry::global`] covers the common
/// one-per-process deployment.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    by_type: DashMap<TypeId, OrmResult<Arc<EntityDescriptor>>>,
    by_table: DashMap<String, Arc<EntityDescriptor>>,
}

static GLOBAL: Lazy<SchemaRegistry> = Lazy::new(SchemaRegistry::new);

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static SchemaRegistry {
        &GLOBAL
    }

    /// Validated descriptor for `E`, derived on first use and cached for the
    /// registry's lifetime. A validation failure is cached too and returned
    /// on every subsequent call.
    pub fn descriptor<E: Entity>(&self) -> OrmResult<Arc<EntityDescriptor>> {
        if let Some(cached) = self.by_type.get(&TypeId::of::<E>()) {
            return cached.clone();
        }

        let outcome = E::descriptor().validate().map(Arc::new);
        if let Ok(desc) = &outcome {
            self.by_table.insert(desc.table.clone(), Arc::clone(desc));
        }
        self.by_type.insert(TypeId::of::<E>(), outcome.clone());
        outcome
    }

    /// Descriptor previously registered for the given table, used to
    /// enumerate join columns for relationship targets.
    pub fn descriptor_for_table(&self, table: &str) -> Option<Arc<EntityDescriptor>> {
        self.by_table.get(table).map(|entry| Arc::clone(&entry))
    }
}
