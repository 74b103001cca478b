use crate::{
    ColumnDesc, CommandIdentity, ConventionMapper, Error, ErrorAction, ErrorHook, FromRow,
    MapperCache, MappingConfig, Materializer, MaterializerKey, Record, RecordDef, Result,
    TypeMetadata, build_materializer, truncate_long,
};
use std::{
    any::{Any, TypeId},
    fmt::{self, Debug},
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

/// One mapping configuration together with every cache derived from it.
///
/// A state never changes configuration, [`Mapper::reconfigure`] swaps in a new one. Readers that
/// hold the previous state finish with it.
pub struct MapperState {
    config: Arc<dyn MappingConfig>,
    cache: MapperCache,
    generation: u64,
}

impl MapperState {
    fn new(config: Arc<dyn MappingConfig>, generation: u64) -> Self {
        Self {
            config,
            cache: MapperCache::default(),
            generation,
        }
    }

    pub fn config(&self) -> &dyn MappingConfig {
        self.config.as_ref()
    }

    pub fn cache(&self) -> &MapperCache {
        &self.cache
    }

    /// Incremented by every flush or reconfiguration.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn metadata<T: Record>(&self) -> Result<Arc<TypeMetadata<T>>> {
        self.metadata_for(T::record_def())
    }

    pub fn metadata_for<T: Send + 'static>(
        &self,
        def: &'static RecordDef<T>,
    ) -> Result<Arc<TypeMetadata<T>>> {
        let erased = self.cache.metadata.get_or_try_build(
            &TypeId::of::<T>(),
            |_| true,
            || {
                let metadata: Arc<dyn Any + Send + Sync> =
                    Arc::new(TypeMetadata::build(def, self.config.as_ref())?);
                Ok(metadata)
            },
        )?;
        erased
            .downcast::<TypeMetadata<T>>()
            .map_err(|_| Error::msg(format!("Cached metadata of {} has the wrong type", def.name)))
    }

    /// Materializer of `T` for `columns`, the range of the result shape starting at `offset`.
    pub fn materializer<T: FromRow>(
        &self,
        command: &CommandIdentity,
        columns: &[ColumnDesc],
        offset: usize,
    ) -> Result<Arc<dyn Materializer>> {
        let key = MaterializerKey {
            type_id: TypeId::of::<T>(),
            command: command.clone(),
            offset,
            count: columns.len(),
        };
        self.cache.materializers.get_or_try_build(
            &key,
            |m| m.columns() == columns,
            || {
                log::debug!(
                    "Building the materializer of {} for columns {}..{} of: {}",
                    std::any::type_name::<T>(),
                    offset,
                    offset + columns.len(),
                    truncate_long!(command.sql),
                );
                build_materializer::<T>(self, columns)
            },
        )
    }
}

impl Debug for MapperState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperState")
            .field("generation", &self.generation)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Entry point of the mapping engine: owns the configuration, its caches and the error hook.
///
/// Share it behind an `Arc`, cursors keep a reference to it.
pub struct Mapper {
    state: RwLock<Arc<MapperState>>,
    generation: AtomicU64,
    on_error: RwLock<Option<ErrorHook>>,
}

impl Mapper {
    pub fn new(config: impl MappingConfig + 'static) -> Self {
        Self {
            state: RwLock::new(Arc::new(MapperState::new(Arc::new(config), 0))),
            generation: AtomicU64::new(0),
            on_error: RwLock::new(None),
        }
    }

    /// Current configuration and caches.
    pub fn snapshot(&self) -> Arc<MapperState> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Installs a new configuration, every derived cache is dropped at once.
    pub fn reconfigure(&self, config: impl MappingConfig + 'static) {
        self.replace(Arc::new(config));
    }

    /// Drops every cache, keeping the configuration.
    pub fn flush(&self) {
        let config = self.snapshot().config.clone();
        self.replace(config);
    }

    fn replace(&self, config: Arc<dyn MappingConfig>) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let state = Arc::new(MapperState::new(config, generation));
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
        log::debug!("Mapping caches flushed, generation {generation}");
    }

    pub fn metadata<T: Record>(&self) -> Result<Arc<TypeMetadata<T>>> {
        self.snapshot().metadata::<T>()
    }

    /// Installs the hook deciding whether errors met while streaming rows reach the caller.
    pub fn on_error(&self, hook: impl Fn(&Error) -> ErrorAction + Send + Sync + 'static) {
        *self.on_error.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(hook));
    }

    pub fn clear_error_hook(&self) {
        *self.on_error.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub(crate) fn handle_error(&self, error: &Error) -> ErrorAction {
        let hook = self
            .on_error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match hook {
            Some(hook) => hook(error),
            None => ErrorAction::Propagate,
        }
    }
}

impl Default for Mapper {
    fn default() -> Self {
        Self::new(ConventionMapper::default())
    }
}

impl Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("state", &self.snapshot())
            .finish()
    }
}
