use super::search_client::SearchClient;
use crate::backend::{create_backend, IndexBackend};
use crate::codec::{DocumentCodec, JsonCodec};
use crate::config::{ClientSettings, Config};
use crate::error::{ClientError, Result};
use crate::schema::{EntityDescriptor, SearchableEntity};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds and holds one client per registered entity type.
///
/// All clients share one backend and one set of settings. Entity types are
/// registered explicitly; nothing is discovered implicitly.
pub struct ClientRegistry {
    backend: Arc<dyn IndexBackend>,
    settings: ClientSettings,
    clients: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    indexes: HashMap<String, &'static str>,
}

impl ClientRegistry {
    pub fn new(backend: Arc<dyn IndexBackend>, settings: ClientSettings) -> Self {
        Self {
            backend,
            settings,
            clients: HashMap::new(),
            indexes: HashMap::new(),
        }
    }

    /// Registry over the backend named in the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let backend = create_backend(&config.backend)?;
        Ok(Self::new(backend, config.client.clone()))
    }

    /// Register an entity type using the JSON codec
    pub fn register<E: SearchableEntity>(
        &mut self,
        descriptor: EntityDescriptor<E>,
    ) -> Result<SearchClient<E>> {
        let codec = Arc::new(JsonCodec::<E>::new(self.settings.use_compression));
        self.register_with_codec(descriptor, codec)
    }

    pub fn register_with_codec<E: SearchableEntity>(
        &mut self,
        descriptor: EntityDescriptor<E>,
        codec: Arc<dyn DocumentCodec<E>>,
    ) -> Result<SearchClient<E>> {
        let type_name = std::any::type_name::<E>();

        if let Some(existing) = self.indexes.get(descriptor.index_name()) {
            return Err(ClientError::Configuration(format!(
                "index '{}' is already registered for {}",
                descriptor.index_name(),
                existing
            )));
        }
        if self.clients.contains_key(&TypeId::of::<E>()) {
            return Err(ClientError::Configuration(format!(
                "{} is already registered",
                type_name
            )));
        }

        let index = descriptor.index_name().to_string();
        let client = SearchClient::new(
            Arc::clone(&self.backend),
            codec,
            descriptor,
            self.settings.clone(),
        )?;

        tracing::info!(index = %index, entity = type_name, "Registered search client");
        self.indexes.insert(index, type_name);
        self.clients
            .insert(TypeId::of::<E>(), Box::new(client.clone()));
        Ok(client)
    }

    /// Client for a registered entity type
    pub fn client<E: SearchableEntity>(&self) -> Option<SearchClient<E>> {
        self.clients
            .get(&TypeId::of::<E>())
            .and_then(|client| client.downcast_ref::<SearchClient<E>>())
            .cloned()
    }

    pub fn index_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.indexes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn backend(&self) -> &Arc<dyn IndexBackend> {
        &self.backend
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("backend", &self.backend.name())
            .field("indexes", &self.index_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::create_memory_backend;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Brand {
        id: String,
        name: String,
    }

    impl SearchableEntity for Brand {
        fn persistence_key(&self) -> String {
            self.id.clone()
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Store {
        id: String,
        city: String,
    }

    impl SearchableEntity for Store {
        fn persistence_key(&self) -> String {
            self.id.clone()
        }
    }

    fn brand_descriptor(index: &str) -> EntityDescriptor<Brand> {
        EntityDescriptor::builder(index)
            .text("name", |b: &Brand| Some(b.name.clone()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ClientRegistry::new(create_memory_backend(), ClientSettings::default());
        registry.register(brand_descriptor("brand")).unwrap();
        registry
            .register(
                EntityDescriptor::builder("store")
                    .tag("city", |s: &Store| Some(s.city.clone()))
                    .build()
                    .unwrap(),
            )
            .unwrap();

        assert_eq!(registry.index_names(), vec!["brand", "store"]);

        let brands = registry.client::<Brand>().unwrap();
        brands
            .save(&Brand {
                id: "b1".to_string(),
                name: "Acme".to_string(),
            })
            .unwrap();

        // Clients share the backend, so a second lookup sees the write
        let again = registry.client::<Brand>().unwrap();
        assert!(again.find_by_key("b1").unwrap().is_some());
        assert!(registry.backend().index_exists("store").unwrap());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ClientRegistry::new(create_memory_backend(), ClientSettings::default());
        registry.register(brand_descriptor("brand")).unwrap();

        let same_type = registry.register(brand_descriptor("brand_v2"));
        assert!(matches!(same_type, Err(ClientError::Configuration(_))));

        let same_index = registry.register(
            EntityDescriptor::builder("brand")
                .tag("city", |s: &Store| Some(s.city.clone()))
                .build()
                .unwrap(),
        );
        assert!(matches!(same_index, Err(ClientError::Configuration(_))));
        assert!(registry.client::<Store>().is_none());
    }

    #[test]
    fn test_from_config_uses_configured_backend() {
        let registry = ClientRegistry::from_config(&Config::defaults().unwrap()).unwrap();
        assert_eq!(registry.backend().name(), "memory");
        assert_eq!(registry.settings().page_size, 1000);
    }
}
