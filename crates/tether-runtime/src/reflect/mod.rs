//! Reflection policy layer
//!
//! Built-in templates that expose host values to scripts without a
//! hand-written template per type:
//!
//! - instances of types described in a [`TypeCatalog`] get their
//!   properties and methods
//! - [`HostType`] values expose static members and construct instances
//!   when called
//! - [`HostFunction`] values are callable
//! - [`HostDictionary`] values read like plain objects keyed by string
//!
//! Each kind is enabled separately in [`ReflectionConfig`] and can be
//! narrowed with a filter. The reflection templates are consulted after
//! the templates a context is configured with.

mod descriptor;
mod dictionary;
mod function;
mod templates;

use std::fmt;
use std::sync::Arc;

pub use descriptor::{
    DisplayFn, Getter, Method, PropertyDescriptor, Setter, StaticGetter, StaticMethod,
    TypeCatalog, TypeDescriptor, TypeDescriptorBuilder,
};
pub use dictionary::HostDictionary;
pub use function::{BoundMethod, HostFunction, HostType};

use crate::template::HostObjectTemplate;
use crate::value::HostObject;

/// What happens when script code touches a member a type does not have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingMemberPolicy {
    /// Fall through to the proxy's own property storage
    #[default]
    Ignore,
    /// Throw a `TypeError` into the script
    Throw,
}

pub type ExposureFilter = Arc<dyn Fn(&HostObject) -> bool + Send + Sync>;

/// Whether one kind of host value is exposed, and to which objects
#[derive(Clone)]
pub struct Exposure {
    pub enabled: bool,
    pub filter: Option<ExposureFilter>,
}

impl Exposure {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            filter: None,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            filter: None,
        }
    }

    /// Only expose objects accepted by `filter`
    pub fn with_filter(mut self, filter: impl Fn(&HostObject) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn allows(&self, object: &HostObject) -> bool {
        self.enabled && self.filter.as_ref().map_or(true, |filter| filter(object))
    }
}

impl Default for Exposure {
    fn default() -> Self {
        Self::enabled()
    }
}

impl fmt::Debug for Exposure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exposure")
            .field("enabled", &self.enabled)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ReflectionConfig {
    /// Instances of catalogued types
    pub objects: Exposure,
    /// [`HostType`] values
    pub types: Exposure,
    /// [`HostFunction`] values
    pub functions: Exposure,
    /// [`HostDictionary`] values
    pub dictionaries: Exposure,
    pub missing_members: MissingMemberPolicy,
    /// Where instance descriptors are looked up
    pub catalog: Arc<TypeCatalog>,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            objects: Exposure::enabled(),
            types: Exposure::enabled(),
            functions: Exposure::enabled(),
            dictionaries: Exposure::enabled(),
            missing_members: MissingMemberPolicy::Ignore,
            catalog: TypeCatalog::global(),
        }
    }
}

impl ReflectionConfig {
    /// Nothing is exposed by reflection
    pub fn disabled() -> Self {
        Self {
            objects: Exposure::disabled(),
            types: Exposure::disabled(),
            functions: Exposure::disabled(),
            dictionaries: Exposure::disabled(),
            ..Self::default()
        }
    }

    pub fn with_objects(mut self, exposure: Exposure) -> Self {
        self.objects = exposure;
        self
    }

    pub fn with_types(mut self, exposure: Exposure) -> Self {
        self.types = exposure;
        self
    }

    pub fn with_functions(mut self, exposure: Exposure) -> Self {
        self.functions = exposure;
        self
    }

    pub fn with_dictionaries(mut self, exposure: Exposure) -> Self {
        self.dictionaries = exposure;
        self
    }

    pub fn with_missing_members(mut self, policy: MissingMemberPolicy) -> Self {
        self.missing_members = policy;
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<TypeCatalog>) -> Self {
        self.catalog = catalog;
        self
    }
}

/// Templates for the enabled kinds, in selection order
pub(crate) fn templates(config: &ReflectionConfig) -> Vec<Arc<HostObjectTemplate>> {
    let mut list = Vec::new();
    if config.functions.enabled {
        list.push(templates::function_template(config.functions.clone()));
    }
    if config.objects.enabled || config.types.enabled {
        list.push(templates::bound_method_template());
    }
    if config.types.enabled {
        list.push(templates::type_template(
            config.types.clone(),
            config.missing_members,
        ));
    }
    if config.objects.enabled {
        list.push(templates::object_template(
            config.catalog.clone(),
            config.objects.clone(),
            config.missing_members,
        ));
    }
    if config.dictionaries.enabled {
        list.push(dictionary::dictionary_template(
            config.dictionaries.clone(),
            config.missing_members,
        ));
    }
    list.into_iter().map(Arc::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exposure_filter() {
        let exposure = Exposure::enabled().with_filter(|object| object.is::<u8>());
        assert!(exposure.allows(&HostObject::new(1_u8)));
        assert!(!exposure.allows(&HostObject::new(1_u16)));
        assert!(!Exposure::disabled().allows(&HostObject::new(1_u8)));
    }

    #[test]
    fn test_templates_follow_enabled_kinds() {
        let names = |config: &ReflectionConfig| -> Vec<String> {
            templates(config).iter().map(|t| t.name().to_string()).collect()
        };
        assert_eq!(
            names(&ReflectionConfig::default()),
            vec![
                "host-function",
                "host-method",
                "host-type",
                "host-object",
                "host-dictionary"
            ]
        );
        assert!(names(&ReflectionConfig::disabled()).is_empty());
        assert_eq!(
            names(&ReflectionConfig::disabled().with_functions(Exposure::enabled())),
            vec!["host-function"]
        );
        assert_eq!(
            names(&ReflectionConfig::disabled().with_dictionaries(Exposure::enabled())),
            vec!["host-dictionary"]
        );
    }
}
