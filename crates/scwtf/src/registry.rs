//! Resource kinds known to the provider
//!
//! Built once at startup from a [`Features`] value and never mutated.

use crate::resource::{DynamicResource, Resource, Typed};
use crate::resources::{
    DomainZone, InstanceIp, Object, ObjectBucket, ObjectBucketLockConfiguration,
    ObjectBucketPolicy, RdbDatabase, RdbInstance,
};
use scwtf_config::Meta;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Feature flags merged into the registry at construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Features {
    pub beta: bool,
}

impl Features {
    pub fn from_meta(meta: &Meta) -> Self {
        Self {
            beta: meta.enable_beta(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registry {
    features: Features,
    resources: BTreeMap<&'static str, Arc<dyn DynamicResource>>,
}

impl Registry {
    pub fn new(features: Features) -> Self {
        let mut registry = Self {
            features,
            resources: BTreeMap::new(),
        };
        registry.register(InstanceIp);
        registry.register(RdbInstance);
        registry.register(RdbDatabase);
        registry.register(DomainZone);
        registry.register(ObjectBucket);
        registry.register(ObjectBucketLockConfiguration);
        registry.register(Object);
        registry.register(ObjectBucketPolicy);
        registry
    }

    fn register<R: Resource>(&mut self, resource: R) {
        if resource.is_beta() && !self.features.beta {
            debug!(kind = R::KIND, "Beta resource not registered");
            return;
        }
        self.resources.insert(R::KIND, Arc::new(Typed(resource)));
    }

    pub fn features(&self) -> Features {
        self.features
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn DynamicResource>> {
        self.resources.get(kind).cloned()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }

    /// Resources able to purge leftovers of test runs
    pub fn sweepers(&self) -> impl Iterator<Item = Arc<dyn DynamicResource>> + '_ {
        self.resources
            .values()
            .filter(|r| r.has_sweeper())
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beta_kinds_need_the_flag() {
        let stable = Registry::new(Features::default());
        assert!(stable.get("scaleway_object_bucket_policy").is_none());
        assert!(stable.get("scaleway_object_bucket").is_some());

        let beta = Registry::new(Features { beta: true });
        assert!(beta.get("scaleway_object_bucket_policy").is_some());
        assert_eq!(beta.len(), stable.len() + 1);
    }

    #[test]
    fn test_sweepers() {
        let registry = Registry::new(Features::default());
        let kinds: Vec<_> = registry.sweepers().map(|r| r.kind()).collect();
        assert_eq!(kinds, vec!["scaleway_instance_ip", "scaleway_rdb_instance"]);
    }
}
