//! Requirement resolution: which catalog entries still need fetching.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::artifact::ArtifactDescriptor;
use crate::catalog::ArtifactCatalog;
use crate::oracle::ExistenceOracle;
use crate::Result;

/// Filters a catalog down to the artifacts absent from local storage.
#[derive(Clone)]
pub struct RequirementResolver {
    local_root: PathBuf,
    oracle: Arc<dyn ExistenceOracle>,
}

impl RequirementResolver {
    pub fn new(local_root: impl Into<PathBuf>, oracle: Arc<dyn ExistenceOracle>) -> Self {
        Self {
            local_root: local_root.into(),
            oracle,
        }
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    /// The required set, in catalog order.
    ///
    /// An artifact is required iff the oracle reports its local path absent.
    /// The first oracle failure aborts resolution.
    pub fn resolve(&self, catalog: &ArtifactCatalog) -> Result<Vec<ArtifactDescriptor>> {
        let mut required = Vec::new();
        for descriptor in catalog {
            let path = descriptor.local_path(&self.local_root);
            if self.oracle.exists(&path)? {
                debug!(artifact = %descriptor.id, "present locally");
            } else {
                debug!(artifact = %descriptor.id, path = %path.display(), "missing");
                required.push(descriptor.clone());
            }
        }

        info!(
            catalog = catalog.len(),
            required = required.len(),
            "resolved requirements"
        );
        Ok(required)
    }
}
