//! The artifact catalog: which files a base install needs, plus the extra
//! files each distribution brings.
//!
//! Catalogs are values. [`ArtifactCatalog::extend`] never mutates the
//! receiver; it hands back a new catalog with the distribution's set
//! appended after the existing entries.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info};

use crate::artifact::{ArtifactDescriptor, ArtifactId, SizeClass};
use crate::{Error, Result};

const BUCKET_URL: &str = "https://s3-us-west-2.amazonaws.com/tech.ula.us.west.oregon";

/// Ordered, append-only set of artifact descriptors with unique ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactCatalog {
    entries: Vec<ArtifactDescriptor>,
}

/// What happened when a catalog was extended with a distribution tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    /// The tag was recognized and its set appended.
    Applied { tag: String, added: usize },
    /// The tag has no descriptor set; the catalog is unchanged.
    UnknownDistribution { tag: String },
}

impl ArtifactCatalog {
    /// Establish a catalog from its base set.
    pub fn compose(base: impl IntoIterator<Item = ArtifactDescriptor>) -> Result<Self> {
        let mut catalog = Self::default();
        catalog.append(base)?;
        Ok(catalog)
    }

    /// The built-in base install.
    pub fn builtin() -> Self {
        Self {
            entries: builtin_base(),
        }
    }

    /// Return a new catalog with the descriptor set for `tag` appended.
    ///
    /// Unknown tags mean "no extra requirements": the returned catalog equals
    /// `self` and the outcome says so.
    pub fn extend(&self, tag: &str, sets: &DistributionSets) -> Result<(Self, Extension)> {
        let Some(set) = sets.get(tag) else {
            debug!(tag, "no descriptor set for distribution");
            return Ok((
                self.clone(),
                Extension::UnknownDistribution {
                    tag: tag.to_string(),
                },
            ));
        };

        let mut extended = self.clone();
        let added = extended.append(set.iter().cloned())?;
        info!(tag, added, total = extended.len(), "catalog extended");
        Ok((
            extended,
            Extension::Applied {
                tag: tag.to_string(),
                added,
            },
        ))
    }

    fn append(&mut self, items: impl IntoIterator<Item = ArtifactDescriptor>) -> Result<usize> {
        let mut seen: HashSet<ArtifactId> = self.entries.iter().map(|d| d.id.clone()).collect();
        let mut added = Vec::new();
        for item in items {
            if !seen.insert(item.id.clone()) {
                return Err(Error::DuplicateArtifact(item.id));
            }
            added.push(item);
        }
        let count = added.len();
        self.entries.extend(added);
        Ok(count)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ArtifactDescriptor> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[ArtifactDescriptor] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &ArtifactId) -> Option<&ArtifactDescriptor> {
        self.entries.iter().find(|d| &d.id == id)
    }
}

impl<'a> IntoIterator for &'a ArtifactCatalog {
    type Item = &'a ArtifactDescriptor;
    type IntoIter = std::slice::Iter<'a, ArtifactDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Descriptor sets keyed by distribution tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionSets {
    sets: BTreeMap<String, Vec<ArtifactDescriptor>>,
}

impl DistributionSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// The distributions known out of the box (`debian`).
    pub fn builtin() -> Self {
        let mut sets = Self::new();
        sets.insert("debian", builtin_debian());
        sets
    }

    /// Register (or replace) the set for `tag`.
    pub fn insert(
        &mut self,
        tag: impl Into<String>,
        set: Vec<ArtifactDescriptor>,
    ) -> Option<Vec<ArtifactDescriptor>> {
        self.sets.insert(tag.into(), set)
    }

    pub fn get(&self, tag: &str) -> Option<&[ArtifactDescriptor]> {
        self.sets.get(tag).map(Vec::as_slice)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }
}

fn hosted(namespace: &'static str, leaf: &'static str, path: &str, size: SizeClass) -> ArtifactDescriptor {
    ArtifactDescriptor::new(
        ArtifactId::from_static(namespace, leaf),
        format!("{}/{}", BUCKET_URL, path),
        size,
    )
}

/// Support binaries and scripts every install needs.
pub fn builtin_base() -> Vec<ArtifactDescriptor> {
    use SizeClass::Small;
    vec![
        hosted("support", "proot", "mainSupport/arm/proot", Small),
        hosted("support", "busybox", "mainSupport/arm/busybox", Small),
        hosted("support", "libtalloc.so.2", "mainSupport/arm/libtalloc.so.2", Small),
        hosted("support", "execInProot.sh", "mainSupport/main/execInProot.sh", Small),
        hosted("support", "killProcTree.sh", "mainSupport/main/killProcTree.sh", Small),
        hosted(
            "support",
            "isServerInProcTree.sh",
            "mainSupport/main/isServerInProcTree.sh",
            Small,
        ),
    ]
}

/// Files specific to a Debian filesystem, including its root archive.
pub fn builtin_debian() -> Vec<ArtifactDescriptor> {
    use SizeClass::{Large, Small};
    vec![
        hosted("debian", "startSSHServer.sh", "debianSupport/main/startSSHServer.sh", Small),
        hosted(
            "debian",
            "extractFilesystem.sh",
            "debianSupport/main/extractFilesystem.sh",
            Small,
        ),
        hosted("debian", "busybox", "debianSupport/arm/busybox", Small),
        hosted(
            "debian",
            "libdisableselinux.so",
            "debianSupport/arm/libdisableselinux.so",
            Small,
        ),
        hosted("debian", "ld.so.preload", "debianSupport/main/ld.so.preload", Small),
        hosted("debian", "rootfs.tar.gz", "debianSupport/arm/rootfs.tar.gz", Large),
    ]
}
