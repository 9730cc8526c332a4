//! Artifact identity and descriptors.
//!
//! An artifact is addressed by a namespace and a leaf name. The namespace
//! selects the subdirectory under the local root, the leaf is the file name:
//! `debian:rootfs.tar.gz` lives at `<root>/debian/rootfs.tar.gz`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::{Error, Result};

/// Separator between namespace and leaf in the textual form of an id.
pub const ID_SEPARATOR: char = ':';

/// Structured artifact identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactId {
    namespace: String,
    leaf: String,
}

impl ArtifactId {
    /// Build an id from its parts, rejecting segments that cannot be used as
    /// a single path component.
    pub fn new(namespace: impl Into<String>, leaf: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        let leaf = leaf.into();
        check_segment(&namespace, "namespace", &namespace, &leaf)?;
        check_segment(&leaf, "leaf", &namespace, &leaf)?;
        Ok(Self { namespace, leaf })
    }

    /// For compile-time constant ids that are known to be well formed.
    pub(crate) fn from_static(namespace: &'static str, leaf: &'static str) -> Self {
        Self {
            namespace: namespace.to_string(),
            leaf: leaf.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn leaf(&self) -> &str {
        &self.leaf
    }

    /// Where this artifact lives once installed: `root/namespace/leaf`.
    pub fn local_path(&self, root: &Path) -> PathBuf {
        root.join(&self.namespace).join(&self.leaf)
    }
}

fn check_segment(segment: &str, what: &str, namespace: &str, leaf: &str) -> Result<()> {
    let reason = if segment.is_empty() {
        Some("is empty")
    } else if segment == "." || segment == ".." {
        Some("is a relative path component")
    } else if segment.contains(['/', '\\']) {
        Some("contains a path separator")
    } else if segment.contains(ID_SEPARATOR) {
        Some("contains the id separator")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::InvalidArtifactId(format!(
            "{}{}{}: {} {}",
            namespace, ID_SEPARATOR, leaf, what, reason
        ))),
        None => Ok(()),
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.namespace, ID_SEPARATOR, self.leaf)
    }
}

impl FromStr for ArtifactId {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let (namespace, leaf) = raw.split_once(ID_SEPARATOR).ok_or_else(|| {
            Error::InvalidArtifactId(format!(
                "{}: expected <namespace>{}<leaf>",
                raw, ID_SEPARATOR
            ))
        })?;
        Self::new(namespace, leaf)
    }
}

impl TryFrom<String> for ArtifactId {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self> {
        raw.parse()
    }
}

impl From<ArtifactId> for String {
    fn from(id: ArtifactId) -> Self {
        id.to_string()
    }
}

/// Size classification used by network gating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    #[default]
    Small,
    /// Bulk filesystem archives and anything else too big for a metered link.
    Large,
}

impl SizeClass {
    /// Naming-convention fallback for entries that do not declare a class.
    /// Applied once when a descriptor is built from configuration.
    pub fn classify_leaf(leaf: &str) -> Self {
        if leaf.contains("rootfs") {
            SizeClass::Large
        } else {
            SizeClass::Small
        }
    }

    pub fn is_large(self) -> bool {
        self == SizeClass::Large
    }
}

/// One fetchable unit: where it comes from and how big it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    pub id: ArtifactId,
    /// URL the bytes are retrieved from.
    pub source: String,
    pub size: SizeClass,
}

impl ArtifactDescriptor {
    pub fn new(id: ArtifactId, source: impl Into<String>, size: SizeClass) -> Self {
        Self {
            id,
            source: source.into(),
            size,
        }
    }

    pub fn small(id: ArtifactId, source: impl Into<String>) -> Self {
        Self::new(id, source, SizeClass::Small)
    }

    pub fn large(id: ArtifactId, source: impl Into<String>) -> Self {
        Self::new(id, source, SizeClass::Large)
    }

    pub fn is_large(&self) -> bool {
        self.size.is_large()
    }

    pub fn local_path(&self, root: &Path) -> PathBuf {
        self.id.local_path(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let id: ArtifactId = "debian:rootfs.tar.gz".parse().unwrap();
        assert_eq!(id.namespace(), "debian");
        assert_eq!(id.leaf(), "rootfs.tar.gz");
        assert_eq!(id.to_string(), "debian:rootfs.tar.gz");
    }

    #[test]
    fn local_path_is_namespaced() {
        let id = ArtifactId::new("support", "libtalloc.so.2").unwrap();
        assert_eq!(
            id.local_path(Path::new("/data/files")),
            PathBuf::from("/data/files/support/libtalloc.so.2")
        );
    }

    #[test]
    fn rejects_malformed_ids() {
        for raw in [
            "busybox",
            ":busybox",
            "debian:",
            "debian:a:b",
            "deb/ian:busybox",
            "debian:../busybox",
            "..:busybox",
            "debian:.",
        ] {
            assert!(
                matches!(raw.parse::<ArtifactId>(), Err(Error::InvalidArtifactId(_))),
                "{raw} accepted"
            );
        }
    }

    #[test]
    fn serde_uses_textual_form() {
        let id = ArtifactId::new("support", "proot").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"support:proot\"");

        let back: ArtifactId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        assert!(serde_json::from_str::<ArtifactId>("\"proot\"").is_err());
    }

    #[test]
    fn classify_leaf_fallback() {
        assert_eq!(SizeClass::classify_leaf("rootfs.tar.gz"), SizeClass::Large);
        assert_eq!(SizeClass::classify_leaf("alpine-rootfs.img"), SizeClass::Large);
        assert_eq!(SizeClass::classify_leaf("busybox"), SizeClass::Small);
    }

    #[test]
    fn explicit_size_wins_over_name() {
        let id = ArtifactId::new("debian", "rootfs.tar.gz").unwrap();
        let d = ArtifactDescriptor::small(id, "https://example.com/rootfs.tar.gz");
        assert!(!d.is_large());
    }
}
