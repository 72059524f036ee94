//! Tag family descriptors and the registry that owns their native handles.

use crate::config::TagFamily;
use crate::engine::DetectionEngine;
use crate::error::{Result, TagPoseError};

/// Static description of a tag family variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FamilyDescriptor {
    /// The variant this entry describes.
    pub family: TagFamily,
    /// Canonical AprilTag name (e.g. `tag36h11`).
    pub name: &'static str,
    /// Number of data bits in the code.
    pub bits: u32,
    /// Minimum hamming distance between codes.
    pub min_hamming: u32,
}

// Indexed by `TagFamily` discriminant; order must follow the enum declaration.
static FAMILY_TABLE: [FamilyDescriptor; 8] = [
    FamilyDescriptor {
        family: TagFamily::Tag16h5,
        name: "tag16h5",
        bits: 16,
        min_hamming: 5,
    },
    FamilyDescriptor {
        family: TagFamily::Tag25h9,
        name: "tag25h9",
        bits: 25,
        min_hamming: 9,
    },
    FamilyDescriptor {
        family: TagFamily::Tag36h11,
        name: "tag36h11",
        bits: 36,
        min_hamming: 11,
    },
    FamilyDescriptor {
        family: TagFamily::TagCircle21h7,
        name: "tagCircle21h7",
        bits: 21,
        min_hamming: 7,
    },
    FamilyDescriptor {
        family: TagFamily::TagCircle49h12,
        name: "tagCircle49h12",
        bits: 49,
        min_hamming: 12,
    },
    FamilyDescriptor {
        family: TagFamily::TagCustom48h12,
        name: "tagCustom48h12",
        bits: 48,
        min_hamming: 12,
    },
    FamilyDescriptor {
        family: TagFamily::TagStandard41h12,
        name: "tagStandard41h12",
        bits: 41,
        min_hamming: 12,
    },
    FamilyDescriptor {
        family: TagFamily::TagStandard52h13,
        name: "tagStandard52h13",
        bits: 52,
        min_hamming: 13,
    },
];

/// Descriptor for a family variant.
#[must_use]
pub fn descriptor(family: TagFamily) -> &'static FamilyDescriptor {
    &FAMILY_TABLE[family as usize]
}

/// Find a descriptor by its canonical name.
#[must_use]
pub fn lookup_by_name(name: &str) -> Option<&'static FamilyDescriptor> {
    FAMILY_TABLE.iter().find(|d| d.name == name)
}

/// Owns one native descriptor per requested family.
///
/// Requests are not deduplicated: asking for the same family twice creates two handles.
/// Each handle is stored next to its variant so teardown can pick the matching destructor.
pub struct FamilyRegistry<F> {
    entries: Vec<(TagFamily, F)>,
}

impl<F> FamilyRegistry<F> {
    /// Create a descriptor for every requested family.
    ///
    /// If any creation fails, the handles created so far are destroyed before the error is
    /// returned.
    pub fn create<E>(engine: &mut E, families: &[TagFamily]) -> Result<Self>
    where
        E: DetectionEngine<Family = F>,
    {
        let mut registry = Self {
            entries: Vec::with_capacity(families.len()),
        };
        for &family in families {
            match engine.create_family(descriptor(family)) {
                Some(handle) => registry.entries.push((family, handle)),
                None => {
                    registry.destroy(engine);
                    return Err(TagPoseError::FamilyCreationFailed { family });
                }
            }
        }
        Ok(registry)
    }

    /// Register every owned family with `detector`.
    pub fn register_with<E>(&self, engine: &mut E, detector: &mut E::Detector)
    where
        E: DetectionEngine<Family = F>,
    {
        for (family, handle) in &self.entries {
            tracing::debug!(family = %family, "registering tag family");
            engine.add_family(detector, descriptor(*family), handle);
        }
    }

    /// Destroy every handle exactly once, in registration order.
    pub fn destroy<E>(self, engine: &mut E)
    where
        E: DetectionEngine<Family = F>,
    {
        for (family, handle) in self.entries {
            tracing::debug!(family = %family, "destroying tag family");
            engine.destroy_family(descriptor(family), handle);
        }
    }

    /// Registered variants, in request order.
    #[must_use]
    pub fn families(&self) -> Vec<TagFamily> {
        self.entries.iter().map(|(family, _)| *family).collect()
    }

    /// Number of owned handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no family was requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedEngine;

    #[test]
    fn test_table_matches_enum_order() {
        for (i, &family) in TagFamily::all().iter().enumerate() {
            assert_eq!(FAMILY_TABLE[i].family, family);
            assert_eq!(descriptor(family).family, family);
        }
    }

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(
            lookup_by_name("tagStandard41h12").map(|d| d.family),
            Some(TagFamily::TagStandard41h12)
        );
        assert!(lookup_by_name("TAG36H11").is_none());
    }

    #[test]
    fn test_duplicates_are_not_merged() {
        let mut engine = ScriptedEngine::new();
        let registry = FamilyRegistry::create(
            &mut engine,
            &[TagFamily::Tag36h11, TagFamily::Tag36h11, TagFamily::Tag16h5],
        )
        .unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(engine.counters().live_families(), 3);

        registry.destroy(&mut engine);
        assert_eq!(engine.counters().live_families(), 0);
        assert_eq!(
            engine.counters().destroyed_families(),
            vec![TagFamily::Tag36h11, TagFamily::Tag36h11, TagFamily::Tag16h5]
        );
    }

    #[test]
    fn test_failed_creation_releases_partial_registry() {
        let mut engine = ScriptedEngine::new().failing_family(TagFamily::TagCircle21h7);
        let result = FamilyRegistry::create(
            &mut engine,
            &[TagFamily::Tag36h11, TagFamily::TagCircle21h7, TagFamily::Tag25h9],
        );
        assert!(matches!(
            result,
            Err(TagPoseError::FamilyCreationFailed {
                family: TagFamily::TagCircle21h7
            })
        ));
        assert_eq!(engine.counters().live_families(), 0);
        assert_eq!(
            engine.counters().destroyed_families(),
            vec![TagFamily::Tag36h11]
        );
    }
}
