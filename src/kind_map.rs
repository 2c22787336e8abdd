//! Maps the local container resource types to the kinds that the provider api knows them by.
//!
//! ```
//! use container_sync::kind_map::kind_in_provider;
//!
//! assert_eq!(Some("ReplicationController"), kind_in_provider("ContainerReplicator"));
//! assert_eq!(None, kind_in_provider("ContainerNode"));
//! ```
use std::fmt::{self, Display};

/// The local resource types that have a counterpart in the provider api
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerResourceType {
    ContainerBuild,
    ContainerBuildPod,
    ContainerGroup,
    ContainerLimit,
    ContainerQuota,
    ContainerReplicator,
    ContainerRoute,
    PersistentVolumeClaim,
    ContainerImage,
    ContainerService,
}

impl ContainerResourceType {
    pub const ALL: &'static [ContainerResourceType] = &[
        ContainerResourceType::ContainerBuild,
        ContainerResourceType::ContainerBuildPod,
        ContainerResourceType::ContainerGroup,
        ContainerResourceType::ContainerLimit,
        ContainerResourceType::ContainerQuota,
        ContainerResourceType::ContainerReplicator,
        ContainerResourceType::ContainerRoute,
        ContainerResourceType::PersistentVolumeClaim,
        ContainerResourceType::ContainerImage,
        ContainerResourceType::ContainerService,
    ];

    /// Looks up a type by its local type name, for example `"ContainerService"`
    pub fn from_type_name(type_name: &str) -> Option<ContainerResourceType> {
        ContainerResourceType::ALL
            .iter()
            .copied()
            .find(|t| t.type_name() == type_name)
    }

    pub fn type_name(self) -> &'static str {
        match self {
            ContainerResourceType::ContainerBuild => "ContainerBuild",
            ContainerResourceType::ContainerBuildPod => "ContainerBuildPod",
            ContainerResourceType::ContainerGroup => "ContainerGroup",
            ContainerResourceType::ContainerLimit => "ContainerLimit",
            ContainerResourceType::ContainerQuota => "ContainerQuota",
            ContainerResourceType::ContainerReplicator => "ContainerReplicator",
            ContainerResourceType::ContainerRoute => "ContainerRoute",
            ContainerResourceType::PersistentVolumeClaim => "PersistentVolumeClaim",
            ContainerResourceType::ContainerImage => "ContainerImage",
            ContainerResourceType::ContainerService => "ContainerService",
        }
    }

    pub fn kind_in_provider(self) -> &'static str {
        match self {
            ContainerResourceType::ContainerBuild => "BuildConfig",
            ContainerResourceType::ContainerBuildPod => "Build",
            ContainerResourceType::ContainerGroup => "Pod",
            ContainerResourceType::ContainerLimit => "LimitRange",
            ContainerResourceType::ContainerQuota => "ResourceQuota",
            ContainerResourceType::ContainerReplicator => "ReplicationController",
            ContainerResourceType::ContainerRoute => "Route",
            ContainerResourceType::PersistentVolumeClaim => "PersistentVolumeClaim",
            ContainerResourceType::ContainerImage => "Image",
            ContainerResourceType::ContainerService => "Service",
        }
    }
}

impl Display for ContainerResourceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Returns the provider kind for the given local type name, or `None` if the type isn't mapped.
/// A miss means the mapping is incomplete for this deployment, and callers must not carry on
/// as if the resource had some default kind.
pub fn kind_in_provider(local_type_name: &str) -> Option<&'static str> {
    ContainerResourceType::from_type_name(local_type_name).map(ContainerResourceType::kind_in_provider)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn maps_every_known_type() {
        let expected = [
            ("ContainerBuild", "BuildConfig"),
            ("ContainerBuildPod", "Build"),
            ("ContainerGroup", "Pod"),
            ("ContainerLimit", "LimitRange"),
            ("ContainerQuota", "ResourceQuota"),
            ("ContainerReplicator", "ReplicationController"),
            ("ContainerRoute", "Route"),
            ("PersistentVolumeClaim", "PersistentVolumeClaim"),
            ("ContainerImage", "Image"),
            ("ContainerService", "Service"),
        ];
        for (local, kind) in expected.iter() {
            assert_eq!(Some(*kind), kind_in_provider(local));
            // repeated lookups always agree
            assert_eq!(kind_in_provider(local), kind_in_provider(local));
        }
        assert_eq!(expected.len(), ContainerResourceType::ALL.len());
    }

    #[test]
    fn unmapped_types_are_a_miss() {
        assert_eq!(None, kind_in_provider("ContainerNode"));
        assert_eq!(None, kind_in_provider("containerservice"));
        assert_eq!(None, kind_in_provider(""));
    }

    #[test]
    fn type_names_round_trip() {
        for t in ContainerResourceType::ALL {
            assert_eq!(Some(*t), ContainerResourceType::from_type_name(t.type_name()));
        }
    }
}
