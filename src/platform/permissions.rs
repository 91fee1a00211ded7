use std::collections::HashSet;
use std::sync::RwLock;

use super::{Capability, PermissionAuthority};

/// Permission authority backed by an in-memory grant set.
///
/// Hosts forward permission dialog results through [`grant`](Self::grant)
/// and [`revoke`](Self::revoke).
#[derive(Debug, Default)]
pub struct StaticPermissions {
    granted: RwLock<HashSet<Capability>>,
}

impl StaticPermissions {
    pub fn new(granted: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            granted: RwLock::new(granted.into_iter().collect()),
        }
    }

    pub fn grant(&self, capability: Capability) {
        self.granted
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(capability);
    }

    #[allow(dead_code)]
    pub fn revoke(&self, capability: Capability) {
        self.granted
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&capability);
    }

    pub fn revoke_all(&self) {
        self.granted
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl PermissionAuthority for StaticPermissions {
    fn has_capability(&self, capability: Capability) -> bool {
        self.granted
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::location_permitted;

    #[test]
    fn coarse_location_alone_is_enough() {
        let permissions = StaticPermissions::new([Capability::CoarseLocation]);
        assert!(location_permitted(&permissions));

        permissions.revoke(Capability::CoarseLocation);
        assert!(!location_permitted(&permissions));

        permissions.grant(Capability::FineLocation);
        assert!(location_permitted(&permissions));
    }
}
