//! Matcher lifecycle: built from the store, swapped whole on every
//! enrollment change.

use presencia_core::{Descriptor, EnrolledIdentity, FaceMatcher};
use presencia_store::{Store, StoreError};
use std::sync::RwLock;

/// Build a fresh nearest-neighbor index from every enrolled user with a
/// usable descriptor set.
pub fn build_matcher(store: &Store) -> Result<FaceMatcher, StoreError> {
    let identities: Vec<EnrolledIdentity> = store
        .list_users()?
        .into_iter()
        .filter(|user| !user.descriptors.is_empty())
        .map(|user| EnrolledIdentity {
            dni: user.dni,
            descriptors: user.descriptors.into_iter().map(Descriptor::new).collect(),
        })
        .collect();

    tracing::debug!(identities = identities.len(), "rebuilt face matcher");
    Ok(FaceMatcher::build(&identities))
}

/// Rebuild and atomically swap the shared matcher. Called synchronously
/// by whatever mutated the user set, before that mutation is reported
/// back to its caller.
pub fn swap_matcher(slot: &RwLock<FaceMatcher>, store: &Store) -> Result<(), StoreError> {
    let fresh = build_matcher(store)?;
    *slot.write().unwrap_or_else(|e| e.into_inner()) = fresh;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use presencia_core::MatchOutcome;
    use presencia_store::UserProfile;

    #[test]
    fn test_swap_tracks_enrollment_changes() {
        let store = Store::open_in_memory().unwrap();
        let slot = RwLock::new(build_matcher(&store).unwrap());
        let probe = Descriptor::new(vec![0.5, 0.5]);
        assert_eq!(slot.read().unwrap().classify(&probe), MatchOutcome::NoneEnrolled);

        let id = store
            .insert_user(&UserProfile {
                dni: "1".into(),
                name: "Ana".into(),
                descriptors: vec![vec![0.5, 0.5]],
                ..Default::default()
            })
            .unwrap();
        swap_matcher(&slot, &store).unwrap();
        assert!(slot.read().unwrap().classify(&probe).is_confident());

        store.delete_user(id).unwrap();
        swap_matcher(&slot, &store).unwrap();
        assert_eq!(slot.read().unwrap().classify(&probe), MatchOutcome::NoneEnrolled);
    }

    #[test]
    fn test_users_without_descriptors_are_skipped() {
        let store = Store::open_in_memory().unwrap();
        store
            .insert_user(&UserProfile { dni: "1".into(), name: "Sin perfil".into(), ..Default::default() })
            .unwrap();
        let matcher = build_matcher(&store).unwrap();
        assert!(matcher.is_empty());
    }
}
