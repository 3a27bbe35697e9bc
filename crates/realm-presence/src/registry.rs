//! The connection registry: which identity is behind which connection.
//!
//! # Deduplication invariant
//!
//! At most one entry per [`UserId`] exists at any time. Registering a user
//! who is already online removes the old entry *before* inserting the new
//! one, within the same call, so the invariant holds after every
//! transition.
//!
//! # Indexing
//!
//! Entries are keyed by connection. A secondary `UserId → ConnectionId`
//! index makes the "is this user already online?" check O(1); both maps
//! are only ever mutated together inside this type.

use std::collections::HashMap;

use realm_auth::{Identity, UserId};
use realm_transport::ConnectionId;

use crate::PresenceError;

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Primary map: connection → identity.
    entries: HashMap<ConnectionId, Identity>,

    /// Secondary index: user → the one connection they are online on.
    by_user: HashMap<UserId, ConnectionId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `identity` on `connection_id`.
    ///
    /// If the same user is already registered on another connection, that
    /// entry is removed first and its connection id is returned so the
    /// caller can close it. Re-registering on the same connection returns
    /// `None`.
    pub fn register(
        &mut self,
        connection_id: ConnectionId,
        identity: Identity,
    ) -> Option<ConnectionId> {
        let user_id = identity.user_id;

        let evicted = match self.by_user.get(&user_id) {
            Some(&existing) if existing != connection_id => {
                self.entries.remove(&existing);
                Some(existing)
            }
            _ => None,
        };

        // The connection may have been registered as someone else before.
        if let Some(previous) = self.entries.insert(connection_id, identity) {
            if previous.user_id != user_id
                && self.by_user.get(&previous.user_id) == Some(&connection_id)
            {
                self.by_user.remove(&previous.user_id);
            }
        }
        self.by_user.insert(user_id, connection_id);

        evicted
    }

    /// Removes and returns the entry for `connection_id`. No-op (returns
    /// `None`) when there is none, so calling it twice is harmless.
    pub fn unregister(&mut self, connection_id: ConnectionId) -> Option<Identity> {
        let identity = self.entries.remove(&connection_id)?;
        if self.by_user.get(&identity.user_id) == Some(&connection_id) {
            self.by_user.remove(&identity.user_id);
        }
        Some(identity)
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<&Identity> {
        self.entries.get(&connection_id)
    }

    /// The connection a user is currently online on.
    pub fn connection_for(&self, user_id: UserId) -> Option<ConnectionId> {
        self.by_user.get(&user_id).copied()
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.entries.contains_key(&connection_id)
    }

    /// Registered connection ids in ascending order.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Registered identities sorted by user id.
    pub fn identities(&self) -> Vec<Identity> {
        let mut identities: Vec<Identity> = self.entries.values().cloned().collect();
        identities.sort_by_key(|identity| identity.user_id);
        identities
    }

    /// Empties the registry, returning the connection ids that were in it.
    pub fn clear(&mut self) -> Vec<ConnectionId> {
        let ids = self.connection_ids();
        self.entries.clear();
        self.by_user.clear();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Verifies that the primary map and the user index describe the same
    /// set of entries, one per user.
    pub fn check_consistency(&self) -> Result<(), PresenceError> {
        if self.entries.len() != self.by_user.len() {
            return Err(PresenceError::RegistryInvariantViolation(format!(
                "{} entries but {} indexed users",
                self.entries.len(),
                self.by_user.len()
            )));
        }
        for (user_id, connection_id) in &self.by_user {
            match self.entries.get(connection_id) {
                Some(identity) if identity.user_id == *user_id => {}
                _ => {
                    return Err(PresenceError::RegistryInvariantViolation(
                        format!("{user_id} indexed to {connection_id} without a matching entry"),
                    ));
                }
            }
        }
        Ok(())
    }
}
