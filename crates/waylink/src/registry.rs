//! The object registry: every live protocol object on one connection.
//!
//! Identity 1 is the display and is registered before anything else.
//! Client-allocated identities are handed out by a cursor that starts at 1
//! and probes upward, skipping slots that are still taken.
//!
//! # Concurrency note
//!
//! `ObjectRegistry` is NOT thread-safe by itself; it's a plain `HashMap`.
//! The connection keeps it behind a `std::sync::Mutex` that is only ever
//! held for a single lookup or insert, never across an `.await`.
//!
//! # Known limitation
//!
//! Identities are not compacted. Deleting object 5 doesn't make 5 the next
//! allocation: the cursor keeps moving up until it reaches the top of the
//! client range, then wraps back to 2. The protocol recommends reusing the
//! lowest free identity; nothing on the wire depends on it.

use std::collections::HashMap;

use waylink_protocol::ObjectId;

use crate::config::MAX_CLIENT_ID;
use crate::{Proxy, WaylinkError};

/// First identity handed out after a wrap-around. Identity 1 is the
/// display and never moves.
const FIRST_CLIENT_ID: u32 = 2;

/// Maps object identities to their proxies.
#[derive(Debug)]
pub struct ObjectRegistry {
    objects: HashMap<ObjectId, Proxy>,
    /// Highest identity tried so far.
    last_id: u32,
    max_id: u32,
}

impl ObjectRegistry {
    /// An empty registry allocating up to `max_id`.
    pub fn new(max_id: u32) -> Self {
        Self {
            objects: HashMap::new(),
            last_id: ObjectId::DISPLAY.get(),
            max_id: max_id.max(FIRST_CLIENT_ID),
        }
    }

    /// Finds the next free client identity.
    ///
    /// # Errors
    /// [`WaylinkError::IdsExhausted`] once a full cycle through the client
    /// range found nothing free.
    pub fn allocate_id(&mut self) -> Result<ObjectId, WaylinkError> {
        let span = self.max_id - FIRST_CLIENT_ID + 1;
        for _ in 0..span {
            self.last_id = if self.last_id >= self.max_id {
                FIRST_CLIENT_ID
            } else {
                self.last_id + 1
            };
            let id = ObjectId(self.last_id);
            if !self.objects.contains_key(&id) {
                return Ok(id);
            }
        }
        Err(WaylinkError::IdsExhausted)
    }

    /// Registers `proxy` under its own identity.
    ///
    /// Returns the object that previously held the identity, if any. That
    /// only happens when the server reuses an identity we still track.
    pub fn insert(&mut self, proxy: Proxy) -> Option<Proxy> {
        let id = proxy.id();
        let previous = self.objects.insert(id, proxy);
        if let Some(old) = &previous {
            tracing::warn!(object = id.get(), interface = old.interface(), "identity reused while still registered");
        }
        previous
    }

    /// Removes an object. Requests and events for it are no longer routed.
    pub fn remove(&mut self, id: ObjectId) -> Option<Proxy> {
        self.objects.remove(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<Proxy> {
        self.objects.get(&id).cloned()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Some object implementing `interface`.
    ///
    /// With several candidates the choice is unspecified.
    pub fn find_by_interface(&self, interface: &str) -> Option<Proxy> {
        self.objects
            .values()
            .find(|p| p.interface() == interface)
            .cloned()
    }

    /// All registered objects, ordered by identity.
    pub fn objects(&self) -> Vec<Proxy> {
        let mut all: Vec<Proxy> = self.objects.values().cloned().collect();
        all.sort_by_key(Proxy::id);
        all
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new(MAX_CLIENT_ID)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use waylink_protocol::{Interface, InterfaceDefinition, DEFAULT_CALLBACK_INTERFACE};

    use super::*;

    fn interface(name: &str) -> Arc<Interface> {
        Arc::new(Interface::new(
            InterfaceDefinition::new(name, 1),
            DEFAULT_CALLBACK_INTERFACE,
        ))
    }

    fn proxy(id: u32, name: &str) -> Proxy {
        Proxy::detached(ObjectId(id), interface(name))
    }

    #[test]
    fn test_allocate_id_starts_after_display() {
        let mut reg = ObjectRegistry::default();
        reg.insert(proxy(1, "wl_display"));
        assert_eq!(reg.allocate_id().unwrap(), ObjectId(2));
        assert_eq!(reg.allocate_id().unwrap(), ObjectId(3));
    }

    #[test]
    fn test_allocate_id_skips_occupied_slots() {
        let mut reg = ObjectRegistry::default();
        reg.insert(proxy(2, "wl_registry"));
        reg.insert(proxy(3, "wl_output"));
        assert_eq!(reg.allocate_id().unwrap(), ObjectId(4));
    }

    #[test]
    fn test_allocate_id_does_not_compact() {
        let mut reg = ObjectRegistry::default();
        let a = reg.allocate_id().unwrap();
        reg.insert(proxy(a.get(), "wl_callback"));
        reg.remove(a);
        // The freed identity is not handed out again right away.
        assert_eq!(reg.allocate_id().unwrap(), ObjectId(3));
    }

    #[test]
    fn test_allocate_id_wraps_to_first_client_id() {
        let mut reg = ObjectRegistry::new(4);
        reg.insert(proxy(3, "wl_output"));
        assert_eq!(reg.allocate_id().unwrap(), ObjectId(2));
        assert_eq!(reg.allocate_id().unwrap(), ObjectId(4));
        assert_eq!(reg.allocate_id().unwrap(), ObjectId(2));
    }

    #[test]
    fn test_allocate_id_reuses_removed_id_after_wrap() {
        let mut reg = ObjectRegistry::new(5);
        for _ in 0..4 {
            let id = reg.allocate_id().unwrap();
            reg.insert(proxy(id.get(), "wl_surface"));
        }
        assert!(reg.remove(ObjectId(3)).is_some());

        // 2 is still taken, so the cursor lands on the freed slot.
        assert_eq!(reg.allocate_id().unwrap(), ObjectId(3));
        reg.insert(proxy(3, "wl_output"));
        assert!(matches!(reg.allocate_id(), Err(WaylinkError::IdsExhausted)));
    }

    #[test]
    fn test_allocate_id_full_range_returns_exhausted() {
        let mut reg = ObjectRegistry::new(4);
        for id in 2..=4 {
            reg.insert(proxy(id, "wl_output"));
        }
        assert!(matches!(reg.allocate_id(), Err(WaylinkError::IdsExhausted)));
    }

    #[test]
    fn test_find_by_interface_and_objects() {
        let mut reg = ObjectRegistry::default();
        reg.insert(proxy(5, "wl_seat"));
        reg.insert(proxy(1, "wl_display"));
        reg.insert(proxy(2, "wl_registry"));

        assert_eq!(reg.find_by_interface("wl_seat").unwrap().id(), ObjectId(5));
        assert!(reg.find_by_interface("wl_output").is_none());
        let ids: Vec<u32> = reg.objects().iter().map(|p| p.id().get()).collect();
        assert_eq!(ids, [1, 2, 5]);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut reg = ObjectRegistry::default();
        assert!(reg.remove(ObjectId(9)).is_none());
        assert!(reg.is_empty());
    }
}
