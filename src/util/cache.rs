use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;

use anyhow::Result;

use crate::core::traits::Backend;

/// A backend object that can be created from a key, and is owned by a [`Cache`].
/// Dropping the resource must destroy the backend object.
pub trait Resource<B: Backend>: Sized {
    type Key: Hash + Eq + Clone;
    type ExtraParams<'a>;

    fn create(backend: B, key: &Self::Key, params: Self::ExtraParams<'_>) -> Result<Self>;
}

/// Content-addressed store of resources. Every distinct key creates its resource exactly once,
/// and entries live as long as the cache does.
pub struct Cache<B: Backend, R: Resource<B>> {
    backend: B,
    store: HashMap<R::Key, R>,
}

impl<B: Backend, R: Resource<B>> Cache<B, R> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            store: HashMap::new(),
        }
    }

    /// Look up the resource for `key`, creating it on a miss. A failed creation leaves no entry behind.
    pub fn get_or_create(&mut self, key: &R::Key, params: R::ExtraParams<'_>) -> Result<&R> {
        match self.store.entry(key.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let value = R::create(self.backend.clone(), key, params)?;
                Ok(entry.insert(value))
            }
        }
    }

    pub fn get(&self, key: &R::Key) -> Option<&R> {
        self.store.get(key)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
