use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

use async_trait::async_trait;

use lessonbay_auth::{ClassResource, ClassStore, Enrollment, EnrollmentStore, Principal, StoreError, UserStore};
use lessonbay_core::{ClassId, UserId};

/// Keyed in-memory table for tests/dev.
#[derive(Debug)]
pub struct KeyedStore<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> KeyedStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for KeyedStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("in-memory store lock poisoned".to_string())
}

impl<K, V> KeyedStore<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn get(&self, key: &K) -> Result<Option<V>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(key).cloned())
    }

    pub fn upsert(&self, key: K, value: V) -> Result<V, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        map.insert(key, value.clone());
        Ok(value)
    }

    /// Insert `value` when `key` is absent, otherwise apply `update` to the stored value.
    /// Returns the value as stored.
    pub fn insert_or_update(&self, key: K, value: V, update: impl FnOnce(&mut V, V)) -> Result<V, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        match map.entry(key) {
            Entry::Vacant(slot) => Ok(slot.insert(value).clone()),
            Entry::Occupied(mut slot) => {
                update(slot.get_mut(), value);
                Ok(slot.get().clone())
            }
        }
    }

    pub fn remove(&self, key: &K) -> Result<bool, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        Ok(map.remove(key).is_some())
    }

    pub fn filter(&self, mut keep: impl FnMut(&K, &V) -> bool) -> Result<Vec<V>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .iter()
            .filter_map(|(k, v)| if keep(k, v) { Some(v.clone()) } else { None })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    rows: KeyedStore<UserId, Principal>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get_by_id(&self, id: UserId) -> Result<Option<Principal>, StoreError> {
        self.rows.get(&id)
    }

    async fn upsert(&self, user: Principal) -> Result<Principal, StoreError> {
        self.rows.upsert(user.id, user)
    }

    async fn sync_profile(&self, user: Principal) -> Result<Principal, StoreError> {
        self.rows.insert_or_update(user.id, user, |stored, fresh| {
            stored.email = fresh.email;
            stored.display_name = fresh.display_name;
        })
    }

    async fn list(&self) -> Result<Vec<Principal>, StoreError> {
        let mut users = self.rows.filter(|_, _| true)?;
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryClassStore {
    rows: KeyedStore<ClassId, ClassResource>,
}

impl InMemoryClassStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClassStore for InMemoryClassStore {
    async fn get_by_id(&self, id: ClassId) -> Result<Option<ClassResource>, StoreError> {
        self.rows.get(&id)
    }

    async fn insert(&self, class: ClassResource) -> Result<ClassResource, StoreError> {
        self.rows.upsert(class.id, class)
    }

    async fn delete(&self, id: ClassId) -> Result<bool, StoreError> {
        self.rows.remove(&id)
    }

    async fn list(&self) -> Result<Vec<ClassResource>, StoreError> {
        let mut classes = self.rows.filter(|_, _| true)?;
        classes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(classes)
    }
}

/// Enrollment rows keyed by `(user, class)`, so a purchase overwrites rather than appends.
#[derive(Debug, Default)]
pub struct InMemoryEnrollmentStore {
    rows: KeyedStore<(UserId, ClassId), Enrollment>,
}

impl InMemoryEnrollmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EnrollmentStore for InMemoryEnrollmentStore {
    async fn get_by_user_and_class(
        &self,
        user_id: UserId,
        class_id: ClassId,
    ) -> Result<Option<Enrollment>, StoreError> {
        self.rows.get(&(user_id, class_id))
    }

    async fn upsert(&self, enrollment: Enrollment) -> Result<Enrollment, StoreError> {
        self.rows.upsert((enrollment.user_id, enrollment.class_id), enrollment)
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Enrollment>, StoreError> {
        let mut rows = self.rows.filter(|(u, _), _| *u == user_id)?;
        rows.sort_by(|a, b| b.end_at.cmp(&a.end_at));
        Ok(rows)
    }
}
