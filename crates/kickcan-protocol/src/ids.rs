use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Generational handle into authority-side storage.
///
/// A handle whose generation no longer matches its slot refers to a despawned
/// or retired value and resolves to nothing.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle<T> {
    pub index: u32,
    pub generation: u32,
    _marker: PhantomData<T>,
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> Handle<T> {
    #[inline]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self::new((raw >> 32) as u32, raw as u32)
    }

    #[inline]
    pub const fn to_raw(self) -> u64 {
        ((self.index as u64) << 32) | (self.generation as u64)
    }
}

impl<T: Tag> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}v{}", T::PREFIX, self.index, self.generation)
    }
}

impl<T: Tag> fmt::Display for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl<T> Serialize for Handle<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.to_raw())
    }
}

impl<'de, T> Deserialize<'de> for Handle<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = u64::deserialize(deserializer)?;
        Ok(Self::from_raw(raw))
    }
}

/// Marker for the kind of value a [`Handle`] points at.
pub trait Tag {
    const PREFIX: &'static str;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityTag;
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemTag;

impl Tag for EntityTag {
    const PREFIX: &'static str = "entity";
}

impl Tag for ItemTag {
    const PREFIX: &'static str = "item";
}

/// Avatar or agent taking part in replication.
pub type EntityId = Handle<EntityTag>;
/// One instance of the shared item. Every respawn gets a fresh id.
pub type ItemId = Handle<ItemTag>;

/// Transport-level client identifier (renet client id).
pub type ClientId = u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_packing_keeps_index_and_generation() {
        let id = EntityId::new(7, 3);
        let back = EntityId::from_raw(id.to_raw());
        assert_eq!(back, id);
        assert_eq!(back.index, 7);
        assert_eq!(back.generation, 3);
    }

    #[test]
    fn debug_names_the_kind() {
        assert_eq!(format!("{:?}", ItemId::new(2, 1)), "item#2v1");
        assert_eq!(EntityId::new(0, 0).to_string(), "entity#0v0");
    }

    #[test]
    fn handles_copy_and_serialize_for_any_tag() {
        struct Bare;

        let id: Handle<Bare> = Handle::new(3, 9);
        let copy = id;
        assert_eq!((id.index, copy.generation), (3, 9));

        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, (3u64 << 32 | 9).to_string());
        let back: Handle<Bare> = serde_json::from_str(&json).expect("deserialize");
        assert_eq!((back.index, back.generation), (3, 9));
    }
}
