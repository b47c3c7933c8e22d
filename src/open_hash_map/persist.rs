//! Serde support: a map is written as a plain map of its entries and read
//! back into a freshly sized table.

use super::OpenHashMap;
use crate::{
    alloc::{Alloc, Global},
    hash::{Primitive, Strategy, DEFAULT_LOAD_FACTOR},
};
use core::{fmt, marker::PhantomData};
use serde::{
    de::{Error as _, MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

impl<K, V, S, A> Serialize for OpenHashMap<K, V, S, A>
where
    K: Primitive + Serialize,
    V: Serialize,
    A: Alloc,
{
    fn serialize<Se: Serializer>(&self, serializer: Se) -> Result<Se::Ok, Se::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self {
            map.serialize_entry(&key, value)?;
        }
        map.end()
    }
}

impl<'de, K, V, S> Deserialize<'de> for OpenHashMap<K, V, S, Global>
where
    K: Primitive + Deserialize<'de>,
    V: Deserialize<'de> + Default,
    S: Strategy<K> + Default,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(MapVisitor(PhantomData))
    }
}

/// Entries to make room for before reading any; longer maps grow as usual.
const PRESIZE_LIMIT: usize = 4096;

struct MapVisitor<K, V, S>(PhantomData<fn() -> (K, V, S)>);

impl<'de, K, V, S> Visitor<'de> for MapVisitor<K, V, S>
where
    K: Primitive + Deserialize<'de>,
    V: Deserialize<'de> + Default,
    S: Strategy<K> + Default,
{
    type Value = OpenHashMap<K, V, S, Global>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Self::Value, M::Error> {
        let expected = access.size_hint().unwrap_or(0).min(PRESIZE_LIMIT);
        let mut map =
            OpenHashMap::with_capacity_and_strategy(expected, DEFAULT_LOAD_FACTOR, S::default())
                .map_err(M::Error::custom)?;
        while let Some((key, value)) = access.next_entry()? {
            map.insert(key, value).map_err(M::Error::custom)?;
        }
        Ok(map)
    }
}
