use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use std::fmt::{self, Formatter};
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;

use crate::StashTable;

struct TableVisitor<K, V, S> {
    _marker: PhantomData<StashTable<K, V, S>>,
}

impl<K, V, S> Serialize for StashTable<K, V, S>
where
    K: Serialize + Hash + Eq,
    V: Serialize,
    S: BuildHasher,
{
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        self.try_for_each(|key, value| map.serialize_entry(key, value))?;
        map.end()
    }
}

impl<'de, K, V, S> Deserialize<'de> for StashTable<K, V, S>
where
    K: Deserialize<'de> + Hash + Eq,
    V: Deserialize<'de>,
    S: Default + BuildHasher,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(TableVisitor::new())
    }
}

impl<K, V, S> TableVisitor<K, V, S> {
    pub(crate) fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<'de, K, V, S> Visitor<'de> for TableVisitor<K, V, S>
where
    K: Deserialize<'de> + Hash + Eq,
    V: Deserialize<'de>,
    S: Default + BuildHasher,
{
    type Value = StashTable<K, V, S>;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "a map")
    }

    fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        // The capacity is fixed at construction, so the entries are gathered
        // first and the table is sized to hold exactly what was read.
        let mut entries: Vec<(K, V)> = match access.size_hint() {
            Some(size) => Vec::with_capacity(size),
            None => Vec::new(),
        };
        while let Some(entry) = access.next_entry()? {
            entries.push(entry);
        }

        let table = StashTable::with_capacity_and_hasher(entries.len(), S::default());
        for (key, value) in entries {
            table.set(key, value);
        }

        Ok(table)
    }
}
