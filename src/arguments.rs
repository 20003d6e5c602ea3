use crate::value::Value;

/// Insertion-ordered bag of named values.
///
/// Used for table properties, for ingesting a row from name/value pairs and
/// for harvesting a row back out by column name. Lookups never fail loudly:
/// a missing name yields `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    entries: Vec<(String, Value)>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`, replacing the first entry with that name or
    /// appending a new one.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.index_of(&name) {
            Some(idx) => self.entries[idx].1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    /// Appends an entry even when the name is already present.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.entries.push((name.into(), value.into()));
        self
    }

    /// Returns the first value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.index_of(name).map(|idx| &self.entries[idx].1)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(key, _)| key == name)
    }

    pub fn get_at(&self, index: usize) -> Option<(&str, &Value)> {
        self.entries
            .get(index)
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<N: Into<String>, V: Into<Value>> FromIterator<(N, V)> for Arguments {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut arguments = Self::new();
        for (name, value) in iter {
            arguments.append(name, value);
        }
        arguments
    }
}
