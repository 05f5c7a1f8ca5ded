//! Ordered prompt collection.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{Prompt, PromptId};

/// The complete, ordered set of prompts held by one replica.
///
/// At most one prompt exists per [`PromptId`]; constructing a collection from
/// a sequence keeps the first occurrence of each identity. Order is preserved
/// exactly as supplied.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Prompt>", into = "Vec<Prompt>")]
pub struct Collection {
    prompts: Vec<Prompt>,
}

impl Collection {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            prompts: Vec::new(),
        }
    }

    /// Returns the number of prompts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    /// Returns `true` when the collection holds no prompts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Iterates prompts in stored order.
    pub fn iter(&self) -> std::slice::Iter<'_, Prompt> {
        self.prompts.iter()
    }

    /// Returns the prompts as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Prompt] {
        &self.prompts
    }

    /// Looks up a prompt by identity.
    #[must_use]
    pub fn get(&self, id: PromptId) -> Option<&Prompt> {
        self.prompts.iter().find(|prompt| prompt.id() == id)
    }

    /// Returns `true` when a prompt with `id` is present.
    #[must_use]
    pub fn contains(&self, id: PromptId) -> bool {
        self.get(id).is_some()
    }

    /// Returns the largest identity present, if any.
    #[must_use]
    pub fn latest_id(&self) -> Option<PromptId> {
        self.prompts.iter().map(Prompt::id).max()
    }

    /// Places `prompt` at the front, replacing any entry with the same identity.
    pub fn prepend(&mut self, prompt: Prompt) {
        self.prompts.retain(|existing| existing.id() != prompt.id());
        self.prompts.insert(0, prompt);
    }

    /// Removes and returns the prompt with `id`.
    pub fn remove(&mut self, id: PromptId) -> Option<Prompt> {
        let index = self.prompts.iter().position(|prompt| prompt.id() == id)?;
        Some(self.prompts.remove(index))
    }

    /// Consumes the collection, returning the underlying prompts.
    #[must_use]
    pub fn into_vec(self) -> Vec<Prompt> {
        self.prompts
    }
}

impl From<Vec<Prompt>> for Collection {
    fn from(prompts: Vec<Prompt>) -> Self {
        let mut seen = HashSet::with_capacity(prompts.len());
        let prompts = prompts
            .into_iter()
            .filter(|prompt| seen.insert(prompt.id()))
            .collect();
        Self { prompts }
    }
}

impl From<Collection> for Vec<Prompt> {
    fn from(collection: Collection) -> Self {
        collection.prompts
    }
}

impl FromIterator<Prompt> for Collection {
    fn from_iter<T: IntoIterator<Item = Prompt>>(iter: T) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl IntoIterator for Collection {
    type Item = Prompt;
    type IntoIter = std::vec::IntoIter<Prompt>;

    fn into_iter(self) -> Self::IntoIter {
        self.prompts.into_iter()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Prompt;
    type IntoIter = std::slice::Iter<'a, Prompt>;

    fn into_iter(self) -> Self::IntoIter {
        self.prompts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PromptDraft;

    fn prompt(id: i64, name: &str) -> Prompt {
        Prompt::create(PromptId::from_millis(id), PromptDraft::new(name, "body")).unwrap()
    }

    #[test]
    fn construction_keeps_first_duplicate() {
        let collection = Collection::from(vec![prompt(1, "first"), prompt(2, "b"), prompt(1, "dup")]);
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.get(PromptId::from_millis(1)).unwrap().name(), "first");
    }

    #[test]
    fn prepend_replaces_same_identity() {
        let mut collection = Collection::from(vec![prompt(2, "b"), prompt(1, "a")]);
        collection.prepend(prompt(1, "a2"));
        let names: Vec<_> = collection.iter().map(Prompt::name).collect();
        assert_eq!(names, ["a2", "b"]);
    }

    #[test]
    fn remove_returns_entry() {
        let mut collection = Collection::from(vec![prompt(2, "b"), prompt(1, "a")]);
        let removed = collection.remove(PromptId::from_millis(2)).unwrap();
        assert_eq!(removed.name(), "b");
        assert!(collection.remove(PromptId::from_millis(2)).is_none());
        assert_eq!(collection.latest_id(), Some(PromptId::from_millis(1)));
    }

    #[test]
    fn accepts_pretty_and_compact_json() {
        let compact = r#"[{"id":2,"name":"b","text":"t"},{"id":1,"name":"a","text":"t"}]"#;
        let pretty = "[\n  {\n    \"id\": 2,\n    \"name\": \"b\",\n    \"text\": \"t\"\n  },\n  {\"id\": 1, \"name\": \"a\", \"text\": \"t\"}\n]";
        let a: Collection = serde_json::from_str(compact).unwrap();
        let b: Collection = serde_json::from_str(pretty).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_slice()[0].id(), PromptId::from_millis(2));
    }

    #[test]
    fn rejects_non_array_documents() {
        assert!(serde_json::from_str::<Collection>(r#"{"id": 1}"#).is_err());
    }
}
