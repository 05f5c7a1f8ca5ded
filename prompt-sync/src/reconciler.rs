//! Identity-keyed merge of the local and remote replicas.

use std::collections::BTreeMap;

use prompt_primitives::{Collection, Prompt, PromptId};

/// Merges two replicas with remote-wins precedence.
///
/// Every identity present in either input appears exactly once in the
/// output; on collision the remote entry is kept. The result is ordered by
/// descending identity. When either side is empty the other is returned
/// unchanged, order included.
///
/// Deletions are not representable: an entry removed from one replica but
/// still present in the other survives the merge.
#[must_use]
pub fn reconcile(local: &Collection, remote: &Collection) -> Collection {
    if local.is_empty() {
        return remote.clone();
    }
    if remote.is_empty() {
        return local.clone();
    }

    let mut merged: BTreeMap<PromptId, &Prompt> =
        local.iter().map(|prompt| (prompt.id(), prompt)).collect();
    for prompt in remote {
        merged.insert(prompt.id(), prompt);
    }

    merged.into_values().rev().cloned().collect()
}
