use crate::document::{DocumentHost, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    ChildList {
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    CharacterData {
        target: NodeId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Whether a batch of records warrants a re-highlight: an added element
/// that carries text, or a text change that leaves non-blank content.
pub fn is_significant<D: DocumentHost + ?Sized>(document: &D, records: &[MutationRecord]) -> bool {
    records.iter().any(|record| match record {
        MutationRecord::ChildList { added, .. } => added.iter().any(|node| {
            document.tag_name(*node).is_some() && !document.find_text_nodes(*node).is_empty()
        }),
        MutationRecord::CharacterData { target } => document
            .text_of(*target)
            .map(|text| !text.trim().is_empty())
            .unwrap_or(false),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityTracker {
    current: Visibility,
}

impl Default for VisibilityTracker {
    fn default() -> Self {
        Self {
            current: Visibility::Visible,
        }
    }
}

impl VisibilityTracker {
    pub fn current(&self) -> Visibility {
        self.current
    }

    pub fn transition(&mut self, next: Visibility) -> bool {
        let became_visible = self.current == Visibility::Hidden && next == Visibility::Visible;
        self.current = next;
        became_visible
    }
}
