use thiserror::Error;

use crate::change::MutationRecord;
use crate::model::{Color, HighlightSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("node {0:?} no longer exists")]
    StaleNode(NodeId),
    #[error("node {0:?} is not a text node")]
    NotAText(NodeId),
    #[error("node {0:?} is not an element")]
    NotAnElement(NodeId),
    #[error("node {0:?} is not connected to the document")]
    Detached(NodeId),
    #[error("node {0:?} has no parent")]
    NoParent(NodeId),
    #[error("inserting {child:?} under {parent:?} would create a cycle")]
    WouldCycle { parent: NodeId, child: NodeId },
    #[error("highlight range {start}..{end} does not match the node text")]
    RangeMismatch { start: usize, end: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    Marked {
        text: String,
        class: String,
        color: Color,
    },
}

impl Fragment {
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) | Self::Marked { text, .. } => text,
        }
    }
}

pub fn build_fragments(
    text: &str,
    spans: &[HighlightSpan],
    class: &str,
) -> Result<Vec<Fragment>, DocumentError> {
    let mut fragments = Vec::with_capacity(spans.len() * 2 + 1);
    let mut last_end = 0;

    for span in spans {
        let range = span.origin.clone();
        let mismatch = DocumentError::RangeMismatch {
            start: range.start,
            end: range.end,
        };
        if range.start < last_end || range.is_empty() {
            return Err(mismatch);
        }
        let Some(found) = text.get(range.clone()) else {
            return Err(mismatch);
        };
        if found != span.matched_text {
            return Err(mismatch);
        }

        if range.start > last_end {
            fragments.push(Fragment::Text(text[last_end..range.start].to_string()));
        }
        fragments.push(Fragment::Marked {
            text: found.to_string(),
            class: class.to_string(),
            color: span.color,
        });
        last_end = range.end;
    }

    if last_end < text.len() {
        fragments.push(Fragment::Text(text[last_end..].to_string()));
    }

    Ok(fragments)
}

pub fn highlight_style(color: Color) -> String {
    format!(
        "background-color: {color}; color: #000; padding: 2px 1px; border-radius: 3px; \
         font-weight: bold; box-shadow: 0 1px 3px rgba(0, 0, 0, 0.2);"
    )
}

pub trait DocumentHost {
    fn body(&self) -> NodeId;

    fn find_text_nodes(&self, root: NodeId) -> Vec<NodeId>;

    fn text_of(&self, node: NodeId) -> Option<&str>;

    fn tag_name(&self, node: NodeId) -> Option<&str>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn is_connected(&self, node: NodeId) -> bool;

    fn text_content(&self, node: NodeId) -> String;

    fn replace_node(
        &mut self,
        old: NodeId,
        fragments: Vec<Fragment>,
    ) -> Result<Vec<NodeId>, DocumentError>;

    fn query_marked(&self, class: &str) -> Vec<NodeId>;

    fn merge_adjacent_text(&mut self, root: NodeId) -> usize;

    fn take_mutations(&mut self) -> Vec<MutationRecord>;

    fn split_text_node(
        &mut self,
        node: NodeId,
        spans: &[HighlightSpan],
        class: &str,
    ) -> Result<Vec<NodeId>, DocumentError> {
        let text = self
            .text_of(node)
            .ok_or(DocumentError::NotAText(node))?
            .to_string();
        let fragments = build_fragments(&text, spans, class)?;
        self.replace_node(node, fragments)
    }
}

impl<T: DocumentHost + ?Sized> DocumentHost for &mut T {
    fn body(&self) -> NodeId {
        (**self).body()
    }

    fn find_text_nodes(&self, root: NodeId) -> Vec<NodeId> {
        (**self).find_text_nodes(root)
    }

    fn text_of(&self, node: NodeId) -> Option<&str> {
        (**self).text_of(node)
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        (**self).tag_name(node)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        (**self).parent(node)
    }

    fn is_connected(&self, node: NodeId) -> bool {
        (**self).is_connected(node)
    }

    fn text_content(&self, node: NodeId) -> String {
        (**self).text_content(node)
    }

    fn replace_node(
        &mut self,
        old: NodeId,
        fragments: Vec<Fragment>,
    ) -> Result<Vec<NodeId>, DocumentError> {
        (**self).replace_node(old, fragments)
    }

    fn query_marked(&self, class: &str) -> Vec<NodeId> {
        (**self).query_marked(class)
    }

    fn merge_adjacent_text(&mut self, root: NodeId) -> usize {
        (**self).merge_adjacent_text(root)
    }

    fn take_mutations(&mut self) -> Vec<MutationRecord> {
        (**self).take_mutations()
    }
}

#[derive(Debug, Clone)]
struct ElementData {
    tag: String,
    classes: Vec<String>,
    style: Option<String>,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<NodeData>,
}

#[derive(Debug, Clone)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    body: NodeId,
    mutations: Vec<MutationRecord>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut document = Self {
            slots: Vec::new(),
            free: Vec::new(),
            body: NodeId {
                index: 0,
                generation: 0,
            },
            mutations: Vec::new(),
        };
        document.body = document.create_element("body");
        document
    }

    pub fn from_paragraphs(input: &str) -> Self {
        let mut document = Self::new();
        let body = document.body;
        let mut current: Vec<&str> = Vec::new();

        for line in input.lines().chain(std::iter::once("")) {
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                current.push(trimmed);
                continue;
            }
            if current.is_empty() {
                continue;
            }

            let paragraph = document.create_element("p");
            let text = document.create_text(&current.join(" "));
            document.attach_unchecked(paragraph, text);
            document.attach_unchecked(body, paragraph);
            current.clear();
        }

        document
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeKind::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            classes: Vec::new(),
            style: None,
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Text(text.to_string()))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DocumentError> {
        self.insert_before(parent, child, None)
    }

    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> Result<NodeId, DocumentError> {
        let element = self.create_element(tag);
        self.append_child(parent, element)?;
        Ok(element)
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> Result<NodeId, DocumentError> {
        let node = self.create_text(text);
        self.append_child(parent, node)?;
        Ok(node)
    }

    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DocumentError> {
        match self.node(parent) {
            Some(NodeData {
                kind: NodeKind::Element(_),
                ..
            }) => {}
            Some(_) => return Err(DocumentError::NotAnElement(parent)),
            None => return Err(DocumentError::StaleNode(parent)),
        }
        if self.node(child).is_none() {
            return Err(DocumentError::StaleNode(child));
        }
        if child == self.body || self.is_inclusive_ancestor(child, parent) {
            return Err(DocumentError::WouldCycle { parent, child });
        }

        if self.parent(child).is_some() {
            self.detach(child)?;
        }

        let position = match reference {
            Some(reference) => {
                let siblings = self.children(parent);
                siblings
                    .iter()
                    .position(|id| *id == reference)
                    .ok_or(DocumentError::NoParent(reference))?
            }
            None => self.children(parent).len(),
        };

        if let Some(node) = self.node_mut(parent) {
            node.children.insert(position, child);
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }

        self.record(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
        Ok(())
    }

    pub fn remove(&mut self, node: NodeId) -> Result<(), DocumentError> {
        self.detach(node)
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), DocumentError> {
        match self.node_mut(node) {
            Some(NodeData {
                kind: NodeKind::Text(content),
                ..
            }) => {
                *content = text.to_string();
            }
            Some(_) => return Err(DocumentError::NotAText(node)),
            None => return Err(DocumentError::StaleNode(node)),
        }
        self.record(MutationRecord::CharacterData { target: node });
        Ok(())
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) -> Result<(), DocumentError> {
        match self.node_mut(node) {
            Some(NodeData {
                kind: NodeKind::Element(element),
                ..
            }) => {
                if !element.classes.iter().any(|c| c == class) {
                    element.classes.push(class.to_string());
                }
                Ok(())
            }
            Some(_) => Err(DocumentError::NotAnElement(node)),
            None => Err(DocumentError::StaleNode(node)),
        }
    }

    pub fn classes(&self, node: NodeId) -> &[String] {
        match self.node(node) {
            Some(NodeData {
                kind: NodeKind::Element(element),
                ..
            }) => &element.classes,
            _ => &[],
        }
    }

    pub fn style(&self, node: NodeId) -> Option<&str> {
        match self.node(node) {
            Some(NodeData {
                kind: NodeKind::Element(element),
                ..
            }) => element.style.as_deref(),
            _ => None,
        }
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node)
            .map(|data| data.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.node(node).is_some()
    }

    pub fn render(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.render_into(node, &mut out);
        out
    }

    fn render_into(&self, node: NodeId, out: &mut String) {
        let Some(data) = self.node(node) else {
            return;
        };
        match &data.kind {
            NodeKind::Text(text) => push_escaped(out, text, false),
            NodeKind::Element(element) => {
                out.push('<');
                out.push_str(&element.tag);
                if !element.classes.is_empty() {
                    out.push_str(" class=\"");
                    push_escaped(out, &element.classes.join(" "), true);
                    out.push('"');
                }
                if let Some(style) = &element.style {
                    out.push_str(" style=\"");
                    push_escaped(out, style, true);
                    out.push('"');
                }
                out.push('>');
                for child in &data.children {
                    self.render_into(*child, out);
                }
                out.push_str("</");
                out.push_str(&element.tag);
                out.push('>');
            }
        }
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let data = NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        };

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(data);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(data),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn attach_unchecked(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
    }

    fn detach(&mut self, node: NodeId) -> Result<(), DocumentError> {
        let parent = self
            .node(node)
            .ok_or(DocumentError::StaleNode(node))?
            .parent
            .ok_or(DocumentError::NoParent(node))?;

        // Connectedness must be sampled before the link is cut.
        let observed = self.is_connected(parent);
        if let Some(data) = self.node_mut(parent) {
            data.children.retain(|child| *child != node);
        }
        if let Some(data) = self.node_mut(node) {
            data.parent = None;
        }

        if observed {
            self.mutations.push(MutationRecord::ChildList {
                target: parent,
                added: Vec::new(),
                removed: vec![node],
            });
        }
        Ok(())
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.node(id).and_then(|data| data.parent);
        }
        false
    }

    fn free_subtree(&mut self, root: NodeId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(slot) = self.slots.get_mut(id.index as usize) else {
                continue;
            };
            if slot.generation != id.generation {
                continue;
            }
            if let Some(data) = slot.node.take() {
                stack.extend(data.children);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
            }
        }
    }

    fn record(&mut self, record: MutationRecord) {
        let target = match &record {
            MutationRecord::ChildList { target, .. } | MutationRecord::CharacterData { target } => {
                *target
            }
        };
        if self.is_connected(target) {
            self.mutations.push(record);
        }
    }

    fn materialize(&mut self, fragment: Fragment) -> NodeId {
        match fragment {
            Fragment::Text(text) => self.create_text(&text),
            Fragment::Marked { text, class, color } => {
                let span = self.alloc(NodeKind::Element(ElementData {
                    tag: "span".to_string(),
                    classes: vec![class],
                    style: Some(highlight_style(color)),
                }));
                let inner = self.create_text(&text);
                self.attach_unchecked(span, inner);
                span
            }
        }
    }
}

impl DocumentHost for Document {
    fn body(&self) -> NodeId {
        self.body
    }

    fn find_text_nodes(&self, root: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(data) = self.node(id) else {
                continue;
            };
            match data.kind {
                NodeKind::Text(_) => found.push(id),
                NodeKind::Element(_) => stack.extend(data.children.iter().rev().copied()),
            }
        }
        found
    }

    fn text_of(&self, node: NodeId) -> Option<&str> {
        match self.node(node) {
            Some(NodeData {
                kind: NodeKind::Text(text),
                ..
            }) => Some(text),
            _ => None,
        }
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        match self.node(node) {
            Some(NodeData {
                kind: NodeKind::Element(element),
                ..
            }) => Some(&element.tag),
            _ => None,
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|data| data.parent)
    }

    fn is_connected(&self, node: NodeId) -> bool {
        self.node(node).is_some() && self.is_inclusive_ancestor(self.body, node)
    }

    fn text_content(&self, node: NodeId) -> String {
        self.find_text_nodes(node)
            .into_iter()
            .filter_map(|id| self.text_of(id))
            .collect()
    }

    fn replace_node(
        &mut self,
        old: NodeId,
        fragments: Vec<Fragment>,
    ) -> Result<Vec<NodeId>, DocumentError> {
        if !self.contains_node(old) {
            return Err(DocumentError::StaleNode(old));
        }
        if !self.is_connected(old) {
            return Err(DocumentError::Detached(old));
        }
        let parent = self.parent(old).ok_or(DocumentError::NoParent(old))?;
        let position = self
            .children(parent)
            .iter()
            .position(|id| *id == old)
            .ok_or(DocumentError::NoParent(old))?;

        let replacements: Vec<NodeId> = fragments
            .into_iter()
            .map(|fragment| self.materialize(fragment))
            .collect();
        for id in &replacements {
            if let Some(data) = self.node_mut(*id) {
                data.parent = Some(parent);
            }
        }
        if let Some(data) = self.node_mut(parent) {
            let tail = data.children.split_off(position + 1);
            data.children.pop();
            data.children.extend(replacements.iter().copied());
            data.children.extend(tail);
        }

        self.record(MutationRecord::ChildList {
            target: parent,
            added: replacements.clone(),
            removed: vec![old],
        });
        self.free_subtree(old);
        Ok(replacements)
    }

    fn query_marked(&self, class: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = vec![self.body];
        while let Some(id) = stack.pop() {
            let Some(data) = self.node(id) else {
                continue;
            };
            if let NodeKind::Element(element) = &data.kind {
                if element.classes.iter().any(|c| c == class) {
                    found.push(id);
                }
                stack.extend(data.children.iter().rev().copied());
            }
        }
        found
    }

    fn merge_adjacent_text(&mut self, root: NodeId) -> usize {
        let mut merged = 0;
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            let children = match self.node(id) {
                Some(data) => data.children.clone(),
                None => continue,
            };

            let mut kept = Vec::with_capacity(children.len());
            let mut absorbed = Vec::new();
            let mut grown = Vec::new();
            let mut run_head: Option<NodeId> = None;

            for child in children {
                let Some(text) = self.text_of(child).map(str::to_string) else {
                    run_head = None;
                    stack.push(child);
                    kept.push(child);
                    continue;
                };

                match run_head {
                    Some(head) => {
                        if let Some(NodeKind::Text(head_text)) =
                            self.node_mut(head).map(|data| &mut data.kind)
                        {
                            head_text.push_str(&text);
                        }
                        if !grown.contains(&head) {
                            grown.push(head);
                        }
                        absorbed.push(child);
                    }
                    None => {
                        run_head = Some(child);
                        kept.push(child);
                    }
                }
            }

            if absorbed.is_empty() {
                continue;
            }

            merged += absorbed.len();
            if let Some(data) = self.node_mut(id) {
                data.children = kept;
            }
            for head in grown {
                self.record(MutationRecord::CharacterData { target: head });
            }
            self.record(MutationRecord::ChildList {
                target: id,
                added: Vec::new(),
                removed: absorbed.clone(),
            });
            for node in absorbed {
                self.free_subtree(node);
            }
        }

        merged
    }

    fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.mutations)
    }
}

fn push_escaped(out: &mut String, text: &str, attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}
