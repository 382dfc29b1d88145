use std::collections::{HashMap, VecDeque};

use super::{
    node::{NodeData, NodeKey, NodeSpec, UiNode},
    widget::{MoveEvent, TreeEvent, TreeWidget},
};

#[derive(Debug, Clone)]
struct Entry {
    node: UiNode,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
    editing: bool,
    placeholder: bool,
}

/// Headless tree widget.
///
/// The `user_*` methods play the part of a person clicking around: they
/// change the tree the way a widget would and queue the matching event.
#[derive(Debug, Clone)]
pub struct MemoryTree {
    entries: HashMap<NodeKey, Entry>,
    events: VecDeque<TreeEvent>,
    next_id: u64,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new("Assets")
    }
}

impl MemoryTree {
    pub fn new(root_label: &str) -> Self {
        let root = Entry {
            node: UiNode {
                key: NodeKey::root(),
                label: root_label.to_owned(),
                data: None,
                original: None,
                expandable: true,
            },
            parent: None,
            children: Vec::new(),
            editing: false,
            placeholder: false,
        };
        MemoryTree {
            entries: HashMap::from([(NodeKey::root(), root)]),
            events: VecDeque::new(),
            next_id: 1,
        }
    }

    fn mint_key(&mut self) -> NodeKey {
        let key = NodeKey(format!("j1_{}", self.next_id));
        self.next_id += 1;
        key
    }

    fn insert_entry(&mut self, parent: &NodeKey, node: UiNode, placeholder: bool) -> NodeKey {
        let key = node.key.clone();
        self.entries.insert(
            key.clone(),
            Entry {
                node,
                parent: Some(parent.clone()),
                children: Vec::new(),
                editing: false,
                placeholder,
            },
        );
        if let Some(parent) = self.entries.get_mut(parent) {
            parent.children.push(key.clone());
            parent.node.expandable = true;
        }
        key
    }

    fn remove_subtree(&mut self, key: &NodeKey) {
        if let Some(entry) = self.entries.remove(key) {
            for child in entry.children {
                self.remove_subtree(&child);
            }
        }
    }

    fn is_ancestor(&self, ancestor: &NodeKey, key: &NodeKey) -> bool {
        let mut current = Some(key.clone());
        while let Some(k) = current {
            if &k == ancestor {
                return true;
            }
            current = self.entries.get(&k).and_then(|e| e.parent.clone());
        }
        false
    }

    /// Detaches `key` and inserts it under `new_parent`; `None` if the move
    /// is impossible (unknown nodes, the root, or a cycle).
    fn relocate(&mut self, key: &NodeKey, new_parent: &NodeKey, position: usize) -> Option<MoveEvent> {
        if key.is_root() || !self.entries.contains_key(new_parent) || self.is_ancestor(key, new_parent)
        {
            return None;
        }
        let old_parent = self.entries.get(key)?.parent.clone()?;
        let siblings = &mut self.entries.get_mut(&old_parent)?.children;
        let old_position = siblings.iter().position(|k| k == key)?;
        siblings.remove(old_position);

        let target = self.entries.get_mut(new_parent)?;
        let position = position.min(target.children.len());
        target.children.insert(position, key.clone());
        target.node.expandable = true;
        if let Some(entry) = self.entries.get_mut(key) {
            entry.parent = Some(new_parent.clone());
        }
        Some(MoveEvent {
            node: key.clone(),
            old_parent,
            new_parent: new_parent.clone(),
            old_position,
            position,
        })
    }

    pub fn user_expand(&mut self, key: &NodeKey) {
        self.events.push_back(TreeEvent::ExpandRequested(key.clone()));
    }

    /// Finishes an inline edit with `text`.
    pub fn user_commit_edit(&mut self, key: &NodeKey, text: &str) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        if !entry.editing {
            return;
        }
        entry.editing = false;
        let old_name = std::mem::replace(&mut entry.node.label, text.to_owned());
        let event = if std::mem::take(&mut entry.placeholder) {
            TreeEvent::CreateCommitted {
                node: key.clone(),
                name: text.to_owned(),
            }
        } else {
            TreeEvent::RenameCommitted {
                node: key.clone(),
                old_name,
                new_name: text.to_owned(),
            }
        };
        self.events.push_back(event);
    }

    pub fn user_drag(&mut self, key: &NodeKey, new_parent: &NodeKey, position: usize) {
        if let Some(moved) = self.relocate(key, new_parent, position) {
            self.events.push_back(TreeEvent::Moved(moved));
        }
    }

    pub fn user_delete(&mut self, key: &NodeKey) {
        self.events.push_back(TreeEvent::DeleteRequested(key.clone()));
    }

    /// Drops the live record of `key`, keeping the original snapshot.
    pub fn strip_live_data(&mut self, key: &NodeKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.node.data = None;
        }
    }

    pub fn is_editing(&self, key: &NodeKey) -> bool {
        self.entries.get(key).is_some_and(|e| e.editing)
    }

    pub fn find_by_label(&self, parent: &NodeKey, label: &str) -> Option<NodeKey> {
        self.entries
            .get(parent)?
            .children
            .iter()
            .find(|child| self.entries.get(*child).is_some_and(|e| e.node.label == label))
            .cloned()
    }

    /// Indented listing; unexpanded nodes that may have children end in `/`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&NodeKey::root(), 0, &mut out);
        out
    }

    fn render_into(&self, key: &NodeKey, depth: usize, out: &mut String) {
        let Some(entry) = self.entries.get(key) else {
            return;
        };
        let marker = if entry.node.expandable && entry.children.is_empty() {
            "/"
        } else {
            ""
        };
        out.push_str(&format!("{}{}{}\n", "  ".repeat(depth), entry.node.label, marker));
        for child in &entry.children {
            self.render_into(child, depth + 1, out);
        }
    }
}

impl TreeWidget for MemoryTree {
    fn node(&self, key: &NodeKey) -> Option<UiNode> {
        self.entries.get(key).map(|e| e.node.clone())
    }

    fn parent(&self, key: &NodeKey) -> Option<NodeKey> {
        self.entries.get(key)?.parent.clone()
    }

    fn children(&self, key: &NodeKey) -> Vec<NodeKey> {
        self.entries
            .get(key)
            .map(|e| e.children.clone())
            .unwrap_or_default()
    }

    fn set_children(&mut self, parent: &NodeKey, children: Vec<NodeSpec>) -> Vec<NodeKey> {
        let Some(entry) = self.entries.get_mut(parent) else {
            return Vec::new();
        };
        let old = std::mem::take(&mut entry.children);
        entry.node.expandable = !children.is_empty();
        for key in old {
            self.remove_subtree(&key);
        }
        children
            .into_iter()
            .map(|spec| {
                let data = Some(NodeData {
                    asset_id: Some(spec.asset_id),
                });
                let node = UiNode {
                    key: self.mint_key(),
                    label: spec.label,
                    data,
                    original: data,
                    expandable: spec.expandable,
                };
                self.insert_entry(parent, node, false)
            })
            .collect()
    }

    fn create_placeholder(&mut self, parent: &NodeKey, label: &str) -> NodeKey {
        let node = UiNode {
            key: self.mint_key(),
            label: label.to_owned(),
            data: None,
            original: None,
            expandable: false,
        };
        self.insert_entry(parent, node, true)
    }

    fn begin_edit(&mut self, key: &NodeKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.editing = true;
        }
    }

    fn rename(&mut self, key: &NodeKey, label: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.node.label = label.to_owned();
        }
    }

    fn move_node(&mut self, key: &NodeKey, new_parent: &NodeKey, position: usize) -> bool {
        match self.relocate(key, new_parent, position) {
            Some(moved) => {
                self.events.push_back(TreeEvent::Moved(moved));
                true
            }
            None => false,
        }
    }

    fn remove(&mut self, key: &NodeKey) {
        if key.is_root() {
            return;
        }
        let parent = self.entries.get(key).and_then(|e| e.parent.clone());
        if let Some(parent) = parent.and_then(|p| self.entries.get_mut(&p)) {
            parent.children.retain(|k| k != key);
        }
        self.remove_subtree(key);
    }

    fn next_event(&mut self) -> Option<TreeEvent> {
        self.events.pop_front()
    }
}
