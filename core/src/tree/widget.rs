use super::node::{NodeKey, NodeSpec, UiNode};

/// A node changed parent or position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveEvent {
    pub node: NodeKey,
    pub old_parent: NodeKey,
    pub new_parent: NodeKey,
    pub old_position: usize,
    pub position: usize,
}

/// Structural events fired by a tree widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    ExpandRequested(NodeKey),
    /// Inline edit of a placeholder finished.
    CreateCommitted { node: NodeKey, name: String },
    RenameCommitted {
        node: NodeKey,
        old_name: String,
        new_name: String,
    },
    Moved(MoveEvent),
    DeleteRequested(NodeKey),
}

/// Rendering surface for the hierarchy.
///
/// The widget owns its nodes; the synthetic root always exists under
/// [`NodeKey::root`]. Every move, including programmatic ones through
/// [`TreeWidget::move_node`], must be reported as [`TreeEvent::Moved`].
pub trait TreeWidget: Send {
    fn node(&self, key: &NodeKey) -> Option<UiNode>;

    /// `None` for the root and for unknown keys.
    fn parent(&self, key: &NodeKey) -> Option<NodeKey>;

    fn children(&self, key: &NodeKey) -> Vec<NodeKey>;

    /// Replaces the children of `parent`. An empty list turns it into a leaf.
    fn set_children(&mut self, parent: &NodeKey, children: Vec<NodeSpec>) -> Vec<NodeKey>;

    /// Appends a node without any asset record.
    fn create_placeholder(&mut self, parent: &NodeKey, label: &str) -> NodeKey;

    fn begin_edit(&mut self, key: &NodeKey);

    fn rename(&mut self, key: &NodeKey, label: &str);

    /// Returns false when the node could not be moved; no event is queued then.
    fn move_node(&mut self, key: &NodeKey, new_parent: &NodeKey, position: usize) -> bool;

    fn remove(&mut self, key: &NodeKey);

    fn next_event(&mut self) -> Option<TreeEvent>;
}

/// Interactive yes/no question.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Answers every question the same way.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
    fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}
