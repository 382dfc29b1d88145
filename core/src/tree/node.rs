use std::fmt::Display;

use crate::model::{AssetId, TreeSource};

/// Widget-side identity of a node. Unrelated to the asset id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub String);

impl NodeKey {
    const ROOT_KEY: &'static str = "#";

    pub fn root() -> Self {
        NodeKey(Self::ROOT_KEY.to_owned())
    }

    pub fn is_root(&self) -> bool {
        self.0 == Self::ROOT_KEY
    }
}

impl Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeKey {
    fn from(value: &str) -> Self {
        NodeKey(value.to_owned())
    }
}

/// Record attached to a node, linking it back to the asset it shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeData {
    pub asset_id: Option<AssetId>,
}

/// A node as the widget currently holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiNode {
    pub key: NodeKey,
    pub label: String,
    /// Live record; widgets may drop it, e.g. after a drag between trees.
    pub data: Option<NodeData>,
    /// Snapshot taken when the node was created from server data.
    pub original: Option<NodeData>,
    pub expandable: bool,
}

impl UiNode {
    /// The backing asset id: live data first, then the original snapshot.
    ///
    /// The root always resolves to [`AssetId::ROOT`]. A fresh placeholder has
    /// neither record and resolves to `None`.
    pub fn asset_id(&self) -> Option<AssetId> {
        if self.key.is_root() {
            return Some(AssetId::ROOT);
        }
        self.data
            .and_then(|data| data.asset_id)
            .or_else(|| self.original.and_then(|data| data.asset_id))
    }
}

/// What a widget needs to create a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub label: String,
    pub asset_id: AssetId,
    pub expandable: bool,
}

/// The one conversion from server records to widget nodes.
///
/// Live assets are always expandable: their children are discovered lazily.
/// Deleted assets carry their children inline.
pub fn node_spec(source: &TreeSource) -> NodeSpec {
    let expandable = match source {
        TreeSource::Asset(_) => true,
        TreeSource::Deleted(deleted) => !deleted.children.is_empty(),
    };
    NodeSpec {
        label: source.name().to_owned(),
        asset_id: source.asset_id(),
        expandable,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Unloaded,
    Loading {
        generation: u64,
    },
    Loaded,
}
