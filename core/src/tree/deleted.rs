use itertools::Itertools;

use crate::model::{DeletedAsset, TreeSource};

use super::node::node_spec;

/// The soft-deleted assets as last fetched from the server.
#[derive(Debug, Clone, Default)]
pub struct DeletedAssetsView {
    items: Vec<DeletedAsset>,
}

impl DeletedAssetsView {
    pub fn replace(&mut self, items: Vec<DeletedAsset>) {
        self.items = items;
    }

    pub fn items(&self) -> &[DeletedAsset] {
        &self.items
    }
}

/// Display lines for one deleted asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedDetail {
    pub title: String,
    pub parents: Vec<String>,
    pub children: Vec<String>,
}

impl DeletedDetail {
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![self.title.clone()];
        lines.extend(self.parents.iter().map(|p| format!("  {}", p)));
        lines.extend(self.children.iter().map(|c| format!("  {}", c)));
        lines
    }
}

/// Every former parent is listed, in server order. The children line follows
/// whether the asset would be expandable as a tree node.
pub fn detail(asset: &DeletedAsset) -> DeletedDetail {
    let spec = node_spec(&TreeSource::Deleted(asset.clone()));
    let parents = if asset.parent_ids.is_empty() {
        vec!["No parents".to_owned()]
    } else {
        asset
            .parent_ids
            .iter()
            .map(|id| format!("Parent #{}", id.0))
            .collect()
    };
    let children = if !spec.expandable {
        vec!["No children".to_owned()]
    } else {
        vec![format!(
            "Children: {}",
            asset
                .children
                .iter()
                .map(|child| format!("{} (#{})", child.name, child.id.0))
                .join(", ")
        )]
    };
    DeletedDetail {
        title: format!("{} (#{})", spec.label, spec.asset_id.0),
        parents,
        children,
    }
}
