use serde::Serialize;

use super::AssetId;

/// A node of the server-maintained hierarchy.
///
/// `children` is only populated by endpoints returning nested trees; the lazy
/// path leaves it empty and discovers children at expand time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: AssetId,
    pub name: String,
    pub children: Vec<Asset>,
}

impl Asset {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Asset {
            id: AssetId(id),
            name: name.into(),
            children: Vec::new(),
        }
    }
}

/// Snapshot of a soft-deleted asset.
///
/// The hierarchy allows multiple parents per asset, so all former parents are
/// kept in `parent_ids` in the order the server reports them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedAsset {
    pub asset_id: AssetId,
    pub name: String,
    pub parent_ids: Vec<AssetId>,
    pub children: Vec<Asset>,
}

/// Anything that can be rendered as a tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeSource {
    Asset(Asset),
    Deleted(DeletedAsset),
}

impl TreeSource {
    pub fn asset_id(&self) -> AssetId {
        match self {
            TreeSource::Asset(asset) => asset.id,
            TreeSource::Deleted(deleted) => deleted.asset_id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TreeSource::Asset(asset) => &asset.name,
            TreeSource::Deleted(deleted) => &deleted.name,
        }
    }

    pub fn children(&self) -> &[Asset] {
        match self {
            TreeSource::Asset(asset) => &asset.children,
            TreeSource::Deleted(deleted) => &deleted.children,
        }
    }
}

impl From<Asset> for TreeSource {
    fn from(value: Asset) -> Self {
        TreeSource::Asset(value)
    }
}

impl From<DeletedAsset> for TreeSource {
    fn from(value: DeletedAsset) -> Self {
        TreeSource::Deleted(value)
    }
}
