use std::{collections::HashMap, sync::Arc};

use itertools::Itertools;

use crate::{
    api::{ApiError, HierarchyApi, RestoreOutcome, UpdateAsset},
    model::{Asset, AssetId, TreeSource},
    notify::{Notifier, Toast},
};

use super::{
    deleted::DeletedAssetsView,
    node::{node_spec, LoadState, NodeKey},
    widget::{Confirm, MoveEvent, TreeEvent, TreeWidget},
};

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("This asset is not synchronized yet, refresh the tree and try again")]
    Unresolved(NodeKey),
    #[error("The root node cannot be changed")]
    Root,
    #[error("Top-level assets cannot be moved")]
    TopLevelMove,
    #[error("Unknown node {0}")]
    UnknownNode(NodeKey),
}

/// What an operation ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Loaded(usize),
    AlreadyLoaded,
    /// A newer load of the same node was started; the response was dropped.
    Discarded,
    Created,
    Renamed,
    Moved,
    Deleted,
    Cancelled,
    Unchanged,
    /// The widget reported our own revert back to us.
    EchoSuppressed,
}

/// An in-flight children load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub node: NodeKey,
    pub parent: Option<AssetId>,
    generation: u64,
}

/// A move made by the controller itself, expected back from the widget.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Echo {
    node: NodeKey,
    from: NodeKey,
    to: NodeKey,
}

impl Echo {
    fn matches(&self, moved: &MoveEvent) -> bool {
        self.node == moved.node && self.from == moved.old_parent && self.to == moved.new_parent
    }
}

/// Keeps a [`TreeWidget`] in sync with the remote hierarchy.
///
/// Every mutation is applied to the widget first and rolled back when the
/// server refuses it. Failures are reported through the notifier and also
/// returned to the caller.
pub struct TreeController<W, A> {
    widget: W,
    api: Arc<A>,
    notifier: Arc<dyn Notifier>,
    confirm: Box<dyn Confirm>,
    loads: HashMap<NodeKey, LoadState>,
    generation: u64,
    echoes: Vec<Echo>,
    /// Nodes whose failed move could not be undone because a later move of
    /// theirs was already queued, mapped to the parent the server still has.
    displaced: HashMap<NodeKey, NodeKey>,
    deleted: DeletedAssetsView,
}

impl<W: TreeWidget, A: HierarchyApi> TreeController<W, A> {
    pub fn new(
        widget: W,
        api: Arc<A>,
        notifier: Arc<dyn Notifier>,
        confirm: Box<dyn Confirm>,
    ) -> Self {
        TreeController {
            widget,
            api,
            notifier,
            confirm,
            loads: HashMap::new(),
            generation: 0,
            echoes: Vec::new(),
            displaced: HashMap::new(),
            deleted: DeletedAssetsView::default(),
        }
    }

    pub fn widget(&self) -> &W {
        &self.widget
    }

    pub fn widget_mut(&mut self) -> &mut W {
        &mut self.widget
    }

    pub fn deleted_view(&self) -> &DeletedAssetsView {
        &self.deleted
    }

    pub fn load_state(&self, key: &NodeKey) -> LoadState {
        self.loads.get(key).copied().unwrap_or_default()
    }

    #[cfg(test)]
    pub(super) fn tracked_loads(&self) -> usize {
        self.loads.len()
    }

    /// Drops what is tracked for the nodes below `key`.
    fn forget_below(&mut self, key: &NodeKey) {
        for child in self.widget.children(key) {
            self.forget_below(&child);
            self.loads.remove(&child);
            self.displaced.remove(&child);
        }
    }

    fn resolve(&self, key: &NodeKey) -> Result<AssetId, TreeError> {
        let node = self
            .widget
            .node(key)
            .ok_or_else(|| TreeError::UnknownNode(key.clone()))?;
        node.asset_id()
            .ok_or_else(|| TreeError::Unresolved(key.clone()))
    }

    fn resolve_parent(&self, key: &NodeKey) -> Result<Option<AssetId>, TreeError> {
        let parent = self
            .widget
            .parent(key)
            .ok_or_else(|| TreeError::UnknownNode(key.clone()))?;
        Ok(self.resolve(&parent)?.as_parent())
    }

    fn report(&self, title: &str, err: &TreeError) {
        tracing::warn!(%err, title, "tree operation failed");
        let toast = match err {
            TreeError::Root | TreeError::TopLevelMove => Toast::warning(title, err.to_string()),
            _ => Toast::error(title, err.to_string()),
        };
        self.notifier.notify(toast);
    }

    fn fail<T>(&self, title: &str, err: impl Into<TreeError>) -> Result<T, TreeError> {
        let err = err.into();
        self.report(title, &err);
        Err(err)
    }

    /// Starts a load of `key`'s children; any older load of it goes stale.
    pub fn begin_load(&mut self, key: &NodeKey) -> Result<LoadTicket, TreeError> {
        let id = self.resolve(key)?;
        self.generation += 1;
        self.loads.insert(
            key.clone(),
            LoadState::Loading {
                generation: self.generation,
            },
        );
        Ok(LoadTicket {
            node: key.clone(),
            parent: id.as_parent(),
            generation: self.generation,
        })
    }

    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<Asset>, ApiError>,
    ) -> Result<Outcome, TreeError> {
        match self.loads.get(&ticket.node) {
            Some(LoadState::Loading { generation }) if *generation == ticket.generation => {}
            current => {
                tracing::debug!(node = %ticket.node, ?current, "discarding stale children response");
                return Ok(Outcome::Discarded);
            }
        }
        match result {
            Ok(assets) => {
                let count = assets.len();
                let specs = assets
                    .into_iter()
                    .map(|asset| node_spec(&TreeSource::Asset(asset)))
                    .collect();
                self.forget_below(&ticket.node);
                self.widget.set_children(&ticket.node, specs);
                self.loads.insert(ticket.node, LoadState::Loaded);
                Ok(Outcome::Loaded(count))
            }
            Err(err) => {
                self.loads.insert(ticket.node, LoadState::Unloaded);
                self.fail("Could not load assets", err)
            }
        }
    }

    async fn load(&mut self, key: &NodeKey) -> Result<Outcome, TreeError> {
        let ticket = match self.begin_load(key) {
            Ok(ticket) => ticket,
            Err(err) => return self.fail("Could not load assets", err),
        };
        let result = self.api.children_of(ticket.parent).await;
        self.complete_load(ticket, result)
    }

    /// Loads the children of `key` the first time it is expanded.
    #[tracing::instrument(skip(self))]
    pub async fn expand(&mut self, key: &NodeKey) -> Result<Outcome, TreeError> {
        if self.load_state(key) == LoadState::Loaded {
            return Ok(Outcome::AlreadyLoaded);
        }
        self.load(key).await
    }

    /// Reloads the children of `key` even if they are loaded.
    #[tracing::instrument(skip(self))]
    pub async fn refresh(&mut self, key: &NodeKey) -> Result<Outcome, TreeError> {
        self.load(key).await
    }

    /// Replaces the whole tree with the nested hierarchy.
    #[tracing::instrument(skip(self))]
    pub async fn load_hierarchy(&mut self) -> Result<usize, TreeError> {
        let assets = match self.api.hierarchy().await {
            Ok(assets) => assets,
            Err(err) => return self.fail("Could not load assets", err),
        };
        Ok(self.populate(&NodeKey::root(), assets))
    }

    fn populate(&mut self, parent: &NodeKey, assets: Vec<Asset>) -> usize {
        let (specs, nested): (Vec<_>, Vec<_>) = assets
            .into_iter()
            .map(|mut asset| {
                let children = std::mem::take(&mut asset.children);
                (node_spec(&TreeSource::Asset(asset)), children)
            })
            .unzip();
        self.forget_below(parent);
        let keys = self.widget.set_children(parent, specs);
        self.loads.insert(parent.clone(), LoadState::Loaded);
        keys.iter()
            .zip(nested)
            .map(|(key, children)| 1 + self.populate(key, children))
            .sum()
    }

    /// Adds a placeholder under `parent` and puts it into edit mode. The
    /// server call happens when the edit is committed.
    pub fn begin_create(&mut self, parent: &NodeKey, label: &str) -> NodeKey {
        let key = self.widget.create_placeholder(parent, label);
        self.widget.begin_edit(&key);
        key
    }

    #[tracing::instrument(skip(self))]
    pub async fn create(&mut self, node: &NodeKey, name: &str) -> Result<Outcome, TreeError> {
        const TITLE: &str = "Could not create asset";
        let name = name.trim();
        if name.is_empty() {
            self.widget.remove(node);
            return Ok(Outcome::Cancelled);
        }
        let parent = match self.resolve_parent(node) {
            Ok(parent) => parent,
            Err(err) => {
                self.widget.remove(node);
                return self.fail(TITLE, err);
            }
        };
        match self.api.insert(parent, name).await {
            Ok(reply) => {
                // the placeholder keeps no asset id until the parent is reloaded
                self.widget.rename(node, name);
                self.notifier.notify(Toast::success(
                    "Asset created",
                    reply
                        .message
                        .unwrap_or_else(|| format!("\"{}\" was created.", name)),
                ));
                Ok(Outcome::Created)
            }
            Err(err) => {
                self.widget.remove(node);
                self.fail(TITLE, err)
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn rename(
        &mut self,
        node: &NodeKey,
        old_name: &str,
        new_name: &str,
    ) -> Result<Outcome, TreeError> {
        const TITLE: &str = "Could not rename asset";
        let new_name = new_name.trim();
        if new_name.is_empty() || new_name == old_name {
            self.widget.rename(node, old_name);
            return Ok(Outcome::Unchanged);
        }
        if node.is_root() {
            self.widget.rename(node, old_name);
            return self.fail(TITLE, TreeError::Root);
        }
        let ids = self
            .resolve(node)
            .and_then(|id| Ok((id, self.resolve_parent(node)?)));
        let (id, parent) = match ids {
            Ok(ids) => ids,
            Err(err) => {
                self.widget.rename(node, old_name);
                return self.fail(TITLE, err);
            }
        };
        let update = UpdateAsset::rename(id, parent, old_name, new_name);
        match self.api.update(&update).await {
            Ok(reply) => {
                self.widget.rename(node, new_name);
                self.notifier.notify(Toast::success(
                    "Asset renamed",
                    reply.message.unwrap_or_else(|| {
                        format!("\"{}\" is now \"{}\".", old_name, new_name)
                    }),
                ));
                Ok(Outcome::Renamed)
            }
            Err(err) => {
                self.widget.rename(node, old_name);
                self.fail(TITLE, err)
            }
        }
    }

    /// Puts a moved node back under `origin`, where the server has it.
    ///
    /// A node that a later queued move already took elsewhere stays put; that
    /// move is then sent from `origin`.
    fn revert(&mut self, moved: &MoveEvent, origin: &NodeKey) {
        match self.widget.parent(&moved.node) {
            Some(current) if current == moved.new_parent => {
                let position = if origin == &moved.old_parent {
                    moved.old_position
                } else {
                    usize::MAX
                };
                if self.widget.move_node(&moved.node, origin, position) {
                    self.echoes.push(Echo {
                        node: moved.node.clone(),
                        from: current,
                        to: origin.clone(),
                    });
                } else {
                    tracing::warn!(node = %moved.node, %origin, "could not put node back");
                }
            }
            Some(_) => {
                self.displaced.insert(moved.node.clone(), origin.clone());
            }
            None => {}
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn on_move(&mut self, moved: MoveEvent) -> Result<Outcome, TreeError> {
        const TITLE: &str = "Could not move asset";
        if let Some(index) = self.echoes.iter().position(|echo| echo.matches(&moved)) {
            self.echoes.remove(index);
            return Ok(Outcome::EchoSuppressed);
        }
        let origin = self
            .displaced
            .remove(&moved.node)
            .unwrap_or_else(|| moved.old_parent.clone());
        if moved.node.is_root() || origin.is_root() {
            self.revert(&moved, &origin);
            return self.fail("Move not allowed", TreeError::TopLevelMove);
        }
        if origin == moved.new_parent {
            return Ok(Outcome::Unchanged);
        }
        let resolved = self.resolve(&moved.node).and_then(|id| {
            Ok((
                id,
                self.resolve(&origin)?,
                self.resolve(&moved.new_parent)?,
            ))
        });
        let (id, old_parent, new_parent) = match resolved {
            Ok(ids) => ids,
            Err(err) => {
                self.revert(&moved, &origin);
                return self.fail(TITLE, err);
            }
        };
        let label = self
            .widget
            .node(&moved.node)
            .map(|node| node.label)
            .unwrap_or_default();
        let update = UpdateAsset {
            id,
            old_parent_id: old_parent.as_parent(),
            new_parent_id: new_parent.as_parent(),
            old_name: label.clone(),
            new_name: label.clone(),
        };
        match self.api.update(&update).await {
            Ok(reply) => {
                self.notifier.notify(Toast::success(
                    "Asset moved",
                    reply
                        .message
                        .unwrap_or_else(|| format!("\"{}\" was moved.", label)),
                ));
                Ok(Outcome::Moved)
            }
            Err(err) => {
                self.revert(&moved, &origin);
                self.fail(TITLE, err)
            }
        }
    }

    /// Deletes `node` after the user confirmed it.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&mut self, node: &NodeKey) -> Result<Outcome, TreeError> {
        const TITLE: &str = "Could not delete asset";
        if node.is_root() {
            return self.fail(TITLE, TreeError::Root);
        }
        let label = match self.widget.node(node) {
            Some(ui) => ui.label,
            None => return self.fail(TITLE, TreeError::UnknownNode(node.clone())),
        };
        if !self
            .confirm
            .confirm(&format!("Delete \"{}\" and everything below it?", label))
        {
            tracing::debug!(%node, "delete declined");
            return Ok(Outcome::Cancelled);
        }
        let id = match self.resolve(node) {
            Ok(id) => id,
            Err(err) => return self.fail(TITLE, err),
        };
        match self.api.delete(id).await {
            Ok(()) => {
                self.forget_below(node);
                self.loads.remove(node);
                self.displaced.remove(node);
                self.widget.remove(node);
                self.notifier.notify(Toast::success(
                    "Asset deleted",
                    format!("\"{}\" was deleted.", label),
                ));
                Ok(Outcome::Deleted)
            }
            Err(err) => self.fail(TITLE, err),
        }
    }

    /// Refetches the deleted-assets view.
    #[tracing::instrument(skip(self))]
    pub async fn load_deleted(&mut self) -> Result<usize, TreeError> {
        match self.api.deleted().await {
            Ok(items) => {
                let count = items.len();
                self.deleted.replace(items);
                Ok(count)
            }
            Err(err) => self.fail("Could not load deleted assets", err),
        }
    }

    /// Restores a deleted asset. The deleted view is reloaded afterwards
    /// whatever the outcome.
    #[tracing::instrument(skip(self))]
    pub async fn restore(&mut self, id: AssetId) -> Result<RestoreOutcome, TreeError> {
        let result = self.api.restore(id).await;
        match &result {
            Ok(RestoreOutcome::NoContent) => self
                .notifier
                .notify(Toast::info("Restore complete", "Nothing further to show.")),
            Ok(RestoreOutcome::Notice {
                message,
                parent_ids,
                note,
            }) => {
                let mut text = message.clone();
                if !parent_ids.is_empty() {
                    text.push_str(&format!(
                        " Former parents: {}.",
                        parent_ids.iter().map(|p| format!("#{}", p.0)).join(", ")
                    ));
                }
                if let Some(note) = note {
                    text.push(' ');
                    text.push_str(note);
                }
                self.notifier
                    .notify(Toast::warning("Restore needs attention", text));
            }
            Ok(RestoreOutcome::Restored(asset)) => self.notifier.notify(Toast::success(
                "Asset restored",
                format!("\"{}\" was restored.", asset.name),
            )),
            Err(err) => self
                .notifier
                .notify(Toast::error("Could not restore asset", err.to_string())),
        }
        if let Err(err) = self.load_deleted().await {
            tracing::debug!(%err, "deleted view stays stale");
        }
        result.map_err(TreeError::from)
    }

    #[tracing::instrument(skip(self))]
    pub async fn dispatch(&mut self, event: TreeEvent) -> Result<Outcome, TreeError> {
        match event {
            TreeEvent::ExpandRequested(node) => self.expand(&node).await,
            TreeEvent::CreateCommitted { node, name } => self.create(&node, &name).await,
            TreeEvent::RenameCommitted {
                node,
                old_name,
                new_name,
            } => self.rename(&node, &old_name, &new_name).await,
            TreeEvent::Moved(moved) => self.on_move(moved).await,
            TreeEvent::DeleteRequested(node) => self.delete(&node).await,
        }
    }

    /// Handles every event the widget has queued, including the ones queued
    /// while handling.
    pub async fn pump(&mut self) -> Vec<Result<Outcome, TreeError>> {
        let mut results = Vec::new();
        while let Some(event) = self.widget.next_event() {
            results.push(self.dispatch(event).await);
        }
        results
    }
}
