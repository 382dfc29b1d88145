use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::json;

use crate::{
    model::{Asset, AssetId, DeletedAsset},
    session::SessionStore,
};

use super::{
    response::read_json,
    wire::{self, AverageReply, MutationReply, RestoreOutcome},
    ApiError,
};

/// Name-only or parent-changing edit, sent to `UpdateAsset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateAsset {
    pub id: AssetId,
    pub old_parent_id: Option<AssetId>,
    pub new_parent_id: Option<AssetId>,
    pub old_name: String,
    pub new_name: String,
}

impl UpdateAsset {
    pub fn rename(id: AssetId, parent: Option<AssetId>, old_name: &str, new_name: &str) -> Self {
        UpdateAsset {
            id,
            old_parent_id: parent,
            new_parent_id: parent,
            old_name: old_name.to_owned(),
            new_name: new_name.to_owned(),
        }
    }
}

/// Operations of the remote hierarchy service.
#[async_trait]
pub trait HierarchyApi: Send + Sync {
    /// Children of `parent`, or the top level when `parent` is `None`.
    async fn children_of(&self, parent: Option<AssetId>) -> Result<Vec<Asset>, ApiError>;

    /// The whole tree with nested children.
    async fn hierarchy(&self) -> Result<Vec<Asset>, ApiError>;

    async fn insert(&self, parent: Option<AssetId>, name: &str)
        -> Result<MutationReply, ApiError>;

    async fn update(&self, update: &UpdateAsset) -> Result<MutationReply, ApiError>;

    async fn move_asset(
        &self,
        id: AssetId,
        new_parent: Option<AssetId>,
    ) -> Result<MutationReply, ApiError>;

    async fn delete(&self, id: AssetId) -> Result<(), ApiError>;

    async fn deleted(&self) -> Result<Vec<DeletedAsset>, ApiError>;

    async fn restore(&self, id: AssetId) -> Result<RestoreOutcome, ApiError>;

    async fn combinations_count(&self) -> Result<Option<u64>, ApiError>;

    async fn average(&self, column: &str) -> Result<AverageReply, ApiError>;
}

const HIERARCHY: &str = "AssetHierarchy";

pub struct HierarchyClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<dyn SessionStore>,
}

impl HierarchyClient {
    pub fn new(
        base_url: &str,
        session: Arc<dyn SessionStore>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()?;
        Ok(Self::with_http(http, base_url, session))
    }

    pub fn with_http(http: reqwest::Client, base_url: &str, session: Arc<dyn SessionStore>) -> Self {
        HierarchyClient {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            session,
        }
    }

    fn request(&self, method: Method, action: &str) -> RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, HIERARCHY, action);
        let builder = self.http.request(method, url);
        match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<serde_json::Value, ApiError> {
        let resp = builder.send().await?;
        read_json(resp).await
    }
}

#[async_trait]
impl HierarchyApi for HierarchyClient {
    #[tracing::instrument(skip(self))]
    async fn children_of(&self, parent: Option<AssetId>) -> Result<Vec<Asset>, ApiError> {
        let action = match parent {
            Some(id) => format!("GetByParentId/{}", id.0),
            None => "GetByParentId".to_owned(),
        };
        let body = self.send(self.request(Method::GET, &action)).await?;
        Ok(wire::assets(&body))
    }

    #[tracing::instrument(skip(self))]
    async fn hierarchy(&self) -> Result<Vec<Asset>, ApiError> {
        let body = self
            .send(self.request(Method::GET, "GetAssetHierarchy"))
            .await?;
        Ok(wire::assets(&body))
    }

    #[tracing::instrument(skip(self))]
    async fn insert(
        &self,
        parent: Option<AssetId>,
        name: &str,
    ) -> Result<MutationReply, ApiError> {
        let body = self
            .send(
                self.request(Method::POST, "InsertAsset")
                    .json(&json!({ "parentId": parent, "name": name })),
            )
            .await?;
        Ok(wire::mutation_reply(&body))
    }

    #[tracing::instrument(skip(self))]
    async fn update(&self, update: &UpdateAsset) -> Result<MutationReply, ApiError> {
        let body = self
            .send(self.request(Method::PUT, "UpdateAsset").json(update))
            .await?;
        Ok(wire::mutation_reply(&body))
    }

    #[tracing::instrument(skip(self))]
    async fn move_asset(
        &self,
        id: AssetId,
        new_parent: Option<AssetId>,
    ) -> Result<MutationReply, ApiError> {
        let body = self
            .send(
                self.request(Method::PUT, "MoveAsset")
                    .json(&json!({ "id": id, "newParentId": new_parent })),
            )
            .await?;
        Ok(wire::mutation_reply(&body))
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: AssetId) -> Result<(), ApiError> {
        let body = self
            .send(self.request(Method::DELETE, &format!("DeleteAsset/{}", id.0)))
            .await?;
        if body == json!(false) {
            return Err(ApiError::server(
                StatusCode::OK.as_u16(),
                "The server refused to delete the asset",
            ));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn deleted(&self) -> Result<Vec<DeletedAsset>, ApiError> {
        let body = self
            .send(self.request(Method::GET, "GetAllDeletedAssets"))
            .await?;
        Ok(wire::deleted_assets(&body))
    }

    #[tracing::instrument(skip(self))]
    async fn restore(&self, id: AssetId) -> Result<RestoreOutcome, ApiError> {
        let resp = self
            .request(Method::GET, &format!("RetrieveDeletedAsset/{}", id.0))
            .send()
            .await?;
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(RestoreOutcome::NoContent);
        }
        let body = read_json(resp).await?;
        Ok(wire::restore_outcome(&body))
    }

    #[tracing::instrument(skip(self))]
    async fn combinations_count(&self) -> Result<Option<u64>, ApiError> {
        let body = self
            .send(self.request(Method::GET, "GetAllCombinationsCount"))
            .await?;
        Ok(wire::combinations_count(&body))
    }

    #[tracing::instrument(skip(self))]
    async fn average(&self, column: &str) -> Result<AverageReply, ApiError> {
        // the endpoint takes the bare column name as a JSON string
        let body = self
            .send(self.request(Method::POST, "CalculateAverage").json(column))
            .await?;
        Ok(wire::average_reply(&body))
    }
}
