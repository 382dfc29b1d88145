//! Normalization of server payloads into the canonical model types.
//!
//! The backend is not consistent about casing and wrapping, so every endpoint
//! gets exactly one function here and nothing else in the crate looks at raw
//! JSON.

use std::fmt::Display;

use chrono::Utc;
use serde_json::Value;

use crate::model::{Asset, AssetId, DeletedAsset, Profile, Session};

/// Result of an insert, update or move.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MutationReply {
    pub asset: Option<Asset>,
    pub message: Option<String>,
}

/// The three ways a restore can succeed.
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
    /// `204`, nothing further to show.
    NoContent,
    /// The server wants the user to act, e.g. pick one of several former parents.
    Notice {
        message: String,
        parent_ids: Vec<AssetId>,
        note: Option<String>,
    },
    Restored(Asset),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AverageReply {
    pub column: Option<String>,
    pub average: Option<f64>,
    pub message: Option<String>,
}

fn field<'a>(value: &'a Value, names: &[&str]) -> Option<&'a Value> {
    let map = value.as_object()?;
    names
        .iter()
        .find_map(|name| map.get(*name).filter(|v| !v.is_null()))
}

fn string_field(value: &Value, names: &[&str]) -> Option<String> {
    match field(value, names)? {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_owned()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn id_value(value: &Value) -> Option<AssetId> {
    match value {
        Value::Number(number) => number.as_i64().map(AssetId),
        Value::String(text) => text.trim().parse::<i64>().ok().map(AssetId),
        _ => None,
    }
}

fn id_list(value: Option<&Value>) -> Vec<AssetId> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(id_value).collect(),
        Some(single) => id_value(single).into_iter().collect(),
        None => Vec::new(),
    }
}

/// Unwraps `[...]`, `{"$values": [...]}` and `{"items": [...]}` lists.
fn list_items<'a>(value: &'a Value, wrapper_names: &[&str]) -> &'a [Value] {
    match value {
        Value::Array(items) => items,
        Value::Object(_) => field(value, wrapper_names)
            .map(|inner| list_items(inner, &["$values"]))
            .unwrap_or(&[]),
        _ => &[],
    }
}

pub fn asset(value: &Value) -> Option<Asset> {
    let id = field(value, &["id", "Id", "assetId", "AssetId"]).and_then(id_value)?;
    let name = string_field(value, &["name", "Name"]).unwrap_or_default();
    let children = field(value, &["children", "Children"])
        .map(assets)
        .unwrap_or_default();
    Some(Asset { id, name, children })
}

/// `GetByParentId` and `GetAssetHierarchy`.
pub fn assets(value: &Value) -> Vec<Asset> {
    list_items(value, &["$values", "items", "assets", "Assets"])
        .iter()
        .filter_map(|item| {
            let parsed = asset(item);
            if parsed.is_none() {
                tracing::warn!(?item, "skipping asset without id");
            }
            parsed
        })
        .collect()
}

pub fn deleted_asset(value: &Value) -> Option<DeletedAsset> {
    let asset_id = field(value, &["assetId", "AssetId", "id", "Id"]).and_then(id_value)?;
    let name = string_field(value, &["name", "Name", "assetName", "AssetName"]).unwrap_or_default();
    let parent_ids = id_list(field(
        value,
        &["parentIds", "ParentIds", "parentId", "ParentId"],
    ));
    let children = field(value, &["children", "Children"])
        .map(assets)
        .unwrap_or_default();
    Some(DeletedAsset {
        asset_id,
        name,
        parent_ids,
        children,
    })
}

/// `GetAllDeletedAssets`.
pub fn deleted_assets(value: &Value) -> Vec<DeletedAsset> {
    list_items(value, &["DeletedAssets", "deletedAssets", "$values", "items"])
        .iter()
        .filter_map(deleted_asset)
        .collect()
}

/// `InsertAsset`, `UpdateAsset` and `MoveAsset`.
pub fn mutation_reply(value: &Value) -> MutationReply {
    MutationReply {
        asset: asset(value),
        message: string_field(value, &["message", "Message"]),
    }
}

/// `RetrieveDeletedAsset` with a body. The `204` case never gets here.
pub fn restore_outcome(value: &Value) -> RestoreOutcome {
    let message = string_field(value, &["message", "Message"]);
    match (message, asset(value)) {
        (None, Some(restored)) => RestoreOutcome::Restored(restored),
        (message, _) => RestoreOutcome::Notice {
            message: message.unwrap_or_else(|| "Restore request completed".to_owned()),
            parent_ids: id_list(field(value, &["parentIds", "ParentIds"])),
            note: string_field(value, &["note", "Note"]),
        },
    }
}

/// `GetAllCombinationsCount`.
pub fn combinations_count(value: &Value) -> Option<u64> {
    match field(value, &["totalCombinations", "TotalCombinations"])? {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// `CalculateAverage` and the `ReceiveAverage` push event.
pub fn average_reply(value: &Value) -> AverageReply {
    let average = match field(value, &["average", "Average", "avg", "value"]) {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse().ok(),
        _ => None,
    };
    AverageReply {
        column: string_field(value, &["columnName", "ColumnName", "column"]),
        average,
        message: string_field(value, &["message", "Message"]),
    }
}

/// How a structural push event refers to its asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLabel {
    Name(String),
    Id(i64),
}

impl Display for AssetLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetLabel::Name(name) => write!(f, "\"{}\"", name),
            AssetLabel::Id(id) => write!(f, "#{}", id),
        }
    }
}

const LABEL_NAME_FIELDS: &[&str] = &[
    "name",
    "Name",
    "assetName",
    "AssetName",
    "deviceName",
    "DeviceName",
    "title",
];
const LABEL_NESTED_FIELDS: &[&str] = &["asset", "Asset", "device", "Device", "data", "payload"];

/// The `DeviceAdded`, `DeviceUpdated` and `DeviceRemoved` push payloads.
/// A name wins over an id, also when the name is nested one level down.
pub fn asset_label(value: &Value) -> Option<AssetLabel> {
    match value {
        Value::String(text) if !text.trim().is_empty() => {
            Some(AssetLabel::Name(text.trim().to_owned()))
        }
        Value::Number(number) => number.as_i64().map(AssetLabel::Id),
        Value::Array(items) => items.iter().find_map(asset_label),
        Value::Object(map) => LABEL_NAME_FIELDS
            .iter()
            .find_map(|name| match map.get(*name) {
                Some(Value::String(text)) if !text.trim().is_empty() => {
                    Some(AssetLabel::Name(text.trim().to_owned()))
                }
                _ => None,
            })
            .or_else(|| {
                LABEL_NESTED_FIELDS
                    .iter()
                    .filter_map(|name| map.get(*name))
                    .find_map(asset_label)
            })
            .or_else(|| {
                field(value, &["id", "Id", "assetId", "AssetId"])
                    .and_then(id_value)
                    .map(|id| AssetLabel::Id(id.0))
            }),
        _ => None,
    }
}

/// `Auth/login` and `Auth/register`. `email` is what the user typed; the
/// server does not echo it back reliably.
pub fn session(value: &Value, email: &str, fallback_name: Option<&str>) -> Session {
    let token = string_field(value, &["accessToken", "AccessToken", "token"]);
    let user = field(value, &["user", "User"]);
    let name = string_field(value, &["name", "Name", "userName", "UserName"])
        .or_else(|| user.and_then(|u| string_field(u, &["name", "userName", "UserName"])))
        .or_else(|| fallback_name.map(str::to_owned))
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_owned());
    let role = user
        .and_then(|u| string_field(u, &["role", "Role"]))
        .or_else(|| string_field(value, &["role", "Role"]))
        .unwrap_or_else(|| "User".to_owned());
    Session {
        token,
        profile: Profile {
            email: email.to_owned(),
            name,
            role,
        },
        issued_at: Utc::now(),
    }
}
