use serde_json::Value;

use crate::api::wire;

/// The push hubs the client subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum HubKind {
    /// Structural changes of the hierarchy.
    Structure,
    /// Aggregate (average) computations.
    Average,
}

impl HubKind {
    pub fn error_key(&self) -> String {
        format!("connection:{}:error", self)
    }

    pub fn reconnecting_key(&self) -> String {
        format!("connection:{}:reconnecting", self)
    }

    pub fn key_prefix(&self) -> String {
        format!("connection:{}:", self)
    }
}

/// A named event received on a hub.
#[derive(Debug, Clone, PartialEq)]
pub enum PushMessage {
    AssetAdded(Value),
    AssetUpdated(Value),
    AssetRemoved(Value),
    Average {
        column: String,
        average: Option<f64>,
    },
}

impl PushMessage {
    /// Maps a hub invocation to a message, `None` for events we do not handle.
    pub fn parse(event: &str, args: &[Value]) -> Option<PushMessage> {
        let first = || args.first().cloned().unwrap_or(Value::Null);
        match event {
            "DeviceAdded" => Some(PushMessage::AssetAdded(first())),
            "DeviceUpdated" => Some(PushMessage::AssetUpdated(first())),
            "DeviceRemoved" => Some(PushMessage::AssetRemoved(first())),
            "ReceiveAverage" => parse_average(args),
            _ => None,
        }
    }
}

fn parse_average(args: &[Value]) -> Option<PushMessage> {
    match args {
        [Value::String(column), average, ..] => Some(PushMessage::Average {
            column: column.clone(),
            average: match average {
                Value::Number(number) => number.as_f64(),
                Value::String(text) => text.trim().parse().ok(),
                _ => None,
            },
        }),
        [payload @ Value::Object(_), ..] => {
            let reply = wire::average_reply(payload);
            Some(PushMessage::Average {
                column: reply.column?,
                average: reply.average,
            })
        }
        _ => None,
    }
}

/// Lifecycle and message signals coming from a hub connection.
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    Connecting,
    Connected,
    ConnectFailed(String),
    Reconnecting(Option<String>),
    Reconnected,
    Closed(Option<String>),
    Message(PushMessage),
}
