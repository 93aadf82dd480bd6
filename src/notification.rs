use serde_json::{Map, Value};
use time::OffsetDateTime;

/// Anything that can be delivered through a [`Connection`](crate::Connection).
///
/// Only `token` and `body` are required; every optional accessor that returns
/// `None` leaves its header out of the request.
pub trait Message {
    /// Device token the message is addressed to.
    fn token(&self) -> &str;

    /// Serialized payload. Called once for every request built.
    fn body(&self) -> String;

    fn id(&self) -> Option<&str> {
        None
    }

    fn expiration(&self) -> Option<u64> {
        None
    }

    fn priority(&self) -> Option<u64> {
        None
    }

    fn topic(&self) -> Option<&str> {
        None
    }

    fn collapse_id(&self) -> Option<&str> {
        None
    }

    fn push_type(&self) -> Option<&str> {
        None
    }
}

/// A single push notification addressed to one device.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Notification {
    pub token: String,
    pub id: Option<String>,
    pub expiration: Option<u64>,
    pub priority: Option<u64>,
    pub topic: Option<String>,
    pub collapse_id: Option<String>,
    pub push_type: Option<String>,

    /// Either a plain string or a dictionary with `title`, `body` and friends.
    pub alert: Option<Value>,
    pub badge: Option<u32>,
    pub sound: Option<String>,
    pub content_available: bool,
    pub category: Option<String>,
    pub url_args: Option<Vec<String>>,
    pub mutable_content: bool,
    pub thread_id: Option<String>,

    /// Extra top-level keys merged next to `aps`.
    pub custom_payload: Option<Map<String, Value>>,
}

impl Notification {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into(), ..Self::default() }
    }

    /// Sets `expiration` from a point in time. Times before the epoch clamp to
    /// zero, which APNs treats as "deliver once, do not store".
    pub fn expire_at(&mut self, at: OffsetDateTime) {
        self.expiration = Some(u64::try_from(at.unix_timestamp()).unwrap_or(0));
    }

    fn aps(&self) -> Map<String, Value> {
        let mut aps = Map::new();
        if let Some(alert) = &self.alert {
            aps.insert("alert".into(), alert.clone());
        }
        if let Some(badge) = self.badge {
            aps.insert("badge".into(), badge.into());
        }
        if let Some(sound) = &self.sound {
            aps.insert("sound".into(), sound.clone().into());
        }
        if let Some(category) = &self.category {
            aps.insert("category".into(), category.clone().into());
        }
        if self.content_available {
            aps.insert("content-available".into(), 1.into());
        }
        if let Some(url_args) = &self.url_args {
            aps.insert("url-args".into(), url_args.clone().into());
        }
        if self.mutable_content {
            aps.insert("mutable-content".into(), 1.into());
        }
        if let Some(thread_id) = &self.thread_id {
            aps.insert("thread-id".into(), thread_id.clone().into());
        }
        aps
    }

    /// The JSON document sent as the request body.
    pub fn payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("aps".into(), Value::Object(self.aps()));
        if let Some(custom) = &self.custom_payload {
            payload.extend(custom.clone());
        }
        Value::Object(payload)
    }
}

impl Message for Notification {
    fn token(&self) -> &str {
        &self.token
    }

    fn body(&self) -> String {
        self.payload().to_string()
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn expiration(&self) -> Option<u64> {
        self.expiration
    }

    fn priority(&self) -> Option<u64> {
        self.priority
    }

    fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    fn collapse_id(&self) -> Option<&str> {
        self.collapse_id.as_deref()
    }

    fn push_type(&self) -> Option<&str> {
        self.push_type.as_deref()
    }
}
