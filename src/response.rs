use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::Deserialize;
use uuid::Uuid;

/// The gateway's reply to a single push.
#[derive(Clone, Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// JSON body APNs sends alongside a non-200 status.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Rejection {
    pub reason: String,
    /// Milliseconds since the epoch at which the token stopped being valid (410 only).
    pub timestamp: Option<u64>,
}

impl Response {
    pub fn ok(&self) -> bool {
        self.status == StatusCode::OK
    }

    /// The `apns-id` the gateway assigned to (or echoed for) the notification.
    pub fn apns_id(&self) -> Option<Uuid> {
        self.headers.get("apns-id")?.to_str().ok()?.parse().ok()
    }

    pub fn rejection(&self) -> Option<Rejection> {
        if self.body.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }

    pub fn reason(&self) -> Option<String> {
        self.rejection().map(|r| r.reason)
    }

    pub fn timestamp(&self) -> Option<u64> {
        self.rejection().and_then(|r| r.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, apns_id: Option<&str>, body: &'static str) -> Response {
        let mut headers = HeaderMap::new();
        if let Some(id) = apns_id {
            headers.insert("apns-id", id.parse().unwrap());
        }
        Response { status: StatusCode::from_u16(status).unwrap(), headers, body: Bytes::from_static(body.as_bytes()) }
    }

    #[test]
    fn test_successful_response() {
        let res = response(200, Some("EB5A43B1-1CA5-4F40-AB1E-37A42C0C31A4"), "");

        assert!(res.ok());
        assert_eq!(res.apns_id(), Some(Uuid::parse_str("eb5a43b1-1ca5-4f40-ab1e-37a42c0c31a4").unwrap()));
        assert_eq!(res.rejection(), None);
        assert_eq!(res.reason(), None);
    }

    #[test]
    fn test_rejected_response() {
        let res = response(400, None, r#"{"reason":"BadDeviceToken"}"#);

        assert!(!res.ok());
        assert_eq!(res.apns_id(), None);
        assert_eq!(res.reason().as_deref(), Some("BadDeviceToken"));
        assert_eq!(res.timestamp(), None);
    }

    #[test]
    fn test_unregistered_response_carries_timestamp() {
        let res = response(410, None, r#"{"reason":"Unregistered","timestamp":1461491082000}"#);

        assert_eq!(res.reason().as_deref(), Some("Unregistered"));
        assert_eq!(res.timestamp(), Some(1_461_491_082_000));
    }

    #[test]
    fn test_malformed_body() {
        let res = response(500, Some("not-a-uuid"), "oops");
        assert_eq!(res.rejection(), None);
        assert_eq!(res.apns_id(), None);
    }
}
