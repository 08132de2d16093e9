//! Purpose: Send notifications to the members of a view.
//! Exports: `Notification`, `NotificationReceipt`.
use super::{ApiResult, CallOptions, Host, View, settle};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Default, Serialize)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recipients: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct NotificationReceipt {
    pub id: String,
    #[serde(default)]
    pub delivered: u64,
}

impl View {
    pub fn notify(&self, notification: &Notification) -> ApiResult<NotificationReceipt> {
        let url = self.url(Host::Api, &["notifications"])?;
        let reply = self
            .client()
            .transport()
            .post(url.as_str(), Some(notification), CallOptions::new())?;
        settle(reply, &format!("notify view {}", self.id()))
    }
}
