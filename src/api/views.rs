//! Purpose: View management and the session flow that installs the bearer token.
//! Exports: `View`, `ViewInfo`, `NewView`, `SessionData`.
//! Role: A `View` is a scoped lens onto a bag; all per-view resources hang off it.
//! Invariants: `connect` is sent without auth and stores the returned token on the shared transport.
use super::{ApiResult, BagClient, CallOptions, Error, ErrorKind, Host, settle};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ViewInfo {
    pub id: String,
    #[serde(default)]
    pub bag_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct NewView {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SessionData {
    pub token: String,
    #[serde(default)]
    pub view: ViewInfo,
    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Serialize)]
struct SessionRequest<'a> {
    key: &'a str,
}

#[derive(Clone)]
pub struct View {
    client: BagClient,
    id: String,
}

impl BagClient {
    pub fn create_view(&self, bag_id: &str, view: &NewView) -> ApiResult<ViewInfo> {
        let url = self.url(Host::Api, &["bags", bag_id, "views"])?;
        let reply = self
            .transport()
            .post(url.as_str(), Some(view), CallOptions::new())?;
        settle(reply, &format!("create view in bag {bag_id}"))
    }

    pub fn list_views(&self, bag_id: &str) -> ApiResult<Vec<ViewInfo>> {
        let url = self.url(Host::Api, &["bags", bag_id, "views"])?;
        let reply = self.transport().get(url.as_str(), CallOptions::new())?;
        settle(reply, &format!("list views in bag {bag_id}"))
    }
}

impl View {
    pub(crate) fn new(client: BagClient, id: String) -> Self {
        Self { client, id }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn client(&self) -> &BagClient {
        &self.client
    }

    /// Exchange an access key for session data and keep its token for later calls.
    pub fn connect(&self, access_key: &str) -> ApiResult<SessionData> {
        let url = self.url(Host::Api, &["sessions"])?;
        let reply = self.client.transport().post(
            url.as_str(),
            Some(&SessionRequest { key: access_key }),
            CallOptions::new().skip_auth(),
        )?;
        let session: SessionData = settle(reply, &format!("connect to view {}", self.id))?;
        if session.token.is_empty() {
            return Err(Error::new(ErrorKind::Decode)
                .with_message(format!("connect to view {}: session carried no token", self.id)));
        }
        self.client.transport().set_token(Some(session.token.clone()));
        Ok(session)
    }

    pub fn info(&self) -> ApiResult<ViewInfo> {
        let url = self.url(Host::Api, &[])?;
        let reply = self.client.transport().get(url.as_str(), CallOptions::new())?;
        settle(reply, &format!("get view {}", self.id))
    }

    pub fn delete(&self) -> ApiResult<()> {
        let url = self.url(Host::Api, &[])?;
        let reply = self
            .client
            .transport()
            .delete::<()>(url.as_str(), None, CallOptions::new())?;
        settle(reply, &format!("delete view {}", self.id)).map(drop)
    }

    /// URL of `segments` below `views/{id}` on `host`.
    pub(crate) fn url(&self, host: Host, segments: &[&str]) -> ApiResult<url::Url> {
        let mut all = Vec::with_capacity(segments.len() + 2);
        all.push("views");
        all.push(self.id.as_str());
        all.extend_from_slice(segments);
        self.client.url(host, &all)
    }
}
