//! Purpose: Folder listing and lifecycle within a view.
//! Exports: `FolderEntry`, `EntryKind`.
//! Role: Thin mappings over `views/{id}/folders`; nested paths travel in the `path` query.
use super::{ApiResult, CallOptions, Host, View, settle};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    #[default]
    File,
    Folder,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct FolderEntry {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub kind: EntryKind,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Serialize)]
struct CreateFolder<'a> {
    path: &'a str,
}

impl View {
    pub fn list_folder(&self, path: &str) -> ApiResult<Vec<FolderEntry>> {
        let mut url = self.url(Host::Api, &["folders"])?;
        url.query_pairs_mut().append_pair("path", path);
        let reply = self.client().transport().get(url.as_str(), CallOptions::new())?;
        settle(reply, &format!("list folder {path}"))
    }

    pub fn create_folder(&self, path: &str) -> ApiResult<FolderEntry> {
        let url = self.url(Host::Api, &["folders"])?;
        let reply = self.client().transport().post(
            url.as_str(),
            Some(&CreateFolder { path }),
            CallOptions::new(),
        )?;
        settle(reply, &format!("create folder {path}"))
    }

    pub fn delete_folder(&self, path: &str) -> ApiResult<()> {
        let mut url = self.url(Host::Api, &["folders"])?;
        url.query_pairs_mut().append_pair("path", path);
        let reply = self
            .client()
            .transport()
            .delete::<()>(url.as_str(), None, CallOptions::new())?;
        settle(reply, &format!("delete folder {path}")).map(drop)
    }
}
