//! Purpose: CRUD for structured-data objects stored in a view's collections.
//! Exports: `ObjectMeta`, `ObjectList`.
//! Role: Generic over the caller's document type; bodies are JSON.
//! Invariants: Object documents are decoded into the caller's `T`; metadata is always `ObjectMeta`.
use super::{ApiResult, CallOptions, Host, View, settle};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ObjectMeta {
    pub key: String,
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ObjectList {
    #[serde(default)]
    pub items: Vec<ObjectMeta>,
    #[serde(default)]
    pub total: u64,
}

impl View {
    pub fn list_objects(&self, collection: &str) -> ApiResult<ObjectList> {
        let url = self.url(Host::Api, &["objects", collection])?;
        let reply = self.client().transport().get(url.as_str(), CallOptions::new())?;
        settle(reply, &format!("list objects in {collection}"))
    }

    pub fn get_object<T>(&self, collection: &str, key: &str) -> ApiResult<T>
    where
        T: DeserializeOwned + Default,
    {
        let url = self.url(Host::Api, &["objects", collection, key])?;
        let reply = self.client().transport().get(url.as_str(), CallOptions::new())?;
        settle(reply, &format!("get object {collection}/{key}"))
    }

    pub fn create_object<V>(&self, collection: &str, value: &V) -> ApiResult<ObjectMeta>
    where
        V: Serialize + ?Sized,
    {
        let url = self.url(Host::Api, &["objects", collection])?;
        let reply = self
            .client()
            .transport()
            .post(url.as_str(), Some(value), CallOptions::new())?;
        settle(reply, &format!("create object in {collection}"))
    }

    pub fn put_object<V>(&self, collection: &str, key: &str, value: &V) -> ApiResult<ObjectMeta>
    where
        V: Serialize + ?Sized,
    {
        let url = self.url(Host::Api, &["objects", collection, key])?;
        let reply = self
            .client()
            .transport()
            .put(url.as_str(), Some(value), CallOptions::new())?;
        settle(reply, &format!("put object {collection}/{key}"))
    }

    pub fn delete_object(&self, collection: &str, key: &str) -> ApiResult<()> {
        let url = self.url(Host::Api, &["objects", collection, key])?;
        let reply = self
            .client()
            .transport()
            .delete::<()>(url.as_str(), None, CallOptions::new())?;
        settle(reply, &format!("delete object {collection}/{key}")).map(drop)
    }
}
