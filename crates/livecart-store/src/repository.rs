use livecart_core::types::{Order, TickerState};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::error::Result;

/// Named record collections of the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Chat,
    Orders,
    Products,
    Customers,
    Events,
    StreamRooms,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Chat => "chat",
            Collection::Orders => "orders",
            Collection::Products => "products",
            Collection::Customers => "customers",
            Collection::Events => "events",
            Collection::StreamRooms => "stream_rooms",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level field equality filter. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub eq: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.eq.push((field.into(), value.into()));
        self
    }
}

/// Contract to the storage collaborator.
///
/// `append` must hand back the stored record, including the server-assigned
/// `id` and `created_at`, before anything is published about it.
pub trait Repository: Send + Sync {
    fn append(&self, collection: Collection, record: Value) -> Result<Value>;

    /// Newest first, at most `limit` records.
    fn list(&self, collection: Collection, filter: &Filter, limit: usize) -> Result<Vec<Value>>;

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>>;

    /// Merge the top-level keys of `patch` into the record. `id` and
    /// `created_at` are never overwritten.
    fn update(&self, collection: Collection, id: &str, patch: Value) -> Result<Value>;

    fn delete(&self, collection: Collection, id: &str) -> Result<()>;

    fn ticker_state(&self) -> Result<TickerState>;

    fn set_ticker_state(&self, text: &str, enabled: bool) -> Result<TickerState>;

    fn latest_order_for(&self, customer_number: &str) -> Result<Option<Order>> {
        let filter = Filter::new().eq("customer_id", customer_number);
        let latest = self.list(Collection::Orders, &filter, 1)?.into_iter().next();
        Ok(latest.map(serde_json::from_value).transpose()?)
    }
}

/// Typed helpers over the JSON document API.
pub trait RepositoryExt: Repository {
    fn append_as<D, T>(&self, collection: Collection, draft: &D) -> Result<T>
    where
        D: Serialize,
        T: DeserializeOwned,
    {
        let stored = self.append(collection, serde_json::to_value(draft)?)?;
        Ok(serde_json::from_value(stored)?)
    }

    fn list_as<T: DeserializeOwned>(
        &self,
        collection: Collection,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<T>> {
        self.list(collection, filter, limit)?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(Into::into))
            .collect()
    }

    fn get_as<T: DeserializeOwned>(&self, collection: Collection, id: &str) -> Result<Option<T>> {
        Ok(self
            .get(collection, id)?
            .map(serde_json::from_value)
            .transpose()?)
    }

    fn update_as<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: &str,
        patch: Value,
    ) -> Result<T> {
        Ok(serde_json::from_value(self.update(collection, id, patch)?)?)
    }
}

impl<R: Repository + ?Sized> RepositoryExt for R {}
