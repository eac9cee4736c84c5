//! REST client for the document management service.

use std::cell::RefCell;
use std::collections::HashMap;

use metafix_model::{CustomFieldDef, Document, ItemKind, MetafixError, PatchFields, Result};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::query::{DocumentQuery, DocumentSelector};
use crate::DocumentStore;

/// One page of a paginated list response.
#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default)]
    count: u64,
    #[serde(default)]
    next: Option<String>,
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct NamedItem {
    id: u64,
    name: String,
}

/// Token-authenticated client for the service's REST API.
///
/// Name/id lookups fetch each item collection once and answer from a
/// per-instance cache afterwards, so a batch run does not hammer the
/// correspondent and tag endpoints.
pub struct HttpStore {
    api_root: String,
    token: String,
    client: Client,
    items: RefCell<HashMap<ItemKind, Vec<(u64, String)>>>,
    custom_fields: RefCell<Option<Vec<CustomFieldDef>>>,
}

impl HttpStore {
    /// Creates a client for the service at `base_url` (the host root, not
    /// the `/api` prefix).
    pub fn new(base_url: &str, token: &str) -> Result<HttpStore> {
        let client = Client::builder().build().map_err(request_error)?;
        Ok(HttpStore {
            api_root: format!("{}/api", base_url.trim_end_matches('/')),
            token: token.to_string(),
            client,
            items: RefCell::new(HashMap::new()),
            custom_fields: RefCell::new(None),
        })
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<Response> {
        request
            .header("Authorization", format!("Token {}", self.token))
            .send()
            .and_then(Response::error_for_status)
            .map_err(request_error)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        trace!(url, "GET");
        let response = self.send(self.client.get(url))?;
        response.json().map_err(request_error)
    }

    /// Follows `next` links until the listing is exhausted.
    fn get_all<T: DeserializeOwned>(&self, first_url: String) -> Result<Vec<T>> {
        let mut results = Vec::new();
        let mut next = Some(first_url);
        while let Some(url) = next {
            let page: Page<T> = self.get_json(&url)?;
            results.extend(page.results);
            next = page.next;
        }
        Ok(results)
    }

    /// Runs `f` over the cached item list for `kind`, fetching it on first
    /// use.
    fn with_items<T>(&self, kind: ItemKind, f: impl FnOnce(&[(u64, String)]) -> T) -> Result<T> {
        if !self.items.borrow().contains_key(&kind) {
            let url = format!("{}/{}/", self.api_root, kind.collection());
            debug!(%kind, "fetching item collection");
            let fetched: Vec<NamedItem> = self.get_all(url)?;
            let pairs = fetched.into_iter().map(|item| (item.id, item.name)).collect();
            self.items.borrow_mut().insert(kind, pairs);
        }
        let items = self.items.borrow();
        Ok(f(items.get(&kind).map(Vec::as_slice).unwrap_or(&[])))
    }
}

impl DocumentStore for HttpStore {
    fn get_document(&self, id: u64) -> Result<Option<Document>> {
        let url = format!("{}/documents/{id}/", self.api_root);
        trace!(url, "GET");
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.token))
            .send()
            .map_err(request_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status().map_err(request_error)?;
        response.json().map(Some).map_err(request_error)
    }

    fn list_documents(&self, selector: &DocumentSelector) -> Result<Vec<Document>> {
        match selector {
            DocumentSelector::All => self.get_all(format!("{}/documents/", self.api_root)),
            DocumentSelector::ById(id) => Ok(self.get_document(*id)?.into_iter().collect()),
            DocumentSelector::ByItem { kind, name } => {
                let id = self.resolve_name(*kind, name)?.ok_or_else(|| {
                    MetafixError::Store(format!("no {kind} named '{name}'"))
                })?;
                let url = format!(
                    "{}/documents/?{}={id}",
                    self.api_root,
                    kind.document_filter_field()
                );
                self.get_all(url)
            }
        }
    }

    fn patch_document(&self, id: u64, fields: &PatchFields) -> Result<()> {
        let url = format!("{}/documents/{id}/", self.api_root);
        debug!(url, ?fields, "PATCH");
        self.send(self.client.patch(&url).json(fields))?;
        Ok(())
    }

    fn resolve_name(&self, kind: ItemKind, name: &str) -> Result<Option<u64>> {
        self.with_items(kind, |items| {
            items
                .iter()
                .find(|(_, item_name)| item_name == name)
                .map(|(id, _)| *id)
        })
    }

    fn item_name(&self, kind: ItemKind, id: u64) -> Result<Option<String>> {
        self.with_items(kind, |items| {
            items
                .iter()
                .find(|(item_id, _)| *item_id == id)
                .map(|(_, name)| name.clone())
        })
    }

    fn resolve_custom_field(&self, name: &str) -> Result<Option<CustomFieldDef>> {
        if self.custom_fields.borrow().is_none() {
            let url = format!("{}/custom_fields/", self.api_root);
            let fetched: Vec<CustomFieldDef> = self.get_all(url)?;
            *self.custom_fields.borrow_mut() = Some(fetched);
        }
        let fields = self.custom_fields.borrow();
        Ok(fields
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .find(|field| field.name == name)
            .cloned())
    }

    fn count_documents(&self, query: &DocumentQuery) -> Result<u64> {
        let url = format!("{}/documents/", self.api_root);
        let params = count_params(query);
        trace!(url, ?params, "GET count");
        let request = self
            .client
            .get(&url)
            .query(&[("page_size", "1")])
            .query(&params);
        let response = self.send(request)?;
        let page: Page<serde_json::Value> = response.json().map_err(request_error)?;
        Ok(page.count)
    }
}

/// Translates a count query into the service's filter parameters.
fn count_params(query: &DocumentQuery) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut push = |key: &str, value: String| params.push((key.to_string(), value));

    if let Some(name) = &query.correspondent {
        push("correspondent__name__iexact", name.clone());
    }
    if let Some(name) = &query.document_type {
        push("document_type__name__iexact", name.clone());
    }
    if let Some(name) = &query.storage_path {
        push("storage_path__name__iexact", name.clone());
    }
    if let Some(title) = &query.title {
        push("title__iexact", title.clone());
    }
    if let Some(asn) = query.asn {
        push("archive_serial_number", asn.to_string());
    }
    if let Some(year) = query.created_year {
        push("created__year", year.to_string());
    }
    if let Some(month) = query.created_month {
        push("created__month", month.to_string());
    }
    if let Some(day) = query.created_day {
        push("created__day", day.to_string());
    }
    if let Some(year) = query.added_year {
        push("added__year", year.to_string());
    }
    if let Some(month) = query.added_month {
        push("added__month", month.to_string());
    }
    if let Some(day) = query.added_day {
        push("added__day", day.to_string());
    }
    if let Some(date) = query.created_after {
        push("created__date__gt", date.format("%Y-%m-%d").to_string());
    }
    if let Some(date) = query.created_before {
        push("created__date__lt", date.format("%Y-%m-%d").to_string());
    }
    if let Some(date) = query.added_after {
        push("added__date__gt", date.format("%Y-%m-%d").to_string());
    }
    if let Some(date) = query.added_before {
        push("added__date__lt", date.format("%Y-%m-%d").to_string());
    }
    params
}

fn request_error(err: reqwest::Error) -> MetafixError {
    MetafixError::Store(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn count_params_cover_all_constraint_kinds() {
        let query = DocumentQuery {
            correspondent: Some("The Bank".to_string()),
            created_year: Some(2020),
            added_after: NaiveDate::from_ymd_opt(2020, 1, 1),
            ..DocumentQuery::default()
        };
        let params = count_params(&query);
        assert!(params.contains(&(
            "correspondent__name__iexact".to_string(),
            "The Bank".to_string()
        )));
        assert!(params.contains(&("created__year".to_string(), "2020".to_string())));
        assert!(params.contains(&("added__date__gt".to_string(), "2020-01-01".to_string())));
        assert_eq!(params.len(), 3);
    }
}
