//! [`LibraryApi`] over the library server's REST API.

use std::cell::RefCell;

use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, Response, header};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::api::LibraryApi;
use crate::data_model::{Delta, Item, Mutation, MutationReceipt, Snapshot, SyncToken};
use crate::error::TransportError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    /// Scheme and host, without a trailing slash. e.g. `https://library.example.com`
    pub base_url: String,
}

pub struct HttpLibraryApi {
    client: reqwest::Client,
    config: HttpConfig,
    access_token: RefCell<Option<String>>,
}

impl HttpLibraryApi {
    pub fn new(config: HttpConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            access_token: RefCell::new(None),
        }
    }

    /// Sent as a bearer token with every following request.
    pub fn set_access_token(&self, token: Option<String>) {
        *self.access_token.borrow_mut() = token;
    }

    fn request(&self, method: Method, path: &str, query: &[(&str, &str)]) -> RequestBuilder {
        let url = format!("{}{path}", self.config.base_url.trim_end_matches('/'));
        let mut request = self.client.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = self.access_token.borrow().as_ref() {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        request
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Response, TransportError> {
        let mut request = self.request(method, path, query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            log::warn!("{path} responded with {status}");
            return Err(TransportError::Status(status.as_u16()));
        }
        Ok(response)
    }
}

impl LibraryApi for HttpLibraryApi {
    async fn fetch_all(&self) -> Result<Snapshot, TransportError> {
        let response = self.send(Method::GET, "/api/v1/books", &[], None).await?;
        let sync_token = server_time_token(&response);
        let items: Vec<Item> = response.json().await?;
        Ok(Snapshot { items, sync_token })
    }

    async fn fetch_delta(&self, since: &SyncToken) -> Result<Delta, TransportError> {
        let query = [("since", since.as_str())];
        let response = self
            .send(Method::GET, "/api/v1/books/delta", &query, None)
            .await?;
        Ok(response.json().await?)
    }

    async fn send_mutation(&self, mutation: &Mutation) -> Result<MutationReceipt, TransportError> {
        let (method, path, body) = route(mutation);
        let response = self.send(method, &path, &[], Some(&body)).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(MutationReceipt::default());
        }
        serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

fn server_time_token(response: &Response) -> Option<SyncToken> {
    let token = response
        .headers()
        .get(header::DATE)
        .and_then(|value| value.to_str().ok())
        .and_then(sync_token_from_date_header);
    if token.is_none() {
        log::warn!("Full fetch response has no usable Date header");
    }
    token
}

/// The server's clock, not ours, marks where the next delta starts.
pub fn sync_token_from_date_header(value: &str) -> Option<SyncToken> {
    let time = DateTime::parse_from_rfc2822(value).ok()?;
    Some(SyncToken::from_server_time(time.with_timezone(&Utc)))
}

fn route(mutation: &Mutation) -> (Method, String, Value) {
    match mutation {
        Mutation::AssignShelves {
            item_ids,
            assign,
            unassign,
        } => (
            Method::POST,
            "/api/v1/books/shelves".to_string(),
            json!({
                "bookIds": item_ids,
                "shelvesToAssign": assign,
                "shelvesToUnassign": unassign,
            }),
        ),
        Mutation::SaveProgress { item_id, progress } => (
            Method::POST,
            "/api/v1/books/progress".to_string(),
            json!({
                "bookId": item_id,
                "location": progress.location,
                "percentage": progress.percentage,
            }),
        ),
        Mutation::UpdateReadStatus { item_ids, status } => (
            Method::PUT,
            "/api/v1/books/status".to_string(),
            json!({ "bookIds": item_ids, "status": status }),
        ),
        Mutation::UpdateRating {
            item_ids,
            rating: Some(rating),
        } => (
            Method::PUT,
            "/api/v1/books/personal-rating".to_string(),
            json!({ "bookIds": item_ids, "rating": rating }),
        ),
        Mutation::UpdateRating {
            item_ids,
            rating: None,
        } => (
            Method::POST,
            "/api/v1/books/reset-personal-rating".to_string(),
            json!({ "bookIds": item_ids }),
        ),
        Mutation::SetFieldLocks { item_ids, locks } => (
            Method::PUT,
            "/api/v1/books/metadata/toggle-field-locks".to_string(),
            json!({ "bookIds": item_ids, "fieldActions": locks }),
        ),
        Mutation::AttachFiles { item_id, file_ids } => (
            Method::POST,
            format!("/api/v1/books/{item_id}/files/attach"),
            json!({ "fileIds": file_ids }),
        ),
        Mutation::DetachFiles { item_id, file_ids } => (
            Method::POST,
            format!("/api/v1/books/{item_id}/files/detach"),
            json!({ "fileIds": file_ids }),
        ),
        Mutation::DeleteItems { item_ids } => (
            Method::DELETE,
            "/api/v1/books".to_string(),
            json!({ "ids": item_ids }),
        ),
    }
}
