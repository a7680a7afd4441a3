//! Microsoft Graph drive client.

use super::credentials::TokenProvider;
use super::{DeleteOutcome, DriveApi, DriveItem, FolderRef, ItemPayload};
use crate::error::RemoteError;
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Graph v1.0 root
pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0/";

/// Fields requested for every child listing
const ITEM_SELECT: &str =
    "name,folder,id,file,size,createdDateTime,lastModifiedDateTime,parentReference";

/// Builder for [`GraphClient`]
pub struct GraphClientBuilder {
    base_url: String,
    timeout: Duration,
    tokens: Box<dyn TokenProvider>,
}

impl GraphClientBuilder {
    /// Override the API root (must end with `/`)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the client
    pub fn build(self) -> Result<GraphClient, RemoteError> {
        let http = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| RemoteError::Transport {
                endpoint: self.base_url.clone(),
                reason: e.to_string(),
            })?;

        Ok(GraphClient {
            http,
            base_url: self.base_url,
            tokens: self.tokens,
        })
    }
}

/// Blocking Microsoft Graph client for one signed-in account
pub struct GraphClient {
    http: Client,
    base_url: String,
    tokens: Box<dyn TokenProvider>,
}

impl GraphClient {
    /// Start building a client that authenticates with `tokens`
    pub fn builder(tokens: Box<dyn TokenProvider>) -> GraphClientBuilder {
        GraphClientBuilder {
            base_url: GRAPH_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            tokens,
        }
    }

    fn token(&self) -> Result<String, RemoteError> {
        self.tokens.access_token().ok_or_else(|| {
            error!("Access token missing; refusing to call the drive");
            RemoteError::Unauthenticated
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn send(
        &self,
        endpoint: &str,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<Response, RemoteError> {
        debug!(endpoint, "Calling drive API");
        request.send().map_err(|e| RemoteError::Transport {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }

    fn read_json<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T, RemoteError> {
        response.json::<T>().map_err(|e| RemoteError::Malformed {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        url: &str,
        select: Option<&str>,
        item_id: &str,
    ) -> Result<T, RemoteError> {
        let token = self.token()?;
        let mut request = self.http.get(url).bearer_auth(token);
        if let Some(select) = select {
            request = request.query(&[("$select", select)]);
        }

        let response = check_status(endpoint, item_id, self.send(endpoint, request)?)?;
        Self::read_json(endpoint, response)
    }
}

impl DriveApi for GraphClient {
    fn list_children(&self, folder: &FolderRef) -> Result<Vec<DriveItem>, RemoteError> {
        let endpoint = folder.children_endpoint();
        let mut page: ChildrenPage =
            self.get_json(&endpoint, &self.url(&endpoint), Some(ITEM_SELECT), folder.id())?;
        let mut items = convert_page(&endpoint, std::mem::take(&mut page.value));

        // nextLink already carries the query string
        while let Some(next) = page.next_link.take() {
            page = self.get_json(&endpoint, &next, None, folder.id())?;
            items.extend(convert_page(&endpoint, std::mem::take(&mut page.value)));
        }

        Ok(items)
    }

    fn thumbnail(&self, item_id: &str) -> Result<Vec<u8>, RemoteError> {
        let endpoint = format!("me/drive/items/{item_id}/thumbnails");
        let sets: ThumbnailSets = self.get_json(&endpoint, &self.url(&endpoint), None, item_id)?;

        let url = sets
            .value
            .into_iter()
            .next()
            .and_then(|set| set.large)
            .map(|thumb| thumb.url)
            .ok_or_else(|| RemoteError::NotFound {
                item_id: item_id.to_string(),
            })?;

        // Thumbnail URLs are pre-authenticated
        let response = check_status(&endpoint, item_id, self.send(&endpoint, self.http.get(&url))?)?;
        let bytes = response.bytes().map_err(|e| RemoteError::Transport {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;

        if bytes.is_empty() {
            return Err(RemoteError::NotFound {
                item_id: item_id.to_string(),
            });
        }

        Ok(bytes.to_vec())
    }

    fn delete_item(&self, item_id: &str) -> Result<DeleteOutcome, RemoteError> {
        let endpoint = format!("me/drive/items/{item_id}");
        let token = self.token()?;
        let response = self.send(&endpoint, self.http.delete(self.url(&endpoint)).bearer_auth(token))?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::OK => Ok(DeleteOutcome::Deleted),
            StatusCode::NOT_FOUND => {
                warn!(item_id, "Item was already gone");
                Ok(DeleteOutcome::AlreadyGone)
            }
            status => Err(RemoteError::Status {
                endpoint,
                status: status.as_u16(),
            }),
        }
    }
}

fn check_status(endpoint: &str, item_id: &str, response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    error!(endpoint, status = status.as_u16(), "Drive API error");
    if status == StatusCode::NOT_FOUND {
        Err(RemoteError::NotFound {
            item_id: item_id.to_string(),
        })
    } else {
        Err(RemoteError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        })
    }
}

/// Convert raw children, dropping the malformed ones
fn convert_page(endpoint: &str, raw: Vec<RawItem>) -> Vec<DriveItem> {
    raw.into_iter()
        .filter_map(|item| match DriveItem::try_from(item) {
            Ok(item) => Some(item),
            Err(reason) => {
                warn!(endpoint, %reason, "Dropping malformed drive item");
                None
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ChildrenPage {
    #[serde(default)]
    value: Vec<RawItem>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItem {
    id: Option<String>,
    name: Option<String>,
    size: Option<u64>,
    folder: Option<RawFolder>,
    file: Option<RawFile>,
    created_date_time: Option<String>,
    last_modified_date_time: Option<String>,
    parent_reference: Option<RawParent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFolder {
    child_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFile {
    mime_type: Option<String>,
    hashes: Option<RawHashes>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHashes {
    sha256_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawParent {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThumbnailSets {
    #[serde(default)]
    value: Vec<ThumbnailSet>,
}

#[derive(Debug, Deserialize)]
struct ThumbnailSet {
    large: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

fn parse_time(field: &str, value: Option<String>) -> Result<DateTime<Utc>, String> {
    let value = value.ok_or_else(|| format!("missing {field}"))?;
    DateTime::parse_from_rfc3339(&value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("bad {field} '{value}': {e}"))
}

impl TryFrom<RawItem> for DriveItem {
    type Error = String;

    fn try_from(raw: RawItem) -> Result<Self, Self::Error> {
        let id = raw.id.ok_or("missing id")?;
        let name = raw.name.ok_or_else(|| format!("item {id} has no name"))?;

        let payload = match (raw.folder, raw.file) {
            (Some(folder), _) => ItemPayload::Folder {
                child_count: folder
                    .child_count
                    .ok_or_else(|| format!("folder {id} has no childCount"))?,
            },
            (None, Some(file)) => ItemPayload::File {
                mime_type: file
                    .mime_type
                    .ok_or_else(|| format!("file {id} has no mimeType"))?,
                sha256: file.hashes.and_then(|h| h.sha256_hash),
            },
            (None, None) => ItemPayload::Other,
        };

        Ok(DriveItem {
            created_at: parse_time("createdDateTime", raw.created_date_time)?,
            modified_at: parse_time("lastModifiedDateTime", raw.last_modified_date_time)?,
            size: raw.size.unwrap_or(0),
            parent_path: raw.parent_reference.and_then(|p| p.path).unwrap_or_default(),
            id,
            name,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::remote::{NoToken, StaticToken};

    fn parse(json: &str) -> (Vec<DriveItem>, Option<String>) {
        let page: ChildrenPage = serde_json::from_str(json).unwrap();
        (convert_page("test", page.value), page.next_link)
    }

    #[test]
    fn parses_files_and_folders() {
        let (items, next) = parse(
            r#"{
                "value": [
                    {
                        "id": "F1", "name": "Pictures", "size": 0,
                        "folder": { "childCount": 3 },
                        "createdDateTime": "2023-01-02T03:04:05Z",
                        "lastModifiedDateTime": "2023-01-02T03:04:05Z",
                        "parentReference": { "path": "/drive/root:" }
                    },
                    {
                        "id": "I1", "name": "IMG_01.jpg", "size": 2048,
                        "file": { "mimeType": "image/jpeg", "hashes": { "sha256Hash": "ABC" } },
                        "createdDateTime": "2023-01-02T03:04:05.123Z",
                        "lastModifiedDateTime": "2023-02-02T03:04:05Z",
                        "parentReference": { "path": "/drive/root:/Pictures" }
                    }
                ],
                "@odata.nextLink": "https://graph.microsoft.com/v1.0/next"
            }"#,
        );

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].payload, ItemPayload::Folder { child_count: 3 });
        assert_eq!(
            items[1].payload,
            ItemPayload::File {
                mime_type: "image/jpeg".into(),
                sha256: Some("ABC".into())
            }
        );
        assert_eq!(items[1].parent_path, "/drive/root:/Pictures");
        assert_eq!(items[1].size, 2048);
        assert_eq!(next.as_deref(), Some("https://graph.microsoft.com/v1.0/next"));
    }

    #[test]
    fn malformed_items_are_dropped() {
        let (items, _) = parse(
            r#"{
                "value": [
                    { "name": "no-id.jpg" },
                    {
                        "id": "X", "name": "bad-date.jpg",
                        "file": { "mimeType": "image/png" },
                        "createdDateTime": "yesterday",
                        "lastModifiedDateTime": "2023-02-02T03:04:05Z"
                    },
                    {
                        "id": "Y", "name": "folder-without-count",
                        "folder": {},
                        "createdDateTime": "2023-02-02T03:04:05Z",
                        "lastModifiedDateTime": "2023-02-02T03:04:05Z"
                    },
                    {
                        "id": "OK", "name": "fine.pdf",
                        "file": { "mimeType": "application/pdf" },
                        "createdDateTime": "2023-02-02T03:04:05Z",
                        "lastModifiedDateTime": "2023-02-02T03:04:05Z"
                    }
                ]
            }"#,
        );

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "OK");
        assert_eq!(items[0].parent_path, "");
    }

    #[test]
    fn items_without_facets_are_other() {
        let (items, _) = parse(
            r#"{ "value": [ {
                "id": "P", "name": "Notebook", "package": { "type": "oneNote" },
                "createdDateTime": "2023-02-02T03:04:05Z",
                "lastModifiedDateTime": "2023-02-02T03:04:05Z"
            } ] }"#,
        );

        assert_eq!(items[0].payload, ItemPayload::Other);
    }

    #[test]
    fn missing_token_fails_every_call_without_network() {
        let client = GraphClient::builder(Box::new(NoToken))
            .base_url("http://127.0.0.1:9/")
            .build()
            .unwrap();

        assert_eq!(
            client.list_children(&FolderRef::Root),
            Err(RemoteError::Unauthenticated)
        );
        assert_eq!(client.thumbnail("A"), Err(RemoteError::Unauthenticated));
        assert_eq!(client.delete_item("A"), Err(RemoteError::Unauthenticated));
    }

    #[test]
    fn endpoint_urls_join_cleanly() {
        let client = GraphClient::builder(Box::new(StaticToken::new("t")))
            .build()
            .unwrap();

        assert_eq!(
            client.url("/me/drive/items/A/children"),
            "https://graph.microsoft.com/v1.0/me/drive/items/A/children"
        );
    }
}
