//! Production [`RemoteStore`] backed by `reqwest` (spec §1: "the remote
//! store SDK (treated as four opaque RPCs)"). Grounded on the `reqwest`
//! usage pattern in the upstream project's cloud API client: build a
//! `Client` once, issue requests against a base URL, and map the response
//! through `status()` before deserializing the body with `.json()`.

use super::{
    Citation, OperationHandle, OperationResponse, PollResult, RateLimiter, RemoteStore, StoreDoc,
    StoreDocSummary, UploadedRaw,
};
use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub struct HttpRemoteStore {
    client: Client,
    base_url: String,
    api_key: String,
    limiter: RateLimiter,
}

impl HttpRemoteStore {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("reqwest client builder should never fail with default TLS config"),
            base_url,
            api_key,
            limiter: RateLimiter::new(5.0, 10.0),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Classify a response's status into the engine's error taxonomy
    /// (spec §7). 404 becomes [`EngineError::RemoteNotFound`] so
    /// idempotent-delete wrappers can normalize it; 429/5xx become
    /// [`EngineError::RemoteTransient`] so the retry wrapper can act on it;
    /// everything else is fatal.
    async fn classify_error(&self, path: &str, response: reqwest::Response) -> EngineError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());

        if status == StatusCode::NOT_FOUND {
            EngineError::RemoteNotFound(format!("{path}: {body}"))
        } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            EngineError::RemoteTransient(format!("{path} returned {status}: {body}"))
        } else {
            EngineError::RemoteFatal(format!("{path} returned {status}: {body}"))
        }
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn upload_raw(
        &self,
        display_name: &str,
        bytes: Vec<u8>,
    ) -> EngineResult<UploadedRaw> {
        self.limiter.acquire().await;
        let path = "v1/raw-files";
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .query(&[("display_name", display_name)])
            .body(bytes)
            .send()
            .await
            .map_err(|e| EngineError::RemoteTransient(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.classify_error(path, response).await);
        }

        #[derive(Deserialize)]
        struct Resp {
            id: String,
            uri: String,
        }
        let parsed: Resp = response
            .json()
            .await
            .map_err(|e| EngineError::RemoteFatal(format!("decoding upload_raw response: {e}")))?;
        Ok(UploadedRaw {
            id: parsed.id,
            uri: parsed.uri,
        })
    }

    async fn import_to_store(&self, raw_id: &str) -> EngineResult<OperationHandle> {
        self.limiter.acquire().await;
        let path = "v1/import-operations";
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .json(&json!({ "raw_id": raw_id }))
            .send()
            .await
            .map_err(|e| EngineError::RemoteTransient(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.classify_error(path, response).await);
        }

        #[derive(Deserialize)]
        struct Resp {
            operation_id: String,
        }
        let parsed: Resp = response
            .json()
            .await
            .map_err(|e| EngineError::RemoteFatal(format!("decoding import_to_store response: {e}")))?;
        Ok(OperationHandle(parsed.operation_id))
    }

    async fn poll_operation(&self, handle: &OperationHandle) -> EngineResult<PollResult> {
        self.limiter.acquire().await;
        let path = format!("v1/import-operations/{}", handle.0);
        let response = self
            .client
            .get(self.url(&path))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| EngineError::RemoteTransient(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.classify_error(&path, response).await);
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EngineError::RemoteFatal(format!("decoding poll_operation response: {e}")))?;

        let done = raw.get("done").and_then(|v| v.as_bool()).unwrap_or(false);
        let store_doc_id = raw
            .get("response")
            .and_then(|r| r.get("store_doc_id"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(PollResult {
            done,
            response: done.then(|| OperationResponse {
                store_doc_id,
                raw: raw.get("response").cloned().unwrap_or(serde_json::Value::Null),
            }),
        })
    }

    async fn list_store_docs(&self) -> EngineResult<Vec<StoreDocSummary>> {
        self.limiter.acquire().await;
        let path = "v1/store-documents";
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.get(self.url(path)).bearer_auth(&self.api_key);
            if let Some(token) = &page_token {
                request = request.query(&[("page_token", token)]);
            }
            let response = request
                .send()
                .await
                .map_err(|e| EngineError::RemoteTransient(e.to_string()))?;

            if !response.status().is_success() {
                return Err(self.classify_error(path, response).await);
            }

            #[derive(Deserialize)]
            struct Entry {
                name: String,
                display_name: String,
            }
            #[derive(Deserialize)]
            struct Page {
                documents: Vec<Entry>,
                next_page_token: Option<String>,
            }
            let page: Page = response
                .json()
                .await
                .map_err(|e| EngineError::RemoteFatal(format!("decoding list_store_docs page: {e}")))?;

            out.extend(page.documents.into_iter().map(|e| StoreDocSummary {
                name: e.name,
                display_name: e.display_name,
            }));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(out)
    }

    async fn get_store_doc(&self, name: &str) -> EngineResult<StoreDoc> {
        self.limiter.acquire().await;
        let path = format!("v1/store-documents/{name}");
        let response = self
            .client
            .get(self.url(&path))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| EngineError::RemoteTransient(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.classify_error(&path, response).await);
        }

        #[derive(Deserialize)]
        struct Resp {
            name: String,
            display_name: String,
        }
        let parsed: Resp = response
            .json()
            .await
            .map_err(|e| EngineError::RemoteFatal(format!("decoding get_store_doc response: {e}")))?;
        Ok(StoreDoc {
            name: parsed.name,
            display_name: parsed.display_name,
        })
    }

    async fn delete_store_doc(&self, name: &str) -> EngineResult<()> {
        self.limiter.acquire().await;
        let path = format!("v1/store-documents/{name}");
        let response = self
            .client
            .delete(self.url(&path))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| EngineError::RemoteTransient(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.classify_error(&path, response).await)
        }
    }

    async fn delete_raw(&self, id: &str) -> EngineResult<()> {
        self.limiter.acquire().await;
        let path = format!("v1/raw-files/{id}");
        let response = self
            .client
            .delete(self.url(&path))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| EngineError::RemoteTransient(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.classify_error(&path, response).await)
        }
    }

    async fn search(&self, query: &str, top_k: usize) -> EngineResult<Vec<Citation>> {
        self.limiter.acquire().await;
        let path = "v1/search";
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .json(&json!({ "query": query, "top_k": top_k }))
            .send()
            .await
            .map_err(|e| EngineError::RemoteTransient(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.classify_error(path, response).await);
        }

        #[derive(Deserialize)]
        struct Entry {
            store_doc_id: String,
        }
        #[derive(Deserialize)]
        struct Resp {
            citations: Vec<Entry>,
        }
        let parsed: Resp = response
            .json()
            .await
            .map_err(|e| EngineError::RemoteFatal(format!("decoding search response: {e}")))?;
        Ok(parsed
            .citations
            .into_iter()
            .map(|e| Citation {
                store_doc_id: e.store_doc_id,
            })
            .collect())
    }
}
