// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::TonieError;
use crate::tonie::model::{Chapter, CreativeTonie, Household};

const API_BASE: &str = "https://api.tonie.cloud/v2";
const TOKEN_URL: &str =
    "https://login.tonies.com/auth/realms/tonies/protocol/openid-connect/token";
const CLIENT_ID: &str = "my-tonies";

/// Tonie cloud API abstraction for testability
#[async_trait]
pub trait TonieClient: Send + Sync {
    /// All households visible to the logged-in account
    async fn households(&self) -> Result<Vec<Household>, TonieError>;

    /// All Creative Tonies of a household
    async fn creative_tonies(&self, household_id: &str) -> Result<Vec<CreativeTonie>, TonieError>;

    /// Re-fetch a tonie to pick up server-side chapter changes
    async fn refresh(&self, tonie: &CreativeTonie) -> Result<CreativeTonie, TonieError>;

    /// Upload an audio file and attach it as a new chapter
    async fn upload_chapter(
        &self,
        tonie: &CreativeTonie,
        path: &Path,
        title: &str,
    ) -> Result<(), TonieError>;

    /// Replace the tonie's chapter list, used for both removal and reorder
    async fn set_chapters(
        &self,
        tonie: &CreativeTonie,
        chapters: &[Chapter],
    ) -> Result<(), TonieError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileUploadGrant {
    request: UploadRequest,
    file_id: String,
}

#[derive(Debug, Deserialize)]
struct UploadRequest {
    url: String,
    #[serde(default)]
    fields: HashMap<String, String>,
}

/// Production client talking to the Tonie cloud over HTTPS
pub struct TonieHttpClient {
    client: reqwest::Client,
    token: String,
}

impl TonieHttpClient {
    /// Log in via the OpenID password grant the official apps use
    pub async fn login(username: &str, password: &str) -> Result<Self, TonieError> {
        let client = reqwest::Client::new();

        let response = client
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "password"),
                ("client_id", CLIENT_ID),
                ("username", username),
                ("password", password),
            ])
            .send()
            .await
            .map_err(|e| TonieError::RequestFailed {
                url: TOKEN_URL.to_string(),
                source: e,
            })?;

        let status = response.status().as_u16();
        if status >= 400 {
            let message = response.text().await.unwrap_or_default();
            return Err(TonieError::LoginFailed { status, message });
        }

        let token: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| TonieError::RequestFailed {
                    url: TOKEN_URL.to_string(),
                    source: e,
                })?;

        Ok(Self {
            client,
            token: token.access_token,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, TonieError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| TonieError::RequestFailed {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(TonieError::Api {
                url: url.to_string(),
                status,
            });
        }

        response.json().await.map_err(|e| TonieError::RequestFailed {
            url: url.to_string(),
            source: e,
        })
    }

    async fn send_json(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<(), TonieError> {
        let response = request
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| TonieError::RequestFailed {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(TonieError::Api {
                url: url.to_string(),
                status,
            });
        }

        Ok(())
    }

    fn tonie_url(tonie: &CreativeTonie) -> String {
        format!(
            "{API_BASE}/households/{}/creativetonies/{}",
            tonie.household_id, tonie.id
        )
    }
}

#[async_trait]
impl TonieClient for TonieHttpClient {
    async fn households(&self) -> Result<Vec<Household>, TonieError> {
        self.get_json(&format!("{API_BASE}/households")).await
    }

    async fn creative_tonies(&self, household_id: &str) -> Result<Vec<CreativeTonie>, TonieError> {
        self.get_json(&format!(
            "{API_BASE}/households/{household_id}/creativetonies"
        ))
        .await
    }

    async fn refresh(&self, tonie: &CreativeTonie) -> Result<CreativeTonie, TonieError> {
        self.get_json(&Self::tonie_url(tonie)).await
    }

    async fn upload_chapter(
        &self,
        tonie: &CreativeTonie,
        path: &Path,
        title: &str,
    ) -> Result<(), TonieError> {
        // Step 1: ask the API for a pre-signed upload form
        let file_url = format!("{API_BASE}/file");
        let response = self
            .client
            .post(&file_url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| TonieError::RequestFailed {
                url: file_url.clone(),
                source: e,
            })?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(TonieError::Api {
                url: file_url,
                status,
            });
        }

        let grant: FileUploadGrant =
            response
                .json()
                .await
                .map_err(|e| TonieError::RequestFailed {
                    url: file_url,
                    source: e,
                })?;

        // Step 2: multipart POST to the storage backend, file part last
        let data =
            tokio::fs::read(path)
                .await
                .map_err(|e| TonieError::UploadReadFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?;

        let mut form = reqwest::multipart::Form::new();
        for (key, value) in grant.request.fields {
            form = form.text(key, value);
        }
        form = form.part(
            "file",
            reqwest::multipart::Part::bytes(data).file_name(title.to_string()),
        );

        let upload_response = self
            .client
            .post(&grant.request.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TonieError::RequestFailed {
                url: grant.request.url.clone(),
                source: e,
            })?;

        let upload_status = upload_response.status().as_u16();
        if upload_status >= 400 {
            return Err(TonieError::UploadRejected(upload_status));
        }

        // Step 3: attach the uploaded file as a chapter
        let chapters_url = format!("{}/chapters", Self::tonie_url(tonie));
        let body = serde_json::json!({ "title": title, "file": grant.file_id });
        self.send_json(self.client.post(&chapters_url), &chapters_url, &body)
            .await
    }

    async fn set_chapters(
        &self,
        tonie: &CreativeTonie,
        chapters: &[Chapter],
    ) -> Result<(), TonieError> {
        let url = Self::tonie_url(tonie);
        let body = serde_json::json!({ "chapters": chapters });
        self.send_json(self.client.patch(&url), &url, &body).await
    }
}
