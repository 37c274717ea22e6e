//! User directory backends.

use async_trait::async_trait;
use edubridge_config::DirectoryUserConfig;
use edubridge_core::error::DirectoryError;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const PHONE_ATTRIBUTE: &str = "phone_number";
pub const PERSONA_ATTRIBUTE: &str = "custom:persona";
pub const NAME_ATTRIBUTE: &str = "name";

/// A directory entry, with the raw persona attribute as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    pub username: String,
    pub phone_number: String,
    pub persona: Option<String>,
    pub name: Option<String>,
}

/// Lookup of users by phone number.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find the user whose phone attribute equals `phone` exactly.
    async fn find_by_phone(&self, phone: &str) -> Result<Option<DirectoryUser>, DirectoryError>;
}

/// Users listed in `[[directory.users]]`.
#[derive(Debug, Default, Clone)]
pub struct StaticDirectory {
    users: Vec<DirectoryUser>,
}

impl StaticDirectory {
    pub fn new(users: Vec<DirectoryUser>) -> Self {
        Self { users }
    }

    pub fn from_config(users: &[DirectoryUserConfig]) -> Self {
        Self::new(
            users
                .iter()
                .map(|u| DirectoryUser {
                    username: u.phone_number.clone(),
                    phone_number: u.phone_number.clone(),
                    persona: u.persona.clone(),
                    name: u.name.clone(),
                })
                .collect(),
        )
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<DirectoryUser>, DirectoryError> {
        Ok(self.users.iter().find(|u| u.phone_number == phone).cloned())
    }
}

/// A user pool reached over HTTP with a paginated `ListUsers` call.
///
/// Each request is `POST {endpoint}` with
/// `{"UserPoolId", "Limit", "PaginationToken"?}`; each response is
/// `{"Users": [{"Username", "Attributes": [{"Name", "Value"}]}], "PaginationToken"?}`.
pub struct HttpDirectory {
    endpoint: String,
    user_pool_id: String,
    page_size: u32,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ListUsersRequest<'a> {
    user_pool_id: &'a str,
    limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pagination_token: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListUsersResponse {
    #[serde(default)]
    users: Vec<PoolUser>,
    #[serde(default)]
    pagination_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PoolUser {
    #[serde(default)]
    username: String,
    #[serde(default)]
    attributes: Vec<PoolAttribute>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PoolAttribute {
    name: String,
    #[serde(default)]
    value: String,
}

impl PoolUser {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }
}

impl HttpDirectory {
    pub fn new(
        endpoint: impl Into<String>,
        user_pool_id: impl Into<String>,
        page_size: u32,
    ) -> Result<Self, DirectoryError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| DirectoryError::RequestFailed(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            user_pool_id: user_pool_id.into(),
            page_size: page_size.max(1),
            client,
        })
    }

    async fn page(&self, token: Option<&str>) -> Result<ListUsersResponse, DirectoryError> {
        let request = ListUsersRequest {
            user_pool_id: &self.user_pool_id,
            limit: self.page_size,
            pagination_token: token,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| DirectoryError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DirectoryError::RequestFailed(format!(
                "HTTP {}",
                response.status().as_u16()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| DirectoryError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl UserDirectory for HttpDirectory {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<DirectoryUser>, DirectoryError> {
        let mut token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self.page(token.as_deref()).await?;
            pages += 1;

            let found = page
                .users
                .iter()
                .find(|u| u.attribute(PHONE_ATTRIBUTE) == Some(phone));
            if let Some(user) = found {
                debug!(username = %user.username, pages, "Directory user found");
                return Ok(Some(DirectoryUser {
                    username: user.username.clone(),
                    phone_number: phone.to_string(),
                    persona: user.attribute(PERSONA_ATTRIBUTE).map(str::to_string),
                    name: user.attribute(NAME_ATTRIBUTE).map(str::to_string),
                }));
            }

            match page.pagination_token {
                Some(next) if !next.is_empty() => token = Some(next),
                _ => break,
            }
        }

        debug!(pages, "Directory user not found");
        Ok(None)
    }
}
