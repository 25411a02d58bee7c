//! Public university directory client, used for discovery when the local
//! catalogue has no match for a search.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// The directory returns every campus matching a name fragment; only the
/// first few are worth importing.
pub const MAX_DIRECTORY_RESULTS: usize = 20;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Directory returned status {0}")]
    Status(u16),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub country: String,
    #[serde(default)]
    pub alpha_two_code: Option<String>,
    #[serde(rename = "state-province", default)]
    pub state_province: Option<String>,
    #[serde(default)]
    pub web_pages: Vec<String>,
}

#[async_trait]
pub trait UniversityDirectory: Send + Sync {
    async fn search(
        &self,
        name: &str,
        country: Option<&str>,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError>;
}

/// Client for the hipolabs `GET /search?name=..&country=..` API.
pub struct HipolabsDirectory {
    client: Client,
    base_url: String,
}

impl HipolabsDirectory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl UniversityDirectory for HipolabsDirectory {
    async fn search(
        &self,
        name: &str,
        country: Option<&str>,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let mut query = vec![("name", name)];
        if let Some(country) = country {
            query.push(("country", country));
        }

        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Status(status.as_u16()));
        }

        let mut entries: Vec<DirectoryEntry> = response.json().await?;
        debug!("Directory returned {} entries for '{name}'", entries.len());
        entries.retain(|e| !e.name.trim().is_empty() && !e.country.trim().is_empty());
        entries.truncate(MAX_DIRECTORY_RESULTS);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_search_parses_directory_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("name", "oxford"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "name": "University of Oxford",
                    "country": "United Kingdom",
                    "alpha_two_code": "GB",
                    "state-province": null,
                    "web_pages": ["http://www.ox.ac.uk/"],
                    "domains": ["ox.ac.uk"]
                },
                { "name": "", "country": "Nowhere" }
            ])))
            .mount(&server)
            .await;

        let directory = HipolabsDirectory::new(server.uri());
        let entries = directory.search("oxford", None).await.unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "University of Oxford");
        assert_eq!(entries[0].web_pages, vec!["http://www.ox.ac.uk/".to_string()]);
    }

    #[tokio::test]
    async fn test_search_passes_country_and_truncates() {
        let server = MockServer::start().await;
        let many: Vec<_> = (0..30)
            .map(|i| json!({ "name": format!("College {i}"), "country": "Canada" }))
            .collect();
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("country", "Canada"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(many)))
            .mount(&server)
            .await;

        let directory = HipolabsDirectory::new(format!("{}/", server.uri()));
        let entries = directory.search("college", Some("Canada")).await.unwrap();
        assert_eq!(entries.len(), MAX_DIRECTORY_RESULTS);
    }

    #[tokio::test]
    async fn test_search_reports_upstream_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let directory = HipolabsDirectory::new(server.uri());
        let err = directory.search("anything", None).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Status(503)));
    }
}
