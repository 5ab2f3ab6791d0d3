use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::provider::{Credentials, DnsProvider, DnsRecord};
use crate::error::ProviderError;

const NAMECOM_API_BASE: &str = "https://api.name.com";
const NAMECOM_DEV_API_BASE: &str = "https://api.dev.name.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_SIZE: u32 = 1000;

pub struct NameComProvider {
    client: Client,
    credentials: Credentials,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListRecordsResponse {
    #[serde(default)]
    records: Vec<DnsRecord>,
    #[serde(default)]
    next_page: Option<u32>,
}

#[derive(Debug, Serialize)]
struct CreateRecordRequest<'a> {
    host: &'a str,
    #[serde(rename = "type")]
    record_type: &'a str,
    answer: &'a str,
    ttl: u32,
}

impl NameComProvider {
    /// Creates a client for the production API, or the sandbox when `dev` is set.
    pub fn new(credentials: Credentials, dev: bool) -> Result<Self, ProviderError> {
        let base_url = if dev {
            NAMECOM_DEV_API_BASE
        } else {
            NAMECOM_API_BASE
        };

        Self::with_base_url(credentials, base_url)
    }

    pub fn with_base_url(credentials: Credentials, base_url: &str) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            credentials,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn records_url(&self, domain: &str) -> String {
        format!("{}/v4/domains/{}/records", self.base_url, domain)
    }

    async fn check_status(response: Response) -> Result<Response, ProviderError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::Api {
            status,
            message: api_message(&body),
        })
    }
}

/// Pulls `message`/`details` out of a Name.com error body, falling back to the raw text.
fn api_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ApiError {
        message: String,
        #[serde(default)]
        details: Option<String>,
    }

    match serde_json::from_str::<ApiError>(body) {
        Ok(ApiError {
            message,
            details: Some(details),
        }) => format!("{message}: {details}"),
        Ok(ApiError { message, .. }) => message,
        Err(_) => body.trim().to_string(),
    }
}

#[async_trait]
impl DnsProvider for NameComProvider {
    async fn list_records(&self, domain: &str) -> Result<Vec<DnsRecord>, ProviderError> {
        let url = self.records_url(domain);
        let mut records = Vec::new();
        let mut page = 1;

        loop {
            debug!("Listing records for {} (page {})", domain, page);

            let response = self
                .client
                .get(&url)
                .basic_auth(&self.credentials.username, Some(&self.credentials.token))
                .query(&[("perPage", PAGE_SIZE), ("page", page)])
                .send()
                .await?;

            let body = Self::check_status(response).await?.text().await?;
            let parsed: ListRecordsResponse = serde_json::from_str(&body)?;
            records.extend(parsed.records);

            match parsed.next_page {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        Ok(records)
    }

    async fn create_record(&self, domain: &str, record: &DnsRecord) -> Result<(), ProviderError> {
        let payload = CreateRecordRequest {
            host: &record.host,
            record_type: &record.record_type,
            answer: &record.answer,
            ttl: record.ttl,
        };

        let response = self
            .client
            .post(self.records_url(domain))
            .basic_auth(&self.credentials.username, Some(&self.credentials.token))
            .json(&payload)
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn delete_record(&self, domain: &str, record_id: u64) -> Result<(), ProviderError> {
        let url = format!("{}/{}", self.records_url(domain), record_id);

        let response = self
            .client
            .delete(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.token))
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "namecom"
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{basic_auth, body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            username: "alice".to_string(),
            token: "secret".to_string(),
        }
    }

    fn provider(server: &MockServer) -> NameComProvider {
        NameComProvider::with_base_url(credentials(), &server.uri()).unwrap()
    }

    #[test]
    fn test_base_url_selection() {
        let prod = NameComProvider::new(credentials(), false).unwrap();
        let dev = NameComProvider::new(credentials(), true).unwrap();
        assert_eq!(prod.base_url(), "https://api.name.com");
        assert_eq!(dev.base_url(), "https://api.dev.name.com");
    }

    #[test]
    fn test_create_request_serialization() {
        let record = DnsRecord::new_a("example.com", "www", "192.168.1.1", 300);
        let payload = CreateRecordRequest {
            host: &record.host,
            record_type: &record.record_type,
            answer: &record.answer,
            ttl: record.ttl,
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"host": "www", "type": "A", "answer": "192.168.1.1", "ttl": 300})
        );
    }

    #[test]
    fn test_api_message() {
        assert_eq!(
            api_message(r#"{"message":"Permission Denied","details":"Authentication Error"}"#),
            "Permission Denied: Authentication Error"
        );
        assert_eq!(api_message(r#"{"message":"Not Found"}"#), "Not Found");
        assert_eq!(api_message("bad gateway\n"), "bad gateway");
    }

    #[tokio::test]
    async fn test_list_records_follows_pages() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v4/domains/example.com/records"))
            .and(query_param("page", "1"))
            .and(basic_auth("alice", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "records": [{
                    "id": 1, "domainName": "example.com", "fqdn": "example.com.",
                    "type": "A", "answer": "1.1.1.1", "ttl": 300
                }],
                "nextPage": 2,
                "lastPage": 2
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v4/domains/example.com/records"))
            .and(query_param("page", "2"))
            .and(basic_auth("alice", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "records": [{
                    "id": 2, "domainName": "example.com", "host": "www",
                    "fqdn": "www.example.com.", "type": "A", "answer": "2.2.2.2", "ttl": 300
                }],
                "lastPage": 2
            })))
            .expect(1)
            .mount(&server)
            .await;

        let records = provider(&server).list_records("example.com").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, Some(1));
        assert_eq!(records[1].host, "www");
    }

    #[tokio::test]
    async fn test_list_records_empty_domain() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v4/domains/example.com/records"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let records = provider(&server).list_records("example.com").await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_list_records_surfaces_api_errors() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({"message": "Unauthenticated"})),
            )
            .mount(&server)
            .await;

        let err = provider(&server).list_records("example.com").await.unwrap_err();
        match err {
            ProviderError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Unauthenticated");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_list_records_rejects_malformed_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = provider(&server).list_records("example.com").await.unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }

    #[tokio::test]
    async fn test_create_record() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v4/domains/example.com/records"))
            .and(basic_auth("alice", "secret"))
            .and(body_json(serde_json::json!({
                "host": "www", "type": "A", "answer": "3.3.3.3", "ttl": 600
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 9})))
            .expect(1)
            .mount(&server)
            .await;

        let record = DnsRecord::new_a("example.com", "www", "3.3.3.3", 600);
        provider(&server)
            .create_record("example.com", &record)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_record() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/v4/domains/example.com/records/42"))
            .and(basic_auth("alice", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        provider(&server).delete_record("example.com", 42).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_record_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let err = provider(&server).delete_record("example.com", 42).await.unwrap_err();
        assert!(matches!(err, ProviderError::Api { status: 404, .. }));
    }
}
