use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;

/// Header Redmine reads the API key from on every authenticated call.
const API_KEY_HEADER: &str = "X-Redmine-API-Key";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// An `{id, name}` reference as Redmine embeds it in issues
/// (status, priority, project, tracker, author, assignee).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamedRef {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Issue {
    pub id: u64,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: NamedRef,
    pub priority: NamedRef,
    pub project: NamedRef,
    pub tracker: NamedRef,
    pub author: NamedRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<NamedRef>,
    pub created_on: String,
    pub updated_on: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub identifier: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: u32,
    pub is_public: bool,
    pub created_on: String,
    pub updated_on: String,
}

/// One page of issues, exactly as `/issues.json` returns it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueList {
    pub issues: Vec<Issue>,
    pub total_count: u64,
    pub offset: u64,
    pub limit: u64,
}

/// Partial schema of `/users/current.json`. Fields Redmine is known to send
/// are named; anything else survives round-trips in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurrentUser {
    pub id: Option<u64>,
    pub login: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub mail: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Payload for issue creation. Optional fields are omitted from the wire
/// when unset so the tracker applies its own defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewIssue {
    pub project_id: u64,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracker_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to_id: Option<u64>,
}

/// Pagination and filtering for `issues`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssueQuery {
    pub project_id: Option<u64>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for IssueQuery {
    fn default() -> Self {
        Self {
            project_id: None,
            limit: 25,
            offset: 0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("tracker returned HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("request to tracker failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait RedmineProvider: Send + Sync {
    /// Probe the tracker with a current-user lookup. Unlike every other
    /// operation this never raises; any failure is reported as `false`.
    async fn test_connection(&self) -> bool;
    async fn current_user(&self) -> Result<CurrentUser, TrackerError>;
    async fn projects(&self) -> Result<Vec<Project>, TrackerError>;
    async fn project(&self, id: u64) -> Result<Project, TrackerError>;
    async fn issues(&self, query: IssueQuery) -> Result<IssueList, TrackerError>;
    async fn issue(&self, id: u64) -> Result<Issue, TrackerError>;
    async fn create_issue(&self, issue: &NewIssue) -> Result<Issue, TrackerError>;
    async fn update_issue(
        &self,
        id: u64,
        fields: &serde_json::Map<String, Value>,
    ) -> Result<Issue, TrackerError>;
    async fn delete_issue(&self, id: u64) -> Result<(), TrackerError>;
}

/// The connection profile: everything one outbound call needs, fixed at
/// startup and shared read-only across requests.
#[derive(Debug, Clone)]
pub struct RedmineClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub tls_verify: bool,
}

impl RedmineClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
            tls_verify: true,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.redmine_url.clone(),
            api_key: config.api_key.clone(),
            timeout: DEFAULT_TIMEOUT,
            tls_verify: config.tls_verify,
        }
    }
}

pub struct HttpRedmineClient {
    client: reqwest::Client,
    config: RedmineClientConfig,
}

// Write bodies and singular read responses nest the resource under a single
// envelope key; Redmine rejects unwrapped write payloads.
#[derive(Serialize)]
struct IssueRequest<T: Serialize> {
    issue: T,
}

#[derive(Deserialize)]
struct IssueEnvelope {
    issue: Issue,
}

#[derive(Deserialize)]
struct ProjectEnvelope {
    project: Project,
}

#[derive(Deserialize)]
struct ProjectsEnvelope {
    projects: Vec<Project>,
}

#[derive(Deserialize)]
struct UserEnvelope {
    user: CurrentUser,
}

impl HttpRedmineClient {
    pub fn new(config: RedmineClientConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.tls_verify)
            .build()?;
        Ok(Self { client, config })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.config.base_url, path))
            .header(API_KEY_HEADER, &self.config.api_key)
    }

    async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response, TrackerError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(TrackerError::Status { status, body })
        }
    }
}

#[async_trait]
impl RedmineProvider for HttpRedmineClient {
    async fn test_connection(&self) -> bool {
        match self.request(Method::GET, "/users/current.json").send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(err) => {
                tracing::warn!(error = %err, "tracker connection test failed");
                false
            }
        }
    }

    async fn current_user(&self) -> Result<CurrentUser, TrackerError> {
        let response = self.request(Method::GET, "/users/current.json").send().await?;
        let envelope: UserEnvelope = Self::expect_success(response).await?.json().await?;
        Ok(envelope.user)
    }

    async fn projects(&self) -> Result<Vec<Project>, TrackerError> {
        let response = self.request(Method::GET, "/projects.json").send().await?;
        let envelope: ProjectsEnvelope = Self::expect_success(response).await?.json().await?;
        Ok(envelope.projects)
    }

    async fn project(&self, id: u64) -> Result<Project, TrackerError> {
        let response = self
            .request(Method::GET, &format!("/projects/{id}.json"))
            .send()
            .await?;
        let envelope: ProjectEnvelope = Self::expect_success(response).await?.json().await?;
        Ok(envelope.project)
    }

    async fn issues(&self, query: IssueQuery) -> Result<IssueList, TrackerError> {
        let mut params = vec![
            ("limit", query.limit.to_string()),
            ("offset", query.offset.to_string()),
        ];
        if let Some(project_id) = query.project_id {
            params.push(("project_id", project_id.to_string()));
        }

        let response = self
            .request(Method::GET, "/issues.json")
            .query(&params)
            .send()
            .await?;
        let list: IssueList = Self::expect_success(response).await?.json().await?;
        Ok(list)
    }

    async fn issue(&self, id: u64) -> Result<Issue, TrackerError> {
        let response = self
            .request(Method::GET, &format!("/issues/{id}.json"))
            .send()
            .await?;
        let envelope: IssueEnvelope = Self::expect_success(response).await?.json().await?;
        Ok(envelope.issue)
    }

    async fn create_issue(&self, issue: &NewIssue) -> Result<Issue, TrackerError> {
        let response = self
            .request(Method::POST, "/issues.json")
            .json(&IssueRequest { issue })
            .send()
            .await?;
        let envelope: IssueEnvelope = Self::expect_success(response).await?.json().await?;
        Ok(envelope.issue)
    }

    async fn update_issue(
        &self,
        id: u64,
        fields: &serde_json::Map<String, Value>,
    ) -> Result<Issue, TrackerError> {
        let response = self
            .request(Method::PUT, &format!("/issues/{id}.json"))
            .json(&IssueRequest { issue: fields })
            .send()
            .await?;
        let envelope: IssueEnvelope = Self::expect_success(response).await?.json().await?;
        Ok(envelope.issue)
    }

    async fn delete_issue(&self, id: u64) -> Result<(), TrackerError> {
        let response = self
            .request(Method::DELETE, &format!("/issues/{id}.json"))
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> HttpRedmineClient {
        let mut config = RedmineClientConfig::new(server.uri(), "test-key");
        config.timeout = Duration::from_secs(5);
        HttpRedmineClient::new(config).expect("client build")
    }

    fn sample_issue_json(id: u64) -> Value {
        json!({
            "id": id,
            "subject": "Broken login form",
            "description": "Submit does nothing",
            "status": {"id": 1, "name": "New"},
            "priority": {"id": 2, "name": "Normal"},
            "project": {"id": 5, "name": "Auditor"},
            "tracker": {"id": 1, "name": "Bug"},
            "author": {"id": 7, "name": "Maria Silva"},
            "created_on": "2026-08-01T09:00:00Z",
            "updated_on": "2026-08-02T10:30:00Z"
        })
    }

    #[tokio::test]
    async fn current_user_unwraps_envelope_and_keeps_unknown_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/current.json"))
            .and(header(API_KEY_HEADER, "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": {
                    "id": 7,
                    "login": "maria",
                    "firstname": "Maria",
                    "lastname": "Silva",
                    "mail": "maria@example.com",
                    "last_login_on": "2026-08-20T08:00:00Z"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let user = client(&server).current_user().await.expect("current user");
        assert_eq!(user.id, Some(7));
        assert_eq!(user.login.as_deref(), Some("maria"));
        assert_eq!(
            user.extra.get("last_login_on"),
            Some(&json!("2026-08-20T08:00:00Z"))
        );
    }

    #[tokio::test]
    async fn issues_defaults_to_limit_25_offset_0_without_project_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/issues.json"))
            .and(query_param("limit", "25"))
            .and(query_param("offset", "0"))
            .and(query_param_is_missing("project_id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issues": [],
                "total_count": 0,
                "offset": 0,
                "limit": 25
            })))
            .expect(1)
            .mount(&server)
            .await;

        let list = client(&server)
            .issues(IssueQuery::default())
            .await
            .expect("issue list");
        assert!(list.issues.is_empty());
        assert_eq!(list.limit, 25);
    }

    #[tokio::test]
    async fn issues_forwards_pagination_and_project_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/issues.json"))
            .and(query_param("limit", "10"))
            .and(query_param("offset", "20"))
            .and(query_param("project_id", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issues": [sample_issue_json(42)],
                "total_count": 31,
                "offset": 20,
                "limit": 10
            })))
            .expect(1)
            .mount(&server)
            .await;

        let list = client(&server)
            .issues(IssueQuery {
                project_id: Some(5),
                limit: 10,
                offset: 20,
            })
            .await
            .expect("issue list");
        assert_eq!(list.total_count, 31);
        assert_eq!(list.issues[0].id, 42);
    }

    #[tokio::test]
    async fn create_issue_wraps_body_under_issue_key() {
        let server = MockServer::start().await;
        // Exact body match: only the supplied fields, nested under "issue".
        Mock::given(method("POST"))
            .and(path("/issues.json"))
            .and(body_json(json!({
                "issue": {"project_id": 5, "subject": "Broken login form"}
            })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"issue": sample_issue_json(42)})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let issue = client(&server)
            .create_issue(&NewIssue {
                project_id: 5,
                subject: "Broken login form".to_string(),
                description: None,
                priority_id: None,
                tracker_id: None,
                assigned_to_id: None,
            })
            .await
            .expect("created issue");
        assert_eq!(issue.id, 42);
        assert_eq!(issue.subject, "Broken login form");
    }

    #[tokio::test]
    async fn update_issue_passes_fields_through_unchanged() {
        let server = MockServer::start().await;
        let fields = json!({"subject": "Renamed", "priority_id": 3});
        Mock::given(method("PUT"))
            .and(path("/issues/42.json"))
            .and(body_json(json!({"issue": fields.clone()})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"issue": sample_issue_json(42)})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fields = fields.as_object().expect("object").clone();
        let issue = client(&server)
            .update_issue(42, &fields)
            .await
            .expect("updated issue");
        assert_eq!(issue.id, 42);
    }

    #[tokio::test]
    async fn delete_issue_succeeds_on_2xx() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/issues/42.json"))
            .and(header(API_KEY_HEADER, "test-key"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).delete_issue(42).await.expect("delete");
    }

    #[tokio::test]
    async fn non_2xx_surfaces_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/issues/999.json"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let err = client(&server).issue(999).await.expect_err("expected error");
        match err {
            TrackerError::Status { status, body } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(body, "Not Found");
            }
            other => panic!("expected Status error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connection_false_on_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/current.json"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        assert!(!client(&server).test_connection().await);
    }

    #[tokio::test]
    async fn test_connection_false_when_tracker_unreachable() {
        // Nothing listens on port 1; the connection is refused.
        let config = RedmineClientConfig::new("http://127.0.0.1:1", "test-key");
        let client = HttpRedmineClient::new(config).expect("client build");
        assert!(!client.test_connection().await);
    }

    #[tokio::test]
    async fn test_connection_true_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/current.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user": {"id": 1}})))
            .mount(&server)
            .await;

        assert!(client(&server).test_connection().await);
    }

    #[tokio::test]
    async fn project_unwraps_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects/5.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "project": {
                    "id": 5,
                    "name": "Auditor",
                    "identifier": "auditor",
                    "description": "Audit tracking",
                    "status": 1,
                    "is_public": false,
                    "created_on": "2026-01-01T00:00:00Z",
                    "updated_on": "2026-06-01T00:00:00Z"
                }
            })))
            .mount(&server)
            .await;

        let project = client(&server).project(5).await.expect("project");
        assert_eq!(project.identifier, "auditor");
        assert!(!project.is_public);
    }
}
