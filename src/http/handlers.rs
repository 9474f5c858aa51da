use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    errors::AppError,
    redmine_client::{IssueQuery, NewIssue},
    AppState,
};

#[derive(Debug, Serialize)]
pub struct ServiceDescriptor {
    pub message: &'static str,
    pub name: &'static str,
    pub version: &'static str,
    pub endpoints: EndpointMap,
}

#[derive(Debug, Serialize)]
pub struct EndpointMap {
    pub test: &'static str,
    pub user: &'static str,
    pub projects: &'static str,
    pub issues: &'static str,
}

pub async fn root() -> Json<ServiceDescriptor> {
    Json(ServiceDescriptor {
        message: "Redmine relay API",
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        endpoints: EndpointMap {
            test: "GET /api/redmine/test-connection",
            user: "GET /api/redmine/user/current",
            projects: "GET /api/redmine/projects",
            issues: "GET /api/redmine/issues",
        },
    })
}

pub async fn test_connection(State(state): State<AppState>) -> Json<Value> {
    let success = state.provider.test_connection().await;
    let recommendation = if success {
        "connection established using the configured API key"
    } else {
        "check that REDMINE_URL and REDMINE_API_KEY point at a reachable tracker"
    };

    Json(json!({
        "message": "tracker connection test",
        "config": &*state.connection,
        "success": success,
        "recommendation": recommendation,
    }))
}

pub async fn current_user(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let user = state
        .provider
        .current_user()
        .await
        .map_err(|err| AppError::upstream("failed to fetch current user", err))?;
    Ok(Json(json!({
        "message": "current user fetched",
        "user": user,
    })))
}

pub async fn list_projects(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let projects = state
        .provider
        .projects()
        .await
        .map_err(|err| AppError::upstream("failed to fetch projects", err))?;
    Ok(Json(json!({
        "message": "projects fetched",
        "count": projects.len(),
        "projects": projects,
    })))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id("project id", &id)?;
    let project = state
        .provider
        .project(id)
        .await
        .map_err(|err| AppError::upstream("failed to fetch project", err))?;
    Ok(Json(json!({
        "message": "project fetched",
        "project": project,
    })))
}

/// Raw query parameters for issue listing. Values stay strings so that a
/// malformed number produces our 400 body instead of the extractor's.
#[derive(Debug, Default, Deserialize)]
pub struct IssuesParams {
    pub project_id: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

pub async fn list_issues(
    State(state): State<AppState>,
    Query(params): Query<IssuesParams>,
) -> Result<Json<Value>, AppError> {
    let query = IssueQuery {
        project_id: parse_optional_int("project_id", params.project_id.as_deref())?,
        limit: parse_optional_int("limit", params.limit.as_deref())?.unwrap_or(25),
        offset: parse_optional_int("offset", params.offset.as_deref())?.unwrap_or(0),
    };

    let list = state
        .provider
        .issues(query)
        .await
        .map_err(|err| AppError::upstream("failed to fetch issues", err))?;
    Ok(Json(json!({
        "message": "issues fetched",
        "issues": list.issues,
        "total_count": list.total_count,
        "offset": list.offset,
        "limit": list.limit,
    })))
}

pub async fn get_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id("issue id", &id)?;
    let issue = state
        .provider
        .issue(id)
        .await
        .map_err(|err| AppError::upstream("failed to fetch issue", err))?;
    Ok(Json(json!({
        "message": "issue fetched",
        "issue": issue,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CreateIssueRequest {
    pub project_id: Option<u64>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub priority_id: Option<u64>,
    pub tracker_id: Option<u64>,
    pub assigned_to_id: Option<u64>,
}

pub async fn create_issue(
    State(state): State<AppState>,
    Json(request): Json<CreateIssueRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let (Some(project_id), Some(subject)) = (
        request.project_id,
        request.subject.filter(|subject| !subject.trim().is_empty()),
    ) else {
        return Err(AppError::validation("project_id and subject are required"));
    };

    let issue = state
        .provider
        .create_issue(&NewIssue {
            project_id,
            subject,
            description: request.description,
            priority_id: request.priority_id,
            tracker_id: request.tracker_id,
            assigned_to_id: request.assigned_to_id,
        })
        .await
        .map_err(|err| AppError::upstream("failed to create issue", err))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "issue created",
            "issue": issue,
        })),
    ))
}

pub async fn update_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id("issue id", &id)?;
    // The update payload is relayed verbatim; it only has to be an object
    // so it can nest under the envelope key.
    let Some(fields) = body.as_object() else {
        return Err(AppError::validation("request body must be a JSON object"));
    };

    let issue = state
        .provider
        .update_issue(id, fields)
        .await
        .map_err(|err| AppError::upstream("failed to update issue", err))?;
    Ok(Json(json!({
        "message": "issue updated",
        "issue": issue,
    })))
}

pub async fn delete_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id("issue id", &id)?;
    state
        .provider
        .delete_issue(id)
        .await
        .map_err(|err| AppError::upstream("failed to delete issue", err))?;
    Ok(Json(json!({
        "message": "issue deleted",
    })))
}

fn parse_id(kind: &str, raw: &str) -> Result<u64, AppError> {
    raw.parse::<u64>()
        .map_err(|_| AppError::validation(format!("invalid {kind}: {raw:?}")))
}

fn parse_optional_int<T: std::str::FromStr>(kind: &str, raw: Option<&str>) -> Result<Option<T>, AppError> {
    raw.map(|value| {
        value
            .parse::<T>()
            .map_err(|_| AppError::validation(format!("invalid {kind}: {value:?}")))
    })
    .transpose()
}
