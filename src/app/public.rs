use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;

use crate::app::{ApiResult, AppState, internal_error, not_found};
use crate::case_study::CaseStudyOutline;
use crate::formats::{
    Certification, Experience, Message, NewMessage, Project, ProjectMedia, Skill,
};
use crate::messages;

pub async fn list_projects(State(state): State<AppState>) -> ApiResult<Json<Vec<Project>>> {
    let projects = state
        .catalog
        .published_projects()
        .await
        .map_err(internal_error)?;
    Ok(Json(projects))
}

pub async fn featured_projects(State(state): State<AppState>) -> ApiResult<Json<Vec<Project>>> {
    let projects = state
        .catalog
        .featured_projects()
        .await
        .map_err(internal_error)?;
    Ok(Json(projects))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Project>> {
    let project = state
        .catalog
        .project_by_slug(&slug)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("project"))?;
    Ok(Json(project))
}

pub async fn project_media(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Vec<ProjectMedia>>> {
    let project = state
        .catalog
        .project_by_slug(&slug)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("project"))?;
    let media = state
        .catalog
        .project_media(&project.id)
        .await
        .map_err(internal_error)?;
    Ok(Json(media))
}

/// A project without case-study markdown answers with an empty outline.
pub async fn case_study(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<CaseStudyOutline>> {
    let case_study = state
        .catalog
        .case_study(&slug)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("project"))?;
    Ok(Json(case_study.outline()))
}

pub async fn experiences(State(state): State<AppState>) -> ApiResult<Json<Vec<Experience>>> {
    let experiences = state.catalog.experiences().await.map_err(internal_error)?;
    Ok(Json(experiences))
}

pub async fn certifications(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Certification>>> {
    let certifications = state
        .catalog
        .certifications()
        .await
        .map_err(internal_error)?;
    Ok(Json(certifications))
}

#[derive(Debug, Deserialize)]
pub struct SkillsQuery {
    category: Option<String>,
}

pub async fn skills(
    State(state): State<AppState>,
    Query(query): Query<SkillsQuery>,
) -> ApiResult<Json<Vec<Skill>>> {
    let skills = match query.category.as_deref().map(str::trim) {
        Some(category) if !category.is_empty() => {
            state.catalog.skills_by_category(category).await
        }
        _ => state.catalog.skills().await,
    }
    .map_err(internal_error)?;
    Ok(Json(skills))
}

pub async fn send_message(
    State(state): State<AppState>,
    Json(message): Json<NewMessage>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let message = messages::validate(message)
        .map_err(|err| (StatusCode::BAD_REQUEST, format!("{err:#}")))?;
    let stored = state.messages.send(message).await.map_err(internal_error)?;
    Ok((StatusCode::CREATED, Json(stored)))
}
