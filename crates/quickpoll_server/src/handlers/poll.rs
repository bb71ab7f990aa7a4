//! Poll HTTP handlers.

use super::normalize::{normalize_field, split_responses};
use super::{found, poll_location};
use crate::context::{AuthUser, Negotiated, RequestBody, RequestContext, ResponseFormat};
use crate::{error::HttpError, AppError, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use quickpoll_core::models::poll::{CreatePollRequest, OptionRequest, Poll};

/// Browser form for poll creation.
///
/// `options` may be one textarea (one response per line), repeated once per
/// input, or both; every value is split on newlines and kept in order.
impl RequestBody for CreatePollRequest {
    fn from_form(bytes: &[u8]) -> Result<Self, HttpError> {
        let fields: Vec<(String, String)> = serde_urlencoded::from_bytes(bytes)
            .map_err(|err| HttpError::MalformedRequest(format!("Invalid form body: {}", err)))?;
        let mut req = CreatePollRequest {
            name: String::new(),
            question: String::new(),
            options: Vec::new(),
        };
        for (key, value) in fields {
            match key.as_str() {
                "name" => req.name = value,
                "question" => req.question = value,
                "options" => req.options.extend(
                    split_responses(&value)
                        .into_iter()
                        .map(|response| OptionRequest { response }),
                ),
                _ => {}
            }
        }
        Ok(req)
    }
}

impl RequestBody for OptionRequest {}

fn poll_not_found(name: &str) -> HttpError {
    AppError::NotFound(format!("No such poll '{}'", name)).into()
}

fn load_poll(state: &AppState, name: &str) -> Result<Poll, HttpError> {
    state.db.polls.get(name)?.ok_or_else(|| poll_not_found(name))
}

/// List every poll keyed by name.
///
/// # Errors
/// Returns an error if listing fails.
pub async fn list_polls(State(state): State<AppState>) -> Result<Response, HttpError> {
    let polls = state.db.polls.list()?;
    Ok(Json(polls).into_response())
}

/// Fetch a single poll with its options and voters.
///
/// # Errors
/// Returns 404 when the poll does not exist.
pub async fn get_poll(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, HttpError> {
    Ok(Json(load_poll(&state, &name)?).into_response())
}

/// Per-option vote counts for a poll.
///
/// # Errors
/// Returns 404 when the poll does not exist.
pub async fn poll_results(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, HttpError> {
    Ok(Json(load_poll(&state, &name)?.tally()).into_response())
}

/// Create a new poll.
///
/// # Returns
/// `201` with the poll as JSON, or a redirect to the poll for form posts.
///
/// # Errors
/// Returns 400 for invalid polls and 409 when the name is taken.
pub async fn create_poll(
    State(state): State<AppState>,
    context: RequestContext,
    AuthUser(user): AuthUser,
    Negotiated(req): Negotiated<CreatePollRequest>,
) -> Result<Response, HttpError> {
    let mut poll = Poll::from(req);
    poll.name = normalize_field(poll.name);
    poll.question = normalize_field(poll.question);
    for option in &mut poll.options {
        option.response = normalize_field(std::mem::take(&mut option.response));
    }

    state.db.polls.create(&poll)?;
    tracing::info!(user = %user, poll = %poll.name, "poll created");

    Ok(match context.response {
        ResponseFormat::Html => found(&poll_location(&poll.name)),
        ResponseFormat::Json => (StatusCode::CREATED, Json(poll)).into_response(),
    })
}

/// Add a response option to an existing poll.
///
/// # Returns
/// `201` with the poll when the option was appended, `200` when it already
/// existed, or a redirect to the poll for form posts.
///
/// # Errors
/// Returns 400 for an empty response and 404 for an unknown poll.
pub async fn add_option(
    State(state): State<AppState>,
    Path(name): Path<String>,
    context: RequestContext,
    AuthUser(user): AuthUser,
    Negotiated(req): Negotiated<OptionRequest>,
) -> Result<Response, HttpError> {
    let response = normalize_field(req.response);
    let added = state.db.polls.add_option(&name, &response)?;
    if added {
        tracing::info!(user = %user, poll = %name, response = %response, "option added");
    }

    if context.response == ResponseFormat::Html {
        return Ok(found(&poll_location(&name)));
    }
    let status = if added {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(load_poll(&state, &name)?)).into_response())
}

/// Cast (or move) the caller's vote.
///
/// # Returns
/// The updated poll as JSON, or a redirect to the poll for form posts.
///
/// # Errors
/// Returns 404 when the poll or option does not exist.
pub async fn vote(
    State(state): State<AppState>,
    Path(name): Path<String>,
    context: RequestContext,
    AuthUser(user): AuthUser,
    Negotiated(req): Negotiated<OptionRequest>,
) -> Result<Response, HttpError> {
    let response = normalize_field(req.response);
    let poll = state.db.polls.vote(&name, &response, &user)?;
    tracing::info!(user = %user, poll = %name, response = %response, "vote recorded");

    Ok(match context.response {
        ResponseFormat::Html => found(&poll_location(&name)),
        ResponseFormat::Json => Json(poll).into_response(),
    })
}
