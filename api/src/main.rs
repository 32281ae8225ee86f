//! An api for collecting and serving poster judging scores.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::needless_pass_by_value)]

#[macro_use]
extern crate rocket;

mod config;
mod helpers;

use clap::Parser;
use config::Cli;
use helpers::{
    ApiErrorBody, ApiErrorKind, ApiResult, CorsFairing, INTERNAL_ERROR_MESSAGE,
    RequestTimingFairing, reference_error, score_error, unprocessable_entity_error,
};
use judging_common::reference::{PosterRow, ReferenceData};
use judging_common::{ScoreRecord, ScoreStore, ScoreSubmission, SubmitReceipt};
use rocket::http::Status;
use rocket::serde::json::{self, Json};
use rocket::{Build, Rocket, State};
use tracing_subscriber::EnvFilter;

#[get("/api/posters")]
fn posters(reference: &State<ReferenceData>) -> ApiResult<Vec<PosterRow>> {
    reference
        .posters()
        .map(Json)
        .map_err(|e| reference_error(&e, "Poster details file not found."))
}

#[get("/api/judges")]
fn judges(reference: &State<ReferenceData>) -> ApiResult<Vec<String>> {
    reference
        .judges()
        .map(Json)
        .map_err(|e| reference_error(&e, "Judges file not found."))
}

#[post("/api/scores", data = "<score>")]
fn submit_score(
    store: &State<ScoreStore>,
    score: Result<Json<ScoreSubmission>, json::Error<'_>>,
) -> ApiResult<SubmitReceipt> {
    let score = score.map_err(|e| {
        tracing::warn!(error = %e, "Rejected malformed score body");
        unprocessable_entity_error(e.to_string())
    })?;
    store
        .submit(&score)
        .map(Json)
        .map_err(|e| score_error(&e))
}

#[get("/api/scores")]
fn list_scores(store: &State<ScoreStore>) -> ApiResult<Vec<ScoreRecord>> {
    store
        .list_all()
        .map(Json)
        .map_err(|e| score_error(&e))
}

/// Answer CORS preflight requests; the headers themselves come from `CorsFairing`.
#[options("/<_..>")]
fn preflight() -> Status {
    Status::NoContent
}

#[catch(400)]
fn bad_request() -> Json<ApiErrorBody> {
    Json(ApiErrorBody::new(
        ApiErrorKind::BadRequest,
        "The request could not be understood.",
    ))
}

#[catch(404)]
fn not_found() -> Json<ApiErrorBody> {
    Json(ApiErrorBody::new(
        ApiErrorKind::NotFound,
        "The requested resource could not be found.",
    ))
}

#[catch(422)]
fn unprocessable_entity() -> Json<ApiErrorBody> {
    Json(ApiErrorBody::new(
        ApiErrorKind::UnprocessableEntity,
        "The request body is missing required fields.",
    ))
}

#[catch(500)]
fn internal() -> Json<ApiErrorBody> {
    Json(ApiErrorBody::new(
        ApiErrorKind::Internal,
        INTERNAL_ERROR_MESSAGE,
    ))
}

fn build(cli: &Cli) -> Rocket<Build> {
    let base = cli.mount_base();
    rocket::build()
        .manage(cli.score_store())
        .manage(cli.reference_data())
        .attach(RequestTimingFairing)
        .attach(CorsFairing::new(cli.allowed_origin.clone()))
        .mount(
            base.as_str(),
            routes![posters, judges, submit_score, list_scores, preflight],
        )
        .register(
            "/",
            catchers![bad_request, not_found, unprocessable_entity, internal],
        )
}

#[launch]
fn rocket() -> _ {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!(
        allowed_origin = %cli.allowed_origin,
        data_dir = %cli.data_dir.display(),
        mount_prefix = %cli.mount_base(),
        corrupt_records = ?cli.corrupt_records,
        "Starting judging API"
    );

    build(&cli)
}
