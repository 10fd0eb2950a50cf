use axum::Json;
use lukeux_core::blueprint::{self, Blueprints};
use serde::Deserialize;

use crate::auth::CurrentUser;

#[derive(Deserialize)]
pub struct ParseBody {
    pub text: String,
}

/// POST /api/blueprints/parse — split a response into concepts and prose
pub async fn parse(_current: CurrentUser, Json(body): Json<ParseBody>) -> Json<Blueprints> {
    Json(blueprint::parse_blueprints(&body.text))
}
