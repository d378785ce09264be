//! Custom `Json` extractor that maps deserialize failures onto the broker's
//! own deny envelope instead of axum's default plain-text 400 rejection, per
//! the fail-closed, never-raw-traces error handling the webhook protocol
//! requires.

use async_trait::async_trait;
use axum::extract::{FromRequest, Request};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;

use super::types::DecisionResponse;

pub struct DecisionJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for DecisionJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(DecisionJson(value)),
            Err(rejection) => {
                tracing::warn!(%rejection, "rejecting malformed webhook request");
                Err(Json(DecisionResponse::deny("bad_request")).into_response())
            }
        }
    }
}
