//! Request extractors that reject with [`Error::ValidationError`], so malformed
//! requests get the same JSON error body as every other failure

use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::prelude::*;

/// JSON request body
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
	T: DeserializeOwned,
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
		match Json::<T>::from_request(req, state).await {
			Ok(Json(value)) => Ok(Self(value)),
			Err(rejection) => {
				debug!("rejected request body: {}", rejection.body_text());
				Err(Error::ValidationError(rejection.body_text()))
			}
		}
	}
}

/// Query string parameters
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
	T: DeserializeOwned,
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
		match Query::<T>::from_request_parts(parts, state).await {
			Ok(Query(value)) => Ok(Self(value)),
			Err(rejection) => Err(Error::ValidationError(rejection.body_text())),
		}
	}
}

// vim: ts=4
