use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};

use crate::error::ApiError;
use crate::validation::FieldErrors;

/// `Json<T>` whose rejection is reported like any other validation failure.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let errors = match &rejection {
            JsonRejection::JsonDataError(e) => {
                let (field, message) = describe(&e.body_text());
                FieldErrors::single(field, message)
            }
            JsonRejection::JsonSyntaxError(_) => FieldErrors::single("body", "malformed JSON"),
            JsonRejection::MissingJsonContentType(_) => {
                FieldErrors::single("body", "expected an application/json body")
            }
            other => FieldErrors::single("body", other.body_text()),
        };
        ApiError::Validation(errors)
    }
}

/// Splits a serde data error such as
/// `... target type: results[0]: missing field `fish_name` at line 1 column 9`
/// into the offending field and a message.
fn describe(text: &str) -> (String, String) {
    let detail = text.split_once("target type: ").map_or(text, |(_, d)| d);
    let detail = detail.split(" at line ").next().unwrap_or(detail);

    let (path, reason) = match detail.split_once(": ") {
        Some((path, reason)) if !path.contains(' ') => (path, reason),
        _ => ("", detail),
    };

    let join = |name: &str| {
        if path.is_empty() {
            name.to_string()
        } else {
            format!("{path}.{name}")
        }
    };

    if let Some(name) = backticked(reason, "missing field `") {
        return (join(name), "this field is required".to_string());
    }
    if let Some(name) = backticked(reason, "unknown field `") {
        return (join(name), "unknown field".to_string());
    }
    let field = if path.is_empty() { "body" } else { path };
    (field.to_string(), reason.to_string())
}

fn backticked<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(prefix)?;
    rest.split_once('`').map(|(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header;
    use choka_types::api::CreateTripRequest;

    async fn extract(body: &str) -> Result<ApiJson<CreateTripRequest>, ApiError> {
        let req = Request::builder()
            .method("POST")
            .uri("/trips")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        ApiJson::<CreateTripRequest>::from_request(req, &()).await
    }

    fn fields(outcome: Result<ApiJson<CreateTripRequest>, ApiError>) -> Vec<String> {
        match outcome {
            Err(ApiError::Validation(errors)) => errors.fields().map(str::to_string).collect(),
            Err(other) => panic!("expected validation error, got {other}"),
            Ok(_) => panic!("expected validation error"),
        }
    }

    #[tokio::test]
    async fn missing_field_names_the_field() {
        let outcome = extract(r#"{"title":"t","prefecture":"北海道"}"#).await;
        assert_eq!(fields(outcome), vec!["content"]);
    }

    #[tokio::test]
    async fn nested_missing_field_keeps_its_path() {
        let outcome = extract(r#"{"title":"t","prefecture":"北海道","content":"c","results":[{}]}"#).await;
        assert_eq!(fields(outcome), vec!["results[0].fish_name"]);
    }

    #[tokio::test]
    async fn syntax_errors_point_at_the_body() {
        assert_eq!(fields(extract("{").await), vec!["body"]);
    }

    #[tokio::test]
    async fn valid_body_passes_through() {
        let ApiJson(req) = extract(r#"{"title":"t","prefecture":"北海道","content":"c"}"#)
            .await
            .unwrap_or_else(|_| panic!("body should parse"));
        assert_eq!(req.title, "t");
        assert!(req.results.is_empty());
    }

    #[test]
    fn describe_unknown_field() {
        let (field, message) = describe(
            "Failed to deserialize the JSON body into the target type: unknown field `x`, expected `title` at line 1 column 4",
        );
        assert_eq!(field, "x");
        assert_eq!(message, "unknown field");
    }
}
