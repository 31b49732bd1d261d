use crate::routes::ErrorBody;
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::Request;

/// Rocket answers 422 when a form cannot be decoded at all; clients get the
/// same 400 as for a form that decodes but fails validation.
#[catch(422)]
pub fn unprocessable_entity_to_bad_request(req: &Request) -> status::Custom<Json<ErrorBody>> {
    tracing::warn!(uri = %req.uri(), "Request body could not be decoded");
    status::Custom(Status::BadRequest, Json(ErrorBody::new("Invalid input")))
}
