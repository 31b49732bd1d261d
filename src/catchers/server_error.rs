use crate::routes::ErrorBody;
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::Request;

#[catch(500)]
pub fn internal_error(req: &Request) -> status::Custom<Json<ErrorBody>> {
    tracing::error!(uri = %req.uri(), "Request failed without a handled error");
    status::Custom(
        Status::InternalServerError,
        Json(ErrorBody::new("Internal server error")),
    )
}
