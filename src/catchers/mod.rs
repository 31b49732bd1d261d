mod missing_route;
mod server_error;
mod unprocessable_entity;

pub use missing_route::*;
pub use server_error::*;
pub use unprocessable_entity::*;
