#[macro_use]
extern crate rocket;
#[macro_use]
extern crate diesel;

pub mod catchers;
pub mod configuration;
pub mod domain;
pub mod email;
pub mod mail_domain;
pub mod models;
pub mod port_saver;
pub mod routes;
pub mod schema;
pub mod startup;
pub mod store;
pub mod telemetry;
pub mod weather_client;
