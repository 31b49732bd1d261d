use crate::catchers::*;
use crate::configuration::Settings;
use crate::email::{build_email_client, EmailClient};
use crate::mail_domain::{DnsMxResolver, MxResolver};
use crate::port_saver;
use crate::port_saver::Port;
use crate::routes::*;
use crate::store::{PgStore, SubscriptionStore};
use crate::weather_client::WeatherClient;
use anyhow::Context;
use rocket::{Config, Ignite, Rocket};
use std::sync::Arc;

/// The out-of-process dependencies a running application talks to.
pub struct Collaborators {
    pub store: Arc<dyn SubscriptionStore>,
    pub email_client: Arc<dyn EmailClient>,
    pub mx_resolver: Arc<dyn MxResolver>,
}

impl Collaborators {
    /// Postgres, the configured mail transport and the system DNS resolver.
    pub async fn from_settings(settings: &Settings) -> Result<Collaborators, anyhow::Error> {
        let store = PgStore::connect(&settings.database)
            .context("Failed to create the database connection pool.")?;
        if settings.database.run_migrations {
            store
                .run_migrations()
                .await
                .context("Failed to bring the database schema up to date.")?;
        }
        let email_client = build_email_client(&settings.email_client)?;
        let mx_resolver = DnsMxResolver::from_system_conf()?;
        Ok(Collaborators {
            store: Arc::new(store),
            email_client,
            mx_resolver: Arc::new(mx_resolver),
        })
    }
}

pub struct Application {
    pub server: Rocket<Ignite>,
    pub port: Port,
}

impl Application {
    pub async fn build(
        settings: &Settings,
        collaborators: Collaborators,
    ) -> Result<Application, anyhow::Error> {
        let weather_client = WeatherClient::new(&settings.weather_api)
            .context("Failed to build the weather API client.")?;
        let (port_saver, port) = port_saver::create_pair();
        let server = rocket::custom(Config {
            address: settings.application.host,
            port: settings.application.port,
            ..Config::release_default()
        })
        .attach(port_saver)
        .manage(collaborators.store)
        .manage(collaborators.email_client)
        .manage(collaborators.mx_resolver)
        .manage(weather_client)
        .manage(ApplicationBaseUrl(settings.application.base_url.clone()))
        .mount("/", routes![index, health_check])
        .mount("/api", routes![weather, subscribe, confirm, unsubscribe])
        .register(
            "/",
            catchers![unprocessable_entity_to_bad_request, not_found, internal_error],
        )
        .ignite()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to ignite the server: {}", e))?;
        Ok(Application { server, port })
    }

    pub async fn run_until_stopped(self) -> Result<(), anyhow::Error> {
        let Application { server, port: _port } = self;
        server
            .launch()
            .await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("Server stopped with an error: {}", e))
    }
}
