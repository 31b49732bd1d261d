use weather_subscriptions::configuration::get_configuration;
use weather_subscriptions::startup::{Application, Collaborators};
use weather_subscriptions::telemetry::{get_subscriber, init_subscriber};

#[rocket::main]
async fn main() -> Result<(), anyhow::Error> {
    let subscriber = get_subscriber(
        "weather_subscriptions".into(),
        "info".into(),
        std::io::stdout,
    );
    init_subscriber(subscriber)?;

    let configuration = get_configuration()?;
    let collaborators = Collaborators::from_settings(&configuration).await?;
    let application = Application::build(&configuration, collaborators).await?;
    application.run_until_stopped().await
}
