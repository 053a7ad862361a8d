use crate::api::{Client, Error};
use crate::metrics::Exporter;
use crate::model::Device;
use crate::settings::Settings;
use prometheus::{Encoder, TextEncoder};
use rocket::http::uri::Origin;
use rocket::http::ContentType;
use rocket::{Build, Rocket, State};

/// Every scrape runs one collection cycle for every device.
#[rocket::get("/")]
async fn metrics_route(exporter: &State<Exporter>) -> Result<(ContentType, String), Error> {
    let content_type =
        ContentType::parse_flexible(TextEncoder::new().format_type()).unwrap_or(ContentType::Plain);

    Ok((content_type, exporter.scrape().await?))
}

/// Assemble the server: one collector per device, served under `settings.metrics_path`.
pub fn build(settings: &Settings, devices: Vec<Device>) -> Result<Rocket<Build>, Error> {
    let listen = settings.listen()?;
    let metrics_path = Origin::parse(&settings.metrics_path)
        .map_err(|e| {
            Error::Config(format!(
                "invalid metrics path {:?}: {}",
                settings.metrics_path, e
            ))
        })?
        .path()
        .to_string();

    let client = Client::new(settings.api_url.as_str(), settings.check_timeout()?)?;
    let exporter = Exporter::from_devices(devices, &client)?;

    log::info!(
        "Starting ecoflow exporter on {}{} for {} device(s), check timeout {:?}",
        listen,
        metrics_path,
        exporter.collectors().len(),
        client.timeout()
    );

    let figment = rocket::Config::figment()
        .merge(("address", listen.ip()))
        .merge(("port", listen.port()));

    Ok(rocket::custom(figment)
        .manage(exporter)
        .mount(metrics_path.as_str(), rocket::routes![metrics_route]))
}
