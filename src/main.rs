use clap::Parser;
use ecoflow_exporter::settings::{load_devices, read_settings, Args};
use ecoflow_exporter::{api, server};
use rocket::{Build, Rocket};
use std::process;

fn setup(args: &Args) -> Result<Rocket<Build>, api::Error> {
    let settings = read_settings(args)?;
    let devices = load_devices(&settings.config_file)?;
    server::build(&settings, devices)
}

#[rocket::main]
async fn main() {
    env_logger::init();

    let args = Args::parse();
    let rocket = match setup(&args) {
        Ok(rocket) => rocket,
        Err(e) => {
            log::error!("{}", e);
            process::exit(1);
        }
    };

    if let Err(e) = rocket.launch().await {
        log::error!("Unable to serve metrics: {}", e);
        process::exit(1);
    }
}
