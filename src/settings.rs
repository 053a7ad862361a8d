use crate::api::endpoint::API_URL;
use crate::api::Error;
use crate::model::{self, Device};
use clap::Parser;
use config::Config;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

const LISTEN: &str = "0.0.0.0:9136";
const CONFIG_FILE: &str = "/etc/prometheus/prometheus-ecoflow-exporter.yaml";
const METRICS_PATH: &str = "/metrics";
const CHECK_TIMEOUT: &str = "5s";

/* Unprefixed variables understood by earlier releases, weaker than `ECOFLOW_*` */
const LEGACY_ENV: [(&str, &str); 4] = [
    ("LISTEN", "listen"),
    ("CONFIG_FILE", "config_file"),
    ("METRICS_PATH", "metrics_path"),
    ("CHECK_TIMEOUT", "check_timeout"),
];

/// Command line flags. Anything given here wins over environment variables.
#[derive(Debug, Default, Parser)]
#[command(name = "ecoflow-exporter", version, about = "Prometheus exporter for EcoFlow devices")]
pub struct Args {
    /// Listen address
    #[arg(long)]
    pub listen: Option<String>,
    /// YAML file with the list of devices
    #[arg(long)]
    pub config_file: Option<String>,
    /// Path the metrics are served on
    #[arg(long)]
    pub metrics_path: Option<String>,
    /// Timeout of a single API query, e.g. `5s`, `500ms`, `1m30s` or plain seconds
    #[arg(long, alias = "check_timeout")]
    pub check_timeout: Option<String>,
    /// Base URL of the EcoFlow API
    #[arg(long)]
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Settings {
    pub listen: String,
    pub config_file: String,
    pub metrics_path: String,
    pub check_timeout: String,
    pub api_url: String,
}

impl Settings {
    pub fn listen(&self) -> Result<SocketAddr, Error> {
        self.listen
            .parse()
            .map_err(|e| Error::Config(format!("invalid listen address {:?}: {}", self.listen, e)))
    }

    /// Rejects zero, negative and non-finite values instead of running without a timeout.
    pub fn check_timeout(&self) -> Result<Duration, Error> {
        let secs = parse_duration(&self.check_timeout).ok_or_else(|| {
            Error::Config(format!("invalid check_timeout {:?}", self.check_timeout))
        })?;

        match Duration::try_from_secs_f64(secs) {
            Ok(timeout) if !timeout.is_zero() => Ok(timeout),
            _ => Err(Error::InvalidTimeout),
        }
    }
}

/// Parse a duration in seconds, written the way Go's `time.ParseDuration` accepts it
/// (`300ms`, `1.5s`, `1m30s`). A bare number is taken as seconds.
fn parse_duration(input: &str) -> Option<f64> {
    let input = input.trim();
    if let Ok(secs) = input.parse::<f64>() {
        return Some(secs);
    }

    let (sign, mut rest) = match input.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, input.strip_prefix('+').unwrap_or(input)),
    };
    if rest.is_empty() {
        return None;
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut total = 0.0;
    while !rest.is_empty() {
        let number_end = rest.find(|c: char| !is_number(c)).unwrap_or(rest.len());
        let unit_end = rest[number_end..]
            .find(is_number)
            .map_or(rest.len(), |i| number_end + i);

        let value: f64 = rest[..number_end].parse().ok()?;
        let (multiplier, divisor) = match &rest[number_end..unit_end] {
            "ns" => (1.0, 1e9),
            "us" | "µs" | "μs" => (1.0, 1e6),
            "ms" => (1.0, 1e3),
            "s" => (1.0, 1.0),
            "m" => (60.0, 1.0),
            "h" => (3600.0, 1.0),
            _ => return None,
        };

        total += value * multiplier / divisor;
        rest = &rest[unit_end..];
    }

    Some(sign * total)
}

impl From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Error::Config(error.to_string())
    }
}

/// Built-in defaults, overridden by the unprefixed `LISTEN`, `CONFIG_FILE`, `METRICS_PATH` and
/// `CHECK_TIMEOUT`, overridden by `ECOFLOW_*` environment variables, overridden by `args`.
pub fn read_settings(args: &Args) -> Result<Settings, Error> {
    let mut settings = Config::default();
    settings
        .set_default("listen", LISTEN)?
        .set_default("config_file", CONFIG_FILE)?
        .set_default("metrics_path", METRICS_PATH)?
        .set_default("check_timeout", CHECK_TIMEOUT)?
        .set_default("api_url", API_URL)?;

    for (var, key) in LEGACY_ENV.iter() {
        match env::var(var) {
            Ok(value) if !value.is_empty() => {
                settings.set_default(key, value)?;
            }
            _ => {}
        }
    }

    settings.merge(config::Environment::with_prefix("ECOFLOW"))?;

    if let Some(listen) = &args.listen {
        settings.set("listen", listen.as_str())?;
    }
    if let Some(config_file) = &args.config_file {
        settings.set("config_file", config_file.as_str())?;
    }
    if let Some(metrics_path) = &args.metrics_path {
        settings.set("metrics_path", metrics_path.as_str())?;
    }
    if let Some(check_timeout) = &args.check_timeout {
        settings.set("check_timeout", check_timeout.as_str())?;
    }
    if let Some(api_url) = &args.api_url {
        settings.set("api_url", api_url.as_str())?;
    }

    Ok(settings.try_into()?)
}

/// Parse a YAML list of devices. Duplicated serial numbers are dropped, see `model::dedup`.
pub fn parse_devices(content: &str) -> Result<Vec<Device>, Error> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let devices: Option<Vec<Device>> = serde_yaml::from_str(content)
        .map_err(|e| Error::Config(format!("couldn't parse device list: {}", e)))?;

    Ok(model::dedup(devices.unwrap_or_default()))
}

pub fn load_devices<P: AsRef<Path>>(path: P) -> Result<Vec<Device>, Error> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("couldn't read {}: {}", path.display(), e)))?;

    parse_devices(&content)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::PathBuf;

    fn resource(filename: &str) -> PathBuf {
        let mut d = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        d.push(format!("resources/test/{}", filename));
        d
    }

    fn settings(check_timeout: &str) -> Settings {
        Settings {
            listen: LISTEN.to_string(),
            config_file: CONFIG_FILE.to_string(),
            metrics_path: METRICS_PATH.to_string(),
            check_timeout: check_timeout.to_string(),
            api_url: API_URL.to_string(),
        }
    }

    #[test]
    fn load_devices_dedups_and_defaults() {
        let devices = load_devices(resource("devices.yaml")).unwrap();

        assert_eq!(2, devices.len());
        assert_eq!("garage", devices[0].label);
        assert_eq!("R331ZEB4ZEA0012345", devices[0].serial_number);
        assert_eq!("app-key-1", devices[0].app_key);
        assert_eq!("secret-key-1", devices[0].secret_key);
        assert_eq!("R331ZEB4ZEA0067890", devices[1].label);
    }

    #[test]
    fn load_devices_missing_file() {
        let err = load_devices(resource("does-not-exist.yaml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn parse_devices_accepts_label_key_and_missing_fields() {
        let devices = parse_devices("- label: shed\n  serialNumber: SN1\n- appKey: k\n").unwrap();

        assert_eq!(2, devices.len());
        assert_eq!("shed", devices[0].label);
        assert_eq!("", devices[1].serial_number);
        assert_eq!("", devices[1].label);
    }

    #[test]
    fn parse_devices_empty() {
        assert!(parse_devices("").unwrap().is_empty());
        assert!(parse_devices("~\n").unwrap().is_empty());
    }

    #[test]
    fn parse_devices_rejects_garbage() {
        let err = parse_devices("serialNumber: [unterminated").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args {
            listen: Some("127.0.0.1:9999".to_string()),
            check_timeout: Some("2.5".to_string()),
            metrics_path: Some("/scrape".to_string()),
            ..Default::default()
        };

        let settings = read_settings(&args).unwrap();

        assert_eq!("127.0.0.1:9999".parse::<SocketAddr>().unwrap(), settings.listen().unwrap());
        assert_eq!(Duration::from_millis(2500), settings.check_timeout().unwrap());
        assert_eq!("/scrape", settings.metrics_path);
    }

    #[test]
    fn check_timeout_must_be_positive() {
        assert_eq!(Duration::from_secs(5), settings("5").check_timeout().unwrap());
        assert_eq!(Err(Error::InvalidTimeout), settings("0").check_timeout());
        assert_eq!(Err(Error::InvalidTimeout), settings("0s").check_timeout());
        assert_eq!(Err(Error::InvalidTimeout), settings("-1").check_timeout());
        assert_eq!(Err(Error::InvalidTimeout), settings("-5s").check_timeout());
        assert_eq!(Err(Error::InvalidTimeout), settings("NaN").check_timeout());
    }

    #[test]
    fn check_timeout_accepts_go_durations() {
        assert_eq!(Duration::from_secs(5), settings(CHECK_TIMEOUT).check_timeout().unwrap());
        assert_eq!(Duration::from_millis(500), settings("500ms").check_timeout().unwrap());
        assert_eq!(Duration::from_millis(1500), settings("1.5s").check_timeout().unwrap());
        assert_eq!(Duration::from_secs(90), settings("1m30s").check_timeout().unwrap());
        assert_eq!(Duration::from_secs(7200), settings("2h").check_timeout().unwrap());
        assert_eq!(Duration::from_millis(250), settings("250ms").check_timeout().unwrap());
        assert!(settings("100us").check_timeout().unwrap() < Duration::from_millis(1));
    }

    #[test]
    fn check_timeout_rejects_garbage() {
        for input in &["", "five", "5 s", "5d", "s", "1.2.3s", "-"] {
            assert!(
                matches!(settings(input).check_timeout(), Err(Error::Config(_))),
                "{:?}",
                input
            );
        }
    }

    #[test]
    fn legacy_environment_is_honoured() {
        env::set_var("CONFIG_FILE", "/tmp/legacy-ecoflow.yaml");
        let settings = read_settings(&Args::default());
        env::remove_var("CONFIG_FILE");

        assert_eq!("/tmp/legacy-ecoflow.yaml", settings.unwrap().config_file);
    }

    #[test]
    fn check_timeout_flag_keeps_underscore_spelling() {
        let args = Args::try_parse_from(&["ecoflow-exporter", "--check_timeout", "3s"]).unwrap();
        assert_eq!(Some("3s".to_string()), args.check_timeout);

        let args = Args::try_parse_from(&["ecoflow-exporter", "--check-timeout", "750ms"]).unwrap();
        assert_eq!(
            Duration::from_millis(750),
            read_settings(&args).unwrap().check_timeout().unwrap()
        );
    }

    #[test]
    fn invalid_listen_address() {
        let mut s = settings(CHECK_TIMEOUT);
        s.listen = "not an address".to_string();
        assert!(matches!(s.listen(), Err(Error::Config(_))));
    }
}
