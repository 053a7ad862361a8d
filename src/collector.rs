use crate::api::{Client, Error};
use crate::model::{Device, TelemetryReading};
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, Opts};
use std::future::Future;
use tokio::sync::Mutex;

pub const NAMESPACE: &str = "ecoflow";

const LABEL_DESCRIPTION: &str = "description";
const LABEL_SERIAL_NUMBER: &str = "sn";

/// Gauges of one device. Only ever touched while holding `DeviceCollector::gauges`.
struct Gauges {
    check_error: Gauge,
    soc: Gauge,
    remain_time: Gauge,
    watts_out_sum: Gauge,
    watts_in_sum: Gauge,
}

impl Gauges {
    fn new(device: &Device) -> Result<Self, Error> {
        let gauge = |name: &str, help: &str| {
            Gauge::with_opts(
                Opts::new(name, help)
                    .namespace(NAMESPACE)
                    .const_label(LABEL_DESCRIPTION, device.label.as_str())
                    .const_label(LABEL_SERIAL_NUMBER, device.serial_number.as_str()),
            )
        };

        Ok(Gauges {
            check_error: gauge("check_error", "1 if the last query of the device failed")?,
            soc: gauge("soc", "State of charge (percent)")?,
            remain_time: gauge("remain_time", "Remaining runtime (minutes)")?,
            watts_out_sum: gauge("watts_out_sum", "Current output power (W)")?,
            watts_in_sum: gauge("watts_in_sum", "Current input power (W)")?,
        })
    }

    fn all(&self) -> [&Gauge; 5] {
        [
            &self.check_error,
            &self.soc,
            &self.remain_time,
            &self.watts_out_sum,
            &self.watts_in_sum,
        ]
    }

    /// Fold the outcome of one fetch into the gauges. On failure only `check_error` moves, the
    /// telemetry gauges keep their last known good values.
    fn update(&self, device: &Device, result: Result<TelemetryReading, Error>) {
        match result {
            Ok(reading) if reading.is_success() => {
                self.check_error.set(0.0);
                self.soc.set(reading.state_of_charge);
                self.remain_time.set(reading.remaining_runtime);
                self.watts_out_sum.set(reading.watts_out_sum);
                self.watts_in_sum.set(reading.watts_in_sum);
                log::debug!("{}: {:?}", device.serial_number, reading);
            }
            Ok(reading) => {
                self.check_error.set(1.0);
                log::warn!(
                    "{}: API returned code {:?}: {}",
                    device.serial_number,
                    reading.code,
                    reading.message
                );
            }
            Err(e) => {
                self.check_error.set(1.0);
                log::warn!("{}: {}", device.serial_number, e);
            }
        }
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.all().iter().flat_map(|g| g.collect()).collect()
    }
}

/// Exposes the telemetry of a single device.
///
/// Every call to `collect()` queries the API once and publishes the result. Calls for the same
/// device are serialized for the whole fetch-update-publish sequence, so the five values
/// returned always come from a single cycle. Collectors of different devices share nothing.
pub struct DeviceCollector {
    device: Device,
    client: Client,
    descs: Vec<Desc>,
    gauges: Mutex<Gauges>,
}

impl DeviceCollector {
    pub fn new(device: Device, client: Client) -> Result<Self, Error> {
        let gauges = Gauges::new(&device)?;
        let descs = gauges
            .all()
            .iter()
            .flat_map(|g| g.desc())
            .cloned()
            .collect();

        Ok(DeviceCollector {
            device,
            client,
            descs,
            gauges: Mutex::new(gauges),
        })
    }

    /// Identity of all gauges. Never waits on a running `collect()`.
    pub fn describe(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    pub async fn collect(&self) -> Vec<MetricFamily> {
        let client = &self.client;
        self.collect_with(|device| client.fetch(device)).await
    }

    /// Run one collection cycle with `fetch` standing in for the API query.
    pub async fn collect_with<'a, F, Fut>(&'a self, fetch: F) -> Vec<MetricFamily>
    where
        F: FnOnce(&'a Device) -> Fut,
        Fut: Future<Output = Result<TelemetryReading, Error>>,
    {
        let gauges = self.gauges.lock().await;

        let result = fetch(&self.device).await;
        gauges.update(&self.device, result);

        gauges.collect()
    }
}
