use crate::api::{Client, Error};
use crate::collector::DeviceCollector;
use crate::model::Device;
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, TextEncoder};
use rocket::futures::future::join_all;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};

/// All device collectors of the process. Owned by the server, there is no global registry.
pub struct Exporter {
    collectors: Vec<DeviceCollector>,
}

impl Exporter {
    /// Fails when two collectors would export the same series (same name and const labels).
    pub fn new(collectors: Vec<DeviceCollector>) -> Result<Self, Error> {
        let mut desc_ids = HashSet::new();

        for desc in collectors.iter().flat_map(|c| c.describe()) {
            if !desc_ids.insert(desc.id) {
                let labels: Vec<String> = desc
                    .const_label_pairs
                    .iter()
                    .map(|l| format!("{}={:?}", l.get_name(), l.get_value()))
                    .collect();
                return Err(Error::Metrics(format!(
                    "{}{{{}}} would be exported twice",
                    desc.fq_name,
                    labels.join(",")
                )));
            }
        }

        Ok(Exporter { collectors })
    }

    pub fn from_devices(devices: Vec<Device>, client: &Client) -> Result<Self, Error> {
        let collectors = devices
            .into_iter()
            .map(|device| DeviceCollector::new(device, client.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        Exporter::new(collectors)
    }

    pub fn collectors(&self) -> &[DeviceCollector] {
        &self.collectors
    }

    /// Run one collection cycle for every device, all of them at once.
    pub async fn gather(&self) -> Vec<MetricFamily> {
        let cycles = self.collectors.iter().map(|c| c.collect());
        merge(join_all(cycles).await.into_iter().flatten())
    }

    /// Collect and render all metrics in the Prometheus text format.
    pub async fn scrape(&self) -> Result<String, Error> {
        let metric_families = self.gather().await;
        encode(&metric_families)
    }
}

/// Merge families sharing a name (one per device) into one, sorted by name.
pub fn merge<I>(families: I) -> Vec<MetricFamily>
where
    I: IntoIterator<Item = MetricFamily>,
{
    let mut merged: BTreeMap<String, MetricFamily> = BTreeMap::new();

    for mut family in families {
        match merged.entry(family.get_name().to_owned()) {
            Entry::Occupied(mut entry) => {
                for metric in family.take_metric().into_iter() {
                    entry.get_mut().mut_metric().push(metric);
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(family);
            }
        }
    }

    merged.into_iter().map(|(_, family)| family).collect()
}

pub fn encode(metric_families: &[MetricFamily]) -> Result<String, Error> {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    encoder.encode(metric_families, &mut buffer)?;
    String::from_utf8(buffer).or(Err(Error::Format))
}
