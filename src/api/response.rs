use crate::model::TelemetryReading;
use serde::Deserialize;

/* Missing numeric fields decode as zero, same as an explicit zero from the API */
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceQuotaData {
    pub soc: f64,
    pub remain_time: f64,
    pub watts_out_sum: f64,
    pub watts_in_sum: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeviceQuota {
    pub code: String,
    pub message: String,
    /* Error responses may carry `"data": null` */
    pub data: Option<DeviceQuotaData>,
}

impl From<DeviceQuota> for TelemetryReading {
    fn from(response: DeviceQuota) -> Self {
        let data = response.data.unwrap_or_default();

        TelemetryReading {
            code: response.code,
            message: response.message,
            state_of_charge: data.soc,
            remaining_runtime: data.remain_time,
            watts_out_sum: data.watts_out_sum,
            watts_in_sum: data.watts_in_sum,
        }
    }
}
