pub type Endpoint = str;

pub const API_URL: &str = "https://api.ecoflow.com";

pub const DEVICE_QUOTA: &Endpoint = "/iot-service/open/api/device/queryDeviceQuota";
