use std::net::IpAddr;
use std::ops::Deref;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::util::xml::{optional_ip, unsigned};

/// One light channel of a fixture.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct WavelengthDescription {
    /// Channel number as reported by the fixture.
    pub number: u8,
    /// Wavelength such as `450nm`, or a colour temperature such as `5700K`.
    pub wavelength: String,
    /// Rated power such as `10.2W`.
    pub power: String,
}

/// The channels of a fixture, in the order the fixture declares them.
///
/// Intensities passed to [`Device::set_intensities`](super::Device::set_intensities)
/// are matched to channels by position in this list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WavelengthList(Vec<WavelengthDescription>);

impl WavelengthList {
    pub fn into_inner(self) -> Vec<WavelengthDescription> {
        self.0
    }
}

impl Deref for WavelengthList {
    type Target = [WavelengthDescription];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a> IntoIterator for &'a WavelengthList {
    type Item = &'a WavelengthDescription;
    type IntoIter = std::slice::Iter<'a, WavelengthDescription>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Decodes the compact `number:wavelength:power,` list used in `diag.xml`.
///
/// A single trailing comma is ignored. Every other segment must have exactly
/// three fields and a numeric channel, otherwise nothing is returned.
pub fn decode_wavelength_list(raw: &str) -> Result<WavelengthList> {
    let body = raw.strip_suffix(',').unwrap_or(raw);
    body.split(',')
        .map(|segment| {
            let fields: Vec<&str> = segment.split(':').collect();
            let [number, wavelength, power] = fields.as_slice() else {
                return Err(Error::Format(format!(
                    "segment {:?} has {} fields, expected 3",
                    segment,
                    fields.len()
                )));
            };
            let number = number
                .parse::<u8>()
                .map_err(|e| Error::Format(format!("channel {:?}: {}", number, e)))?;
            Ok(WavelengthDescription {
                number,
                wavelength: wavelength.to_string(),
                power: power.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()
        .map(WavelengthList)
}

impl FromStr for WavelengthList {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        decode_wavelength_list(s)
    }
}

impl<'de> Deserialize<'de> for WavelengthList {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        decode_wavelength_list(&raw).map_err(serde::de::Error::custom)
    }
}

/// Full state snapshot returned by `/diag.xml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Diagnostic {
    pub model: String,
    #[serde(rename = "cpuFW")]
    pub cpu_firmware: String,
    #[serde(rename = "driverFW")]
    pub driver_firmware: String,
    #[serde(rename = "ethernetMAC")]
    pub ethernet_mac: String,
    #[serde(rename = "wlanMAC")]
    pub wlan_mac: String,
    pub wavelengths: WavelengthList,
    pub clock: String,
    #[serde(rename = "onSchedule")]
    pub on_schedule: String,
    #[serde(rename = "masterOrSlave")]
    pub master_or_slave: String,
    #[serde(rename = "systemStatus")]
    pub system_status: String,
    pub runtime: String,
    #[serde(rename = "latestChange")]
    pub latest_change: String,
    #[serde(rename = "changedBy")]
    pub changed_by: String,
    #[serde(rename = "changeIP")]
    pub change_ip: String,
    #[serde(rename = "changeType")]
    pub change_type: String,
    /// Raw `sensor:value,` list, e.g. `0:26.8C,`.
    pub temps: String,
    /// Raw `channel:value,` list, e.g. `0:0,1:0,`.
    pub intensities: String,
    #[serde(rename = "useNTP", deserialize_with = "unsigned")]
    pub use_ntp: u32,
    #[serde(rename = "networkType")]
    pub network_type: String,
    #[serde(rename = "networkIP", deserialize_with = "optional_ip")]
    pub network_ip: Option<IpAddr>,
    #[serde(rename = "networkSubnet", deserialize_with = "optional_ip")]
    pub network_subnet: Option<IpAddr>,
    #[serde(rename = "networkGateway", deserialize_with = "optional_ip")]
    pub network_gateway: Option<IpAddr>,
    #[serde(rename = "networkDNS1", deserialize_with = "optional_ip")]
    pub network_dns1: Option<IpAddr>,
    #[serde(rename = "networkDNS2", deserialize_with = "optional_ip")]
    pub network_dns2: Option<IpAddr>,
    #[serde(rename = "allowedTemp")]
    pub allowed_temp: String,
    pub hs: String,
    pub title: String,
    #[serde(rename = "wlanIP", deserialize_with = "optional_ip")]
    pub wlan_ip: Option<IpAddr>,
    #[serde(rename = "ethernetIP", deserialize_with = "optional_ip")]
    pub ethernet_ip: Option<IpAddr>,
    #[serde(rename = "ntpOffset")]
    pub ntp_offset: String,
    pub masters: String,
    pub dialog: String,
    #[serde(rename = "poweredLink")]
    pub powered_link: String,
    #[serde(rename = "poweredText")]
    pub powered_text: String,
    #[serde(rename = "ntpPoolType")]
    pub ntp_pool_type: String,
    #[serde(rename = "ntpPoolCustom")]
    pub ntp_pool_custom: String,
    pub favicon: String,
    #[serde(rename = "tempUnit")]
    pub temp_unit: String,
    #[serde(rename = "lockData")]
    pub lock_data: String,
    pub shortcuts: String,
    #[serde(rename = "ntpData")]
    pub ntp_data: String,
    #[serde(rename = "multicastIP")]
    pub multicast_ip: String,
    pub tags: String,
}

/// Narrower state snapshot returned by `/status.xml`.
///
/// The firmware names the elements with single letters; letters without a
/// known meaning are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Status {
    #[serde(rename = "a")]
    pub internal_time: String,
    #[serde(rename = "b")]
    pub on_schedule: String,
    #[serde(rename = "c")]
    pub status: String,
    #[serde(rename = "d")]
    pub uptime: String,
    #[serde(rename = "e")]
    pub last_change_at: String,
    #[serde(rename = "f")]
    pub last_change_interface: String,
    #[serde(rename = "g", deserialize_with = "optional_ip")]
    pub last_change_by: Option<IpAddr>,
    #[serde(rename = "h")]
    pub last_change_type: String,
    #[serde(rename = "i")]
    pub temp: String,
    #[serde(rename = "j")]
    pub intensities: String,
    #[serde(rename = "k")]
    pub masters: String,
    #[serde(rename = "l")]
    pub reserved: String,
    #[serde(rename = "m")]
    pub control_mode: String,
    #[serde(rename = "q")]
    pub ntp_time_settings: String,
}

/// Decodes a complete XML document, rejecting bodies that are not XML at all.
pub(crate) fn decode_document<T>(what: &'static str, body: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    if !body.trim_start().starts_with('<') {
        return Err(Error::decode(
            what,
            serde::de::Error::custom("response body is not an XML document"),
        ));
    }
    quick_xml::de::from_str(body).map_err(|e| Error::decode(what, e))
}

impl FromStr for Diagnostic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        decode_document("diagnostic", s)
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        decode_document("status", s)
    }
}
