use std::net::{IpAddr, SocketAddr};

use lazy_static::lazy_static;
use log::debug;
use reqwest::header::CONNECTION;
use reqwest::{Client, Response, StatusCode};

use crate::error::{Error, Result};
use crate::util::discovery::DeviceInfo;

pub mod lightshow;
pub mod models;

pub use models::{
    decode_wavelength_list, Diagnostic, Status, WavelengthDescription, WavelengthList,
};

/// TCP port the fixtures' HTTP server listens on.
pub const TCP_PORT: u16 = 50630;

lazy_static! {
    /// Client shared by every [`Device`] that was not given its own.
    static ref DEFAULT_CLIENT: Client = Client::new();
}

/**
Handle to one fixture's HTTP control interface.

The handle keeps no state besides the address and the HTTP client, so every
call is a single independent request. Calls are not retried. To bound one,
wrap it in `tokio::time::timeout`; dropping the future cancels the request.
 */
#[derive(Debug, Clone)]
pub struct Device {
    address: IpAddr,
    port: u16,
    client: Client,
}

impl Device {
    /// Creates a handle for the fixture at `address`.
    ///
    /// Without a `client`, a process-wide shared client is used so all
    /// handles share one connection pool.
    pub fn new(address: IpAddr, client: Option<Client>) -> Self {
        Device {
            address,
            port: TCP_PORT,
            client: client.unwrap_or_else(|| DEFAULT_CLIENT.clone()),
        }
    }

    /// Creates a handle for a fixture found by discovery.
    pub fn from_device_info(info: &DeviceInfo, client: Option<Client>) -> Result<Self> {
        let address = info
            .ip_address
            .ok_or_else(|| Error::MissingAddress(info.serial_number.clone()))?;
        Ok(Device::new(address, client))
    }

    /// Talks to the fixture on `port` instead of [`TCP_PORT`].
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}/{}", SocketAddr::new(self.address, self.port), path)
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Response> {
        let url = self.url(path);
        debug!("GET {} {:?}", url, query);
        let response = self
            .client
            .get(&url)
            .query(query)
            .header(CONNECTION, "close")
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(Error::ProtocolStatus(response.status()));
        }
        Ok(response)
    }

    /// Fetches the full state snapshot from `/diag.xml`.
    pub async fn diagnostic(&self) -> Result<Diagnostic> {
        let body = self.get("diag.xml", &[]).await?.text().await?;
        body.parse()
    }

    /// Fetches the short state snapshot from `/status.xml`.
    pub async fn status(&self) -> Result<Status> {
        let body = self.get("status.xml", &[]).await?.text().await?;
        body.parse()
    }

    /// Sets the intensity of every channel.
    ///
    /// Values are matched to channels by position in the
    /// [`Diagnostic::wavelengths`] list, so pass exactly one per channel. The
    /// count is not checked here; the fixture decides what to do with a
    /// mismatch.
    pub async fn set_intensities(&self, intensities: &[u32]) -> Result<()> {
        let value = join_intensities(intensities);
        self.get("intensity.cgi", &[("int", value.as_str())])
            .await?;
        Ok(())
    }
}

/// Formats intensities the way `intensity.cgi` expects them: `1:2:3:4`.
pub fn join_intensities(intensities: &[u32]) -> String {
    intensities
        .iter()
        .map(|intensity| intensity.to_string())
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn joins_intensities_with_colons() {
        assert_eq!(join_intensities(&[1, 2, 3, 4]), "1:2:3:4");
        assert_eq!(join_intensities(&[100]), "100");
        assert_eq!(join_intensities(&[]), "");
    }

    #[test]
    fn new_uses_control_port() {
        let device = Device::new(IpAddr::from([1, 2, 3, 4]), None);
        assert_eq!(device.address(), IpAddr::from([1, 2, 3, 4]));
        assert_eq!(device.port(), TCP_PORT);
        assert_eq!(device.url("diag.xml"), "http://1.2.3.4:50630/diag.xml");
    }

    #[test]
    fn ipv6_urls_are_bracketed() {
        let device = Device::new(IpAddr::from(std::net::Ipv6Addr::LOCALHOST), None).with_port(8080);
        assert_eq!(device.url("status.xml"), "http://[::1]:8080/status.xml");
    }

    #[test]
    fn from_device_info_needs_an_address() {
        let mut info = DeviceInfo {
            serial_number: "fcaaaaaaaaaa".to_string(),
            ..DeviceInfo::default()
        };
        assert!(matches!(
            Device::from_device_info(&info, None),
            Err(Error::MissingAddress(serial)) if serial == "fcaaaaaaaaaa"
        ));

        info.ip_address = Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 8)));
        let device = Device::from_device_info(&info, None).unwrap();
        assert_eq!(device.address(), IpAddr::V4(Ipv4Addr::new(192, 168, 1, 8)));
    }
}
