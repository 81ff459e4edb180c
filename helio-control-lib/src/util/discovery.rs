use std::cmp::max;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::future::{self, Future};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::error::{Error, Result};
use crate::util::wire::{
    encode_command, Command, BROADCAST_HARDWARE_ADDRESS, COMMAND_OFFSET, HEADER_LEN,
};
use crate::util::xml::{flag, optional_ip};

/// UDP port fixtures listen on for queries and send their replies from.
pub const UDP_PORT: u16 = 50632;

/// Destination of discovery queries.
pub const BROADCAST_ADDRESS: Ipv4Addr = Ipv4Addr::BROADCAST;

/// Longest time a scan listens for replies.
pub const DEFAULT_SCAN_WINDOW: Duration = Duration::from_secs(4);

/// Identity and network settings a fixture reports in its info reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceInfo {
    #[serde(rename = "MACAddress")]
    pub mac: String,
    #[serde(rename = "DHCP", deserialize_with = "flag")]
    pub dhcp: bool,
    #[serde(rename = "IPAddress", deserialize_with = "optional_ip")]
    pub ip_address: Option<IpAddr>,
    #[serde(rename = "NetMask")]
    pub net_mask: String,
    #[serde(rename = "Gateway", deserialize_with = "optional_ip")]
    pub gateway: Option<IpAddr>,
    #[serde(rename = "DNS1", deserialize_with = "optional_ip")]
    pub dns1: Option<IpAddr>,
    #[serde(rename = "DNS2", deserialize_with = "optional_ip")]
    pub dns2: Option<IpAddr>,
    #[serde(rename = "FwVersion")]
    pub firmware_version: String,
    /// Unique per fixture; scans de-duplicate on it.
    #[serde(rename = "SerialNr")]
    pub serial_number: String,
}

impl Display for DeviceInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Serial: {}, MAC: {}, IP: {}",
            self.serial_number,
            self.mac,
            display_ip(&self.ip_address)
        )
    }
}

fn display_ip(ip: &Option<IpAddr>) -> String {
    ip.map(|ip| ip.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Checks the envelope of a datagram received on the discovery socket and
/// returns its XML body.
///
/// Checks, in order: the sender's port, the packet length and the command byte.
fn info_reply_body(source: SocketAddr, data: &[u8], reply_port: u16) -> Result<&str> {
    if source.port() != reply_port {
        return Err(Error::MalformedReply(format!(
            "reply from {} did not come from port {}",
            source, reply_port
        )));
    }
    if data.len() <= HEADER_LEN {
        return Err(Error::MalformedReply(format!(
            "reply from {} is only {} bytes",
            source,
            data.len()
        )));
    }
    let info_reply = Command::InfoReply.wire_byte()?;
    if data[COMMAND_OFFSET] != info_reply {
        return Err(Error::MalformedReply(format!(
            "reply from {} has command byte {:#04x}",
            source, data[COMMAND_OFFSET]
        )));
    }
    std::str::from_utf8(&data[HEADER_LEN..])
        .map_err(|e| Error::MalformedReply(format!("reply from {} is not UTF-8: {}", source, e)))
}

fn decode_device_info(source: SocketAddr, body: &str) -> Result<DeviceInfo> {
    quick_xml::de::from_str(body).map_err(|e| {
        Error::MalformedReply(format!("reply from {} is not device XML: {}", source, e))
    })
}

/// Validates a datagram received on the discovery socket and decodes the
/// [`DeviceInfo`] it carries.
pub fn decode_info_reply(source: SocketAddr, data: &[u8], reply_port: u16) -> Result<DeviceInfo> {
    let body = info_reply_body(source, data, reply_port)?;
    decode_device_info(source, body)
}

/// Aborts the receive task when a scan ends, which closes its socket.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// UDP broadcast discovery of fixtures on the local network.
#[derive(Debug, Clone)]
pub struct Discovery {
    port: u16,
    broadcast_address: Ipv4Addr,
    window: Duration,
}

impl Default for Discovery {
    fn default() -> Self {
        Discovery {
            port: UDP_PORT,
            broadcast_address: BROADCAST_ADDRESS,
            window: DEFAULT_SCAN_WINDOW,
        }
    }
}

impl Discovery {
    /// Scans with the default settings until `given_timeout` or the default
    /// window elapses, whichever is shorter.
    pub async fn find_devices(given_timeout: Duration) -> Result<Vec<DeviceInfo>> {
        Discovery::default()
            .scan(given_timeout, future::pending())
            .await
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_broadcast_address(mut self, broadcast_address: Ipv4Addr) -> Self {
        self.broadcast_address = broadcast_address;
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /**
    Broadcasts a query and collects the fixtures that answer.

    Listens until `given_timeout` or the configured window elapses (whichever is
    shorter), or until `cancel` resolves. Fixtures are returned in the order
    their first reply arrived; repeated replies with a known serial number are
    dropped.

    Only socket setup and the query send can fail. Undecodable replies are
    logged and skipped, and a receive error simply ends the scan early.
     */
    pub async fn scan<F>(&self, given_timeout: Duration, cancel: F) -> Result<Vec<DeviceInfo>>
    where
        F: Future<Output = ()>,
    {
        let window = given_timeout.min(self.window);

        // Bind the listener before sending so no early reply is missed.
        let receiver = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, self.port)).await?;

        let sender = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        sender.set_broadcast(true)?;
        let query = encode_command(Command::Query.code(), BROADCAST_HARDWARE_ADDRESS, None)?;
        sender
            .send_to(&query, (self.broadcast_address, self.port))
            .await?;
        debug!(
            "Sent discovery query to {}:{}",
            self.broadcast_address, self.port
        );
        drop(sender);

        Ok(self.collect(receiver, window, cancel).await)
    }

    /// Runs the receive loop on `receiver` and aggregates its replies.
    pub(crate) async fn collect<F>(
        &self,
        receiver: UdpSocket,
        window: Duration,
        cancel: F,
    ) -> Vec<DeviceInfo>
    where
        F: Future<Output = ()>,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let _reader = AbortOnDrop(tokio::spawn(receive_replies(receiver, self.port, tx)));
        aggregate(rx, window, cancel).await
    }

    pub fn pretty_print_devices(devices: &[DeviceInfo]) {
        // Determine the maximum width for each column
        let max_ip_width = devices
            .iter()
            .map(|d| max(display_ip(&d.ip_address).len(), "IP Address".len()))
            .max()
            .unwrap_or(0);
        let max_serial_width = devices
            .iter()
            .map(|d| max(d.serial_number.len(), "Serial".len()))
            .max()
            .unwrap_or(0);
        let max_mac_width = devices
            .iter()
            .map(|d| max(d.mac.len(), "MAC Address".len()))
            .max()
            .unwrap_or(0);
        let max_fw_width = devices
            .iter()
            .map(|d| max(d.firmware_version.len(), "Firmware".len()))
            .max()
            .unwrap_or(0);

        println!(
            "{:<ip_width$} {:<serial_width$} {:<mac_width$} {:<fw_width$} DHCP",
            "IP Address",
            "Serial",
            "MAC Address",
            "Firmware",
            ip_width = max_ip_width + 2,
            serial_width = max_serial_width + 2,
            mac_width = max_mac_width + 2,
            fw_width = max_fw_width + 2,
        );

        println!(
            "{:<ip_width$} {:<serial_width$} {:<mac_width$} {:<fw_width$} ----",
            "-".repeat(max_ip_width),
            "-".repeat(max_serial_width),
            "-".repeat(max_mac_width),
            "-".repeat(max_fw_width),
            ip_width = max_ip_width + 2,
            serial_width = max_serial_width + 2,
            mac_width = max_mac_width + 2,
            fw_width = max_fw_width + 2,
        );

        for device in devices {
            println!(
                "{:<ip_width$} {:<serial_width$} {:<mac_width$} {:<fw_width$} {}",
                display_ip(&device.ip_address),
                device.serial_number,
                device.mac,
                device.firmware_version,
                if device.dhcp { "yes" } else { "no" },
                ip_width = max_ip_width + 2,
                serial_width = max_serial_width + 2,
                mac_width = max_mac_width + 2,
                fw_width = max_fw_width + 2,
            );
        }
    }
}

/// Reads datagrams until the socket fails or the aggregator goes away.
async fn receive_replies(socket: UdpSocket, reply_port: u16, tx: UnboundedSender<DeviceInfo>) {
    let mut buffer = [0u8; 2048];
    loop {
        let (number_of_bytes, source) = match socket.recv_from(&mut buffer).await {
            Ok(received) => received,
            Err(e) => {
                debug!("Discovery receive loop stopped: {}", e);
                return;
            }
        };
        let body = match info_reply_body(source, &buffer[..number_of_bytes], reply_port) {
            Ok(body) => body,
            Err(e) => {
                debug!("Dropping datagram: {}", e);
                continue;
            }
        };
        match decode_device_info(source, body) {
            Ok(device) => {
                if tx.send(device).is_err() {
                    return;
                }
            }
            Err(e) => warn!("Dropping info reply: {}", e),
        }
    }
}

/// Collects unique fixtures until the window closes or `cancel` resolves.
async fn aggregate<F>(
    mut rx: UnboundedReceiver<DeviceInfo>,
    window: Duration,
    cancel: F,
) -> Vec<DeviceInfo>
where
    F: Future<Output = ()>,
{
    let mut seen_serials = HashSet::new();
    let mut devices = Vec::new();

    let deadline = sleep(window);
    tokio::pin!(deadline);
    tokio::pin!(cancel);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                debug!("Discovery window of {:?} elapsed", window);
                break;
            }
            _ = &mut cancel => {
                debug!("Discovery cancelled");
                break;
            }
            received = rx.recv() => match received {
                Some(device) => {
                    if seen_serials.insert(device.serial_number.clone()) {
                        info!("Found device: {}", device);
                        devices.push(device);
                    } else {
                        debug!("Found device {} again, skipping", device.serial_number);
                    }
                }
                None => break,
            },
        }
    }

    devices
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO_XML: &str = "<HelioDevice>\n<MACAddress>64:1A:10:10:10:10</MACAddress><DHCP>true</DHCP><IPAddress>192.168.1.8</IPAddress><NetMask>255.255.255.0</NetMask><Gateway>192.168.1.1</Gateway><DNS1>192.168.1.1</DNS1><DNS2>0.0.0.0</DNS2><FwVersion>R2.2.25</FwVersion><SerialNr>fcaaaaaaaaaa</SerialNr></HelioDevice>";

    fn info_reply(serial: &str) -> Vec<u8> {
        let body = INFO_XML.replace("fcaaaaaaaaaa", serial);
        encode_command(6, "64:1A:10:10:10:10", Some(body.as_bytes()))
            .unwrap()
            .to_vec()
    }

    fn from_port(port: u16) -> SocketAddr {
        SocketAddr::from(([192, 168, 1, 8], port))
    }

    #[test]
    fn decodes_device_info() {
        let info: DeviceInfo = quick_xml::de::from_str(INFO_XML).unwrap();
        assert_eq!(info.mac, "64:1A:10:10:10:10");
        assert!(info.dhcp);
        assert_eq!(info.ip_address, Some(IpAddr::from([192, 168, 1, 8])));
        assert_eq!(info.net_mask, "255.255.255.0");
        assert_eq!(info.gateway, Some(IpAddr::from([192, 168, 1, 1])));
        assert_eq!(info.dns1, Some(IpAddr::from([192, 168, 1, 1])));
        assert_eq!(info.dns2, Some(IpAddr::from([0, 0, 0, 0])));
        assert_eq!(info.firmware_version, "R2.2.25");
        assert_eq!(info.serial_number, "fcaaaaaaaaaa");
    }

    #[test]
    fn accepts_info_reply() {
        let info = decode_info_reply(from_port(UDP_PORT), &info_reply("abc"), UDP_PORT).unwrap();
        assert_eq!(info.serial_number, "abc");
    }

    #[test]
    fn rejects_wrong_source_port() {
        let result = decode_info_reply(from_port(UDP_PORT + 1), &info_reply("abc"), UDP_PORT);
        assert!(matches!(result, Err(Error::MalformedReply(_))));
    }

    #[test]
    fn rejects_short_datagrams() {
        let mut packet = info_reply("abc");
        packet.truncate(HEADER_LEN);
        let result = decode_info_reply(from_port(UDP_PORT), &packet, UDP_PORT);
        assert!(matches!(result, Err(Error::MalformedReply(_))));
    }

    #[test]
    fn rejects_other_commands() {
        let mut packet = info_reply("abc");
        packet[COMMAND_OFFSET] = 0;
        let result = decode_info_reply(from_port(UDP_PORT), &packet, UDP_PORT);
        assert!(matches!(result, Err(Error::MalformedReply(_))));
    }

    #[test]
    fn rejects_bad_xml() {
        let mut packet = info_reply("abc");
        packet.truncate(HEADER_LEN);
        packet.extend_from_slice(b"<HelioDevice><DHCP>maybe</DHCP></HelioDevice>");
        let result = decode_info_reply(from_port(UDP_PORT), &packet, UDP_PORT);
        assert!(matches!(result, Err(Error::MalformedReply(_))));
    }

    #[tokio::test]
    async fn aggregate_deduplicates_by_serial() {
        let (tx, rx) = mpsc::unbounded_channel();
        for serial in ["one", "two", "one", "three", "two"] {
            tx.send(DeviceInfo {
                serial_number: serial.to_string(),
                ..DeviceInfo::default()
            })
            .unwrap();
        }
        let devices = aggregate(rx, Duration::from_millis(100), future::pending()).await;
        let serials: Vec<&str> = devices.iter().map(|d| d.serial_number.as_str()).collect();
        assert_eq!(serials, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn aggregate_stops_on_cancel() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let started = tokio::time::Instant::now();
        let devices = aggregate(rx, Duration::from_secs(30), future::ready(())).await;
        assert!(devices.is_empty());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn collects_replies_from_the_network() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let receiver_addr = receiver.local_addr().unwrap();
        let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let stranger = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let device_port = device.local_addr().unwrap().port();

        let mut wrong_command = info_reply("wrong-command");
        wrong_command[COMMAND_OFFSET] = 0x05;

        device.send_to(&info_reply("first"), receiver_addr).await.unwrap();
        device.send_to(&info_reply("first"), receiver_addr).await.unwrap();
        device.send_to(&wrong_command, receiver_addr).await.unwrap();
        device.send_to(&info_reply("first")[..HEADER_LEN], receiver_addr).await.unwrap();
        stranger.send_to(&info_reply("stranger"), receiver_addr).await.unwrap();
        device.send_to(&info_reply("second"), receiver_addr).await.unwrap();

        let discovery = Discovery::default().with_port(device_port);
        let devices = discovery
            .collect(receiver, Duration::from_millis(500), future::pending())
            .await;
        let serials: Vec<&str> = devices.iter().map(|d| d.serial_number.as_str()).collect();
        assert_eq!(serials, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn scan_without_responders_is_empty() {
        let port = {
            let probe = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
            probe.local_addr().unwrap().port()
        };
        let discovery = Discovery::default()
            .with_port(port)
            .with_broadcast_address(Ipv4Addr::LOCALHOST)
            .with_window(Duration::from_millis(300));
        let devices = discovery
            .scan(DEFAULT_SCAN_WINDOW, future::pending())
            .await
            .unwrap();
        assert!(devices.is_empty());
    }
}
