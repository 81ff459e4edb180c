use std::io;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned by discovery and device control.
///
/// Nothing in this crate retries on its own. Every variant describes a single
/// failed attempt and it is up to the caller to decide whether to try again.
#[derive(Debug, Error)]
pub enum Error {
    /// A command packet could not be built (bad hardware address, command code
    /// outside 0..=99 or an oversized payload).
    #[error("failed to encode command: {0}")]
    WireEncoding(String),

    /// Socket bind, send or receive failure.
    #[error("network error: {0}")]
    Network(#[from] io::Error),

    /// A datagram that is not a valid info reply.
    ///
    /// Discovery drops these and keeps listening; they never reach the caller
    /// of a scan.
    #[error("malformed reply: {0}")]
    MalformedReply(String),

    /// The device answered with something other than `200 OK`.
    #[error("unexpected status code {0}")]
    ProtocolStatus(StatusCode),

    /// The HTTP request could not be sent or its body could not be read.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A response body did not match the expected XML document.
    #[error("failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: quick_xml::DeError,
    },

    /// A wavelength list segment had the wrong shape.
    #[error("invalid wavelength list: {0}")]
    Format(String),

    /// The discovered device did not report an IP address.
    #[error("device {0} did not report an IP address")]
    MissingAddress(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn decode(what: &'static str, source: quick_xml::DeError) -> Self {
        Error::Decode { what, source }
    }
}
