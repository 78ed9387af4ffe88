use chrono::{DateTime, Utc};
use std::fmt;

/// Public key size, or the sentinel for key types without a defined size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySize {
    Bits(u32),
    Unknown,
}

impl fmt::Display for KeySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySize::Bits(bits) => write!(f, "{bits}"),
            KeySize::Unknown => write!(f, "-1"),
        }
    }
}

/// Fields derived from a decoded X.509 certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateDetails {
    pub subject: String,
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub key_size: KeySize,
    /// Decimal rendering of the serial number
    pub serial_number: String,
    pub signature_algorithm: String,
    /// 1-based X.509 version
    pub version: u32,
}

/// One (certificate, device) line of the inventory.
///
/// Database fields are `None` when the outer joins found nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub cert_name: Option<String>,
    pub thumbprint: Option<String>,
    /// Comma-joined SSL server names, passed through from the query
    pub ssl_server_proxies: Option<String>,
    pub display_name: Option<String>,
    pub start_port: Option<String>,
    pub management_ip: Option<String>,
    pub os_version: Option<String>,
    pub certificate: CertificateDetails,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_size_display() {
        assert_eq!(KeySize::Bits(2048).to_string(), "2048");
        assert_eq!(KeySize::Unknown.to_string(), "-1");
    }
}
