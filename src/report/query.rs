use crate::report::row::ReportRow;
use crate::report::x509::decode_certificate;
use crate::utils::errors::Result;
use sqlx::mysql::{MySqlPool, MySqlRow};
use sqlx::Row;

/// One row per (certificate expecting a private key, device holding it).
///
/// Outer joins keep certificates without devices or SSL servers; their
/// device and proxy columns come back NULL. Proxy names and ports are
/// folded per row, comma separated.
pub const REPORT_QUERY: &str = r#"
SELECT
    CAST(nc.NAME AS CHAR) AS CERT_NAME,
    CAST(nc.THUMBPRINT AS CHAR) AS THUMBPRINT,
    nc.CERT_BYTES AS CERT_BYTES,
    GROUP_CONCAT(DISTINCT ss.NAME ORDER BY ss.NAME SEPARATOR ',') AS SSL_SERVER_PROXIES,
    CAST(td.DISPLAY_NAME AS CHAR) AS DISPLAY_NAME,
    GROUP_CONCAT(DISTINCT sslp.START_PORT ORDER BY sslp.START_PORT SEPARATOR ',') AS START_PORT,
    CAST(td.IP_ADDRESS AS CHAR) AS MANAGEMENT_IP,
    CAST(td.SOFTWARE_VERSION AS CHAR) AS OS_VERSION
FROM NAMED_CERTIFICATE nc
LEFT JOIN DEVICE_CERTIFICATE dc ON nc.ID = dc.NAMED_CERTIFICATE_ID
LEFT JOIN TPT_DEVICE td ON dc.DEVICE_SHORT_ID = td.SHORT_ID
LEFT JOIN SSL_SERVER_CERTIFICATES ssc ON nc.ID = ssc.NAMED_CERTIFICATE_ID
LEFT JOIN SSL_SERVER ss ON ssc.SSL_SERVER_ID = ss.SSL_SERVER_ID
LEFT JOIN SSL_SERVER_PORT sslp ON ss.SSL_SERVER_ID = sslp.SSL_SERVER_ID
WHERE nc.PRIVATE_KEY_EXPECTED = 1
GROUP BY nc.ID, td.SHORT_ID
ORDER BY nc.NAME, td.DISPLAY_NAME
"#;

/// Undecoded result row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawReportRow {
    pub cert_name: Option<String>,
    pub thumbprint: Option<String>,
    pub cert_bytes: Option<Vec<u8>>,
    pub ssl_server_proxies: Option<String>,
    pub display_name: Option<String>,
    pub start_port: Option<String>,
    pub management_ip: Option<String>,
    pub os_version: Option<String>,
}

impl RawReportRow {
    fn from_row(row: &MySqlRow) -> Result<Self> {
        // Columns are decoded as bytes so BLOB and binary-collated text behave alike
        let text = |column: &str| -> Result<Option<String>> {
            let bytes: Option<Vec<u8>> = row.try_get(column)?;
            Ok(bytes.map(|b| String::from_utf8_lossy(&b).into_owned()))
        };

        Ok(Self {
            cert_name: text("CERT_NAME")?,
            thumbprint: text("THUMBPRINT")?,
            cert_bytes: row.try_get("CERT_BYTES")?,
            ssl_server_proxies: text("SSL_SERVER_PROXIES")?,
            display_name: text("DISPLAY_NAME")?,
            start_port: text("START_PORT")?,
            management_ip: text("MANAGEMENT_IP")?,
            os_version: text("OS_VERSION")?,
        })
    }

    /// Decode the embedded certificate; a missing certificate is malformed PEM
    pub fn into_report_row(self) -> Result<ReportRow> {
        let certificate = decode_certificate(self.cert_bytes.as_deref().unwrap_or_default())
            .inspect_err(|e| {
                tracing::error!(
                    "Certificate {} cannot be decoded: {e}",
                    self.cert_name.as_deref().unwrap_or("<unnamed>")
                );
            })?;

        Ok(ReportRow {
            cert_name: self.cert_name,
            thumbprint: self.thumbprint,
            ssl_server_proxies: self.ssl_server_proxies,
            display_name: self.display_name,
            start_port: self.start_port,
            management_ip: self.management_ip,
            os_version: self.os_version,
            certificate,
        })
    }
}

/// Run the inventory query against the restored database and decode every row
pub async fn generate_report(pool: &MySqlPool) -> Result<Vec<ReportRow>> {
    let rows = sqlx::query(REPORT_QUERY).fetch_all(pool).await?;
    tracing::info!("Inventory query returned {} rows", rows.len());

    rows.iter()
        .map(|row| {
            let raw = RawReportRow::from_row(row)?;
            tracing::debug!(
                "Certificate {} on {}",
                raw.cert_name.as_deref().unwrap_or_default(),
                raw.display_name.as_deref().unwrap_or("-")
            );
            raw.into_report_row()
        })
        .collect()
}
