use crate::report::row::ReportRow;
use crate::utils::errors::{CertListError, Result};
use crate::utils::output::{build_table_data, GetColumnValue};
use chrono::{DateTime, Utc};
use std::path::Path;

/// Column set and header flavour of the exported table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportMode {
    /// Every report field, headed by its field name
    #[default]
    Loose,
    /// Only tagged fields, headed by their bracketed tag
    Strict,
}

/// Field separator of the exported table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delimiter {
    #[default]
    Comma,
    Semicolon,
}

impl Delimiter {
    pub fn as_byte(self) -> u8 {
        match self {
            Delimiter::Comma => b',',
            Delimiter::Semicolon => b';',
        }
    }
}

/// Timestamp rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateStyle {
    /// `2006-01-02 15:04:05 UTC`
    #[default]
    WithZone,
    /// `2006-01-02 15:04:05`
    Plain,
}

impl DateStyle {
    pub fn format(self, time: &DateTime<Utc>) -> String {
        match self {
            DateStyle::WithZone => time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            DateStyle::Plain => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TableOptions {
    pub mode: ExportMode,
    pub delimiter: Delimiter,
    pub dates: DateStyle,
}

/// Report columns in export order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportColumn {
    DisplayName,
    ManagementIp,
    OsVersion,
    StartPort,
    Issuer,
    NotAfter,
    NotBefore,
    KeySize,
    SerialNumber,
    Thumbprint,
    SignatureAlgorithm,
    Subject,
    Version,
    SslServerProxies,
    CertName,
}

impl ReportColumn {
    pub const ALL: [ReportColumn; 15] = [
        Self::DisplayName,
        Self::ManagementIp,
        Self::OsVersion,
        Self::StartPort,
        Self::Issuer,
        Self::NotAfter,
        Self::NotBefore,
        Self::KeySize,
        Self::SerialNumber,
        Self::Thumbprint,
        Self::SignatureAlgorithm,
        Self::Subject,
        Self::Version,
        Self::SslServerProxies,
        Self::CertName,
    ];

    /// Header used in loose mode
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::DisplayName => "display_name",
            Self::ManagementIp => "management_ip",
            Self::OsVersion => "os_version",
            Self::StartPort => "start_port",
            Self::Issuer => "issuer",
            Self::NotAfter => "not_after",
            Self::NotBefore => "not_before",
            Self::KeySize => "key_size",
            Self::SerialNumber => "serial_number",
            Self::Thumbprint => "thumbprint",
            Self::SignatureAlgorithm => "signature_algorithm",
            Self::Subject => "subject",
            Self::Version => "version",
            Self::SslServerProxies => "ssl_server_proxies",
            Self::CertName => "cert_name",
        }
    }

    /// Strict-mode tag; untagged columns are left out of strict exports
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            Self::DisplayName => Some("[ServerName]"),
            Self::ManagementIp => Some("[IP]"),
            Self::OsVersion => Some("[OS]"),
            Self::StartPort => Some("[Port]"),
            Self::Issuer => Some("[IssuerName]"),
            Self::NotAfter => Some("[ExpirationDate]"),
            Self::NotBefore => Some("[EffectiveDate]"),
            Self::KeySize => Some("[KeySize0]"),
            Self::SerialNumber => Some("[SerialNumber]"),
            Self::Thumbprint => Some("[Thumbprint]"),
            Self::SignatureAlgorithm => Some("[SignatureAlgorithm]"),
            Self::Subject => Some("[SubjectName]"),
            Self::Version => Some("[Version]"),
            Self::SslServerProxies | Self::CertName => None,
        }
    }

    pub fn header(&self, mode: ExportMode) -> Option<&'static str> {
        match mode {
            ExportMode::Loose => Some(self.field_name()),
            ExportMode::Strict => self.tag(),
        }
    }

    /// (header, column) pairs exported in `mode`
    pub fn schema(mode: ExportMode) -> Vec<(&'static str, ReportColumn)> {
        Self::ALL
            .iter()
            .filter_map(|column| column.header(mode).map(|header| (header, *column)))
            .collect()
    }
}

impl GetColumnValue for ReportRow {
    fn get_column_value(&self, column: &ReportColumn, dates: DateStyle) -> String {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        let cert = &self.certificate;

        match column {
            ReportColumn::DisplayName => text(&self.display_name),
            ReportColumn::ManagementIp => text(&self.management_ip),
            ReportColumn::OsVersion => text(&self.os_version),
            ReportColumn::StartPort => text(&self.start_port),
            ReportColumn::Issuer => cert.issuer.clone(),
            ReportColumn::NotAfter => dates.format(&cert.not_after),
            ReportColumn::NotBefore => dates.format(&cert.not_before),
            ReportColumn::KeySize => cert.key_size.to_string(),
            ReportColumn::SerialNumber => cert.serial_number.clone(),
            ReportColumn::Thumbprint => text(&self.thumbprint),
            ReportColumn::SignatureAlgorithm => cert.signature_algorithm.clone(),
            ReportColumn::Subject => cert.subject.clone(),
            ReportColumn::Version => cert.version.to_string(),
            ReportColumn::SslServerProxies => text(&self.ssl_server_proxies),
            ReportColumn::CertName => text(&self.cert_name),
        }
    }
}

/// Write `rows` as a delimited table with a header record, replacing `path`
pub fn save_table(path: &Path, rows: &[ReportRow], options: &TableOptions) -> Result<()> {
    let schema = ReportColumn::schema(options.mode);
    let headers: Vec<&str> = schema.iter().map(|(header, _)| *header).collect();
    let columns: Vec<ReportColumn> = schema.iter().map(|(_, column)| *column).collect();
    let records = build_table_data(rows, &columns, options.dates);

    let mut writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter.as_byte())
        .flexible(false)
        .from_path(path)?;

    writer.write_record(&headers)?;
    for (index, record) in records.iter().enumerate() {
        if record.len() != headers.len() {
            return Err(CertListError::SchemaMismatch(format!(
                "row {index} has {} fields, header has {}",
                record.len(),
                headers.len()
            )));
        }
        writer.write_record(record)?;
    }
    writer.flush()?;

    tracing::info!(
        "Wrote {} rows ({} columns) to {}",
        records.len(),
        headers.len(),
        path.display()
    );
    Ok(())
}
