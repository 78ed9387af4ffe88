//! Certificate inventory: query, decode, export

pub mod query;
pub mod row;
pub mod table;
pub mod x509;

pub use query::{generate_report, RawReportRow, REPORT_QUERY};
pub use row::{CertificateDetails, KeySize, ReportRow};
pub use table::{save_table, DateStyle, Delimiter, ExportMode, ReportColumn, TableOptions};
pub use x509::decode_certificate;
