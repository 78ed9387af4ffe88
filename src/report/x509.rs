use crate::report::row::{CertificateDetails, KeySize};
use crate::utils::errors::{CertListError, Result};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use x509_parser::der_parser::oid::Oid;
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

// Public key algorithm OIDs
const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";

// Named curve OIDs
const OID_SECP224R1: &str = "1.3.132.0.33";
const OID_SECP256R1: &str = "1.2.840.10045.3.1.7";
const OID_SECP384R1: &str = "1.3.132.0.34";
const OID_SECP521R1: &str = "1.3.132.0.35";

/// Signature algorithm OIDs and their conventional names
const SIGNATURE_ALGORITHMS: &[(&str, &str)] = &[
    ("1.2.840.113549.1.1.2", "MD2-RSA"),
    ("1.2.840.113549.1.1.4", "MD5-RSA"),
    ("1.2.840.113549.1.1.5", "SHA1-RSA"),
    ("1.2.840.113549.1.1.10", "RSASSA-PSS"),
    ("1.2.840.113549.1.1.11", "SHA256-RSA"),
    ("1.2.840.113549.1.1.12", "SHA384-RSA"),
    ("1.2.840.113549.1.1.13", "SHA512-RSA"),
    ("1.2.840.10040.4.3", "DSA-SHA1"),
    ("2.16.840.1.101.3.4.3.2", "DSA-SHA256"),
    ("1.2.840.10045.4.1", "ECDSA-SHA1"),
    ("1.2.840.10045.4.3.2", "ECDSA-SHA256"),
    ("1.2.840.10045.4.3.3", "ECDSA-SHA384"),
    ("1.2.840.10045.4.3.4", "ECDSA-SHA512"),
    ("1.3.101.112", "Ed25519"),
];

/// Distinguished name attribute OIDs and their short names
const NAME_ATTRIBUTES: &[(&str, &str)] = &[
    ("2.5.4.3", "CN"),
    ("2.5.4.5", "SERIALNUMBER"),
    ("2.5.4.6", "C"),
    ("2.5.4.7", "L"),
    ("2.5.4.8", "ST"),
    ("2.5.4.9", "STREET"),
    ("2.5.4.10", "O"),
    ("2.5.4.11", "OU"),
    ("2.5.4.17", "POSTALCODE"),
    ("0.9.2342.19200300.100.1.1", "UID"),
    ("0.9.2342.19200300.100.1.25", "DC"),
    ("1.2.840.113549.1.9.1", "emailAddress"),
];

/// Decode the first PEM block of `pem_data` as an X.509 certificate
pub fn decode_certificate(pem_data: &[u8]) -> Result<CertificateDetails> {
    let der_bytes = pem_block(pem_data)?;

    let (_, cert) = X509Certificate::from_der(&der_bytes)
        .map_err(|e| CertListError::CertParsing(e.to_string()))?;

    Ok(CertificateDetails {
        subject: format_name(cert.subject()),
        issuer: format_name(cert.issuer()),
        not_before: to_datetime(cert.validity().not_before)?,
        not_after: to_datetime(cert.validity().not_after)?,
        key_size: key_size(cert.public_key())?,
        serial_number: cert.serial.to_string(),
        signature_algorithm: signature_algorithm_name(&cert.signature_algorithm.algorithm),
        version: cert.version().0 + 1,
    })
}

/// Body of the first `-----BEGIN ...-----` block, base64 decoded
fn pem_block(pem_data: &[u8]) -> Result<Vec<u8>> {
    let text = String::from_utf8_lossy(pem_data);
    let mut label = None;
    let mut body = String::new();

    for line in text.lines() {
        let line = line.trim();
        match label {
            None => {
                label = line
                    .strip_prefix("-----BEGIN ")
                    .and_then(|rest| rest.strip_suffix("-----"));
            }
            Some(name) => {
                if line == format!("-----END {name}-----") {
                    return general_purpose::STANDARD
                        .decode(&body)
                        .map_err(|_| CertListError::MalformedPem);
                }
                // Encapsulated headers (RFC 1421) carry no payload
                if !line.contains(':') {
                    body.push_str(line);
                }
            }
        }
    }

    Err(CertListError::MalformedPem)
}

fn to_datetime(time: ASN1Time) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(time.timestamp(), 0).ok_or_else(|| {
        CertListError::CertParsing(format!("Validity time out of range: {time}"))
    })
}

fn key_size(spki: &SubjectPublicKeyInfo) -> Result<KeySize> {
    match spki.algorithm.algorithm.to_id_string().as_str() {
        OID_RSA_ENCRYPTION => match spki.parsed() {
            Ok(PublicKey::RSA(rsa)) => Ok(KeySize::Bits(modulus_bits(rsa.modulus))),
            Ok(_) => Ok(KeySize::Unknown),
            Err(e) => Err(CertListError::CertParsing(format!(
                "RSA public key parsing error: {e}"
            ))),
        },
        OID_EC_PUBLIC_KEY => {
            let curve = spki
                .algorithm
                .parameters
                .as_ref()
                .and_then(|params| Oid::try_from(params.clone()).ok())
                .map(|oid| oid.to_id_string());
            Ok(match curve.as_deref() {
                Some(OID_SECP224R1) => KeySize::Bits(224),
                Some(OID_SECP256R1) => KeySize::Bits(256),
                Some(OID_SECP384R1) => KeySize::Bits(384),
                Some(OID_SECP521R1) => KeySize::Bits(521),
                _ => KeySize::Unknown,
            })
        }
        _ => Ok(KeySize::Unknown),
    }
}

/// Bit length of a big-endian unsigned integer
fn modulus_bits(modulus: &[u8]) -> u32 {
    let significant = match modulus.iter().position(|&b| b != 0) {
        Some(start) => &modulus[start..],
        None => return 0,
    };
    (significant.len() as u32 - 1) * 8 + (8 - significant[0].leading_zeros())
}

fn signature_algorithm_name(oid: &Oid) -> String {
    let id = oid.to_id_string();
    SIGNATURE_ALGORITHMS
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, name)| name.to_string())
        .unwrap_or(id)
}

/// RFC 2253 rendering: last RDN first, `+` inside multi-valued RDNs
fn format_name(name: &X509Name) -> String {
    let rdns: Vec<_> = name.iter().collect();
    rdns.iter()
        .rev()
        .map(|rdn| {
            rdn.iter()
                .map(|attr| {
                    let id = attr.attr_type().to_id_string();
                    let key = NAME_ATTRIBUTES
                        .iter()
                        .find(|(known, _)| *known == id)
                        .map(|(_, short)| short.to_string())
                        .unwrap_or(id);
                    let value = match attr.as_str() {
                        Ok(text) => escape_value(text),
                        Err(_) => format!("#{}", hex::encode(attr.attr_value().as_bytes())),
                    };
                    format!("{key}={value}")
                })
                .collect::<Vec<_>>()
                .join("+")
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        let special = matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';')
            || (i == 0 && (c == '#' || c == ' '))
            || (i == last && c == ' ');
        if special {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
