//! Signed license records.
//!
//! A license file is a signed, line-oriented document. Each meaningful line
//! carries `<identifier> <expiry>` where expiry is seconds since the Unix
//! epoch. Anything else (armor headers, comments, blank lines, records for
//! other installs) is ignored, so a clearsigned file parses as-is.

use serde::Serialize;

/// One `{identifier, expiry}` line of a license file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseRecord {
    pub identifier: String,
    pub expires_at: i64,
}

impl LicenseRecord {
    /// Parses a single line. Trailing CR/LF is stripped; extra fields after
    /// the timestamp are tolerated.
    #[must_use]
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut fields = line.split_whitespace();
        let identifier = fields.next()?;
        let expires_at = fields.next()?.parse::<i64>().ok()?;

        Some(Self {
            identifier: identifier.to_string(),
            expires_at,
        })
    }
}

/// Parses every well-formed record in `text`.
#[must_use]
pub fn parse_records(text: &str) -> Vec<LicenseRecord> {
    text.lines().filter_map(LicenseRecord::parse_line).collect()
}

/// Latest expiry among records for `identifier`.
#[must_use]
pub fn max_expiry_for(records: &[LicenseRecord], identifier: &str) -> Option<i64> {
    records
        .iter()
        .filter(|r| r.identifier == identifier)
        .map(|r| r.expires_at)
        .max()
}
