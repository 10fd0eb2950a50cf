//! CSV export for the admin tables.
//!
//! RFC 4180 output: CRLF row endings; a field containing a comma, a double
//! quote, CR or LF is wrapped in quotes with embedded quotes doubled.

use ::csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::error::Result;

/// A record that can be written as one CSV row.
pub trait CsvRow {
    fn headers() -> &'static [&'static str];
    fn row(&self) -> Vec<String>;
}

/// Render a header line followed by one line per record.
pub fn to_csv<R: CsvRow>(records: &[R]) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::CRLF)
        .quote_style(QuoteStyle::Necessary)
        .from_writer(Vec::new());
    writer.write_record(R::headers())?;
    for record in records {
        writer.write_record(record.row())?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Conventional download name: `<kind>-YYYYMMDD.csv`.
pub fn export_filename(kind: &str, now: chrono::DateTime<chrono::Utc>) -> String {
    format!("{kind}-{}.csv", now.format("%Y%m%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row(&'static str, &'static str);

    impl CsvRow for Row {
        fn headers() -> &'static [&'static str] {
            &["email", "comment"]
        }

        fn row(&self) -> Vec<String> {
            vec![self.0.to_string(), self.1.to_string()]
        }
    }

    fn one(comment: &'static str) -> String {
        to_csv(&[Row("a@x.io", comment)]).unwrap()
    }

    #[test]
    fn plain_fields_are_unquoted() {
        assert_eq!(one("hello"), "email,comment\r\na@x.io,hello\r\n");
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        assert_eq!(
            one(r#"say "hi""#),
            "email,comment\r\na@x.io,\"say \"\"hi\"\"\"\r\n"
        );
    }

    #[test]
    fn commas_and_newlines_are_quoted() {
        assert!(one("a,b").ends_with(",\"a,b\"\r\n"));
        assert!(one("line1\nline2").ends_with(",\"line1\nline2\"\r\n"));
        assert!(one("cr\rhere").ends_with(",\"cr\rhere\"\r\n"));
    }

    #[test]
    fn to_csv_writes_header_and_rows() {
        let csv = to_csv(&[Row("a@x.io", "fine"), Row("b@x.io", "so-so, \"meh\"")]).unwrap();
        assert_eq!(
            csv,
            "email,comment\r\na@x.io,fine\r\nb@x.io,\"so-so, \"\"meh\"\"\"\r\n"
        );
    }

    #[test]
    fn empty_export_is_header_only() {
        assert_eq!(to_csv::<Row>(&[]).unwrap(), "email,comment\r\n");
    }

    #[test]
    fn filename_has_date() {
        let now = chrono::DateTime::parse_from_rfc3339("2026-03-09T10:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        assert_eq!(export_filename("promo-signups", now), "promo-signups-20260309.csv");
    }
}
