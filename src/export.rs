use chrono::{DateTime, Utc};

use crate::api::CsvExport;
use crate::entities::RefundRequest;

pub const REFUND_HEADERS: [&str; 10] = [
    "Refund ID",
    "Transaction ID",
    "User",
    "Email",
    "Original Amount",
    "Requested Amount",
    "Status",
    "Priority",
    "Reason",
    "Created At",
];

fn quoted(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        quoted(field)
    } else {
        field.to_string()
    }
}

fn refund_row(refund: &RefundRequest) -> String {
    [
        escape(&refund.id),
        escape(&refund.transaction_id),
        quoted(&refund.user_name),
        escape(&refund.user_email),
        escape(&format!("{} {}", refund.original_amount, refund.currency)),
        escape(&format!("{} {}", refund.requested_amount, refund.currency)),
        refund.status.name().to_string(),
        refund.priority.name().to_string(),
        escape(&refund.reason),
        refund.created_at.format("%Y-%m-%d").to_string(),
    ]
    .join(",")
}

/// Renders refunds in the admin export layout. The user name column is
/// always quoted; other fields only when they need it.
pub fn refunds_csv(refunds: &[RefundRequest], at: DateTime<Utc>) -> CsvExport {
    let mut lines = Vec::with_capacity(refunds.len() + 1);
    lines.push(REFUND_HEADERS.join(","));
    lines.extend(refunds.iter().map(refund_row));

    CsvExport {
        filename: format!("refunds-{}.csv", at.format("%Y-%m-%d")),
        content: lines.join("\n"),
    }
}

#[test]
fn refunds_csv_layout() {
    use crate::entities::{sample_refund, RefundStatus};
    use chrono::TimeZone;

    let at = Utc.with_ymd_and_hms(2024, 2, 3, 18, 30, 0).unwrap();
    let mut refund = sample_refund("ref_001", RefundStatus::Pending);
    refund.created_at = Utc.with_ymd_and_hms(2024, 1, 15, 23, 59, 0).unwrap();
    refund.requested_amount = 25.5;

    let export = refunds_csv(&[refund], at);
    let lines: Vec<&str> = export.content.lines().collect();

    assert_eq!(export.filename, "refunds-2024-02-03.csv");
    assert_eq!(
        lines[0],
        "Refund ID,Transaction ID,User,Email,Original Amount,Requested Amount,Status,Priority,Reason,Created At"
    );
    assert_eq!(
        lines[1],
        "ref_001,txn_ref_001,\"Ahmad Al-Rashid\",ahmad@example.com,50 AED,25.5 AED,pending,medium,listing_not_approved,2024-01-15"
    );
}

#[test]
fn refunds_csv_escapes_awkward_fields() {
    use crate::entities::{sample_refund, RefundStatus};

    let mut refund = sample_refund("ref_002", RefundStatus::Approved);
    refund.user_name = "Omar \"The Mechanic\" Saeed".into();
    refund.reason = "duplicate, charged twice".into();

    let export = refunds_csv(&[refund], Utc::now());
    let row = export.content.lines().nth(1).unwrap();

    assert!(row.contains("\"Omar \"\"The Mechanic\"\" Saeed\""));
    assert!(row.contains(",\"duplicate, charged twice\","));
    assert!(row.contains(",approved,"));
}

#[test]
fn refunds_csv_empty_has_header_only() {
    let export = refunds_csv(&[], Utc::now());
    assert_eq!(export.content.lines().count(), 1);
}

/// Reads records back the way spreadsheet tools do: quoted fields may hold
/// separators, doubled quotes and line breaks.
#[cfg(test)]
fn read_records(content: &str) -> Vec<Vec<String>> {
    let mut records = vec![];
    let mut record = vec![];
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        match (quoted, c) {
            (true, '"') if chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            (true, '"') => quoted = false,
            (true, c) => field.push(c),
            (false, '"') => quoted = true,
            (false, ',') => record.push(std::mem::take(&mut field)),
            (false, '\n') => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            (false, c) => field.push(c),
        }
    }
    record.push(field);
    records.push(record);

    records
}

#[test]
fn refunds_csv_reads_back() {
    use crate::entities::{sample_refund, RefundStatus};

    let mut refund = sample_refund("ref_003", RefundStatus::Rejected);
    refund.user_name = "Omar \"The Mechanic\" Saeed".into();
    refund.reason = "charged twice,\nsee ticket \"42\"".into();

    let export = refunds_csv(&[refund.clone(), refund], Utc::now());
    let records = read_records(&export.content);

    assert_eq!(records.len(), 3);
    assert_eq!(records[0], REFUND_HEADERS.map(String::from).to_vec());
    for record in &records[1..] {
        assert_eq!(record.len(), REFUND_HEADERS.len());
        assert_eq!(record[0], "ref_003");
        assert_eq!(record[2], "Omar \"The Mechanic\" Saeed");
        assert_eq!(record[6], "rejected");
        assert_eq!(record[8], "charged twice,\nsee ticket \"42\"");
    }
}
