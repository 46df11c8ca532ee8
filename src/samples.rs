//! Requests shown in the browse view when the marketplace has none yet.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::entities::{BidRequest, Budget, RequestStatus, Urgency, Vehicle};

const SAMPLE_OWNER: Uuid = Uuid::from_u128(0x5a3b_1e00_0000_4000_8000_0000_0000_0000);

fn posted(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

pub fn requests() -> Vec<BidRequest> {
    vec![
        BidRequest {
            id: Uuid::from_u128(0x5a3b_1e00_0000_4000_8000_0000_0000_0001),
            display_id: Some("REQ-2024-001".into()),
            owner_id: SAMPLE_OWNER,
            title: "Engine Oil Leak Repair".into(),
            description: "Car has an oil leak near the engine bay. Need professional diagnosis and repair. Vehicle has 45,000km mileage.".into(),
            category: "Engine".into(),
            urgency: Urgency::Medium,
            budget: Some(Budget {
                min: 500.0,
                max: 1200.0,
            }),
            location: Some("Dubai Marina Area".into()),
            vehicle: Some(Vehicle {
                make: "BYD".into(),
                model: "Han".into(),
                year: "2018".into(),
            }),
            images: vec![
                "https://images.unsplash.com/photo-1563013544-824ae1b704d3?w=300&h=200&fit=crop".into(),
                "https://images.unsplash.com/photo-1609630875171-b1321377ee65?w=300&h=200&fit=crop".into(),
            ],
            status: RequestStatus::Open,
            reply_count: 7,
            accepted_reply_id: None,
            created_at: posted(2024, 1, 15),
        },
        BidRequest {
            id: Uuid::from_u128(0x5a3b_1e00_0000_4000_8000_0000_0000_0002),
            display_id: Some("REQ-2024-002".into()),
            owner_id: SAMPLE_OWNER,
            title: "Air Conditioning Service".into(),
            description: "Air conditioning not cooling properly. Need AC system check and refrigerant refill if needed.".into(),
            category: "AC/Cooling".into(),
            urgency: Urgency::High,
            budget: Some(Budget {
                min: 200.0,
                max: 600.0,
            }),
            location: Some("Business Bay Area".into()),
            vehicle: Some(Vehicle {
                make: "NIO".into(),
                model: "ES8".into(),
                year: "2020".into(),
            }),
            images: vec![
                "https://images.unsplash.com/photo-1549317661-bd32c8ce0db2?w=300&h=200&fit=crop".into(),
            ],
            status: RequestStatus::Open,
            reply_count: 12,
            accepted_reply_id: None,
            created_at: posted(2024, 1, 14),
        },
    ]
}

/// Sample rows are display-only and never reach the backend.
pub fn is_sample(id: Uuid) -> bool {
    requests().iter().any(|request| request.id == id)
}

#[test]
fn samples_are_open_and_newest_first() {
    let samples = requests();

    assert_eq!(samples.len(), 2);
    assert!(samples.iter().all(BidRequest::is_open));
    assert!(samples[0].created_at > samples[1].created_at);
    assert_eq!(samples[0].display_id.as_deref(), Some("REQ-2024-001"));
    assert!(is_sample(samples[1].id));
    assert!(!is_sample(Uuid::new_v4()));
}
