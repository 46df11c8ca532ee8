use crate::api::{RefundFilter, RefundStats};
use crate::entities::{Priority, RefundRequest, RefundStatus};
use crate::error::Error;

/// Refund requests as the admin desk sees them. Loaded once; review
/// decisions are kept here and not written back.
#[derive(Debug, Default)]
pub struct RefundDesk {
    refunds: Option<Vec<RefundRequest>>,
}

impl RefundFilter {
    pub fn matches(&self, refund: &RefundRequest) -> bool {
        if let Some(status) = self.status {
            if refund.status != status {
                return false;
            }
        }

        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                [&refund.user_name, &refund.user_email, &refund.transaction_id]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&term))
            }
        }
    }
}

impl RefundDesk {
    pub fn is_loaded(&self) -> bool {
        self.refunds.is_some()
    }

    pub fn load(&mut self, refunds: Vec<RefundRequest>) {
        if self.refunds.is_none() {
            self.refunds = Some(refunds);
        }
    }

    fn all(&self) -> &[RefundRequest] {
        self.refunds.as_deref().unwrap_or_default()
    }

    pub fn filtered(&self, filter: &RefundFilter) -> Vec<RefundRequest> {
        self.all()
            .iter()
            .filter(|refund| filter.matches(refund))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> RefundStats {
        let refunds = self.all();
        let count = |status: RefundStatus| refunds.iter().filter(|r| r.status == status).count();

        RefundStats {
            pending: count(RefundStatus::Pending),
            approved: count(RefundStatus::Approved),
            total_refunded: refunds
                .iter()
                .filter(|r| matches!(r.status, RefundStatus::Approved | RefundStatus::Processed))
                .map(|r| r.requested_amount)
                .sum(),
            high_priority_pending: refunds
                .iter()
                .filter(|r| r.status == RefundStatus::Pending && r.priority == Priority::High)
                .count(),
        }
    }

    pub fn find_mut(&mut self, id: &str) -> Result<&mut RefundRequest, Error> {
        self.refunds
            .iter_mut()
            .flatten()
            .find(|refund| refund.id == id)
            .ok_or_else(|| Error::not_found_error(format!("Refund request {} not found", id)))
    }
}

#[cfg(test)]
fn desk() -> RefundDesk {
    use crate::entities::sample_refund;

    let mut pending = sample_refund("ref_001", RefundStatus::Pending);
    pending.priority = Priority::High;

    let mut approved = sample_refund("ref_002", RefundStatus::Approved);
    approved.requested_amount = 30.0;
    approved.user_name = "Fatima Khan".into();
    approved.user_email = "fatima@example.com".into();

    let mut processed = sample_refund("ref_003", RefundStatus::Processed);
    processed.requested_amount = 20.0;

    let rejected = sample_refund("ref_004", RefundStatus::Rejected);

    let mut desk = RefundDesk::default();
    desk.load(vec![pending, approved, processed, rejected]);
    desk
}

#[test]
fn stats_test() {
    let stats = desk().stats();

    assert_eq!(stats.pending, 1);
    assert_eq!(stats.approved, 1);
    assert_eq!(stats.total_refunded, 50.0);
    assert_eq!(stats.high_priority_pending, 1);
}

#[test]
fn filter_by_status_and_search() {
    let desk = desk();

    let all = desk.filtered(&RefundFilter::default());
    assert_eq!(all.len(), 4);

    let pending = desk.filtered(&RefundFilter {
        status: Some(RefundStatus::Pending),
        search: None,
    });
    assert_eq!(pending.len(), 1);

    let by_name = desk.filtered(&RefundFilter {
        status: None,
        search: Some("FATIMA".into()),
    });
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].id, "ref_002");

    let by_transaction = desk.filtered(&RefundFilter {
        status: None,
        search: Some("txn_ref_003".into()),
    });
    assert_eq!(by_transaction.len(), 1);

    let none = desk.filtered(&RefundFilter {
        status: Some(RefundStatus::Rejected),
        search: Some("fatima".into()),
    });
    assert!(none.is_empty());
}

#[test]
fn load_only_once() {
    let mut desk = desk();
    desk.load(vec![]);

    assert_eq!(desk.filtered(&RefundFilter::default()).len(), 4);
    assert!(desk.find_mut("missing").unwrap_err().is_not_found_error());
}
