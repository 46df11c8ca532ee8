use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Credits charged for the first bid a garage places on a request.
pub const BID_COST: f64 = 2.0;

pub const MIN_TOP_UP: f64 = 10.0;
pub const MAX_TOP_UP: f64 = 10_000.0;

pub const DEFAULT_CURRENCY: &str = "AED";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Wallet {
    pub balance: f64,
    pub currency: String,
    pub total_earned: Option<f64>,
    pub total_spent: Option<f64>,
}

impl Default for Wallet {
    fn default() -> Self {
        Self {
            balance: 0.0,
            currency: DEFAULT_CURRENCY.into(),
            total_earned: None,
            total_spent: None,
        }
    }
}

impl Wallet {
    pub fn can_afford_bid(&self) -> bool {
        self.balance >= BID_COST
    }

    /// Local mirror of the server-side bid debit.
    pub fn charge_bid(&mut self) -> Result<f64, Error> {
        if !self.can_afford_bid() {
            return Err(Error::top_up_required_error());
        }

        self.balance -= BID_COST;
        self.total_spent = Some(self.total_spent.unwrap_or(0.0) + BID_COST);

        Ok(BID_COST)
    }

    pub fn refund_charge(&mut self, amount: f64) {
        self.balance += amount;
        self.total_spent = self.total_spent.map(|spent| (spent - amount).max(0.0));
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Credit,
    Debit,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Completed,
    Pending,
    Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub amount: f64,
    pub kind: TransactionKind,
    pub source: String,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Rejects top-up amounts outside the accepted AED range before anything
/// leaves the process.
pub fn validate_top_up(amount: f64) -> Result<(), Error> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::out_of_range_error("Please enter a valid amount"));
    }

    if amount < MIN_TOP_UP {
        return Err(Error::out_of_range_error("Minimum top-up amount is AED 10"));
    }

    if amount > MAX_TOP_UP {
        return Err(Error::out_of_range_error(
            "Maximum top-up amount is AED 10,000",
        ));
    }

    Ok(())
}

#[test]
fn charge_bid_test() {
    let mut wallet = Wallet {
        balance: 5.0,
        ..Default::default()
    };

    assert_eq!(wallet.charge_bid().unwrap(), 2.0);
    assert_eq!(wallet.balance, 3.0);
    assert_eq!(wallet.total_spent, Some(2.0));

    wallet.refund_charge(2.0);
    assert_eq!(wallet.balance, 5.0);
    assert_eq!(wallet.total_spent, Some(0.0));
}

#[test]
fn charge_bid_insufficient_test() {
    let mut wallet = Wallet {
        balance: 1.5,
        ..Default::default()
    };

    assert!(wallet.charge_bid().unwrap_err().is_top_up_required_error());
    assert_eq!(wallet.balance, 1.5);
}

#[test]
fn validate_top_up_bounds() {
    assert!(validate_top_up(10.0).is_ok());
    assert!(validate_top_up(10_000.0).is_ok());
    assert!(validate_top_up(250.0).is_ok());

    for amount in [9.99, 10_000.01, 0.0, -50.0, f64::NAN, f64::INFINITY] {
        assert!(validate_top_up(amount).unwrap_err().is_out_of_range_error());
    }
}
