//! Status enums for orders, payments and reviews.
//!
//! Fulfillment and payment are two independent axes. Nothing here derives one
//! from the other: an order can be `completed` while its payment is still
//! `awaiting_verification` if an admin moves it there.

use serde::{Deserialize, Serialize};

/// Order fulfillment status.
///
/// ```text
/// pending_payment -> paid -> processing -> shipped -> completed
///        \            \
///         +-----------+--> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "fulfillment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    #[default]
    PendingPayment,
    Paid,
    Processing,
    Shipped,
    Completed,
    Cancelled,
}

impl FulfillmentStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::PendingPayment,
        Self::Paid,
        Self::Processing,
        Self::Shipped,
        Self::Completed,
        Self::Cancelled,
    ];

    /// Whether no transition may leave this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether an admin may move an order from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::PendingPayment, Self::Paid | Self::Cancelled)
                | (Self::Paid, Self::Processing | Self::Cancelled)
                | (Self::Processing, Self::Shipped)
                | (Self::Shipped, Self::Completed)
        )
    }

    /// Statuses reachable from `self` in one step.
    #[must_use]
    pub fn next_states(self) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|next| self.can_transition_to(*next))
            .collect()
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Paid => "paid",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FulfillmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid fulfillment status: {s}"))
    }
}

/// Payment verification status.
///
/// Payments are verified by an admin (e.g. checking a transfer receipt).
/// `failed` can go back to `awaiting_verification` when the customer submits
/// a new proof of payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    AwaitingVerification,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub const ALL: [Self; 4] = [
        Self::Unpaid,
        Self::AwaitingVerification,
        Self::Paid,
        Self::Failed,
    ];

    /// Whether an admin may move a payment from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Unpaid, Self::AwaitingVerification | Self::Paid | Self::Failed)
                | (Self::AwaitingVerification, Self::Paid | Self::Failed)
                | (Self::Failed, Self::AwaitingVerification)
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::AwaitingVerification => "awaiting_verification",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid payment status: {s}"))
    }
}

/// How the customer intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Manual bank transfer, verified from an uploaded receipt.
    BankTransfer,
    /// E-wallet payment (QR code).
    EWallet,
    /// Cash collected by the courier.
    CashOnDelivery,
}

/// Moderation state of a product review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "review_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}
