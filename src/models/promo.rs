use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::PromoKind;

/// A promotional discount rule. Static reference data: looked up,
/// never mutated by a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoCode {
    pub code: String,
    pub kind: PromoKind,
    /// Percentage points for `Percentage`, currency amount for `FlatAmount`.
    pub value: f64,
    pub min_price: Option<f64>,
    pub expires_at: Option<DateTime<Utc>>,
}
