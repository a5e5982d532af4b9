//! Promo engine — pure, deterministic discount evaluation.
//!
//! Rules run in order, first match wins: unknown code, expired code,
//! minimum order not met, then the kind-specific discount. The clock is a
//! parameter so the same inputs always produce the same quote.

use chrono::{DateTime, TimeZone, Utc};

use crate::models::{PromoCode, PromoKind};

/// Result of evaluating a promo code against a base price.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Quote {
    pub discount: f64,
    pub total: f64,
    pub message: String,
}

/// Static registry of promo codes, looked up case-insensitively.
pub struct PromoRegistry {
    codes: Vec<PromoCode>,
}

impl PromoRegistry {
    pub fn new(codes: Vec<PromoCode>) -> Self {
        Self { codes }
    }

    pub fn with_seed_data() -> Self {
        Self::new(seed_codes())
    }

    pub fn get(&self, code: &str) -> Option<&PromoCode> {
        let code = code.trim();
        self.codes.iter().find(|p| p.code.eq_ignore_ascii_case(code))
    }

    /// Evaluate `code` against `base_price` at `now`.
    pub fn apply(&self, code: &str, base_price: f64, now: DateTime<Utc>) -> Quote {
        let Some(promo) = self.get(code) else {
            return Quote::rejected(base_price, "Invalid code");
        };

        if let Some(expires_at) = promo.expires_at {
            if now > expires_at {
                return Quote::rejected(base_price, "Code expired");
            }
        }

        if let Some(min_price) = promo.min_price {
            if base_price < min_price {
                return Quote::rejected(base_price, "Minimum order not met");
            }
        }

        let discount = match promo.kind {
            PromoKind::Percentage => round2(base_price * promo.value / 100.0),
            PromoKind::FlatAmount => promo.value.min(base_price),
        };
        let total = round2((base_price - discount).max(0.0));

        Quote {
            discount,
            total,
            message: format!("Code {} applied", promo.code),
        }
    }
}

impl Quote {
    fn rejected(base_price: f64, message: &str) -> Self {
        Self {
            discount: 0.0,
            total: round2(base_price.max(0.0)),
            message: message.into(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn seed_codes() -> Vec<PromoCode> {
    vec![
        PromoCode {
            code: "NEWUSER10".into(),
            kind: PromoKind::Percentage,
            value: 10.0,
            min_price: None,
            expires_at: None,
        },
        PromoCode {
            code: "CARE15".into(),
            kind: PromoKind::Percentage,
            value: 15.0,
            min_price: Some(75.0),
            expires_at: None,
        },
        PromoCode {
            code: "FLAT20".into(),
            kind: PromoKind::FlatAmount,
            value: 20.0,
            min_price: Some(60.0),
            expires_at: None,
        },
        PromoCode {
            code: "MONSOON25".into(),
            kind: PromoKind::Percentage,
            value: 25.0,
            min_price: None,
            expires_at: Some(Utc.with_ymd_and_hms(2025, 9, 30, 23, 59, 59).unwrap()),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn ten_percent_off_fifty() {
        let registry = PromoRegistry::with_seed_data();
        let quote = registry.apply("NEWUSER10", 50.0, now());
        assert_eq!(quote.discount, 5.0);
        assert_eq!(quote.total, 45.0);
    }

    #[test]
    fn unknown_code_rejected_without_discount() {
        let registry = PromoRegistry::with_seed_data();
        let quote = registry.apply("NOPE", 50.0, now());
        assert_eq!(quote.discount, 0.0);
        assert_eq!(quote.total, 50.0);
        assert_eq!(quote.message, "Invalid code");
    }

    #[test]
    fn expired_code_rejected() {
        let registry = PromoRegistry::with_seed_data();
        let quote = registry.apply("MONSOON25", 100.0, now());
        assert_eq!(quote.discount, 0.0);
        assert_eq!(quote.message, "Code expired");
    }

    #[test]
    fn minimum_order_enforced() {
        let registry = PromoRegistry::with_seed_data();
        let quote = registry.apply("CARE15", 50.0, now());
        assert_eq!(quote.discount, 0.0);
        assert_eq!(quote.message, "Minimum order not met");
    }

    #[test]
    fn flat_discount_capped_at_base_price() {
        let registry = PromoRegistry::new(vec![PromoCode {
            code: "BIG".into(),
            kind: PromoKind::FlatAmount,
            value: 500.0,
            min_price: None,
            expires_at: None,
        }]);
        let quote = registry.apply("BIG", 80.0, now());
        assert_eq!(quote.discount, 80.0);
        assert_eq!(quote.total, 0.0);
    }

    #[test]
    fn percentage_rounds_to_two_decimals() {
        let registry = PromoRegistry::new(vec![PromoCode {
            code: "THIRD".into(),
            kind: PromoKind::Percentage,
            value: 33.0,
            min_price: None,
            expires_at: None,
        }]);
        let quote = registry.apply("THIRD", 9.99, now());
        assert_eq!(quote.discount, 3.3);
        assert_eq!(quote.total, 6.69);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = PromoRegistry::with_seed_data();
        let quote = registry.apply("newuser10", 50.0, now());
        assert_eq!(quote.discount, 5.0);
    }

    #[test]
    fn apply_is_deterministic() {
        let registry = PromoRegistry::with_seed_data();
        let a = registry.apply("NEWUSER10", 42.42, now());
        let b = registry.apply("NEWUSER10", 42.42, now());
        assert_eq!(a, b);
    }

    #[test]
    fn discount_never_exceeds_base_price() {
        let registry = PromoRegistry::with_seed_data();
        for price in [0.0, 1.0, 49.99, 50.0, 1000.0] {
            for code in ["NEWUSER10", "CARE15", "FLAT20", "MONSOON25", "NOPE"] {
                let quote = registry.apply(code, price, now());
                assert!(quote.discount >= 0.0);
                assert!(quote.discount <= price + f64::EPSILON);
                assert!((quote.total - round2(price - quote.discount)).abs() < 1e-9);
            }
        }
    }
}
