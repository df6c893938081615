use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::services::pricing::round_half_up;

/// A promo is either a percentage off or a fixed amount off, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Discount {
    #[serde(rename = "discountPercent", alias = "percent")]
    Percent(u32),
    #[serde(rename = "discountFixed", alias = "fixed")]
    Fixed(i64),
}

impl Discount {
    /// Amount taken off `fare`; never more than the fare itself.
    pub fn amount_off(&self, fare: i64) -> i64 {
        match *self {
            Discount::Percent(percent) => {
                round_half_up(fare as f64 * f64::from(percent) / 100.0).min(fare)
            }
            Discount::Fixed(amount) => amount.min(fare),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, Discount>",
    into = "BTreeMap<String, Discount>"
)]
pub struct PromoCatalog {
    codes: BTreeMap<String, Discount>,
}

impl From<BTreeMap<String, Discount>> for PromoCatalog {
    fn from(codes: BTreeMap<String, Discount>) -> Self {
        Self::new(codes)
    }
}

impl From<PromoCatalog> for BTreeMap<String, Discount> {
    fn from(catalog: PromoCatalog) -> Self {
        catalog.codes
    }
}

impl Default for PromoCatalog {
    fn default() -> Self {
        Self::new([
            ("WELCOME10", Discount::Percent(10)),
            ("SAVE20", Discount::Percent(20)),
            ("FLAT50", Discount::Fixed(50)),
            ("RIDE100", Discount::Fixed(100)),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoResult {
    pub valid: bool,
    #[serde(flatten)]
    pub discount: Option<Discount>,
    pub message: String,
}

impl PromoResult {
    fn invalid(message: &str) -> Self {
        Self {
            valid: false,
            discount: None,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Discounted {
    pub final_fare: i64,
    pub discount: i64,
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

impl PromoCatalog {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = (S, Discount)>,
        S: AsRef<str>,
    {
        Self {
            codes: codes
                .into_iter()
                .map(|(code, discount)| (normalize_code(code.as_ref()), discount))
                .collect(),
        }
    }

    pub fn validate_promo_code(&self, code: &str) -> PromoResult {
        let normalized = normalize_code(code);
        if normalized.is_empty() {
            return PromoResult::invalid("Enter a promo code");
        }
        let Some(discount) = self.codes.get(&normalized).copied() else {
            return PromoResult::invalid("Invalid promo code");
        };
        let message = match discount {
            Discount::Percent(percent) => format!("{percent}% off applied"),
            Discount::Fixed(amount) => format!("₹{amount} off applied"),
        };
        PromoResult {
            valid: true,
            discount: Some(discount),
            message,
        }
    }
}

pub fn apply_discount(fare: i64, promo: &PromoResult) -> Discounted {
    let discount = match (promo.valid, promo.discount) {
        (true, Some(discount)) => discount.amount_off(fare),
        _ => 0,
    };
    Discounted {
        final_fare: (fare - discount).max(0),
        discount,
    }
}
