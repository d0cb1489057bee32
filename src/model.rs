use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;

/// A scraped product record before the store has assigned it an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewObservation {
    pub name: String,
    pub price: Decimal,
    pub detail_url: String,
}

impl NewObservation {
    /// Composite identity used for within-run dedup.
    pub fn dedup_key(&self) -> String {
        format!("{}{}{}", self.name, self.price, self.detail_url)
    }
}

/// One stored row. `id` is the recency ordinal: higher means newer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub id: i64,
    pub name: String,
    pub price: Decimal,
    pub detail_url: String,
    pub observed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceChange {
    pub name: String,
    pub price_difference: Decimal,
    pub detail_url: String,
}

impl PriceChange {
    /// `Product: X, Price Difference: +2, Product URL: ...`
    pub fn render(&self) -> String {
        let diff = if self.price_difference.is_sign_positive() {
            format!("+{}", self.price_difference)
        } else {
            self.price_difference.to_string()
        };
        format!(
            "Product: {}, Price Difference: {}, Product URL: {}",
            self.name, diff, self.detail_url
        )
    }
}

/// Price changes sorted ascending by difference.
///
/// Equality is equality of the serialized form, order included. Two reports
/// holding numerically equal decimals with different scales compare unequal.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Report(pub Vec<PriceChange>);

impl Report {
    pub fn empty() -> Self {
        Report(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// One line per change, in report order.
    pub fn render(&self) -> String {
        self.0
            .iter()
            .map(PriceChange::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl PartialEq for Report {
    fn eq(&self, other: &Self) -> bool {
        self.to_json() == other.to_json()
    }
}

impl Eq for Report {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn change(name: &str, diff: &str) -> PriceChange {
        PriceChange {
            name: name.to_string(),
            price_difference: Decimal::from_str(diff).unwrap(),
            detail_url: format!("https://shop.test/{}", name),
        }
    }

    #[test]
    fn render_signs_positive_differences() {
        assert_eq!(
            change("A", "2").render(),
            "Product: A, Price Difference: +2, Product URL: https://shop.test/A"
        );
        assert_eq!(
            change("B", "-3.5").render(),
            "Product: B, Price Difference: -3.5, Product URL: https://shop.test/B"
        );
    }

    #[test]
    fn report_equality_is_order_sensitive() {
        let a = Report(vec![change("A", "-1"), change("B", "2")]);
        let b = Report(vec![change("B", "2"), change("A", "-1")]);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn report_equality_follows_serialized_form() {
        let a = Report(vec![change("A", "2")]);
        let b = Report(vec![change("A", "2.00")]);
        assert_ne!(a, b);
    }

    #[test]
    fn dedup_key_concatenates_fields() {
        let obs = NewObservation {
            name: "Whey".into(),
            price: Decimal::from_str("129900").unwrap(),
            detail_url: "https://shop.test/whey".into(),
        };
        assert_eq!(obs.dedup_key(), "Whey129900https://shop.test/whey");
    }
}
