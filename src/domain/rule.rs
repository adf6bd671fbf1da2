//! Order rules: `code=price=shippingFlag` entries from the link-order setting

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;

use super::error::LinkOrderError;

/// Separator between rule entries
pub const ENTRY_SEPARATOR: char = ';';
/// Separator between the fields of one entry
pub const FIELD_SEPARATOR: char = '=';

/// One configured order-by-link rule.
///
/// The price is kept as configured; it is validated when the line item is built
/// so that a matched rule with a bad price still reports `InvalidPrice`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRule {
    pub code: String,
    pub price: String,
    pub shipping_flag: bool,
}

impl OrderRule {
    /// Parse a single trimmed entry. Returns `None` for entries without a code.
    pub fn parse(entry: &str) -> Option<Self> {
        let mut fields = entry.trim().split(FIELD_SEPARATOR);
        let code = fields.next().unwrap_or_default().trim();
        if code.is_empty() {
            return None;
        }

        let price = fields.next().unwrap_or_default().trim().to_string();
        let shipping_flag = fields.next().map(parse_shipping_flag).unwrap_or(false);

        Some(Self {
            code: code.to_string(),
            price,
            shipping_flag,
        })
    }

    pub fn matches(&self, code: &str) -> bool {
        self.code == code
    }
}

/// Parse the whole setting into rules, keeping configuration order.
pub fn parse_rules(raw: &str) -> Vec<OrderRule> {
    raw.split(ENTRY_SEPARATOR)
        .filter_map(OrderRule::parse)
        .collect()
}

/// First rule whose code equals `code` exactly.
pub fn find_rule<'a>(rules: &'a [OrderRule], code: &str) -> Option<&'a OrderRule> {
    if code.is_empty() {
        return None;
    }
    rules.iter().find(|rule| rule.matches(code))
}

/// Parse a configured price. Accepts `.` or `,` as decimal separator and
/// requires a strictly positive result.
pub fn parse_price(raw: &str) -> Result<Decimal, LinkOrderError> {
    let normalized = raw.trim().replace(',', ".");
    let price =
        Decimal::from_str(&normalized).map_err(|_| LinkOrderError::invalid_price(raw))?;
    if price <= Decimal::ZERO {
        return Err(LinkOrderError::invalid_price(raw));
    }
    Ok(price)
}

/// `true`, `1`, `yes`, `on` (any case) enable the shipping fee.
pub fn parse_shipping_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Validated input for one cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineRequest {
    pub product_code: String,
    pub unit_price: Decimal,
    pub add_shipping_fee: bool,
}

impl CartLineRequest {
    pub fn new(
        product_code: impl Into<String>,
        raw_price: &str,
        add_shipping_fee: bool,
    ) -> Result<Self, LinkOrderError> {
        Ok(Self {
            product_code: product_code.into(),
            unit_price: parse_price(raw_price)?,
            add_shipping_fee,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn parses_rules_in_order() {
        let rules = parse_rules("ABC=19.99=true;XYZ=5,00=false");
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].code, "ABC");
        assert_eq!(rules[0].price, "19.99");
        assert!(rules[0].shipping_flag);
        assert_eq!(rules[1].code, "XYZ");
        assert_eq!(rules[1].price, "5,00");
        assert!(!rules[1].shipping_flag);
    }

    #[test]
    fn trims_entries_and_skips_empty_codes() {
        let rules = parse_rules("  ABC=1=1 ;; =2=true;\n XYZ=3 ;");
        let codes: Vec<_> = rules.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["ABC", "XYZ"]);
        assert_eq!(rules[1].price, "3");
        assert!(!rules[1].shipping_flag);
    }

    #[test]
    fn missing_price_is_kept_empty() {
        let rules = parse_rules("ONLY");
        assert_eq!(rules[0].price, "");
        assert!(parse_price(&rules[0].price).is_err());
    }

    #[test]
    fn first_match_wins() {
        let rules = parse_rules("ABC=1=true;ABC=2=false");
        let rule = find_rule(&rules, "ABC").unwrap();
        assert_eq!(rule.price, "1");
    }

    #[test]
    fn match_is_exact_and_case_sensitive() {
        let rules = parse_rules("ABC=1=true");
        assert!(find_rule(&rules, "abc").is_none());
        assert!(find_rule(&rules, "AB").is_none());
        assert!(find_rule(&rules, "").is_none());
    }

    #[test]
    fn parses_prices_with_either_separator() {
        assert_eq!(parse_price("5,00").unwrap(), Decimal::new(500, 2));
        assert_eq!(parse_price("19.99").unwrap(), Decimal::new(1999, 2));
        assert_eq!(parse_price(" 7 ").unwrap(), Decimal::new(7, 0));
    }

    #[test]
    fn rejects_non_positive_and_garbage_prices() {
        for raw in ["0", "0,00", "-1", "-5.50", "", "abc", "1.2.3"] {
            let err = parse_price(raw).unwrap_err();
            assert_eq!(err.kind(), "invalid_price", "price {raw:?}");
        }
    }

    #[test]
    fn shipping_flag_coercion() {
        assert!(parse_shipping_flag("true"));
        assert!(parse_shipping_flag("TRUE"));
        assert!(parse_shipping_flag("1"));
        assert!(parse_shipping_flag(" yes "));
        assert!(!parse_shipping_flag("false"));
        assert!(!parse_shipping_flag("0"));
        assert!(!parse_shipping_flag(""));
    }

    #[test]
    fn cart_line_request_validates_price() {
        let line = CartLineRequest::new("XYZ", "5,00", false).unwrap();
        assert_eq!(line.unit_price, Decimal::new(500, 2));
        assert!(!line.add_shipping_fee);

        assert!(CartLineRequest::new("XYZ", "0", true).is_err());
    }
}
