//! Discount code selection for invoices.
//!
//! Bulk tiers by quantity:
//!
//! | Quantity | Code              |
//! |----------|-------------------|
//! | ≤ 4      | none              |
//! | 5-10     | tier 1            |
//! | 11-15    | tier 2            |
//! | > 15     | tier 3            |
//!
//! Independent customers get the independent code appended after any bulk
//! code. The codes are coupon IDs provisioned on the provider side.

use serde::{Deserialize, Serialize};

use crate::utils::get_env_with_prefix;

/// Bulk discount tier for an order quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkTier {
    Tier1,
    Tier2,
    Tier3,
}

impl BulkTier {
    /// The tier for `quantity`, if any.
    #[must_use]
    pub fn for_quantity(quantity: i64) -> Option<Self> {
        match quantity {
            i64::MIN..=4 => None,
            5..=10 => Some(Self::Tier1),
            11..=15 => Some(Self::Tier2),
            _ => Some(Self::Tier3),
        }
    }
}

/// Coupon IDs applied by the discount policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscountCodes {
    pub tier_1: String,
    pub tier_2: String,
    pub tier_3: String,
    pub independent: String,
}

impl Default for DiscountCodes {
    fn default() -> Self {
        Self {
            tier_1: "bulk_tier_1".to_string(),
            tier_2: "bulk_tier_2".to_string(),
            tier_3: "bulk_tier_3".to_string(),
            independent: "independent_artist".to_string(),
        }
    }
}

impl DiscountCodes {
    /// Override codes from `DISCOUNT_TIER_1..3` and `DISCOUNT_INDEPENDENT`.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if let Some(code) = get_env_with_prefix("DISCOUNT_TIER_1") {
            self.tier_1 = code;
        }
        if let Some(code) = get_env_with_prefix("DISCOUNT_TIER_2") {
            self.tier_2 = code;
        }
        if let Some(code) = get_env_with_prefix("DISCOUNT_TIER_3") {
            self.tier_3 = code;
        }
        if let Some(code) = get_env_with_prefix("DISCOUNT_INDEPENDENT") {
            self.independent = code;
        }
        self
    }

    fn bulk(&self, tier: BulkTier) -> &str {
        match tier {
            BulkTier::Tier1 => &self.tier_1,
            BulkTier::Tier2 => &self.tier_2,
            BulkTier::Tier3 => &self.tier_3,
        }
    }
}

/// Maps an order to the discount codes it qualifies for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscountPolicy {
    codes: DiscountCodes,
}

impl DiscountPolicy {
    pub fn new(codes: DiscountCodes) -> Self {
        Self { codes }
    }

    pub fn codes(&self) -> &DiscountCodes {
        &self.codes
    }

    /// Codes for `quantity`, bulk code first, at most one of each kind.
    #[must_use]
    pub fn discounts_for(&self, quantity: i64, independent: bool) -> Vec<String> {
        let mut codes = Vec::with_capacity(2);
        if let Some(tier) = BulkTier::for_quantity(quantity) {
            codes.push(self.codes.bulk(tier).to_string());
        }
        if independent {
            codes.push(self.codes.independent.clone());
        }
        codes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> DiscountPolicy {
        DiscountPolicy::default()
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(BulkTier::for_quantity(i64::MIN), None);
        assert_eq!(BulkTier::for_quantity(0), None);
        assert_eq!(BulkTier::for_quantity(4), None);
        assert_eq!(BulkTier::for_quantity(5), Some(BulkTier::Tier1));
        assert_eq!(BulkTier::for_quantity(10), Some(BulkTier::Tier1));
        assert_eq!(BulkTier::for_quantity(11), Some(BulkTier::Tier2));
        assert_eq!(BulkTier::for_quantity(15), Some(BulkTier::Tier2));
        assert_eq!(BulkTier::for_quantity(16), Some(BulkTier::Tier3));
        assert_eq!(BulkTier::for_quantity(i64::MAX), Some(BulkTier::Tier3));
    }

    #[test]
    fn test_small_order_independent_only() {
        assert_eq!(policy().discounts_for(3, true), vec!["independent_artist"]);
    }

    #[test]
    fn test_tier_one_order() {
        assert_eq!(policy().discounts_for(7, false), vec!["bulk_tier_1"]);
        assert_eq!(policy().discounts_for(5, false), vec!["bulk_tier_1"]);
    }

    #[test]
    fn test_tier_two_with_independent() {
        assert_eq!(
            policy().discounts_for(12, true),
            vec!["bulk_tier_2", "independent_artist"]
        );
    }

    #[test]
    fn test_tier_three_order() {
        assert_eq!(policy().discounts_for(20, false), vec!["bulk_tier_3"]);
    }

    #[test]
    fn test_no_discounts() {
        assert!(policy().discounts_for(1, false).is_empty());
        assert!(policy().discounts_for(-3, false).is_empty());
    }

    #[test]
    fn test_custom_codes() {
        let policy = DiscountPolicy::new(DiscountCodes {
            tier_2: "VOLUME10".to_string(),
            ..Default::default()
        });
        assert_eq!(policy.discounts_for(14, false), vec!["VOLUME10"]);
    }

    #[test]
    fn test_codes_from_env() {
        unsafe {
            std::env::set_var("BILLDESK_DISCOUNT_TIER_3", "MEGA");
        }
        let codes = DiscountCodes::default().from_env();
        assert_eq!(codes.tier_3, "MEGA");
        assert_eq!(codes.tier_1, "bulk_tier_1");
        unsafe {
            std::env::remove_var("BILLDESK_DISCOUNT_TIER_3");
        }
    }
}
