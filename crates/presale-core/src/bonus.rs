use crate::BonusTier;

/// Ordered purchase bands with bonus percentages.
///
/// Lookups use the whole-number part of the gross settlement amount. A
/// band containing the amount wins; otherwise the highest band starting at
/// or below the amount is treated as open-ended; below every band the bonus
/// is zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BonusTierTable {
    tiers: Vec<BonusTier>,
}

impl BonusTierTable {
    pub fn new(mut tiers: Vec<BonusTier>) -> Self {
        tiers.sort_by(|a, b| {
            a.lower
                .cmp(&b.lower)
                .then_with(|| a.purchase_band.cmp(&b.purchase_band))
        });
        Self { tiers }
    }

    /// Bonus percentage for a gross settlement amount.
    pub fn resolve(&self, gross: f64) -> f64 {
        self.tier_for(gross)
            .map_or(0.0, |tier| tier.bonus_percent)
    }

    pub fn tier_for(&self, gross: f64) -> Option<&BonusTier> {
        let whole = whole_units(gross);
        self.tiers
            .iter()
            .find(|tier| tier.contains(whole))
            .or_else(|| self.tiers.iter().rev().find(|tier| tier.lower <= whole))
    }
}

fn whole_units(amount: f64) -> u64 {
    // Saturating cast; NaN and negatives become 0.
    amount.trunc() as u64
}
