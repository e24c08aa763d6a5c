use rand::Rng;

/// Weighted random draw where the element at index `i` has weight
/// `factor^i`. A factor above one favours later entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedSelector {
    factor: f64,
}

impl WeightedSelector {
    /// Zero, negative and non-finite factors degrade to a uniform draw.
    pub fn new(factor: f64) -> Self {
        let factor = if factor.is_finite() && factor > 0.0 {
            factor
        } else {
            1.0
        };
        Self { factor }
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn pick<'a, T, R: Rng + ?Sized>(&self, items: &'a [T], rng: &mut R) -> Option<&'a T> {
        if items.len() <= 1 {
            return items.first();
        }
        let total = self.total_weight(items.len());
        if !total.is_finite() {
            return items.last();
        }
        let roll = rng.gen::<f64>() * total;
        self.pick_with_roll(items, roll)
    }

    /// Deterministic half of [`pick`](Self::pick): walk the cumulative
    /// weights and return the first element with `roll < cumulative`.
    pub fn pick_with_roll<'a, T>(&self, items: &'a [T], roll: f64) -> Option<&'a T> {
        let mut cumulative = 0.0;
        let mut weight = 1.0;
        for item in items {
            cumulative += weight;
            if roll < cumulative {
                return Some(item);
            }
            weight *= self.factor;
        }
        items.last()
    }

    fn total_weight(&self, count: usize) -> f64 {
        let mut total = 0.0;
        let mut weight = 1.0;
        for _ in 0..count {
            total += weight;
            weight *= self.factor;
        }
        total
    }
}
