//! Boolean action mask.

use serde::{Deserialize, Serialize};

/// One flag per catalog entry: `true` where the action is legal.
///
/// Always exactly as long as the catalog it was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionMask {
    allowed: Vec<bool>,
}

impl ActionMask {
    pub fn new(allowed: Vec<bool>) -> Self {
        Self { allowed }
    }

    /// Create a mask that allows nothing.
    pub fn deny_all(len: usize) -> Self {
        Self {
            allowed: vec![false; len],
        }
    }

    /// Check whether the action at `index` is allowed.
    ///
    /// Out-of-range indices are not allowed.
    pub fn is_allowed(&self, index: usize) -> bool {
        self.allowed.get(index).copied().unwrap_or(false)
    }

    /// Indices of allowed actions, ascending.
    pub fn allowed_indices(&self) -> Vec<usize> {
        self.allowed
            .iter()
            .enumerate()
            .filter_map(|(index, &allowed)| allowed.then_some(index))
            .collect()
    }

    pub fn allowed_count(&self) -> usize {
        self.allowed.iter().filter(|&&allowed| allowed).count()
    }

    /// Check whether no action is allowed.
    pub fn none_allowed(&self) -> bool {
        !self.allowed.contains(&true)
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.allowed
    }

    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    /// Apply the mask to a logit vector.
    ///
    /// Sets every disallowed logit to negative infinity.
    ///
    /// # Panics
    ///
    /// Panics if `logits.len()` differs from the mask length.
    pub fn apply_to_logits(&self, logits: &mut [f32]) {
        assert_eq!(
            logits.len(),
            self.allowed.len(),
            "logits length {} != mask length {}",
            logits.len(),
            self.allowed.len()
        );

        for (logit, &allowed) in logits.iter_mut().zip(&self.allowed) {
            if !allowed {
                *logit = f32::NEG_INFINITY;
            }
        }
    }

    /// Apply the mask and return a new logit vector.
    pub fn apply_to_logits_cloned(&self, logits: &[f32]) -> Vec<f32> {
        let mut result = logits.to_vec();
        self.apply_to_logits(&mut result);
        result
    }
}

impl From<Vec<bool>> for ActionMask {
    fn from(allowed: Vec<bool>) -> Self {
        Self::new(allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_allowed() {
        let mask = ActionMask::new(vec![true, false, true]);

        assert!(mask.is_allowed(0));
        assert!(!mask.is_allowed(1));
        assert!(mask.is_allowed(2));
        assert!(!mask.is_allowed(3)); // out of range
        assert_eq!(mask.allowed_indices(), vec![0, 2]);
        assert_eq!(mask.allowed_count(), 2);
    }

    #[test]
    fn test_apply_to_logits() {
        let mask = ActionMask::new(vec![false, false, true, false, true]);
        let mut logits = vec![1.0, 2.0, 3.0, 4.0, 5.0];

        mask.apply_to_logits(&mut logits);

        assert_eq!(logits[0], f32::NEG_INFINITY);
        assert_eq!(logits[1], f32::NEG_INFINITY);
        assert_eq!(logits[2], 3.0); // Allowed
        assert_eq!(logits[3], f32::NEG_INFINITY);
        assert_eq!(logits[4], 5.0); // Allowed
    }

    #[test]
    fn test_deny_all() {
        let mask = ActionMask::deny_all(4);
        let logits = mask.apply_to_logits_cloned(&[1.0; 4]);

        assert!(mask.none_allowed());
        assert_eq!(mask.len(), 4);
        assert!(logits.iter().all(|&l| l == f32::NEG_INFINITY));
    }

    #[test]
    #[should_panic(expected = "logits length")]
    fn test_wrong_size_panics() {
        let mask = ActionMask::new(vec![true; 3]);
        let mut logits = vec![1.0; 5];
        mask.apply_to_logits(&mut logits);
    }

    #[test]
    fn test_serde_shape() {
        let mask = ActionMask::new(vec![true, false]);
        assert_eq!(serde_json::to_string(&mask).unwrap(), "[true,false]");
    }
}
