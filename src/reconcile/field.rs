use crate::model::{Field, Stamped};

/// Two non-empty observations of one field that disagreed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldConflict<T> {
    pub kept: Stamped<T>,
    pub rejected: Stamped<T>,
}

impl<T: Clone + Ord> Field<T> {
    /// Folds an incoming observation into this field
    ///
    /// An empty observation never clears a value. When both sides hold
    /// different values the one with the higher stamp wins, and equal stamps
    /// fall back to value order, so the result does not depend on the order
    /// observations arrive in. Equal values keep the higher stamp.
    pub fn merge(&mut self, incoming: Field<T>) -> Option<FieldConflict<T>> {
        let new = incoming.0?;

        if self.0.is_none() {
            self.0 = Some(new);
            return None;
        }
        let current = self.0.as_mut()?;

        if current.value == new.value {
            current.stamp = current.stamp.max(new.stamp);
            return None;
        }

        if (new.stamp, &new.value) > (current.stamp, &current.value) {
            let rejected = std::mem::replace(current, new);
            Some(FieldConflict {
                kept: current.clone(),
                rejected,
            })
        } else {
            Some(FieldConflict {
                kept: current.clone(),
                rejected: new,
            })
        }
    }
}
