//! The `Normal`/`Abrupt` outcome a formula or subscription caches.

use crate::same_value::SameValue;

/// The result of running a formula's closure, or of polling a subscription's
/// external `get`.
///
/// `Normal` is an ordinary produced value. `Abrupt` is what the distilled
/// specification calls a "thrown" outcome — here, simply the `Err` arm of the
/// closure's `Result`. Both participate in caching and version-bump decisions
/// identically (see [`Completion::same_outcome_as`]).
#[derive(Debug, Clone)]
pub enum Completion<T, E> {
    Normal(T),
    Abrupt(E),
}

impl<T, E> Completion<T, E> {
    /// Converts this completion into the `Result` a public read returns.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Completion::Normal(value) => Ok(value),
            Completion::Abrupt(error) => Err(error),
        }
    }

    pub fn as_result(&self) -> Result<&T, &E> {
        match self {
            Completion::Normal(value) => Ok(value),
            Completion::Abrupt(error) => Err(error),
        }
    }

    /// Builds a completion from a freshly-run closure's `Result`.
    pub fn from_result(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Completion::Normal(value),
            Err(error) => Completion::Abrupt(error),
        }
    }
}

impl<T: SameValue, E: SameValue> Completion<T, E> {
    /// Step 5 of the validation protocol: `Normal`/`Normal` compares values,
    /// `Abrupt`/`Abrupt` compares payloads, and `Normal`/`Abrupt` is always a
    /// change.
    pub fn same_outcome_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Completion::Normal(a), Completion::Normal(b)) => a.same_value(b),
            (Completion::Abrupt(a), Completion::Abrupt(b)) => a.same_value(b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_and_abrupt_never_match() {
        let normal: Completion<i32, String> = Completion::Normal(1);
        let abrupt: Completion<i32, String> = Completion::Abrupt("e".into());
        assert!(!normal.same_outcome_as(&abrupt));
        assert!(!abrupt.same_outcome_as(&normal));
    }

    #[test]
    fn equal_abrupt_payloads_match() {
        let a: Completion<i32, String> = Completion::Abrupt("boom".into());
        let b: Completion<i32, String> = Completion::Abrupt("boom".into());
        assert!(a.same_outcome_as(&b));
    }

    #[test]
    fn into_result_round_trips() {
        let ok: Completion<i32, String> = Completion::Normal(42);
        assert_eq!(ok.into_result(), Ok(42));
        let err: Completion<i32, String> = Completion::Abrupt("no".into());
        assert_eq!(err.into_result(), Err("no".to_string()));
    }
}
