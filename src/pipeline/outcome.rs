use zkguard_common::Provenance;

/// Result of a recoverable stage: either the real value or a fallback with the reason.
///
/// Stages 2, 4 and 5 never fail outward; this type records which path they took.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Real(T),
    Fallback { value: T, reason: String },
}

impl<T> StageOutcome<T> {
    pub fn fallback(value: T, reason: impl Into<String>) -> Self {
        Self::Fallback {
            value,
            reason: reason.into(),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Real(value) | Self::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Real(value) | Self::Fallback { value, .. } => value,
        }
    }

    pub fn provenance(&self) -> Provenance {
        match self {
            Self::Real(_) => Provenance::Real,
            Self::Fallback { .. } => Provenance::Mock,
        }
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        match self {
            Self::Real(_) => None,
            Self::Fallback { reason, .. } => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_outcome() {
        let outcome = StageOutcome::Real(42.0);
        assert_eq!(*outcome.value(), 42.0);
        assert_eq!(outcome.provenance(), Provenance::Real);
        assert!(outcome.fallback_reason().is_none());
    }

    #[test]
    fn test_fallback_outcome_keeps_reason() {
        let outcome = StageOutcome::fallback(7, "backend offline");
        assert_eq!(outcome.provenance(), Provenance::Mock);
        assert_eq!(outcome.fallback_reason(), Some("backend offline"));
        assert_eq!(outcome.into_value(), 7);
    }
}
