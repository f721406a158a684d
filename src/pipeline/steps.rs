use zkguard_common::{Step, StepStatus};

/// Status tracker for the five fixed pipeline stages.
///
/// This is a plain container: it does not validate transitions. Ordering is
/// the orchestrator's job.
#[derive(Debug, Clone)]
pub struct StepStateMachine {
    steps: Vec<Step>,
}

impl Default for StepStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StepStateMachine {
    pub fn new() -> Self {
        Self {
            steps: Step::initial(),
        }
    }

    /// Put every stage back to `pending`.
    pub fn reset(&mut self) {
        for step in &mut self.steps {
            step.status = StepStatus::Pending;
        }
    }

    /// Set the status of the stage at 0-based `index`.
    ///
    /// Returns the updated step, or `None` if `index` is out of range.
    pub(crate) fn set_status(&mut self, index: usize, status: StepStatus) -> Option<Step> {
        let step = self.steps.get_mut(index)?;
        step.status = status;
        Some(step.clone())
    }

    pub fn status(&self, index: usize) -> Option<StepStatus> {
        self.steps.get(index).map(|s| s.status)
    }

    pub fn snapshot(&self) -> Vec<Step> {
        self.steps.clone()
    }

    pub fn all_completed(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_has_five_pending_steps() {
        let machine = StepStateMachine::new();
        let steps = machine.snapshot();
        assert_eq!(steps.len(), 5);
        assert!(steps.iter().all(|s| s.status == StepStatus::Pending));
        assert_eq!(
            steps.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
    }

    #[test]
    fn test_set_status_updates_single_step() {
        let mut machine = StepStateMachine::new();
        let updated = machine.set_status(2, StepStatus::Processing).unwrap();
        assert_eq!(updated.id, 3);
        assert_eq!(machine.status(2), Some(StepStatus::Processing));
        assert_eq!(machine.status(1), Some(StepStatus::Pending));
        assert_eq!(machine.status(3), Some(StepStatus::Pending));
    }

    #[test]
    fn test_set_status_out_of_range_is_ignored() {
        let mut machine = StepStateMachine::new();
        assert!(machine.set_status(5, StepStatus::Completed).is_none());
        assert!(machine.snapshot().iter().all(|s| s.status == StepStatus::Pending));
    }

    #[test]
    fn test_set_status_does_not_enforce_order() {
        // Ordering discipline belongs to the orchestrator.
        let mut machine = StepStateMachine::new();
        machine.set_status(0, StepStatus::Completed);
        machine.set_status(0, StepStatus::Processing);
        assert_eq!(machine.status(0), Some(StepStatus::Processing));
    }

    #[test]
    fn test_reset_returns_all_to_pending() {
        let mut machine = StepStateMachine::new();
        for i in 0..5 {
            machine.set_status(i, StepStatus::Completed);
        }
        assert!(machine.all_completed());
        machine.reset();
        assert!(machine.snapshot().iter().all(|s| s.status == StepStatus::Pending));
        assert!(!machine.all_completed());
    }

    #[test]
    fn test_titles_survive_reset() {
        let mut machine = StepStateMachine::new();
        let before = machine.snapshot();
        machine.set_status(4, StepStatus::Error);
        machine.reset();
        assert_eq!(machine.snapshot(), before);
    }
}
