#[cfg(test)]
#[path = "../../tests/unit/editing/lifecycle_test.rs"]
mod lifecycle_test;

use crate::models::{ChangeRecord, RouteStatus};
use crate::utils::GenericResult;

/// An action which moves route through dispatch lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchAction {
    /// Hands route over to an agent.
    Dispatch,
    /// Agent starts the route.
    Start,
    /// Route is finished.
    Complete,
}

/// Encapsulates dispatch lifecycle rules: `draft → dispatched → in_progress → completed`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DispatchLifecycle;

impl DispatchLifecycle {
    /// Returns true if the engine may change stops of the route in given status.
    pub fn can_mutate(&self, status: RouteStatus) -> bool {
        status != RouteStatus::Completed
    }

    /// Returns true if the route in given status can be deleted.
    pub fn can_delete(&self, status: RouteStatus) -> bool {
        status == RouteStatus::Draft
    }

    /// Returns true if changes of the route in given status are worth notifying the agent about.
    pub fn requires_notification(&self, status: RouteStatus) -> bool {
        matches!(status, RouteStatus::Dispatched | RouteStatus::InProgress)
    }

    /// Returns an agent to notify, if the committed changes should produce a notification.
    pub fn notification_target<'a>(
        &self,
        status: RouteStatus,
        agent_id: Option<&'a str>,
        changes: &[ChangeRecord],
    ) -> Option<&'a str> {
        agent_id.filter(|_| self.requires_notification(status) && !changes.is_empty())
    }

    /// Returns the status reached by applying `action` or an error if transition is not allowed.
    pub fn transition(&self, status: RouteStatus, action: DispatchAction) -> GenericResult<RouteStatus> {
        match (status, action) {
            (RouteStatus::Draft, DispatchAction::Dispatch) => Ok(RouteStatus::Dispatched),
            (RouteStatus::Dispatched, DispatchAction::Start) => Ok(RouteStatus::InProgress),
            (RouteStatus::Dispatched | RouteStatus::InProgress, DispatchAction::Complete) => Ok(RouteStatus::Completed),
            (status, action) => Err(format!("cannot apply {action:?} to route in {status:?} status").into()),
        }
    }
}
