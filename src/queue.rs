//! `QueueStatus`: the per-node discriminant that guarantees a node belongs
//! to at most one of the candidate/transition/finished-root queues at a
//! time, plus the state-machine transitions that move it between them.

use crate::error::PlanError;
use crate::node::NodeHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    None,
    Check,
    Transition,
    TransitionCheck,
    Delete,
}

impl QueueStatus {
    /// `None -> Check` / `Transition -> TransitionCheck`: a node is marked
    /// as a candidate. Re-marking an already-`Check`ed node is a no-op
    /// coalesce, not an error.
    pub fn enqueue_candidate(self, node: NodeHandle) -> Result<QueueStatus, PlanError> {
        match self {
            QueueStatus::None => Ok(QueueStatus::Check),
            QueueStatus::Check => Ok(QueueStatus::Check),
            QueueStatus::Transition => Ok(QueueStatus::TransitionCheck),
            QueueStatus::TransitionCheck => Ok(QueueStatus::TransitionCheck),
            QueueStatus::Delete => Err(PlanError::IllegalQueueTransition {
                node,
                detail: "cannot re-candidate a node marked for deletion",
            }),
        }
    }

    /// `None -> Transition`. Enqueuing a node already on the candidate
    /// queue for transition without first dequeuing it is the one
    /// explicitly fatal case the source documents.
    pub fn enqueue_transition(self, node: NodeHandle) -> Result<QueueStatus, PlanError> {
        match self {
            QueueStatus::None => Ok(QueueStatus::Transition),
            QueueStatus::Check => Err(PlanError::IllegalQueueTransition {
                node,
                detail: "node already on candidate queue cannot be enqueued for transition directly",
            }),
            _ => Err(PlanError::IllegalQueueTransition {
                node,
                detail: "node already queued for transition",
            }),
        }
    }

    /// `Check -> None` / `Transition -> None`: the node has been popped
    /// and processed. `TransitionCheck -> Check` defers the pending
    /// re-candidacy until the transition has been applied.
    pub fn dequeue(self) -> QueueStatus {
        match self {
            QueueStatus::Check | QueueStatus::Transition => QueueStatus::None,
            QueueStatus::TransitionCheck => QueueStatus::Check,
            other => other,
        }
    }

    pub fn mark_for_deletion(self, node: NodeHandle) -> Result<QueueStatus, PlanError> {
        match self {
            QueueStatus::None => Ok(QueueStatus::Delete),
            _ => Err(PlanError::IllegalQueueTransition {
                node,
                detail: "cannot mark a queued node for deletion",
            }),
        }
    }

    pub fn is_queued(self) -> bool {
        !matches!(self, QueueStatus::None | QueueStatus::Delete)
    }
}
