//! Drag transition rules.
//!
//! Main is a one-way sink: tasks may enter it from either side bucket but
//! never leave, and any manual placement inside Main pins the task. Side
//! buckets are disjoint holding areas, so nothing moves between them.

use bucketsync_shared::{Bucket, MoveRequest, TaskId};

/// Where a finished drag gesture left its task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragOutcome {
    pub task_id: TaskId,
    pub from: Bucket,
    pub to: Bucket,
    pub new_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    BetweenSideBuckets,
    OutOfMain,
}

impl Denial {
    pub fn message(self) -> &'static str {
        match self {
            Denial::BetweenSideBuckets => "Cannot move directly between side banks.",
            Denial::OutOfMain => "Cannot move tasks out of Main back to side banks.",
        }
    }
}

/// Recovery the engine owes the view after an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compensation {
    /// The server response is the new view.
    None,
    /// Throw away the drag library's optimistic move with a full refetch.
    Resync,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Allow(MoveRequest),
    Deny(Denial),
}

impl Transition {
    pub fn compensation(&self) -> Compensation {
        match self {
            Transition::Allow(_) => Compensation::None,
            Transition::Deny(_) => Compensation::Resync,
        }
    }

    /// Compensation owed when the allowed move itself fails.
    pub fn on_failure(&self) -> Compensation {
        Compensation::Resync
    }
}

pub fn decide(outcome: &DragOutcome) -> Transition {
    match (outcome.from, outcome.to) {
        (from, to) if from.is_side() && to.is_side() => {
            Transition::Deny(Denial::BetweenSideBuckets)
        }
        (Bucket::Main, to) if to.is_side() => Transition::Deny(Denial::OutOfMain),
        (Bucket::Main, Bucket::Main) => Transition::Allow(MoveRequest::into_main(
            outcome.task_id.clone(),
            outcome.new_index,
            true,
        )),
        _ => Transition::Allow(MoveRequest::into_main(
            outcome.task_id.clone(),
            outcome.new_index,
            false,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drag(from: Bucket, to: Bucket, new_index: usize) -> DragOutcome {
        DragOutcome {
            task_id: TaskId::new("T"),
            from,
            to,
            new_index,
        }
    }

    #[test]
    fn side_to_side_is_denied_including_same_bucket() {
        for from in [Bucket::SideA, Bucket::SideB] {
            for to in [Bucket::SideA, Bucket::SideB] {
                let t = decide(&drag(from, to, 1));
                assert_eq!(t, Transition::Deny(Denial::BetweenSideBuckets));
                assert_eq!(t.compensation(), Compensation::Resync);
            }
        }
    }

    #[test]
    fn main_to_side_is_denied() {
        for to in [Bucket::SideA, Bucket::SideB] {
            let t = decide(&drag(Bucket::Main, to, 0));
            assert_eq!(t, Transition::Deny(Denial::OutOfMain));
            assert_eq!(t.compensation(), Compensation::Resync);
        }
    }

    #[test]
    fn side_to_main_moves_unlocked() {
        for from in [Bucket::SideA, Bucket::SideB] {
            let Transition::Allow(req) = decide(&drag(from, Bucket::Main, 2)) else {
                panic!("side to main must be allowed");
            };
            assert!(!req.locked);
            assert_eq!(req.new_category, "Main");
            assert_eq!(req.new_index, 2);
        }
    }

    #[test]
    fn reorder_within_main_locks() {
        let t = decide(&drag(Bucket::Main, Bucket::Main, 3));
        assert_eq!(t.compensation(), Compensation::None);
        let Transition::Allow(req) = t else {
            panic!("main reorder must be allowed");
        };
        assert!(req.locked);
        assert_eq!(req.new_index, 3);
    }
}
