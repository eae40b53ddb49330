use std::fmt;

use crate::policy::Denial;

/// User-facing toast messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Denied(Denial),
    MoveFailed,
    RefreshFailed,
    Expired(usize),
    Locked,
    LockFailed,
    Unlocked,
    UnlockFailed,
    Split,
    SplitUnavailable,
    SplitFailed,
    DueUpdated,
    UpdateUnavailable,
    DueUpdateFailed,
    DueInputMissing,
    DueInputInvalid(String),
    Added,
    AddFailed,
    AddInputMissing,
    Done,
    DoneFailed,
    Deleted,
    DeleteFailed,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Denied(denial) => f.write_str(denial.message()),
            Notice::MoveFailed => f.write_str("Move failed."),
            Notice::RefreshFailed => f.write_str("Failed to refresh tasks; the board may be out of date."),
            Notice::Expired(count) => write!(f, "{count} task(s) expired and were removed."),
            Notice::Locked => f.write_str("Task locked in Main."),
            Notice::LockFailed => f.write_str("Failed to lock task."),
            Notice::Unlocked => f.write_str("Task unlocked (auto-reorder enabled)."),
            Notice::UnlockFailed => f.write_str("Failed to unlock task."),
            Notice::Split => f.write_str("Task split."),
            Notice::SplitUnavailable => f.write_str("Split endpoint not available on server."),
            Notice::SplitFailed => f.write_str("Split failed."),
            Notice::DueUpdated => f.write_str("Due date updated."),
            Notice::UpdateUnavailable => f.write_str("Update endpoint not available on server."),
            Notice::DueUpdateFailed => f.write_str("Failed to update due date."),
            Notice::DueInputMissing => f.write_str("Please enter both date and time."),
            Notice::DueInputInvalid(detail) => write!(f, "Invalid due date: {detail}."),
            Notice::Added => f.write_str("Task added."),
            Notice::AddFailed => f.write_str("Failed to add task."),
            Notice::AddInputMissing => f.write_str("Please enter a title and category."),
            Notice::Done => f.write_str("Task marked done."),
            Notice::DoneFailed => f.write_str("Failed to mark task done."),
            Notice::Deleted => f.write_str("Task deleted."),
            Notice::DeleteFailed => f.write_str("Failed to delete task."),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice);
}
