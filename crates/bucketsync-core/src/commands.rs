use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use bucketsync_shared::{Bucket, NewTask, TaskId};
use tracing::{info, warn};

use crate::actions::{ActionReport, ActionResult, RowAction, RowEvent};
use crate::cli::Command;
use crate::config::Config;
use crate::engine::{DragResolution, Engine};
use crate::render::TerminalView;
use crate::scheduler::PollScheduler;

/// Runs one CLI command against the engine.
#[tracing::instrument(skip(engine, view, cfg))]
pub async fn dispatch(
    engine: Arc<Engine>,
    view: &TerminalView,
    cfg: &Config,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Show => engine
            .refresh()
            .await
            .context("failed to fetch tasks"),
        Command::Watch => {
            let scheduler = PollScheduler::new(Arc::clone(&engine), cfg.poll_interval());
            scheduler
                .run_until(async {
                    if let Err(err) = tokio::signal::ctrl_c().await {
                        warn!(error = %err, "failed to listen for ctrl-c");
                    }
                })
                .await;
            Ok(())
        }
        Command::Add {
            title,
            category,
            date,
            time,
        } => {
            let task = NewTask {
                title,
                category,
                due_date: date,
                due_time: time,
            };
            match engine.add_task(task).await {
                ActionResult::Rendered => Ok(()),
                ActionResult::Invalid => bail!("invalid input for new task"),
                other => bail!("adding task failed ({other:?})"),
            }
        }
        Command::Drag { task, to, index } => {
            let id = TaskId::new(task);
            let from = locate(&engine, view, &id).await?;
            engine.begin_drag(id.clone(), from);
            match engine.end_drag(to, index).await {
                Some(DragResolution::Moved) => {
                    info!(task = %id, %from, %to, index, "drag applied");
                    Ok(())
                }
                Some(DragResolution::Denied(denial)) => {
                    info!(task = %id, ?denial, "drag denied");
                    Ok(())
                }
                Some(DragResolution::MoveFailed) => Err(anyhow!("move of task {id} failed")),
                None => Err(anyhow!("drag was not active")),
            }
        }
        Command::Lock { task } => row_action(&engine, view, RowAction::ToggleLock, task).await,
        Command::Split { task } => row_action(&engine, view, RowAction::Split, task).await,
        Command::Done { task } => row_action(&engine, view, RowAction::Done, task).await,
        Command::Delete { task } => row_action(&engine, view, RowAction::Delete, task).await,
        Command::Due { task, date, time } => {
            let report = row_event(&engine, view, RowAction::EditDue, task).await?;
            if report.result != ActionResult::AwaitingInput {
                return check(report);
            }
            engine.set_due_fields(&date, &time);
            let report = engine
                .save_due()
                .await
                .context("due editor closed unexpectedly")?;
            if report.result == ActionResult::Invalid {
                engine.close_due_editor();
            }
            check(report)
        }
    }
}

/// Loads the board quietly and finds where a task currently sits.
async fn locate(engine: &Engine, view: &TerminalView, id: &TaskId) -> anyhow::Result<Bucket> {
    view.set_muted(true);
    let loaded = engine.refresh().await;
    view.set_muted(false);
    loaded.context("failed to fetch tasks")?;

    engine
        .board()
        .row(id)
        .map(|row| row.bucket)
        .ok_or_else(|| anyhow!("task {id} is not on the board"))
}

async fn row_event(
    engine: &Engine,
    view: &TerminalView,
    action: RowAction,
    task: String,
) -> anyhow::Result<ActionReport> {
    let id = TaskId::new(task);
    locate(engine, view, &id).await?;
    Ok(engine.dispatch(RowEvent::new(action, id)).await)
}

async fn row_action(
    engine: &Engine,
    view: &TerminalView,
    action: RowAction,
    task: String,
) -> anyhow::Result<()> {
    let report = row_event(engine, view, action, task).await?;
    check(report)
}

fn check(report: ActionReport) -> anyhow::Result<()> {
    let task = &report.flow.task_id;
    match report.result {
        ActionResult::Rendered | ActionResult::Cancelled | ActionResult::AwaitingInput => Ok(()),
        ActionResult::Unavailable => bail!("server does not support {:?} for task {task}", report.flow.action),
        ActionResult::Failed => bail!("{:?} failed for task {task}", report.flow.action),
        ActionResult::Invalid => bail!("invalid input for task {task}"),
        ActionResult::Stale => bail!("task {task} is no longer on the board"),
        ActionResult::Unsynced => bail!(
            "{:?} applied to task {task} but the board could not be refreshed",
            report.flow.action
        ),
    }
}
