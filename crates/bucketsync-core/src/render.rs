use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::anyhow;
use bucketsync_shared::{Bucket, ListSnapshot, Task, TaskId};
use tracing::warn;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::due;
use crate::notify::{Notice, Notifier};

/// One rendered row. Carries nothing beyond what the snapshot said.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub bucket: Bucket,
    pub index: usize,
    pub task: Task,
}

impl Row {
    pub fn lock_indicator(&self) -> &'static str {
        if self.task.locked { "✔" } else { "◻" }
    }

    pub fn due_label(&self) -> String {
        self.task
            .due_datetime
            .as_deref()
            .map(due::short_label)
            .unwrap_or_default()
    }
}

/// Fully rebuilt board. `generation` increases on every replacement so
/// listeners can tell that all rows were swapped out.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Board {
    pub generation: u64,
    main: Vec<Row>,
    side_a: Vec<Row>,
    side_b: Vec<Row>,
}

impl Board {
    pub fn from_snapshot(snapshot: &ListSnapshot, generation: u64) -> Self {
        let rows = |bucket: Bucket| -> Vec<Row> {
            snapshot
                .bucket(bucket)
                .iter()
                .enumerate()
                .map(|(index, task)| Row {
                    bucket,
                    index,
                    task: task.clone(),
                })
                .collect()
        };

        Self {
            generation,
            main: rows(Bucket::Main),
            side_a: rows(Bucket::SideA),
            side_b: rows(Bucket::SideB),
        }
    }

    pub fn rows(&self, bucket: Bucket) -> &[Row] {
        match bucket {
            Bucket::Main => &self.main,
            Bucket::SideA => &self.side_a,
            Bucket::SideB => &self.side_b,
        }
    }

    /// Resolves an event target to its row.
    pub fn row(&self, id: &TaskId) -> Option<&Row> {
        Bucket::ALL
            .into_iter()
            .flat_map(|bucket| self.rows(bucket).iter())
            .find(|row| &row.task.id == id)
    }

    /// Visible ordering and lock state, bucket by bucket.
    pub fn layout(&self) -> Vec<(Bucket, Vec<(TaskId, bool)>)> {
        Bucket::ALL
            .into_iter()
            .map(|bucket| {
                let ids = self
                    .rows(bucket)
                    .iter()
                    .map(|row| (row.task.id.clone(), row.task.locked))
                    .collect();
                (bucket, ids)
            })
            .collect()
    }
}

/// Receives every replacement board.
pub trait BoardView: Send + Sync {
    fn replace(&self, board: &Board);
}

/// Prints boards to stdout and notices to stderr.
#[derive(Debug)]
pub struct TerminalView {
    color: bool,
    muted: AtomicBool,
}

impl TerminalView {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = match cfg.ui.color.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self::with_color(color))
    }

    pub fn with_color(color: bool) -> Self {
        Self {
            color,
            muted: AtomicBool::new(false),
        }
    }

    /// Suppresses board output, e.g. while loading the board an action
    /// needs before acting on it.
    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    pub fn write_board<W: Write>(&self, mut out: W, board: &Board) -> anyhow::Result<()> {
        for bucket in Bucket::ALL {
            writeln!(out, "{}", self.paint(bucket.label(), "1"))?;

            let rows = board.rows(bucket);
            if rows.is_empty() {
                writeln!(out, "  No tasks yet")?;
                writeln!(out)?;
                continue;
            }

            let headers = vec![
                "#".to_string(),
                "ID".to_string(),
                "Lock".to_string(),
                "Title".to_string(),
                "Category".to_string(),
                "Due".to_string(),
            ];

            let table = rows
                .iter()
                .map(|row| {
                    let title = match row.task.part_label.as_deref() {
                        Some(part) => format!("{} [{part}]", row.task.title),
                        None => row.task.title.clone(),
                    };
                    let lock = if row.task.locked {
                        self.paint(row.lock_indicator(), "33")
                    } else {
                        row.lock_indicator().to_string()
                    };
                    vec![
                        row.index.to_string(),
                        self.paint(row.task.id.as_str(), "36"),
                        lock,
                        title,
                        row.task.category.clone(),
                        row.due_label(),
                    ]
                })
                .collect();

            write_table(&mut out, headers, table)?;
            writeln!(out)?;
        }

        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

impl BoardView for TerminalView {
    fn replace(&self, board: &Board) {
        if self.muted.load(Ordering::SeqCst) {
            return;
        }
        let out = io::stdout().lock();
        if let Err(err) = self.write_board(out, board) {
            warn!(error = %err, generation = board.generation, "failed writing board");
        }
    }
}

impl Notifier for TerminalView {
    fn notify(&self, notice: &Notice) {
        eprintln!("{}", self.paint(&notice.to_string(), "35"));
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    write!(writer, "  ")?;
    for (header, &width) in headers.iter().zip(&widths) {
        write!(writer, "{header:width$} ")?;
    }
    writeln!(writer)?;

    write!(writer, "  ")?;
    for &width in &widths {
        write!(writer, "{:-<width$} ", "")?;
    }
    writeln!(writer)?;

    for row in rows {
        write!(writer, "  ")?;
        for (cell, &width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
