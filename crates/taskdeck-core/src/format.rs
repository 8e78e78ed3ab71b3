//! Outbound message text for task lists, reminders and daily summaries.

use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::types::Task;

/// "• HH:MM — text" in the chat's local time.
pub fn task_line(task: &Task, tz: Tz) -> String {
    format!(
        "• {} — {}",
        task.due_utc.with_timezone(&tz).format("%H:%M"),
        task.text
    )
}

/// One line per task, or a friendly empty marker.
pub fn task_list(tasks: &[Task], tz: Tz) -> String {
    if tasks.is_empty() {
        return "Nothing planned yet".to_string();
    }
    tasks
        .iter()
        .map(|t| task_line(t, tz))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn reminder_text(task: &Task, tz: Tz) -> String {
    format!(
        "⏰ Reminder: {} at {}",
        task.text,
        task.due_utc.with_timezone(&tz).format("%H:%M")
    )
}

pub fn summary_text(date: NaiveDate, tasks: &[Task], tz: Tz) -> String {
    format!(
        "Good morning! Your plan for {}:\n{}",
        date.format("%d.%m"),
        task_list(tasks, tz)
    )
}
