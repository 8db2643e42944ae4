use colored::*;
use jiff::civil::Date;

use triage::{
    models::{priority::Priority, task::TaskRecord},
    services::tasks::Analysis,
};

/// Get the terminal width, defaulting to 80 if unavailable
fn get_terminal_width() -> usize {
    term_size::dimensions().map(|(w, _)| w).unwrap_or(80)
}

pub fn colored_priority(priority: Priority) -> ColoredString {
    let text = format!("{:<6}", priority);
    match priority {
        Priority::High => text.red().bold(),
        Priority::Medium => text.yellow(),
        Priority::Low => text.green(),
    }
}

/// "in 3 days", "today", "2 days ago"
pub fn format_days(days: i64) -> String {
    match days {
        0 => "today".to_string(),
        1 => "in 1 day".to_string(),
        -1 => "1 day ago".to_string(),
        d if d > 0 => format!("in {} days", d),
        d => format!("{} days ago", -d),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let single_line = text.lines().next().unwrap_or_default();
    if single_line.chars().count() <= max_chars && single_line.len() == text.len() {
        return single_line.to_string();
    }
    let kept: String = single_line.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", kept)
}

/// Render a view header with title and count
pub fn render_view_header(title: &str, count: usize) {
    let task_word = if count == 1 { "task" } else { "tasks" };
    println!("\n  {} ({} {})\n", title.cyan().bold(), count, task_word);
}

/// One dashboard row: id, priority, label, and the due date on the right.
/// Overdue is judged against `today`, not the stored snapshot.
pub fn render_task_line(task: &TaskRecord, today: Date) {
    let terminal_width = get_terminal_width();
    let overdue = task.is_overdue(today);

    let right_section = format!("{}  ({})", task.due_date, format_days(task.days_remaining));
    let right_len = right_section.chars().count();

    // "  abcd1234  🔴 High    " is 23 columns wide, the icon counting as two
    let available = terminal_width.saturating_sub(23 + right_len + 4).max(10);
    let label = truncate(task.label(), available);

    let left = format!(
        "  {}  {} {}  {}",
        task.short_id().dimmed(),
        task.priority.icon(),
        colored_priority(task.priority),
        label.bold()
    );
    let left_len = 23 + label.chars().count();

    let right = if overdue {
        right_section.red()
    } else {
        right_section.dimmed()
    };

    if left_len + right_len + 4 < terminal_width {
        let padding = terminal_width - left_len - right_len - 2;
        println!("{}{}{}", left, " ".repeat(padding), right);
    } else {
        println!("{}  {}", left, right);
    }
}

pub fn render_dashboard(title: &str, tasks: &[TaskRecord], today: Date) {
    render_view_header(title, tasks.len());
    for task in tasks {
        render_task_line(task, today);
    }
    println!();
}

/// The card shown after a task is analysed, created or edited
pub fn render_analysis(description: &str, analysis: &Analysis) {
    let priority = analysis.derived.priority();
    println!("\n  {}\n", "Task Analysis".cyan().bold());
    println!("  {} {}", "Task:".dimmed(), description);
    println!(
        "  {} {} {}",
        "Predicted Priority:".dimmed(),
        priority.icon(),
        colored_priority(priority)
    );
    println!(
        "  {} {} ({})",
        "Due:".dimmed(),
        analysis.due_date,
        format_days(analysis.derived.days_remaining())
    );
    println!("  {} {}", "Suggestion:".dimmed(), analysis.derived.suggestion());
    println!();
}

pub fn render_task_detail(task: &TaskRecord, today: Date) {
    println!("\n  {}  {}\n", task.short_id().dimmed(), task.label().bold());
    println!("  {} {}", "Id:".dimmed(), task.id);
    if let Some(title) = &task.title {
        println!("  {} {}", "Title:".dimmed(), title);
    }
    println!("  {} {}", "Description:".dimmed(), task.description);
    println!(
        "  {} {} {}",
        "Priority:".dimmed(),
        task.priority.icon(),
        colored_priority(task.priority)
    );
    println!("  {} {}", "Suggestion:".dimmed(), task.suggestion());

    let due = format!("{} ({} when last saved)", task.due_date, format_days(task.days_remaining));
    if task.is_overdue(today) {
        println!("  {} {} {}", "Due:".dimmed(), due.red(), "overdue".red().bold());
    } else {
        println!("  {} {}", "Due:".dimmed(), due);
    }
    if let Some(email) = &task.notify_email {
        println!("  {} {}", "Reminder Email:".dimmed(), email);
    }
    println!();
}

pub fn render_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

pub fn render_warning(message: &str) {
    eprintln!("{} {}", "Warning:".yellow().bold(), message.yellow());
}
