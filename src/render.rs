//! Colored terminal rendering for schedule types.

use modsync_core::diff::DiffKind;
use modsync_core::ics::russian_date;
use modsync_core::views::DayStatus;
use modsync_core::{Event, EventSet, Person};
use owo_colors::OwoColorize;

pub trait Render {
    fn render(&self) -> String;
}

impl Render for DiffKind {
    fn render(&self) -> String {
        let symbol = self.symbol();
        match self {
            DiffKind::None => symbol.to_string(),
            DiffKind::Added => symbol.green().to_string(),
            DiffKind::Modified => symbol.yellow().to_string(),
            DiffKind::Removed => symbol.red().to_string(),
        }
    }
}

fn colorize_diff(kind: DiffKind, text: &str) -> String {
    match kind {
        DiffKind::None => text.to_string(),
        DiffKind::Added => text.green().to_string(),
        DiffKind::Modified => text.yellow().to_string(),
        DiffKind::Removed => text.red().to_string(),
    }
}

impl Render for Event {
    fn render(&self) -> String {
        let slot = if self.sequence_number > 0 {
            format!("#{}", self.sequence_number)
        } else {
            " ".repeat(2)
        };
        let time = format!(
            "{}-{}",
            self.start_time.format("%H:%M"),
            self.end_time.format("%H:%M")
        );
        let place = match &self.room_name {
            Some(room) if self.is_online() => format!("online: {room}"),
            Some(room) => room.clone(),
            None => "online".to_string(),
        };

        let mut line = format!("{} {} {}", slot.dimmed(), time.bold(), self.title);
        if !self.format_label.is_empty() {
            line.push_str(&format!(" {}", format!("({})", self.format_label).dimmed()));
        }
        line.push_str(&format!("\n      {} · {}", self.instructor, place).dimmed().to_string());
        line
    }
}

impl Render for Person {
    fn render(&self) -> String {
        let kind = if self.is_student() { "student" } else { "employee" };
        format!("{} {} {}", self.to_string().bold(), kind.dimmed(), self.id.dimmed())
    }
}

impl Render for DayStatus {
    fn render(&self) -> String {
        match self {
            DayStatus::OnEvent => "In class".green().to_string(),
            DayStatus::OnBreak => "On a break".yellow().to_string(),
            DayStatus::NonWorking => "Free".dimmed().to_string(),
        }
    }
}

/// Events grouped under a heading per day.
pub fn render_schedule(events: &EventSet) -> String {
    if events.is_empty() {
        return "   No classes".dimmed().to_string();
    }

    let mut lines = Vec::new();
    for date in events.dates() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push(format!("📅 {}", russian_date(date).bold()));
        for event in events.on_date(date).iter() {
            lines.push(format!("   {}", event.render()));
        }
    }
    lines.join("\n")
}

/// Show counts instead of individual changes above this many.
const COMPACT_THRESHOLD: usize = 5;

pub fn render_changes(changes: &EventSet, verbose: bool) -> String {
    if changes.is_empty() {
        return "   No changes".dimmed().to_string();
    }

    let mut lines = Vec::new();
    if verbose || changes.len() <= COMPACT_THRESHOLD {
        for event in changes.iter() {
            let text = format!("{} {}", event.date, event);
            lines.push(format!(
                "   {} {}",
                event.diff_kind.render(),
                colorize_diff(event.diff_kind, &text)
            ));
            if event.diff_kind == DiffKind::Modified {
                let fields: Vec<_> = event.changed_fields.iter().map(|f| f.as_str()).collect();
                lines.push(format!("      {}", fields.join(", ").dimmed()));
            }
        }
    } else {
        for (kind, label) in [
            (DiffKind::Added, "new"),
            (DiffKind::Modified, "changed"),
            (DiffKind::Removed, "cancelled"),
        ] {
            let count = changes.iter().filter(|e| e.diff_kind == kind).count();
            if count > 0 {
                let text = format!("({} {} {})", count, label, pluralize("class", count));
                lines.push(format!("   {} {}", kind.render(), colorize_diff(kind, &text)));
            }
        }
    }
    lines.join("\n")
}

fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}es")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn event(id: &str, kind: DiffKind) -> Event {
        Event::new(
            id,
            NaiveDate::from_ymd_opt(2024, 9, 2).unwrap(),
            NaiveTime::from_hms_opt(8, 20, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 55, 0).unwrap(),
            format!("Class {id}"),
        )
        .marked(kind)
    }

    #[test]
    fn test_render_changes_lists_few_changes() {
        let changes = EventSet::new([event("a", DiffKind::Added), event("b", DiffKind::Removed)]);
        let out = render_changes(&changes, false);
        assert!(out.contains("Class a"));
        assert!(out.contains("Class b"));
    }

    #[test]
    fn test_render_changes_compacts_many_changes() {
        let changes = EventSet::new((0..7).map(|i| event(&i.to_string(), DiffKind::Added)));
        let out = render_changes(&changes, false);
        assert!(out.contains("7 new classes"));
        assert!(!out.contains("Class 3"));

        let verbose = render_changes(&changes, true);
        assert!(verbose.contains("Class 3"));
    }

    #[test]
    fn test_render_schedule_empty() {
        assert!(render_schedule(&EventSet::empty()).contains("No classes"));
    }
}
