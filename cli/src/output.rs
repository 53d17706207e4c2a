//! Renders a scored worklist as a colored terminal table or as JSON.

use colored::{Color, Colorize};
use triage_core::scoring::{Category, PriorityBand};
use triage_core::Scored;

pub fn print_json(scored: &[Scored]) -> serde_json::Result<()> {
    let json = serde_json::to_string_pretty(scored)?;
    println!("{json}");
    Ok(())
}

pub fn print_table(scored: &[Scored], use_color: bool) {
    if scored.is_empty() {
        println!("Nothing to triage.");
        return;
    }

    for scored_item in scored {
        let band = band_label(scored_item.priority);
        let band = if use_color {
            band.color(band_color(scored_item.priority)).bold()
        } else {
            band.normal()
        };
        let repo = &scored_item.item.repository.full_name;
        let number = scored_item.item.subject.number().map(|n| format!("#{n}")).unwrap_or_default();
        let title = &scored_item.item.subject.title;

        println!("{band:<10} {:>4}  {repo}{number:<8} {title}", scored_item.score);
        println!(
            "    reason: {:<16} category: {:<10} action: {}",
            reason_label(scored_item),
            category_label(scored_item.category),
            scored_item.action
        );
    }
}

fn band_label(band: PriorityBand) -> &'static str {
    match band {
        PriorityBand::Urgent => "URGENT",
        PriorityBand::Important => "IMPORTANT",
        PriorityBand::QuickWin => "QUICK WIN",
        PriorityBand::Medium => "MEDIUM",
        PriorityBand::Fyi => "FYI",
    }
}

fn band_color(band: PriorityBand) -> Color {
    match band {
        PriorityBand::Urgent => Color::Red,
        PriorityBand::Important => Color::Yellow,
        PriorityBand::QuickWin => Color::Green,
        PriorityBand::Medium => Color::Cyan,
        PriorityBand::Fyi => Color::BrightBlack,
    }
}

fn category_label(category: Category) -> &'static str {
    match category {
        Category::Urgent => "urgent",
        Category::Important => "important",
        Category::LowHanging => "low-hanging",
        Category::Fyi => "fyi",
    }
}

fn reason_label(scored: &Scored) -> &str {
    scored.item.reason.as_str()
}
