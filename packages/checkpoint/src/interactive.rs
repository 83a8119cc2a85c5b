//! Interactive menu for browsing persisted threads.
//!
//! Provides a menu-driven interface with paginated thread selection using
//! `dialoguer`.

use std::fmt::Write as _;

use dialoguer::{Confirm, Input, Select};

use crate::{CheckpointStore, CheckpointSummary, format_transcript};

/// Number of threads to display per page in the picker.
const PAGE_SIZE: u32 = 20;

/// Top-level actions in the interactive menu.
enum ThreadAction {
    List,
    Show,
    Export,
    Delete,
}

impl ThreadAction {
    const ALL: &[Self] = &[Self::List, Self::Show, Self::Export, Self::Delete];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::List => "List recent threads",
            Self::Show => "Show a thread",
            Self::Export => "Export a thread (JSON)",
            Self::Delete => "Delete a thread",
        }
    }
}

/// Runs the interactive menu against `store`.
///
/// # Errors
///
/// Returns an error if user prompts or any store operation fails.
pub async fn run(store: &dyn CheckpointStore) -> Result<(), Box<dyn std::error::Error>> {
    let labels: Vec<&str> = ThreadAction::ALL.iter().map(ThreadAction::label).collect();

    let idx = Select::new()
        .with_prompt("Threads")
        .items(&labels)
        .default(0)
        .interact()?;

    match ThreadAction::ALL[idx] {
        ThreadAction::List => handle_list(store).await?,
        ThreadAction::Show => handle_show(store).await?,
        ThreadAction::Export => handle_export(store).await?,
        ThreadAction::Delete => handle_delete(store).await?,
    }

    Ok(())
}

/// Renders thread summaries as a fixed-width table.
#[must_use]
pub fn format_table(threads: &[CheckpointSummary]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{:<38} {:<6} {:<22} TITLE", "THREAD", "MSGS", "UPDATED");
    let _ = writeln!(output, "{}", "-".repeat(100));

    for thread in threads {
        let title = thread.title.as_deref().unwrap_or("(no title)");
        let display_title = shorten(title, 50);
        let short_date: String = thread.updated_at.chars().take(19).collect();

        let _ = writeln!(
            output,
            "{:<38} {:<6} {:<22} {}",
            thread.thread_id, thread.message_count, short_date, display_title
        );
    }

    output
}

fn shorten(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", s.chars().take(max - 3).collect::<String>())
    } else {
        s.to_string()
    }
}

async fn handle_list(store: &dyn CheckpointStore) -> Result<(), Box<dyn std::error::Error>> {
    let limit_str: String = Input::new()
        .with_prompt("Max threads to show")
        .default("20".to_string())
        .interact_text()?;
    let limit: u32 = limit_str.parse().unwrap_or(20);

    let threads = store.list(limit, 0).await?;

    if threads.is_empty() {
        println!("No threads found.");
        return Ok(());
    }

    println!();
    print!("{}", format_table(&threads));
    println!("\n{} thread(s)", threads.len());
    Ok(())
}

async fn handle_show(store: &dyn CheckpointStore) -> Result<(), Box<dyn std::error::Error>> {
    let Some(thread_id) = pick_thread(store).await? else {
        return Ok(());
    };

    if let Some(state) = store.load(&thread_id).await? {
        println!("\nThread: {thread_id}");
        println!("Status: {:?}\n", state.status);
        print!("{}", format_transcript(&state.messages));
    } else {
        println!("Thread not found.");
    }

    Ok(())
}

async fn handle_export(store: &dyn CheckpointStore) -> Result<(), Box<dyn std::error::Error>> {
    let Some(thread_id) = pick_thread(store).await? else {
        return Ok(());
    };

    if let Some(state) = store.load(&thread_id).await? {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        println!("Thread not found.");
    }

    Ok(())
}

async fn handle_delete(store: &dyn CheckpointStore) -> Result<(), Box<dyn std::error::Error>> {
    let Some(thread_id) = pick_thread(store).await? else {
        return Ok(());
    };

    let confirmed = Confirm::new()
        .with_prompt(format!("Delete thread {thread_id}?"))
        .default(false)
        .interact()?;

    if !confirmed {
        println!("Cancelled.");
    } else if store.delete(&thread_id).await? {
        println!("Deleted.");
    } else {
        println!("Thread not found.");
    }

    Ok(())
}

/// Navigation entries mixed into the picker.
enum PickerItem {
    Thread(usize),
    PreviousPage,
    NextPage,
}

/// Presents a paginated `Select` menu of threads.
///
/// Returns `None` if there are no threads.
async fn pick_thread(
    store: &dyn CheckpointStore,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let total = u32::try_from(store.count().await?).unwrap_or(u32::MAX);

    if total == 0 {
        println!("No threads found.");
        return Ok(None);
    }

    let total_pages = total.div_ceil(PAGE_SIZE);
    let mut page = 0u32;

    loop {
        let threads = store.list(PAGE_SIZE, page * PAGE_SIZE).await?;

        if threads.is_empty() {
            println!("No threads on this page.");
            return Ok(None);
        }

        let (labels, items) = build_picker_page(&threads, page, total_pages, total);

        let idx = Select::new()
            .with_prompt(format!("Select a thread (page {}/{})", page + 1, total_pages))
            .items(&labels)
            .default(usize::from(page > 0))
            .interact()?;

        match &items[idx] {
            PickerItem::Thread(i) => return Ok(Some(threads[*i].thread_id.clone())),
            PickerItem::PreviousPage => page = page.saturating_sub(1),
            PickerItem::NextPage => page += 1,
        }
    }
}

fn build_picker_page(
    threads: &[CheckpointSummary],
    page: u32,
    total_pages: u32,
    total_count: u32,
) -> (Vec<String>, Vec<PickerItem>) {
    let mut labels = Vec::new();
    let mut items = Vec::new();

    if page > 0 {
        labels.push(format!("\u{2190} Previous page ({total_count} total threads)"));
        items.push(PickerItem::PreviousPage);
    }

    for (i, thread) in threads.iter().enumerate() {
        let title = shorten(thread.title.as_deref().unwrap_or("(no title)"), 60);
        let short_id: String = thread.thread_id.chars().take(8).collect();
        labels.push(format!("{short_id}  {title} ({} msgs)", thread.message_count));
        items.push(PickerItem::Thread(i));
    }

    if page + 1 < total_pages {
        labels.push(format!("Next page \u{2192} ({total_count} total threads)"));
        items.push(PickerItem::NextPage);
    }

    (labels, items)
}
