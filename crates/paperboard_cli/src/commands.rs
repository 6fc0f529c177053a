use anyhow::{anyhow, bail, Context, Result};
use log::info;
use paperboard_core::{
    Author, BoardConfig, BoardController, DayKey, Note, NoteId, NotePatch, Notifier, Position,
    SqliteNoteStore, REACTION_PALETTE,
};
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const ANIMATION_POLL: Duration = Duration::from_millis(10);

pub type Board = BoardController<SqliteNoteStore>;

/// Prints user-facing alerts to stderr.
struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn alert(&self, message: &str) {
        eprintln!("! {message}");
    }
}

pub fn open_board(path: &Path, config: BoardConfig) -> Result<Board> {
    let store = SqliteNoteStore::open(path)
        .with_context(|| format!("failed to open board `{}`", path.display()))?;
    info!("event=cli_open module=cli status=ok db={}", path.display());
    Ok(BoardController::new(
        Arc::new(store),
        config,
        Arc::new(StderrNotifier),
    ))
}

fn parse_author(value: &str) -> Result<Author> {
    Author::parse(value).ok_or_else(|| anyhow!("unknown author `{value}`; expected ziji or xu"))
}

fn parse_id(value: &str) -> Result<NoteId> {
    NoteId::parse_str(value.trim()).with_context(|| format!("invalid note id `{value}`"))
}

fn parse_day(value: Option<&str>) -> Result<DayKey> {
    match value {
        Some(value) => {
            DayKey::parse(value).ok_or_else(|| anyhow!("invalid day `{value}`; expected YYYY-MM-DD"))
        }
        None => Ok(DayKey::today()),
    }
}

pub async fn post(
    board: &Board,
    author: &str,
    reply_to: Option<&str>,
    text: &str,
    animate: bool,
) -> Result<()> {
    board.login(parse_author(author)?);
    board.load().await?;

    if let Some(parent) = reply_to {
        let parent = parse_id(parent)?;
        if !board.select_for_reply(Some(parent)) {
            bail!("no note with id {parent}");
        }
    }

    let Some(note) = board.create_note(text)? else {
        bail!("nothing to post");
    };
    if animate {
        type_out(board, note.id).await?;
    }
    board.settle().await;

    if board.store().get(note.id)?.is_none() {
        bail!("note {} was not saved", note.id);
    }
    println!("{}", note.id);
    Ok(())
}

async fn type_out(board: &Board, id: NoteId) -> Result<()> {
    let mut stdout = std::io::stdout();
    let mut printed = 0;
    loop {
        let revealing = board.read(|state| state.get(id).map(|note| note.is_revealing));
        let Some(shown) = board.displayed_text(id) else {
            break;
        };
        let fresh: String = shown.chars().skip(printed).collect();
        if !fresh.is_empty() {
            printed += fresh.chars().count();
            write!(stdout, "{fresh}")?;
            stdout.flush()?;
        }
        if revealing != Some(true) {
            break;
        }
        tokio::time::sleep(ANIMATION_POLL).await;
    }
    writeln!(stdout)?;
    Ok(())
}

pub async fn list(board: &Board, day: Option<&str>, all: bool) -> Result<()> {
    board.load().await?;
    let notes = if all {
        board.snapshot()
    } else {
        board.set_current_day(parse_day(day)?);
        board.visible_notes()
    };
    for note in &notes {
        print_note(note, 0);
    }
    if notes.is_empty() {
        println!("(no notes)");
    }
    Ok(())
}

pub async fn days(board: &Board) -> Result<()> {
    board.load().await?;
    let mut counts: BTreeMap<DayKey, usize> = BTreeMap::new();
    for note in board.snapshot() {
        *counts.entry(note.day_key()).or_default() += 1;
    }
    for day in board.available_days() {
        println!("{day}  {}", counts.get(&day).copied().unwrap_or_default());
    }
    Ok(())
}

pub async fn threads(board: &Board, day: Option<&str>) -> Result<()> {
    board.load().await?;
    board.set_current_day(parse_day(day)?);
    let notes = board.visible_notes();
    let present: HashSet<NoteId> = notes.iter().map(|note| note.id).collect();

    let mut children: BTreeMap<NoteId, Vec<&Note>> = BTreeMap::new();
    let mut roots = Vec::new();
    for note in &notes {
        match note.reply_to.filter(|parent| present.contains(parent)) {
            Some(parent) => children.entry(parent).or_default().push(note),
            None => roots.push(note),
        }
    }

    let mut stack: Vec<(&Note, usize)> = roots.into_iter().rev().map(|note| (note, 0)).collect();
    while let Some((note, depth)) = stack.pop() {
        print_note(note, depth);
        if let Some(replies) = children.get(&note.id) {
            stack.extend(replies.iter().rev().map(|reply| (*reply, depth + 1)));
        }
    }
    Ok(())
}

pub async fn react(board: &Board, id: &str, emoji: &str, author: &str) -> Result<()> {
    board.login(parse_author(author)?);
    board.load().await?;
    let id = parse_id(id)?;
    if !board.react_to_note(id, emoji)? {
        bail!("no note with id {id}");
    }
    board.settle().await;
    Ok(())
}

pub async fn move_note(board: &Board, id: &str, x: f64, y: f64) -> Result<()> {
    board.load().await?;
    let id = parse_id(id)?;
    let target = Position::new(x, y);
    if !board.update_note(id, NotePatch::position(target))? {
        bail!("no note with id {id}");
    }
    board.settle().await;

    let saved = board.store().get(id)?.map(|note| note.position);
    if saved != Some(target) {
        bail!("move of {id} was not saved");
    }
    Ok(())
}

pub async fn delete(board: &Board, id: &str) -> Result<()> {
    board.load().await?;
    let id = parse_id(id)?;
    if !board.delete_note(id) {
        bail!("no note with id {id}");
    }
    board.settle().await;

    if board.store().get(id)?.is_some() {
        bail!("delete of {id} was not saved");
    }
    Ok(())
}

pub fn palette() {
    println!("{}", REACTION_PALETTE.join(" "));
}

fn print_note(note: &Note, depth: usize) {
    let indent = "  ".repeat(depth);
    let marker = if depth > 0 { "↳ " } else { "" };
    println!(
        "{indent}{marker}{}  {}  {:<4}  ({:.0}, {:.0})  {}",
        note.id,
        note.day_key(),
        note.author.as_str(),
        note.position.x,
        note.position.y,
        note.text.replace('\n', " ")
    );
    if !note.reactions.is_empty() {
        let reactions: Vec<String> = note
            .reactions
            .iter()
            .map(|reaction| format!("{}·{}", reaction.emoji, reaction.author))
            .collect();
        println!("{indent}    {}", reactions.join(" "));
    }
}
