//! CLI for Plates - five camera perspectives from one photograph.

use clap::{Args, Parser, Subcommand, ValueEnum};
use plates::grid::{self, ResultGrid};
use plates::modal::{ClickTarget, ImageModal, Key, ModalAction, ModalScope, Viewport};
use plates::upload::{DragEvent, UploadSurface};
use plates::{GeminiClient, GeminiModel, Orchestrator, Session};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "plates")]
#[command(about = "Generate five camera-perspective master plates from one photo via Gemini")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Gemini model to use
    #[arg(long, value_enum, global = true, default_value = "nano-banana")]
    model: ModelArg,

    /// Retries per call on transient failures
    #[arg(long, global = true, default_value_t = 0)]
    retries: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// List the shot profiles
    Shots,

    /// Generate all five plates and save them
    Generate(GenerateArgs),

    /// Interactive session: generate, refine and download plates
    Shell(ShellArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// Source image (PNG, JPEG or WebP)
    image: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    output: PathBuf,
}

#[derive(Args)]
struct ShellArgs {
    /// Source image to start with
    image: Option<PathBuf>,

    /// Default download directory
    #[arg(short, long, default_value = ".")]
    output: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    NanoBanana,
    NanoBananaPreview,
}

impl From<ModelArg> for GeminiModel {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::NanoBanana => GeminiModel::NanoBanana,
            ModelArg::NanoBananaPreview => GeminiModel::NanoBananaPreview,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Shots => list_shots(cli.json)?,
        Commands::Generate(ref args) => {
            let orchestrator = build_orchestrator(&cli)?;
            generate(&orchestrator, args, cli.json).await?;
        }
        Commands::Shell(ref args) => {
            let orchestrator = build_orchestrator(&cli)?;
            run_shell(orchestrator, args).await?;
        }
    }

    Ok(())
}

fn build_orchestrator(cli: &Cli) -> anyhow::Result<Orchestrator> {
    let client = GeminiClient::builder().model(cli.model.into()).build()?;
    Ok(Orchestrator::new(Arc::new(client)).with_retries(cli.retries))
}

fn list_shots(json_output: bool) -> anyhow::Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(plates::shots::all())?);
        return Ok(());
    }
    for (i, shot) in plates::shots::all().iter().enumerate() {
        println!("{}. {} ({})", i + 1, shot.name, shot.lens);
        println!("   {}", shot.description);
    }
    Ok(())
}

async fn generate(
    orchestrator: &Orchestrator,
    args: &GenerateArgs,
    json_output: bool,
) -> anyhow::Result<()> {
    orchestrator.upload(&args.image).await?;
    let summary = orchestrator.generate_all().await?;

    tokio::fs::create_dir_all(&args.output).await?;
    let session = orchestrator.snapshot();
    let mut results = Vec::with_capacity(session.slots().len());
    for (index, slot) in session.slots().iter().enumerate() {
        let saved = if grid::can_download(slot) {
            Some(grid::download(slot, &args.output).await?)
        } else {
            None
        };
        results.push((index, slot, saved));
    }

    if json_output {
        let shots: Vec<_> = results
            .iter()
            .map(|(index, slot, saved)| {
                serde_json::json!({
                    "index": index,
                    "shot": slot.profile.name,
                    "lens": slot.profile.lens,
                    "success": saved.is_some(),
                    "output": saved.as_ref().map(|p| p.display().to_string()),
                })
            })
            .collect();
        let result = serde_json::json!({
            "generator": orchestrator.generator_name(),
            "summary": summary,
            "shots": shots,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for (index, slot, saved) in &results {
            match saved {
                Some(path) => println!(
                    "[{}] {} ({}): {}",
                    index + 1,
                    slot.profile.name,
                    slot.profile.lens,
                    path.display()
                ),
                None => println!(
                    "[{}] {} ({}): no image",
                    index + 1,
                    slot.profile.name,
                    slot.profile.lens
                ),
            }
        }
        println!(
            "Generated {} of {} plates via {}",
            summary.succeeded,
            summary.succeeded + summary.failed,
            orchestrator.generator_name()
        );
    }

    Ok(())
}

/// Terminal stand-in for the enlarged view's host resources.
///
/// The scroll lock holds back progress output; key capture routes input
/// lines to the open view.
#[derive(Default)]
struct TerminalViewport {
    key_capture: Arc<AtomicBool>,
    scroll_locked: Arc<AtomicBool>,
}

impl Viewport for TerminalViewport {
    fn set_key_capture(&mut self, enabled: bool) {
        self.key_capture.store(enabled, Ordering::SeqCst);
    }

    fn set_scroll_locked(&mut self, locked: bool) {
        self.scroll_locked.store(locked, Ordering::SeqCst);
    }
}

const SHELL_HELP: &str = "\
commands:
  upload PATH        load a new source image
  drop PATH          same as upload, through the drop zone
  generate           generate all five plates
  status             show the grid
  prompt N           show or hide the prompt of plate N
  edit N [TEXT]      start editing the prompt of plate N
  draft N TEXT       replace the prompt draft of plate N
  save N             regenerate plate N with its draft
  cancel N           discard the draft of plate N
  show N             open plate N in the enlarged view
  download N [DIR]   save plate N
  help               this text
  quit               leave";

async fn run_shell(orchestrator: Orchestrator, args: &ShellArgs) -> anyhow::Result<()> {
    let mut viewport = TerminalViewport::default();
    let printer = tokio::spawn(print_progress(
        orchestrator.subscribe(),
        viewport.scroll_locked.clone(),
    ));

    let mut surface = UploadSurface::new();
    let mut grid = ResultGrid::new();
    if let Some(path) = surface.pick(args.image.iter().cloned().collect()) {
        orchestrator.upload(&path).await?;
    }

    println!("{SHELL_HELP}\n(accepts {})", UploadSurface::accept_filter());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        grid.sync(&orchestrator.snapshot());

        match command {
            "" => {}
            "quit" | "exit" => break,
            "help" => println!("{SHELL_HELP}"),
            "upload" => {
                if let Some(path) = surface.pick(vec![PathBuf::from(rest)]) {
                    upload(&orchestrator, &path).await;
                }
            }
            "drop" => {
                surface.drag(DragEvent::Enter);
                let outcome = surface.drag(DragEvent::Drop(vec![PathBuf::from(rest)]));
                if let Some(path) = outcome.file {
                    upload(&orchestrator, &path).await;
                }
            }
            "generate" => {
                let snapshot = orchestrator.snapshot();
                if snapshot.is_loading() {
                    println!("already generating");
                    continue;
                }
                let orchestrator = orchestrator.clone();
                tokio::spawn(async move {
                    // Outcomes are recorded in the session and printed by the progress task.
                    let _ = orchestrator.generate_all().await;
                });
            }
            "status" => print!("{}", grid.render(&orchestrator.snapshot())),
            "prompt" | "edit" | "draft" | "save" | "cancel" | "show" | "download" => {
                let (number, text) = rest.split_once(' ').unwrap_or((rest, ""));
                let Some(index) = parse_plate(number, grid.tiles().len()) else {
                    println!("expected a plate number between 1 and {}", grid.tiles().len());
                    continue;
                };
                handle_tile_command(
                    &orchestrator,
                    &mut grid,
                    &mut viewport,
                    &mut lines,
                    command,
                    index,
                    text.trim(),
                    &args.output,
                )
                .await?;
            }
            other => println!("unknown command: {other} (try help)"),
        }
    }

    printer.abort();
    Ok(())
}

async fn upload(orchestrator: &Orchestrator, path: &Path) {
    match orchestrator.upload(path).await {
        Ok(()) => println!("loaded {}", path.display()),
        Err(e) => println!("could not read {}: {e}", path.display()),
    }
}

fn parse_plate(text: &str, count: usize) -> Option<usize> {
    let n: usize = text.parse().ok()?;
    (1..=count).contains(&n).then(|| n - 1)
}

#[allow(clippy::too_many_arguments)]
async fn handle_tile_command<R>(
    orchestrator: &Orchestrator,
    grid: &mut ResultGrid,
    viewport: &mut TerminalViewport,
    lines: &mut tokio::io::Lines<R>,
    command: &str,
    index: usize,
    text: &str,
    output: &Path,
) -> anyhow::Result<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let session = orchestrator.snapshot();
    let Some(slot) = session.slot(index) else {
        return Ok(());
    };
    let Some(tile) = grid.tile_mut(index) else {
        return Ok(());
    };

    match command {
        "prompt" => {
            tile.toggle_prompt();
            print!("{}", grid.render(&session));
        }
        "edit" => {
            tile.begin_edit();
            if !text.is_empty() {
                tile.set_draft(text);
            }
            println!("draft: {}", tile.edited_prompt());
        }
        "draft" => {
            if !tile.is_editing() {
                tile.begin_edit();
            }
            tile.set_draft(text);
        }
        "save" => {
            if !tile.is_editing() {
                println!("plate {} is not being edited", index + 1);
                return Ok(());
            }
            let command = tile.save();
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                let _ = orchestrator
                    .regenerate(command.index, command.prompt)
                    .await;
            });
        }
        "cancel" => tile.cancel(slot),
        "show" => show_modal(orchestrator, viewport, lines, index).await?,
        "download" => {
            if !grid::can_download(slot) {
                println!("plate {} has no image to download", index + 1);
                return Ok(());
            }
            let dir = if text.is_empty() {
                output.to_path_buf()
            } else {
                PathBuf::from(text)
            };
            tokio::fs::create_dir_all(&dir).await?;
            let path = grid::download(slot, &dir).await?;
            println!("saved {}", path.display());
        }
        _ => {}
    }
    Ok(())
}

async fn show_modal<R>(
    orchestrator: &Orchestrator,
    viewport: &mut TerminalViewport,
    lines: &mut tokio::io::Lines<R>,
    index: usize,
) -> anyhow::Result<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    if !orchestrator.select(index) {
        println!("plate {} has no image yet", index + 1);
        return Ok(());
    }
    let session = orchestrator.snapshot();
    let Some(modal) = session.selected().and_then(ImageModal::new) else {
        orchestrator.close_modal();
        return Ok(());
    };

    let keys = viewport.key_capture.clone();
    let mut scope = Some(ModalScope::enter(viewport));
    let size = modal.image().decode().map(|b| b.len()).unwrap_or(0);
    println!("+-- {} | {}", modal.lens(), modal.title());
    println!("|   {} image, {} bytes", modal.image().mime_type(), size);
    println!("|   {}", modal.caption());
    println!("+-- [esc] or empty line closes, 'backdrop' clicks outside, 'content' clicks inside");

    while keys.load(Ordering::SeqCst) {
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let action = match line.trim() {
            "esc" | "escape" => modal.on_key(Key::Escape),
            "" => modal.on_click(ClickTarget::CloseButton),
            "backdrop" => modal.on_click(ClickTarget::Backdrop),
            "content" => modal.on_click(ClickTarget::Content),
            _ => modal.on_key(Key::Other),
        };
        if action == ModalAction::Close {
            scope.take();
        }
    }

    drop(scope);
    orchestrator.close_modal();
    Ok(())
}

/// Prints slot transitions and errors as the session changes.
///
/// Nothing is printed while the enlarged view holds the scroll lock; the
/// backlog is reported on the next change after it closes.
async fn print_progress(
    mut rx: tokio::sync::watch::Receiver<Session>,
    scroll_locked: Arc<AtomicBool>,
) {
    let mut shown = rx.borrow_and_update().clone();
    while rx.changed().await.is_ok() {
        if scroll_locked.load(Ordering::SeqCst) {
            continue;
        }
        let current = rx.borrow_and_update().clone();

        if current.batch_id() != shown.batch_id() && current.is_loading() {
            println!("generating {} plates...", current.slots().len());
        }
        for (index, slot) in current.slots().iter().enumerate() {
            let was_loading = shown
                .slot(index)
                .filter(|_| shown.batch_id() == current.batch_id())
                .map(|s| s.is_loading)
                .unwrap_or(true);
            if was_loading && !slot.is_loading {
                let state = if slot.has_image() { "ready" } else { "no image" };
                println!("[{}] {}: {state}", index + 1, slot.profile.name);
            } else if !was_loading && slot.is_loading {
                println!("[{}] {}: regenerating", index + 1, slot.profile.name);
            }
        }
        if current.error().is_some() && current.error() != shown.error() {
            println!("Error: {}", current.error().unwrap_or_default());
        }

        shown = current;
    }
}
