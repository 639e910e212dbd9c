use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use facade_contracts::asset::ImageAsset;
use facade_contracts::commands::{
    parse_command, parse_points, ModeChoice, SessionCommand, ViewChoice, SESSION_HELP,
};
use facade_contracts::errors::Result as FacadeResult;
use facade_contracts::events::EventWriter;
use facade_contracts::providers::ProviderKind;
use facade_contracts::results::{GeneratedResult, ResultKind};
use facade_contracts::styles::{DEFAULT_STYLE, ENHANCEMENT_STYLES};
use facade_engine::mask::Point;
use facade_engine::{
    build_provider, EngineConfig, EnhanceMode, RetryingInvoker, SessionController, View,
};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "facade",
    version,
    about = "Architectural rendering enhancement and masked edits"
)]
struct Cli {
    /// Overrides FACADE_PROVIDER (gemini, openai, dryrun).
    #[arg(long, global = true)]
    provider: Option<ProviderKind>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Generate(GenerateArgs),
    Edit(EditArgs),
    Refine(RefineArgs),
    Styles,
    Session(SessionArgs),
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value = "")]
    style: String,
    #[arg(long, default_value = "2K")]
    resolution: String,
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EditMode {
    Enhance,
    Edit,
}

#[derive(Debug, Parser)]
struct EditArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long, value_enum, default_value_t = EditMode::Enhance)]
    mode: EditMode,
    #[arg(long, default_value = DEFAULT_STYLE)]
    style: String,
    #[arg(long)]
    prompt: Option<String>,
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u8).range(1..=100))]
    intensity: u8,
    #[arg(long)]
    overlay: Option<PathBuf>,
    /// Mask stroke as "x,y x,y ..." in display coordinates. Repeatable.
    #[arg(long = "stroke")]
    strokes: Vec<String>,
    #[arg(long)]
    brush_radius: Option<f32>,
    /// Display geometry the strokes were drawn against, as WxH.
    #[arg(long)]
    display: Option<String>,
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Parser)]
struct RefineArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value = "")]
    context: String,
}

#[derive(Debug, Parser)]
struct SessionArgs {
    #[arg(long)]
    events: Option<PathBuf>,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("facade error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("FACADE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Generate(args) => run_generate(cli.provider, args),
        Command::Edit(args) => run_edit(cli.provider, args),
        Command::Refine(args) => run_refine(cli.provider, args),
        Command::Styles => {
            for style in ENHANCEMENT_STYLES {
                println!("{:<20} {}", style.label, style.description);
            }
            Ok(0)
        }
        Command::Session(args) => {
            run_session(cli.provider, args)?;
            Ok(0)
        }
    }
}

fn build_session(
    provider: Option<ProviderKind>,
    events: Option<&Path>,
) -> Result<SessionController> {
    let mut config = EngineConfig::from_env().context("failed to load configuration")?;
    if let Some(provider) = provider {
        config = config.with_provider(provider);
    }
    let invoker = RetryingInvoker::new(config.retry);
    let mut session = SessionController::new(build_provider(&config)?, invoker);
    if let Some(path) = events {
        session = session.with_events(EventWriter::for_new_session(path));
    }
    info!(provider = session.provider_name(), "session ready");
    Ok(session)
}

fn run_generate(provider: Option<ProviderKind>, args: GenerateArgs) -> Result<i32> {
    let mut session = build_session(provider, None)?;
    let result = session.generate(&args.prompt, &args.style, &args.resolution)?;
    write_result(&result, &args.out)?;
    Ok(0)
}

fn run_edit(provider: Option<ProviderKind>, args: EditArgs) -> Result<i32> {
    let mut session = build_session(provider, None)?;
    session.set_view(View::Enhance);
    session.upload_base_image(ImageAsset::from_path(&args.image)?)?;
    session.select_style(&args.style)?;
    session.set_intensity(args.intensity);
    if let Some(overlay) = args.overlay.as_deref() {
        session.set_overlay(ImageAsset::from_path(overlay)?)?;
    }

    match args.mode {
        EditMode::Enhance => {
            session.set_mode(EnhanceMode::Enhancement);
            if !args.strokes.is_empty() {
                warn!("strokes are ignored in enhance mode");
            }
        }
        EditMode::Edit => {
            session.set_mode(EnhanceMode::GuidedEdit);
            if let Some(display) = args.display.as_deref() {
                let (width, height) = parse_display(display)?;
                session.resize_display(width, height);
            }
            if let Some(radius) = args.brush_radius {
                session.mask_mut().set_brush_radius(radius);
            }
            for stroke in &args.strokes {
                let points = stroke_points(stroke)?;
                session.draw_display_stroke(&points);
            }
        }
    }

    let result = session.process(args.prompt.as_deref())?;
    write_result(&result, &args.out)?;
    Ok(0)
}

fn run_refine(provider: Option<ProviderKind>, args: RefineArgs) -> Result<i32> {
    let mut session = build_session(provider, None)?;
    let suggestions = session.refine_prompt(&args.prompt, &args.context)?;
    for (idx, suggestion) in suggestions.iter().enumerate() {
        println!("{}. {suggestion}", idx + 1);
    }
    Ok(0)
}

fn run_session(provider: Option<ProviderKind>, args: SessionArgs) -> Result<()> {
    let mut session = build_session(provider, args.events.as_deref())?;
    let mut create_style = String::new();
    let mut resolution = "2K".to_string();

    let stdin = io::stdin();
    let mut line = String::new();
    println!(
        "Facade session started ({}). Type /help for commands.",
        session.provider_name()
    );

    loop {
        print!("[{}]> ", session.view().as_str());
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let command = parse_command(line.trim_end_matches(['\n', '\r']));
        match command {
            SessionCommand::Noop => {}
            SessionCommand::Quit => break,
            SessionCommand::Help => {
                for entry in SESSION_HELP {
                    println!("  {}", entry.usage);
                }
                println!("  plain text: generate (create view) or set the edit instruction");
            }
            SessionCommand::Status => {
                let mut status = session.status();
                status["create_style"] = json!(create_style);
                status["resolution"] = json!(resolution);
                println!("{}", serde_json::to_string_pretty(&status)?);
            }
            SessionCommand::SetView(choice) => {
                session.set_view(match choice {
                    ViewChoice::Create => View::Create,
                    ViewChoice::Enhance => View::Enhance,
                });
                println!("View: {}", session.view().as_str());
            }
            SessionCommand::SetMode(choice) => {
                session.set_mode(match choice {
                    ModeChoice::Enhancement => EnhanceMode::Enhancement,
                    ModeChoice::GuidedEdit => EnhanceMode::GuidedEdit,
                });
                println!("Mode: {}", session.mode().as_str());
            }
            SessionCommand::SetStyle(label) => {
                if session.view() == View::Create {
                    create_style = label;
                    println!("Create style: {create_style}");
                } else if let Ok(style) = report(session.select_style(&label)) {
                    println!("Style: {}", style.label);
                }
            }
            SessionCommand::SetResolution(value) => {
                resolution = value;
                println!("Resolution: {resolution}");
            }
            SessionCommand::SetIntensity(value) => {
                println!("Intensity: {}", session.set_intensity(value));
            }
            SessionCommand::SetBrush(radius) => {
                session.mask_mut().set_brush_radius(radius);
                println!("Brush radius: {}", session.mask().brush_radius());
            }
            SessionCommand::Upload(path) => {
                let uploaded = ImageAsset::from_path(Path::new(&path))
                    .and_then(|asset| session.upload_base_image(asset));
                if report(uploaded).is_ok() {
                    println!(
                        "Base image: {path} (undo depth {})",
                        session.history().count()
                    );
                }
            }
            SessionCommand::Overlay(path) => {
                let loaded = ImageAsset::from_path(Path::new(&path))
                    .and_then(|asset| session.set_overlay(asset));
                if report(loaded).is_ok() {
                    println!("Overlay: {path}");
                }
            }
            SessionCommand::ClearOverlay => {
                session.clear_overlay();
                println!("Overlay cleared");
            }
            SessionCommand::RemoveBase => {
                session.remove_base_image();
                println!("Base image removed");
            }
            SessionCommand::Stroke(points) => {
                if !session.mask().is_enabled() {
                    println!("Mask drawing needs guided edit mode with a base image in the enhance view");
                    continue;
                }
                let points: Vec<Point> = points.into_iter().map(Point::from).collect();
                session.draw_display_stroke(&points);
                println!("Mask coverage: {} px", session.mask().covered_pixels());
            }
            SessionCommand::ClearMask => {
                session.mask_mut().clear();
                println!("Mask cleared");
            }
            SessionCommand::Generate(prompt) => {
                if let Ok(result) = report(session.generate(&prompt, &create_style, &resolution)) {
                    print_result(&result);
                }
            }
            SessionCommand::Process(prompt) => {
                if let Ok(result) = report(session.process(prompt.as_deref())) {
                    print_result(&result);
                }
            }
            SessionCommand::Prompt(text) => match session.view() {
                View::Create => {
                    if let Ok(result) = report(session.generate(&text, &create_style, &resolution))
                    {
                        print_result(&result);
                    }
                }
                View::Enhance => {
                    session.set_edit_prompt(&text);
                    println!("Edit instruction set; /process to submit");
                }
            },
            SessionCommand::Refine(text) => {
                let context = match session.view() {
                    View::Create => create_style.clone(),
                    View::Enhance => session.style().label.to_string(),
                };
                if let Ok(suggestions) = report(session.refine_prompt(&text, &context)) {
                    for (idx, suggestion) in suggestions.iter().enumerate() {
                        println!("  {}. {suggestion}", idx + 1);
                    }
                }
            }
            SessionCommand::UseSuggestion(index) => {
                if let Ok(text) = report(session.apply_suggestion(index)) {
                    println!("Edit instruction: {text}");
                }
            }
            SessionCommand::Regenerate => {
                if let Ok(result) = report(session.regenerate()) {
                    print_result(&result);
                }
            }
            SessionCommand::Continue => {
                if report(session.continue_editing()).is_ok() {
                    println!(
                        "Continuing from result (undo depth {})",
                        session.history().count()
                    );
                }
            }
            SessionCommand::SendToEnhance => {
                if report(session.send_to_enhance()).is_ok() {
                    println!("Sent to enhance; history reset");
                }
            }
            SessionCommand::Close => {
                session.close_result();
                println!("Result closed");
            }
            SessionCommand::Undo => {
                if session.undo() {
                    println!("Undone (undo depth {})", session.history().count());
                } else {
                    println!("Nothing to undo");
                }
            }
            SessionCommand::Save(path) => {
                let asset = session
                    .current_result()
                    .map(|result| &result.output_image)
                    .or_else(|| session.base_image());
                match asset {
                    Some(asset) => {
                        if report(asset.write_to(Path::new(&path))).is_ok() {
                            println!("Saved {path}");
                        }
                    }
                    None => println!("Nothing to save yet"),
                }
            }
            SessionCommand::Invalid { command, reason } => {
                println!("/{command}: {reason}");
            }
            SessionCommand::Unknown { command, .. } => {
                println!("Unknown command /{command}. Type /help.");
            }
        }
    }
    Ok(())
}

fn report<T>(outcome: FacadeResult<T>) -> FacadeResult<T> {
    if let Err(err) = &outcome {
        println!("error: {err}");
    }
    outcome
}

fn print_result(result: &GeneratedResult) {
    println!(
        "Result ready: {} ({} kind, {} bytes). /save <path>, /regenerate, /close{}",
        result.output_image.name,
        result.kind.as_str(),
        result.output_image.byte_len(),
        match result.kind {
            ResultKind::Create => ", /send_to_enhance",
            ResultKind::Enhance => ", /continue",
        }
    );
}

fn write_result(result: &GeneratedResult, out: &Path) -> Result<()> {
    result
        .output_image
        .write_to(out)
        .with_context(|| format!("failed writing {}", out.display()))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "out": out.display().to_string(),
            "result": result.manifest(),
        }))?
    );
    Ok(())
}

fn stroke_points(raw: &str) -> Result<Vec<Point>> {
    let points = parse_points(raw).map_err(|reason| anyhow!("--stroke '{raw}': {reason}"))?;
    Ok(points.into_iter().map(Point::from).collect())
}

fn parse_display(raw: &str) -> Result<(u32, u32)> {
    let parsed = raw
        .trim()
        .to_ascii_lowercase()
        .split_once('x')
        .and_then(|(width, height)| {
            Some((
                width.trim().parse::<u32>().ok()?,
                height.trim().parse::<u32>().ok()?,
            ))
        })
        .filter(|(width, height)| *width > 0 && *height > 0);
    parsed.ok_or_else(|| anyhow!("--display expects WxH, got '{raw}'"))
}
