use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use scene_embed::component::decide_display;
use scene_embed::constants::{RUNTIME_SCRIPT_URL, RUNTIME_VERSION};
use scene_embed::{EmbedError, Fingerprint, SceneProps};

#[derive(Parser)]
#[command(name = "scene-embed", version)]
#[command(about = "Inspect and preview embedded scene configurations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a props file and print the config the runtime would receive
    Check {
        /// Props file (JSON, camelCase keys)
        file: PathBuf,

        /// Element id to bind the scene to
        #[arg(long, default_value = "scene-preview")]
        element: String,
    },

    /// Render the container markup for a props file
    Render {
        /// Props file (JSON, camelCase keys)
        file: PathBuf,

        /// Element id of the container
        #[arg(long, default_value = "scene-preview")]
        element: String,

        /// Lifecycle state to render
        #[arg(long, value_enum, default_value_t = PreviewState::Ready)]
        state: PreviewState,

        /// Raw error message for the failed state (sanitized before display)
        #[arg(long)]
        error: Option<String>,

        /// Render as if the browser had no WebGL support
        #[arg(long)]
        no_webgl: bool,

        /// Write output to file instead of stdout
        #[arg(short)]
        o: Option<PathBuf>,
    },

    /// Print the pinned runtime script URL
    Url,
}

/// Component state to preview.
#[derive(Clone, Copy, ValueEnum)]
enum PreviewState {
    /// Script or scene still loading
    Loading,
    /// Scene created
    Ready,
    /// Script load or scene initialization failed
    Failed,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Check { file, element } => {
            let props = read_props(&file)?;
            let config = scene_embed::check_props(&props, &element)
                .with_context(|| format!("invalid props in '{}'", file.display()))?;
            eprintln!("fingerprint: {}", Fingerprint::of(&props));
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Render {
            file,
            element,
            state,
            error,
            no_webgl,
            o,
        } => {
            let props = read_props(&file)?;
            let error = match state {
                PreviewState::Failed => Some(preview_error(&props, error.as_deref())),
                PreviewState::Loading | PreviewState::Ready => None,
            };
            let ready = matches!(state, PreviewState::Ready);
            let display = decide_display(&props, !no_webgl, ready, error.as_ref());
            let html = scene_embed::render_static(&props, &element, &display);

            if let Some(out_path) = o {
                fs::write(&out_path, &html)
                    .with_context(|| format!("cannot write '{}'", out_path.display()))?;
                eprintln!("wrote container markup to {}", out_path.display());
            } else {
                println!("{html}");
            }
        }
        Commands::Url => {
            println!("{RUNTIME_SCRIPT_URL}");
            eprintln!("runtime version {RUNTIME_VERSION}");
        }
    }
    Ok(())
}

fn read_props(path: &Path) -> Result<SceneProps> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("cannot read '{}'", path.display()))?;
    SceneProps::from_json(&source).with_context(|| format!("cannot parse '{}'", path.display()))
}

/// The error a failed preview shows: the props' own problem if they have
/// one, else the given raw message, else a script load failure.
fn preview_error(props: &SceneProps, raw: Option<&str>) -> EmbedError {
    if let Err(e) = scene_embed::check_props(props, "preview") {
        return e;
    }
    match raw {
        Some(raw) => EmbedError::initialization(raw),
        None => EmbedError::ScriptLoad,
    }
}
