use crate::assets::{DirEmblems, EmblemSource, KeyLocalizer, NoEmblems};
use crate::config::load_settings;
use crate::map::compute_map;
use crate::model::GameState;
use crate::render::{MapOutput, render_svg};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "starmap",
    version,
    about = "Political map renderer for galaxy save snapshots"
)]
pub struct Args {
    /// Save snapshot file or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Map settings file (JSON5)
    #[arg(short = 's', long = "settings")]
    pub settings: Option<PathBuf>,

    /// Country id whose intel masks the map (terra incognita)
    #[arg(long = "perspective")]
    pub perspective: Option<i64>,

    /// Emblem image directory, laid out as <dir>/<category>/<file>
    #[arg(long = "emblems")]
    pub emblems: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Path data and render flags as JSON.
    Json,
    /// Debug SVG preview.
    Svg,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings(args.settings.as_deref())?;
    if let Some(perspective) = args.perspective {
        settings.perspective_country = Some(perspective);
    }

    let emblem_source: Box<dyn EmblemSource> = match &args.emblems {
        Some(dir) => Box::new(DirEmblems::new(dir)),
        None => Box::new(NoEmblems),
    };

    let raw = read_input(args.input.as_deref())?;
    let state = GameState::from_text(&raw)?;
    let model = compute_map(&state, &settings, &KeyLocalizer, emblem_source.as_ref());
    let output = MapOutput::from_model(&model);

    let rendered = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&output)?,
        OutputFormat::Svg => render_svg(&output, &settings),
    };
    write_output(&rendered, args.output.as_deref())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path == Path::new("-") {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            return Ok(buf);
        }
        return Ok(std::fs::read_to_string(path)?);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn write_output(rendered: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, rendered)?,
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(rendered.as_bytes())?;
            handle.write_all(b"\n")?;
        }
    }
    Ok(())
}
