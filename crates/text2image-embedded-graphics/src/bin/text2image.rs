use std::env;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use text2image_embedded_graphics::{EgRenderer, EmojiRegistry, OutputFormat};
use text2image_render::{GlyphProvider, NoGlyphs, RenderEngine, RenderOptions};

#[derive(Clone, Debug)]
struct Args {
    input: Option<String>,
    out: PathBuf,
    config: Option<String>,
    width: Option<u32>,
    scale: Option<u32>,
    emoji_dir: Option<String>,
    jpeg: bool,
    table_cards: bool,
    plan_json: Option<String>,
}

fn main() -> ExitCode {
    match run(env::args().collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("error: {}", msg);
            eprintln!("{}", help_text());
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), String> {
    let cfg = parse_args(args)?;

    let text = read_input(cfg.input.as_deref())?;
    let mut opts = match &cfg.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| format!("unable to read config '{}': {}", path, e))?;
            RenderOptions::from_json(&json).map_err(|e| e.to_string())?
        }
        None => RenderOptions::default(),
    };
    if let Some(width) = cfg.width {
        opts = opts.with_image_width(width);
    }
    if let Some(scale) = cfg.scale {
        opts = opts.with_image_scale(scale);
    }
    if cfg.table_cards {
        opts = opts.with_table_cards(true);
    }

    let mut registry = EmojiRegistry::new();
    if let Some(dir) = &cfg.emoji_dir {
        let loaded = registry
            .load_dir(dir)
            .map_err(|e| format!("unable to load emoji from '{}': {}", dir, e))?;
        println!("loaded {} emoji glyph(s) from {}", loaded, dir);
    }
    let glyphs: &dyn GlyphProvider = if registry.is_empty() {
        &NoGlyphs
    } else {
        &registry
    };

    let engine = RenderEngine::new(opts);
    let renderer: EgRenderer = EgRenderer::default();
    let plan = engine
        .render(&text, renderer.backend(), glyphs)
        .map_err(|e| e.to_string())?;

    if let Some(path) = &cfg.plan_json {
        let json = plan.to_json().map_err(|e| e.to_string())?;
        std::fs::write(path, json).map_err(|e| format!("unable to write '{}': {}", path, e))?;
    }

    let canvas = renderer.render_to_canvas(&plan);
    let format = if cfg.jpeg {
        OutputFormat::jpeg()
    } else {
        OutputFormat::from_path(&cfg.out)
    };
    canvas
        .save(&cfg.out, format)
        .map_err(|e| format!("unable to write '{}': {}", cfg.out.display(), e))?;
    println!(
        "rendered {}x{} image to {}",
        canvas.width(),
        canvas.height(),
        cfg.out.display()
    );
    Ok(())
}

fn read_input(input: Option<&str>) -> Result<String, String> {
    match input {
        None | Some("-") => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| format!("unable to read stdin: {}", e))?;
            Ok(text)
        }
        Some(path) => std::fs::read_to_string(Path::new(path))
            .map_err(|e| format!("unable to read '{}': {}", path, e)),
    }
}

fn parse_args(args: Vec<String>) -> Result<Args, String> {
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h") {
        return Err("help requested".to_string());
    }

    let has_positional_input = args
        .get(1)
        .is_some_and(|v| v == "-" || !v.starts_with("--"));
    let mut cfg = Args {
        input: has_positional_input.then(|| args[1].clone()),
        out: PathBuf::new(),
        config: None,
        width: None,
        scale: None,
        emoji_dir: None,
        jpeg: false,
        table_cards: false,
        plan_json: None,
    };
    let mut out = None;

    let mut i = if has_positional_input { 2usize } else { 1usize };
    while i < args.len() {
        match args[i].as_str() {
            "--out" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--out requires a value".to_string())?;
                out = Some(PathBuf::from(v));
                i += 2;
            }
            "--config" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--config requires a value".to_string())?;
                cfg.config = Some(v.clone());
                i += 2;
            }
            "--width" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--width requires a value".to_string())?;
                cfg.width = Some(
                    v.parse::<u32>()
                        .map_err(|_| format!("invalid --width value '{}'", v))?,
                );
                i += 2;
            }
            "--scale" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--scale requires a value".to_string())?;
                cfg.scale = Some(
                    v.parse::<u32>()
                        .map_err(|_| format!("invalid --scale value '{}'", v))?,
                );
                i += 2;
            }
            "--emoji-dir" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--emoji-dir requires a value".to_string())?;
                cfg.emoji_dir = Some(v.clone());
                i += 2;
            }
            "--plan-json" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--plan-json requires a value".to_string())?;
                cfg.plan_json = Some(v.clone());
                i += 2;
            }
            "--jpeg" => {
                cfg.jpeg = true;
                i += 1;
            }
            "--table-cards" => {
                cfg.table_cards = true;
                i += 1;
            }
            other => return Err(format!("unknown option '{}'", other)),
        }
    }

    cfg.out = out.ok_or_else(|| "--out is required".to_string())?;
    if cfg.width == Some(0) || cfg.scale == Some(0) {
        return Err("--width and --scale must be > 0".to_string());
    }
    Ok(cfg)
}

fn help_text() -> &'static str {
    "Usage: text2image [INPUT|-] --out PATH [options]\n\
     Renders markdown-flavored text into a PNG or JPEG image.\n\
     INPUT defaults to stdin.\n\
     \n\
     Options:\n\
       --out PATH          output image (.jpg/.jpeg selects JPEG)\n\
       --config JSON       render options file\n\
       --width N           logical image width\n\
       --scale N           integer output scale\n\
       --emoji-dir DIR     directory of <codepoints>.png emoji glyphs\n\
       --jpeg              force JPEG output (quality 80)\n\
       --table-cards       paint tables as cards\n\
       --plan-json PATH    also write the draw plan as JSON"
}
