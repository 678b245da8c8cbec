use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use dotenvy::dotenv;
use tracing::{debug, info};

mod catalog;
mod config;
mod generation;
mod llm;
mod print_sheet;
mod session;
mod utils;

use catalog::{BackgroundColor, ClothingOption, GenerationConfig, FACE_RATIO_PRESETS, PHOTO_SIZES};
use config::CONFIG;
use llm::media::is_image_mime;
use llm::GeminiClient;
use print_sheet::{download_file_name, render_print_sheet, save_print_sheet, SheetSettings};
use session::{GenerationOutcome, PhotoSession};
use utils::data_uri::DataUri;
use utils::logging::init_logging;

#[derive(Debug, Clone, PartialEq)]
enum CliCommand {
    Catalog,
    Generate(GenerateArgs),
}

#[derive(Debug, Clone, PartialEq)]
struct GenerateArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    print_sheet: Option<PathBuf>,
    preset: Option<PathBuf>,
    background: Option<BackgroundColor>,
    clothing: Option<ClothingOption>,
    size: Option<String>,
    face_ratio: Option<u32>,
}

fn usage() -> &'static str {
    "Usage:\n  id_photo_studio catalog\n  id_photo_studio generate --input <photo> [--output <file>] [--background white|blue|gray] [--clothing none|male-shirt|male-suit|female-shirt|female-suit] [--size 3x4|4x6|35x45|passport] [--face-ratio <percent>] [--preset <config.json>] [--print-sheet <file>]"
}

fn next_value<'a>(args: &'a [String], index: &mut usize, flag: &str) -> Result<&'a str> {
    *index += 1;
    args.get(*index)
        .map(|value| value.as_str())
        .ok_or_else(|| anyhow!("Missing value for {flag}"))
}

fn parse_generate_args(args: &[String]) -> Result<GenerateArgs> {
    let mut input = None;
    let mut output = None;
    let mut print_sheet = None;
    let mut preset = None;
    let mut background = None;
    let mut clothing = None;
    let mut size = None;
    let mut face_ratio = None;

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--input" | "-i" => {
                input = Some(PathBuf::from(next_value(args, &mut index, "--input")?));
            }
            "--output" | "-o" => {
                output = Some(PathBuf::from(next_value(args, &mut index, "--output")?));
            }
            "--print-sheet" => {
                print_sheet = Some(PathBuf::from(next_value(
                    args,
                    &mut index,
                    "--print-sheet",
                )?));
            }
            "--preset" => {
                preset = Some(PathBuf::from(next_value(args, &mut index, "--preset")?));
            }
            "--background" | "--bg" => {
                let value = next_value(args, &mut index, "--background")?;
                background = Some(value.parse::<BackgroundColor>()?);
            }
            "--clothing" => {
                let value = next_value(args, &mut index, "--clothing")?;
                clothing = Some(value.parse::<ClothingOption>()?);
            }
            "--size" => {
                size = Some(next_value(args, &mut index, "--size")?.trim().to_string());
            }
            "--face-ratio" => {
                let value = next_value(args, &mut index, "--face-ratio")?;
                face_ratio = Some(
                    value
                        .trim()
                        .trim_end_matches('%')
                        .parse::<u32>()
                        .map_err(|_| anyhow!("Invalid --face-ratio value: {value}"))?,
                );
            }
            "--help" | "-h" => bail!(usage()),
            other => bail!("Unknown generate argument: {other}\n{}", usage()),
        }
        index += 1;
    }

    let input = input.ok_or_else(|| anyhow!("--input is required\n{}", usage()))?;
    Ok(GenerateArgs {
        input,
        output,
        print_sheet,
        preset,
        background,
        clothing,
        size,
        face_ratio,
    })
}

fn parse_cli(args: &[String]) -> Result<CliCommand> {
    match args.get(1).map(|value| value.as_str()) {
        Some("catalog") => Ok(CliCommand::Catalog),
        Some("generate") => Ok(CliCommand::Generate(parse_generate_args(&args[2..])?)),
        Some("--help") | Some("-h") | None => bail!(usage()),
        Some(other) => bail!("Unknown command: {other}\n{}", usage()),
    }
}

fn load_preset(path: &Path) -> Result<GenerationConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read preset {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse preset {}", path.display()))
}

fn build_config(args: &GenerateArgs) -> Result<GenerationConfig> {
    let mut config = match &args.preset {
        Some(path) => load_preset(path)?,
        None => GenerationConfig::default(),
    };
    if let Some(background) = args.background {
        config.bg_color = background;
    }
    if let Some(clothing) = args.clothing {
        config.clothing = clothing;
    }
    if let Some(size) = &args.size {
        config.target_size_id = size.clone();
    }
    if let Some(face_ratio) = args.face_ratio {
        config.face_ratio = face_ratio;
    }
    config.validate()?;
    Ok(config)
}

fn print_catalog() {
    println!("Photo sizes:");
    for size in &PHOTO_SIZES {
        println!(
            "  {:<10} {:<16} ratio {:<8} {}x{} mm",
            size.id,
            size.label,
            size.ratio_label(),
            size.mm_width,
            size.mm_height
        );
    }
    println!("Backgrounds:");
    for color in BackgroundColor::ALL {
        println!("  {:<10} {:<16} {}", color.id(), color.label(), color.hex());
    }
    println!("Clothing:");
    for option in ClothingOption::ALL {
        println!(
            "  {:<14} {} {:<24} {}",
            option.id(),
            option.icon(),
            option.label(),
            option.description()
        );
    }
    println!("Face ratio presets:");
    for preset in FACE_RATIO_PRESETS {
        println!("  {:<10} {}%", preset.label, preset.percent);
    }
}

async fn read_source(path: &Path) -> Result<DataUri> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let source = DataUri::from_bytes(&bytes, "application/octet-stream");
    if !is_image_mime(source.mime_type()) {
        bail!(
            "{} is not a supported photo (detected {})",
            path.display(),
            source.mime_type()
        );
    }
    Ok(source)
}

async fn run_generate(args: GenerateArgs) -> Result<()> {
    let config = build_config(&args)?;
    let source = read_source(&args.input).await?;
    let model = GeminiClient::from_config(&CONFIG)?;

    let session = PhotoSession::with_config(config);
    session.load_source(source);
    let size = session.config().size();
    info!(
        "Generating {} ID photo with {} background via {}",
        size.label,
        session.config().bg_color,
        CONFIG.gemini_image_model
    );

    let image = match session.generate(&model).await? {
        GenerationOutcome::Completed(image) => image,
        outcome => {
            if let GenerationOutcome::Failed(detail) = &outcome {
                debug!("Generation failure detail: {detail}");
            }
            bail!("{}", outcome.user_message().unwrap_or_default())
        }
    };

    let bytes = image.decode().context("Model returned an undecodable image")?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(download_file_name(size, image.mime_type())));
    tokio::fs::write(&output, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Saved {}", output.display());

    if let Some(sheet_path) = &args.print_sheet {
        let sheet = render_print_sheet(&bytes, size, &SheetSettings::from_config(&CONFIG))?;
        save_print_sheet(&sheet, sheet_path)?;
        println!("Saved print sheet {}", sheet_path.display());
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let _guards = init_logging();

    let args: Vec<String> = std::env::args().collect();
    match parse_cli(&args)? {
        CliCommand::Catalog => {
            print_catalog();
            Ok(())
        }
        CliCommand::Generate(generate_args) => run_generate(generate_args).await,
    }
}
