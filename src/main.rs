use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use qrdocx::{Bindings, ImagePlacement, Options, Outcome, PlaceholderValue};

#[derive(Parser)]
#[command(name = "qrdocx", version, about = "Fill DOCX templates with text and QR code images")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replace {{KEY}} placeholders and write the filled document
    Fill {
        /// Template .docx
        input: PathBuf,

        /// Output .docx (default: Processed_<name>_<millis>.docx next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Text binding, KEY=VALUE (repeatable)
        #[arg(long = "text", value_parser = parse_key_val)]
        texts: Vec<(String, String)>,

        /// Image binding, KEY=PNG_PATH (repeatable)
        #[arg(long = "image", value_parser = parse_key_val)]
        images: Vec<(String, String)>,

        /// Edge length of embedded images in millimetres
        #[arg(long, default_value_t = qrdocx::DEFAULT_QR_SIZE_MM)]
        size_mm: f64,

        /// Keep images inside the placeholder's line instead of their own paragraph
        #[arg(long)]
        inline: bool,
    },
    /// List the placeholders a template contains
    Inspect {
        input: PathBuf,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got \"{s}\""))?;
    if !qrdocx::docx::placeholders::is_valid_key(key) {
        return Err(format!("invalid placeholder key \"{key}\""));
    }
    Ok((key.to_string(), value.to_string()))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(command: Command) -> Result<(), qrdocx::Error> {
    match command {
        Command::Fill {
            input,
            output,
            texts,
            images,
            size_mm,
            inline,
        } => {
            let mut bindings = Bindings::new();
            for (key, value) in texts {
                bindings.insert(key, PlaceholderValue::Text(value));
            }
            for (key, path) in images {
                let data = std::fs::read(&path).map_err(|e| {
                    qrdocx::Error::Io(std::io::Error::new(e.kind(), format!("{e}: {path}")))
                })?;
                bindings = bindings.image(key, data, None);
            }
            let options = Options {
                default_size_mm: size_mm,
                placement: if inline {
                    ImagePlacement::Inline
                } else {
                    ImagePlacement::Block
                },
            };
            let output = output.unwrap_or_else(|| {
                let stem = input
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("document");
                input.with_file_name(qrdocx::batch::processed_file_name(
                    stem,
                    qrdocx::batch::now_millis(),
                ))
            });

            let report = qrdocx::fill_docx_file(&input, &output, &bindings, &options)?;
            for k in &report.keys {
                let status = match &k.outcome {
                    Outcome::Substituted { count } => format!("substituted ({count})"),
                    Outcome::Embedded {
                        count,
                        relationship_id,
                        media_path,
                    } => format!("embedded ({count}) {media_path} as {relationship_id}"),
                    Outcome::FallbackUsed { count, reason } => {
                        format!("fallback text ({count}): {reason}")
                    }
                    Outcome::NotFound => "not found".to_string(),
                    Outcome::SplitAcrossRuns => "split across runs, left as is".to_string(),
                };
                println!("{:<24} {status}", k.key);
            }
            if report.original_returned {
                println!("Document left unchanged:");
            }
            for w in &report.warnings {
                println!("  warning: {w}");
            }
            println!("Wrote {}", output.display());
        }
        Command::Inspect { input } => {
            let bytes = std::fs::read(&input)?;
            let (keys, split) = qrdocx::inspect_docx_bytes(&bytes)?;
            if keys.is_empty() && split.is_empty() {
                println!("No placeholders found");
            }
            for key in keys {
                println!("{{{{{key}}}}}");
            }
            for key in split {
                println!("{{{{{key}}}}}  (split across runs; retype it in Word to make it usable)");
            }
        }
    }
    Ok(())
}
