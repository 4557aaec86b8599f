use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use pdf_retext::{Diagnostics, LocatorConfig, MatchOutcome, PdfEditor};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Plain text, one line per text line
    Plain,
    /// Structured spans with bounding boxes, fonts and colors
    Debug,
}

#[derive(Parser)]
#[command(name = "pdf-retext")]
#[command(about = "Replace text in PDF files, keeping its look", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replace every occurrence of a string on one page
    Replace {
        /// PDF file to edit; the result is written beside it
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Text to replace
        #[arg(long)]
        old: String,

        /// Replacement text
        #[arg(long)]
        new: String,

        /// Zero-based page number
        #[arg(long, default_value_t = 0)]
        page: usize,

        /// Password for encrypted PDFs
        #[arg(short, long)]
        password: Option<String>,

        /// Inserted before the extension of the output file name
        #[arg(long, default_value = pdf_retext::DEFAULT_OUTPUT_SUFFIX)]
        suffix: String,

        /// Never download fonts
        #[arg(long)]
        offline: bool,

        #[arg(short, long)]
        verbose: bool,
    },
    /// Print the text of a page
    Text {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Zero-based page number; all pages when omitted
        #[arg(long)]
        page: Option<usize>,

        /// Password for encrypted PDFs
        #[arg(short, long)]
        password: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Plain)]
        format: OutputFormat,
    },
    /// Find a font file for a family, downloading it if needed
    LocateFont {
        family: String,

        /// Never download fonts
        #[arg(long)]
        offline: bool,

        #[arg(short, long)]
        verbose: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open(
    file: &Path,
    password: Option<String>,
    verbose: bool,
    offline: bool,
    suffix: &str,
) -> PdfEditor {
    let mut builder = PdfEditor::builder()
        .verbose(verbose)
        .output_suffix(suffix)
        .locator(LocatorConfig::new().downloads(!offline));
    if let Some(password) = password {
        builder = builder.password(password);
    }
    match builder.open(file) {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("Error opening {:?}: {}", file, e);
            std::process::exit(1);
        }
    }
}

fn main() {
    let args = Args::parse();

    match args.command {
        Command::Replace {
            file,
            old,
            new,
            page,
            password,
            suffix,
            offline,
            verbose,
        } => {
            init_logging(verbose);
            let mut editor = open(&file, password, verbose, offline, &suffix);
            let report = match editor.edit_text(page, &old, &new) {
                Ok(report) => report,
                Err(e) => {
                    eprintln!("Error editing {:?}: {}", file, e);
                    std::process::exit(1);
                }
            };
            for outcome in &report.matches {
                match outcome {
                    MatchOutcome::Replaced { rect, font, .. } => {
                        println!("replaced at {} using {:?}", rect, font)
                    }
                    MatchOutcome::RedactFailed { rect, error } => {
                        println!("skipped {}: {}", rect, error)
                    }
                    MatchOutcome::InsertFailed { rect, error, .. } => {
                        println!("removed but not redrawn {}: {}", rect, error)
                    }
                }
            }
            println!(
                "{} of {} occurrences replaced, saved to {}",
                report.replaced(),
                report.matches.len(),
                report.output.display()
            );
            if !report.is_complete() {
                std::process::exit(2);
            }
        }
        Command::Text {
            file,
            page,
            password,
            format,
        } => {
            init_logging(false);
            let mut editor = open(&file, password, false, true, pdf_retext::DEFAULT_OUTPUT_SUFFIX);
            let pages: Vec<usize> = match page {
                Some(page) => vec![page],
                None => (0..editor.page_count()).collect(),
            };
            for page in pages {
                let output = match editor.page_output(page) {
                    Ok(output) => output,
                    Err(e) => {
                        eprintln!("Error extracting text from {:?}: {}", file, e);
                        std::process::exit(1);
                    }
                };
                match format {
                    OutputFormat::Plain => print!("{}", output),
                    OutputFormat::Debug => {
                        for (line_idx, line) in output.lines().iter().enumerate() {
                            println!("Page {} line {}:", page, line_idx);
                            for (span_idx, span) in line.iter().enumerate() {
                                println!("  Span {}: {:?}", span_idx, span.text);
                                println!("    BBox: {}", span.bbox);
                                println!("    Font: {} {:.1}", span.font_name, span.font_size);
                                println!("    Color: {}", span.color);
                            }
                        }
                    }
                }
            }
        }
        Command::LocateFont {
            family,
            offline,
            verbose,
        } => {
            init_logging(verbose);
            let locator = LocatorConfig::new().downloads(!offline).build();
            match locator.locate(&family, &Diagnostics::new(verbose)) {
                Ok(path) => println!("{}", path.display()),
                Err(e) => {
                    eprintln!("Font '{}' not found: {}", family, e);
                    std::process::exit(1);
                }
            }
        }
    }
}
