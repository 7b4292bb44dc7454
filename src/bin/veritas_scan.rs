use anyhow::{bail, Context};
use std::path::{Path, PathBuf};
use veritas_lib::api::analyze_and_record;
use veritas_lib::services::{Analyzer, HistoryLog, ImageInput};

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

/// Flags that consume the following argument.
const VALUE_FLAGS: [&str; 2] = ["--out", "--history"];

/// First argument that is neither a flag nor a flag's value.
fn positional_arg(args: &[String]) -> Option<String> {
    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            rest.next();
        } else if !arg.starts_with('-') {
            return Some(arg.clone());
        }
    }
    None
}

const USAGE: &str = "Usage:\n  veritas_scan <image> [--out <json_path>] [--history <json_path>] [--no-specialist]\n\nEnvironment:\n  API_KEY / GEMINI_API_KEY          reasoning model key (required)\n  HUGGING_FACE_API_KEY              specialist classifier key (optional)\n  GEMINI_API_URL, HUGGING_FACE_API_URL  endpoint overrides";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let image_arg = match positional_arg(&args) {
        Some(arg) if !has_flag(&args, "--help") && !has_flag(&args, "-h") => arg,
        _ => {
            eprintln!("{}", USAGE);
            return Ok(());
        }
    };

    veritas_lib::init_logging();

    let path = PathBuf::from(image_arg);
    if !path.is_file() {
        bail!("not a file: {}", path.display());
    }

    let mut analyzer = Analyzer::from_environment()?;
    if has_flag(&args, "--no-specialist") {
        analyzer = analyzer.without_specialist();
    }

    let image = ImageInput::from_path(&path)?;

    let history_path = parse_arg_value(&args, "--history").map(PathBuf::from);
    let mut history = match &history_path {
        Some(p) => HistoryLog::load(p).with_context(|| format!("reading history {}", p.display()))?,
        None => HistoryLog::new(),
    };

    let result = analyze_and_record(&analyzer, &image, &mut history).await;
    let json = serde_json::to_string_pretty(&result)?;

    match parse_arg_value(&args, "--out") {
        Some(out) => {
            std::fs::write(Path::new(&out), &json).with_context(|| format!("writing {}", out))?;
            eprintln!("Wrote result to {}", out);
        }
        None => println!("{}", json),
    }

    if let Some(p) = &history_path {
        history.save(p)?;
        eprintln!("History: {} entries in {}", history.len(), p.display());
    }

    if result.is_error() {
        bail!("analysis could not reach the reasoning model; the verdict is a fallback");
    }
    Ok(())
}
