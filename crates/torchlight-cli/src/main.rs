use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::Parser;
use miette::{Context, IntoDiagnostic, Result, miette};
use owo_colors::OwoColorize;
use torchlight::{Block, Config, Manager, PRODUCTION};
use tracing_subscriber::EnvFilter;

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG: &str = "torchlight.toml";

/// Torchlight syntax highlighter - HTML highlighting through the Torchlight API
#[derive(Debug, Parser)]
#[command(name = "torchlight", version)]
struct Args {
    /// Input: code string, filename, or '-' for stdin
    ///
    /// If a file path is provided, reads from that file.
    /// If '-' is provided (or nothing), reads from stdin.
    /// Otherwise, treats the argument as raw code to highlight.
    input: Option<String>,

    /// Language to highlight (e.g., rust, php, javascript)
    ///
    /// If omitted, language is detected from filename or shebang
    #[arg(short, long)]
    lang: Option<String>,

    /// Theme to request (defaults to the configured theme)
    #[arg(short, long)]
    theme: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Fall back to plain output instead of failing when the API errors
    #[arg(long)]
    production: bool,

    /// Print only the highlighted lines, without the wrapping <pre><code>
    #[arg(long)]
    raw: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_tracing(args.verbose);
    run(args)
}

fn setup_tracing(verbose: bool) {
    let default = if verbose { "torchlight=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(args: Args) -> Result<()> {
    let (content, filename) = read_input(args.input.as_deref())?;

    let lang = match (&args.lang, &filename) {
        (Some(lang), _) => lang.clone(),
        (None, Some(filename)) => detect_language(filename)
            .or_else(|| detect_from_content(&content))
            .ok_or_else(|| {
                miette!(
                    "Could not detect language from filename: {}. Use --lang to specify.",
                    filename.display()
                )
            })?
            .to_string(),
        (None, None) => detect_from_content(&content)
            .ok_or_else(|| miette!("Could not detect language. Use --lang to specify."))?
            .to_string(),
    };

    let mut config = load_config(args.config.as_deref())?.with_env_overrides();
    if args.production {
        config = config.with_environment(PRODUCTION);
    }

    let mut block = Block::new("cli").language(&lang).code(content);
    if let Some(theme) = &args.theme {
        block = block.theme(theme);
    }

    let manager = Manager::new(config).into_diagnostic()?;
    let blocks = manager
        .highlight([block])
        .into_diagnostic()
        .wrap_err("Highlighting failed")?;

    let Some(block) = blocks.into_iter().next() else {
        return Err(miette!("The highlighter returned no blocks"));
    };

    let output = if args.raw {
        block.highlighted
    } else {
        block.wrapped
    };
    println!("{}", output.unwrap_or_default());

    if args.verbose {
        eprintln!(
            "{} {} ({})",
            "✓".green(),
            lang.bold(),
            block.theme.as_deref().unwrap_or_default().cyan()
        );
    }

    Ok(())
}

fn read_input(input: Option<&str>) -> Result<(String, Option<PathBuf>)> {
    match input {
        None | Some("-") => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .into_diagnostic()
                .wrap_err("Failed to read stdin")?;
            Ok((buffer, None))
        }
        Some(input) => {
            let path = Path::new(input);
            if path.is_file() {
                let content = fs_err::read_to_string(path)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("Failed to read file '{input}'"))?;
                Ok((content, Some(path.to_path_buf())))
            } else {
                Ok((input.to_string(), None))
            }
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG).is_file() => Path::new(DEFAULT_CONFIG),
        None => return Ok(Config::default()),
    };

    tracing::debug!(path = %path.display(), "loading config");
    Config::load(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to load config {}", path.display()))
}

/// Detect language from a file extension.
fn detect_language(path: &Path) -> Option<&'static str> {
    let lang = match path.extension()?.to_str()? {
        "rs" => "rust",
        "php" => "php",
        "py" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "ts" => "typescript",
        "jsx" => "jsx",
        "tsx" => "tsx",
        "rb" => "ruby",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cc" | "cpp" | "hpp" => "cpp",
        "cs" => "csharp",
        "sh" | "bash" => "bash",
        "zsh" => "zsh",
        "fish" => "fish",
        "html" | "htm" => "html",
        "blade" => "blade",
        "css" => "css",
        "scss" => "scss",
        "json" => "json",
        "toml" => "toml",
        "yml" | "yaml" => "yaml",
        "md" | "markdown" => "markdown",
        "sql" => "sql",
        "vue" => "vue",
        "swift" => "swift",
        "kt" => "kotlin",
        _ => return None,
    };
    Some(lang)
}

/// Detect language from content (e.g., shebang lines)
fn detect_from_content(content: &str) -> Option<&'static str> {
    let shebang = content.lines().next()?.strip_prefix("#!")?.trim();

    [
        ("python", "python"),
        ("node", "javascript"),
        ("ruby", "ruby"),
        ("perl", "perl"),
        ("php", "php"),
        ("bash", "bash"),
        ("/sh", "bash"),
        ("zsh", "zsh"),
        ("fish", "fish"),
    ]
    .into_iter()
    .find(|(needle, _)| shebang.contains(needle))
    .map(|(_, lang)| lang)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_language_from_extension() {
        assert_eq!(detect_language(Path::new("src/main.rs")), Some("rust"));
        assert_eq!(detect_language(Path::new("index.php")), Some("php"));
        assert_eq!(detect_language(Path::new("Makefile")), None);
        assert_eq!(detect_language(Path::new("notes.xyz")), None);
    }

    #[test]
    fn detects_language_from_shebang() {
        assert_eq!(detect_from_content("#!/usr/bin/env python3\nprint(1)"), Some("python"));
        assert_eq!(detect_from_content("#!/bin/sh\necho hi"), Some("bash"));
        assert_eq!(detect_from_content("#!/usr/bin/php\n<?php"), Some("php"));
        assert_eq!(detect_from_content("echo hi"), None);
        assert_eq!(detect_from_content(""), None);
    }

    #[test]
    fn file_input_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.php");
        fs_err::write(&path, "<?php echo 1;").unwrap();

        let (content, filename) = read_input(path.to_str()).unwrap();

        assert_eq!(content, "<?php echo 1;");
        assert_eq!(filename.as_deref(), Some(path.as_path()));
        assert_eq!(detect_language(&path), Some("php"));
    }

    #[test]
    fn literal_input_is_code() {
        let (content, filename) = read_input(Some("fn main() {}")).unwrap();
        assert_eq!(content, "fn main() {}");
        assert!(filename.is_none());
    }

    #[test]
    fn args_parse() {
        let args = Args::parse_from([
            "torchlight", "-l", "php", "-t", "nord", "--production", "--raw", "echo 1;",
        ]);
        assert_eq!(args.lang.as_deref(), Some("php"));
        assert_eq!(args.theme.as_deref(), Some("nord"));
        assert!(args.production && args.raw && !args.verbose);
        assert_eq!(args.input.as_deref(), Some("echo 1;"));
    }
}
