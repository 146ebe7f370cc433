//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the askdoc CLI.

use askdoc_index::SearchHit;
use owo_colors::OwoColorize;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the askdoc banner
    pub fn banner(&self) {
        if self.colored {
            println!(
                "\n   {} {}\n",
                "askdoc".bright_cyan().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!("\n   askdoc v{}\n", env!("CARGO_PKG_VERSION"));
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a file creation message
    pub fn created(&self, kind: &str, path: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "✓".green().bold(),
                kind.dimmed(),
                path.bright_white()
            );
        } else {
            println!("  [CREATED] {} {}", kind, path);
        }
    }

    /// Print a file skipped message
    pub fn skipped(&self, path: &str, reason: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "○".yellow(),
                path.dimmed(),
                format!("({})", reason).yellow()
            );
        } else {
            println!("  [SKIPPED] {} ({})", path, reason);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "💡".dimmed(), message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Print a command suggestion
    pub fn command(&self, cmd: &str) {
        if self.colored {
            println!("     {}", format!("$ {}", cmd).bright_cyan());
        } else {
            println!("     $ {}", cmd);
        }
    }

    /// Print the model's answer, unmodified
    pub fn answer(&self, text: &str) {
        if self.colored {
            println!("\n{}\n", text.bright_white());
        } else {
            println!("\n{}\n", text);
        }
    }

    /// Print one retrieved chunk with its score and locator
    pub fn source(&self, rank: usize, hit: &SearchHit) {
        let locator = hit.chunk.source.to_string();
        let preview = preview(&hit.chunk.text, 80);
        if self.colored {
            println!(
                "    {} {} {}",
                format!("[{}]", rank).dimmed(),
                locator.cyan(),
                format!("score={:.3}", hit.score).dimmed()
            );
            println!("        {}", preview.dimmed());
        } else {
            println!("    [{}] {} score={:.3}", rank, locator, hit.score);
            println!("        {}", preview);
        }
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askdoc_index::{Chunk, SourceLocator};

    #[test]
    fn test_output_new() {
        let output = Output::new();
        assert!(output.colored);
    }

    #[test]
    fn test_output_no_color() {
        let output = Output::no_color();
        assert!(!output.colored);
    }

    #[test]
    fn test_preview_flattens_and_truncates() {
        assert_eq!(preview("a\n  b\tc", 80), "a b c");
        assert_eq!(preview("abcdef", 3), "abc…");
    }

    #[test]
    fn test_output_methods_no_panic() {
        let hit = SearchHit {
            chunk: Chunk::new(
                "some retrieved text",
                SourceLocator::Row {
                    source: "x.csv".into(),
                    row: 1,
                },
            ),
            score: 0.87,
            position: 1,
        };

        for output in [Output::no_color(), Output::new()] {
            output.banner();
            output.success("test success");
            output.info("test info");
            output.warning("test warning");
            output.error("test error");
            output.created("file", "path/to/file");
            output.skipped("path", "reason");
            output.header("Test Header");
            output.kv("key", "value");
            output.hint("hint message");
            output.command("some command");
            output.answer("an answer");
            output.source(1, &hit);
            output.newline();
        }
    }
}
