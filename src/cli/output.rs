//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the sleuth CLI.

use crate::research::{DocumentRef, ProgressEvent};
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

    /// Print the sleuth banner
    pub fn banner(&self) {
        if self.colored {
            println!(
                "\n   {} {}\n",
                "sleuth".bright_cyan().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!("\n   sleuth v{}\n", env!("CARGO_PKG_VERSION"));
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
    pub fn created(&self, file_type: &str, path: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "✓".green().bold(),
                file_type.dimmed(),
                path.bright_white()
            );
        } else {
            println!("  [CREATED] {} {}", file_type, path);
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

    /// Print a subheader
    pub fn subheader(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.cyan().bold());
        } else {
            println!("\n  --- {} ---", title);
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

    /// Print a list item
    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
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

    /// Print completion message
    pub fn complete(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "🚀".green(), message.bright_green().bold());
        } else {
            println!("\n  [DONE] {}", message);
        }
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }

    /// Render a progress event from a running task
    pub fn progress(&self, event: &ProgressEvent) {
        let tag = format!("[{}]", event.task_id());
        let tag = if self.colored {
            tag.dimmed().to_string()
        } else {
            tag
        };

        match event {
            ProgressEvent::TaskStarted { topic, .. } => {
                if self.colored {
                    println!("  {} {} {}", tag, "▶".cyan().bold(), topic.bright_white());
                } else {
                    println!("  {} [START] {}", tag, topic);
                }
            }
            ProgressEvent::CheckingSufficiency { .. } => {
                println!("  {} {}", tag, event);
            }
            ProgressEvent::FollowUps { topic, topics, .. } => {
                println!("  {} Expanding on {}", tag, topic);
                for t in topics {
                    self.list_item(t);
                }
            }
            ProgressEvent::ContentFound {
                topic, documents, ..
            } => {
                println!("  {} Found new content for {}", tag, topic);
                self.documents(documents);
            }
            ProgressEvent::ContentSelected { documents, .. } => {
                println!("  {} Decided to use:", tag);
                self.documents(documents);
            }
            ProgressEvent::NotesReady { topic, .. } => {
                if self.colored {
                    println!("  {} {} Notes ready for {}", tag, "✓".green().bold(), topic);
                } else {
                    println!("  {} [OK] Notes ready for {}", tag, topic);
                }
            }
            ProgressEvent::TaskFailed { error, .. } => {
                if self.colored {
                    eprintln!("  {} {} {}", tag, "✗".red().bold(), error.red());
                } else {
                    eprintln!("  {} [ERROR] {}", tag, error);
                }
            }
        }
    }

    fn documents(&self, documents: &[DocumentRef]) {
        for doc in documents {
            if self.colored {
                println!("    {} {} {}", "•".blue(), doc.title, doc.url.dimmed());
            } else {
                println!("    - {} ({})", doc.title, doc.url);
            }
        }
    }
}
