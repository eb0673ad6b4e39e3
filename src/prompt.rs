//! Console input collaborators.
//!
//! The session driver only sees the [`Prompt`] trait, so tests can script
//! answers without a terminal.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

pub trait Prompt {
    fn text(&mut self, message: &str) -> Result<String>;
    /// Masked input, for credentials.
    fn secret(&mut self, message: &str) -> Result<String>;
    /// Present `options` in order; returns the index of the chosen one.
    fn choice(&mut self, message: &str, options: &[&str]) -> Result<usize>;
    fn yes_no(&mut self, message: &str) -> Result<bool>;
    /// Prompt for an existing filesystem path. Surrounding quotes are
    /// stripped; a missing path is an error the caller reports.
    fn file_path(&mut self, message: &str) -> Result<PathBuf>;
}

/// Strip matched pairs of surrounding quotes, as pasted paths often carry
/// them (repeatedly, for paths quoted twice).
pub fn unquote(raw: &str) -> &str {
    let mut value = raw.trim();
    while value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        value = &value[1..value.len() - 1];
    }
    value
}

#[derive(Default)]
pub struct ConsolePrompt;

impl ConsolePrompt {
    pub fn new() -> Self {
        Self
    }

    fn read_line(&self) -> Result<String> {
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("read from stdin")?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl Prompt for ConsolePrompt {
    fn text(&mut self, message: &str) -> Result<String> {
        print!("{message} ");
        io::stdout().flush().context("flush stdout")?;
        self.read_line()
    }

    fn secret(&mut self, message: &str) -> Result<String> {
        rpassword::prompt_password(format!("{message} ")).context("read masked input")
    }

    fn choice(&mut self, message: &str, options: &[&str]) -> Result<usize> {
        loop {
            println!("{message}");
            for (index, label) in options.iter().enumerate() {
                println!("  {}) {label}", index + 1);
            }
            print!("> ");
            io::stdout().flush().context("flush stdout")?;
            let answer = self.read_line()?;
            match answer.trim().parse::<usize>() {
                Ok(number) if (1..=options.len()).contains(&number) => return Ok(number - 1),
                _ => println!("Please enter a number between 1 and {}.", options.len()),
            }
        }
    }

    fn yes_no(&mut self, message: &str) -> Result<bool> {
        loop {
            print!("{message} [y/n] ");
            io::stdout().flush().context("flush stdout")?;
            match self.read_line()?.trim().to_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => println!("Please answer y or n."),
            }
        }
    }

    fn file_path(&mut self, message: &str) -> Result<PathBuf> {
        let raw = self.text(message)?;
        let location = unquote(&raw);
        if location.is_empty() {
            return Err(anyhow!("please give a file name"));
        }
        let path = PathBuf::from(location);
        if !path.exists() {
            return Err(anyhow!("no file exists at '{}'", path.display()));
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unquote_strips_nested_quote_pairs() {
        assert_eq!(unquote("\"/tmp/report.pdf\""), "/tmp/report.pdf");
        assert_eq!(unquote("'\"/tmp/report.pdf\"'"), "/tmp/report.pdf");
        assert_eq!(unquote("  plain.txt "), "plain.txt");
    }

    #[test]
    fn unquote_leaves_unmatched_quotes_alone() {
        assert_eq!(unquote("\"half"), "\"half");
        assert_eq!(unquote("'"), "'");
    }
}
