//! Colored terminal output with verbosity control.

use cyrup_termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use std::io::{self, IsTerminal, Write};

/// Prints user-facing progress; diagnostics go through `log` instead.
#[derive(Debug, Clone)]
pub struct OutputManager {
    verbose: bool,
    quiet: bool,
}

/// Colors only when the stream is a terminal.
fn choice(is_terminal: bool) -> ColorChoice {
    if is_terminal {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

fn stdout() -> StandardStream {
    StandardStream::stdout(choice(io::stdout().is_terminal()))
}

fn stderr() -> StandardStream {
    StandardStream::stderr(choice(io::stderr().is_terminal()))
}

/// Writes `prefix` in `color`, then `message` uncolored.
fn write_prefixed(
    stream: &mut StandardStream,
    color: Color,
    prefix: &str,
    message: &str,
) -> io::Result<()> {
    stream.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    write!(stream, "{prefix}")?;
    stream.reset()?;
    writeln!(stream, " {message}")
}

impl OutputManager {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose && !self.quiet
    }

    /// Shown only with `--verbose`
    pub fn verbose(&self, message: &str) -> io::Result<()> {
        if self.is_verbose() {
            let mut out = stdout();
            out.set_color(ColorSpec::new().set_dimmed(true))?;
            writeln!(out, "{message}")?;
            out.reset()?;
        }
        Ok(())
    }

    pub fn progress(&self, message: &str) -> io::Result<()> {
        if !self.quiet {
            writeln!(stdout(), "{message}")?;
        }
        Ok(())
    }

    pub fn success(&self, message: &str) -> io::Result<()> {
        if !self.quiet {
            write_prefixed(&mut stdout(), Color::Green, "✓", message)?;
        }
        Ok(())
    }

    pub fn warn(&self, message: &str) -> io::Result<()> {
        if !self.quiet {
            write_prefixed(&mut stderr(), Color::Yellow, "⚠", message)?;
        }
        Ok(())
    }

    /// Always shown, even with `--quiet`
    pub fn error(&self, message: &str) -> io::Result<()> {
        write_prefixed(&mut stderr(), Color::Red, "✗", message)
    }

    pub fn section(&self, title: &str) -> io::Result<()> {
        if !self.quiet {
            let mut out = stdout();
            writeln!(out)?;
            out.set_color(ColorSpec::new().set_bold(true))?;
            writeln!(out, "{title}")?;
            writeln!(out, "{}", "─".repeat(title.chars().count()))?;
            out.reset()?;
        }
        Ok(())
    }

    pub fn indent(&self, message: &str) -> io::Result<()> {
        if !self.quiet {
            writeln!(stdout(), "   {message}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_wins_over_verbose() {
        assert!(OutputManager::new(true, false).is_verbose());
        assert!(!OutputManager::new(true, true).is_verbose());
        assert!(!OutputManager::new(false, false).is_verbose());
    }

    #[test]
    fn piped_streams_are_never_colored() {
        assert!(matches!(choice(false), ColorChoice::Never));
        assert!(matches!(choice(true), ColorChoice::Auto));
    }
}
