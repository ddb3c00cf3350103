//! Terminal prompter built on cliclack

use std::io;

use console::style;
use google_photos_auth::{AuthError, Prompter, Result};

/// Maps Ctrl-C / Esc to an abort instead of an I/O failure
fn interrupted(e: io::Error) -> AuthError {
    if e.kind() == io::ErrorKind::Interrupted {
        AuthError::user_aborted("Cancelled")
    } else {
        e.into()
    }
}

/// Interactive prompter for a real terminal
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn intro(&mut self, title: &str) -> Result<()> {
        cliclack::intro(style(format!(" {title} ")).on_cyan().black())?;
        Ok(())
    }

    fn note(&mut self, title: &str, body: &str) -> Result<()> {
        if body.is_empty() {
            cliclack::log::step(title)?;
        } else {
            cliclack::note(style(title).bold(), body)?;
        }
        Ok(())
    }

    fn confirm(&mut self, message: &str) -> Result<bool> {
        cliclack::confirm(message)
            .initial_value(false)
            .interact()
            .map_err(interrupted)
    }

    fn input(&mut self, message: &str) -> Result<String> {
        cliclack::input(message)
            .required(false)
            .interact::<String>()
            .map_err(interrupted)
    }

    fn warn(&mut self, message: &str) -> Result<()> {
        cliclack::log::warning(message)?;
        Ok(())
    }

    fn success(&mut self, message: &str) -> Result<()> {
        cliclack::outro(style(message).green())?;
        Ok(())
    }
}
