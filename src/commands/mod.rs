use clap::ValueEnum;
use std::io::{self, BufRead, IsTerminal, Write};

mod config_cmd;
mod login;
mod register;
mod user;

pub use config_cmd::ConfigCommand;
pub use login::LoginCommand;
pub use register::RegisterCommand;
pub use user::UserCommand;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Read a password from stdin.
///
/// The terminal keeps echoing while the password is typed; the prompt says
/// so. Piped input is read without a prompt.
pub fn prompt_password() -> io::Result<Option<String>> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        print!("Password (input is visible): ");
        io::stdout().flush()?;
    }
    read_password(&mut stdin.lock())
}

/// First line of `reader` without its line ending; `None` when empty.
fn read_password(reader: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut input = String::new();
    reader.read_line(&mut input)?;
    let input = input.trim_end_matches(['\r', '\n']);

    Ok(if input.is_empty() {
        None
    } else {
        Some(input.to_string())
    })
}
