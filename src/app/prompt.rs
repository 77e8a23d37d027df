// app/prompt.rs
// Linear prompt sequence for connection details not given on the command line.

use super::export_flow::default_output_dir;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

/// Reads a value without echoing it.
pub trait SecretReader {
    /// When false the prompter reads the value as a plain line instead.
    fn is_interactive(&self) -> bool {
        true
    }

    fn read_secret(&mut self, prompt: &str) -> io::Result<String>;
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        crossterm::terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

/// Captures keystrokes in raw mode while stdin is a terminal.
pub struct TerminalSecretReader;

impl SecretReader for TerminalSecretReader {
    fn is_interactive(&self) -> bool {
        io::stdin().is_terminal()
    }

    fn read_secret(&mut self, prompt: &str) -> io::Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{}", prompt)?;
        stdout.flush()?;

        let guard = RawModeGuard::enable()?;
        let mut secret = String::new();
        loop {
            if let Event::Key(KeyEvent { code, modifiers, kind, .. }) = event::read()? {
                if kind == KeyEventKind::Release {
                    continue;
                }
                match code {
                    KeyCode::Enter => break,
                    KeyCode::Backspace => {
                        secret.pop();
                    }
                    KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                        return Err(io::Error::new(io::ErrorKind::Interrupted, "password entry cancelled"));
                    }
                    KeyCode::Esc => {
                        return Err(io::Error::new(io::ErrorKind::Interrupted, "password entry cancelled"));
                    }
                    KeyCode::Char(c) => secret.push(c),
                    _ => {}
                }
            }
        }
        drop(guard);
        writeln!(stdout)?;
        Ok(secret)
    }
}

/// Values already supplied by flags or environment; prompts cover the rest.
#[derive(Debug, Clone, Default)]
pub struct PresetAnswers {
    pub server: Option<String>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub trusted: bool,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDetails {
    pub server: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub output_dir: PathBuf,
}

pub struct Prompter<R, W, S> {
    input: R,
    output: W,
    secrets: S,
}

impl<R: BufRead, W: Write, S: SecretReader> Prompter<R, W, S> {
    pub fn new(input: R, output: W, secrets: S) -> Self {
        Self { input, output, secrets }
    }

    fn ask(&mut self, question: &str) -> io::Result<String> {
        write!(self.output, "{}", question)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed while prompting"));
        }
        Ok(line.trim().to_string())
    }

    fn ask_required(&mut self, question: &str) -> io::Result<String> {
        loop {
            let answer = self.ask(question)?;
            if !answer.is_empty() {
                return Ok(answer);
            }
            writeln!(self.output, "A value is required.")?;
        }
    }

    pub fn collect(&mut self, preset: PresetAnswers) -> io::Result<ConnectionDetails> {
        let needs_prompt = preset.server.is_none()
            || preset.database.is_none()
            || preset.output_dir.is_none()
            || (preset.username.is_none() && !preset.trusted);
        if needs_prompt {
            writeln!(self.output, "Please enter database connection details:")?;
        }

        let server = match preset.server {
            Some(server) => server,
            None => self.ask_required("Server (host[:port] or socket directory, e.g. localhost:5432): ")?,
        };
        let database = match preset.database {
            Some(database) => database,
            None => self.ask_required("Database Name: ")?,
        };

        let username = match preset.username {
            Some(username) => Some(username),
            None if preset.trusted => None,
            None => {
                let auth = self.ask("Use trusted (OS) authentication? (yes/no) [yes]: ")?.to_lowercase();
                match auth.as_str() {
                    "no" => Some(self.ask_required("Username: ")?),
                    "yes" | "" => None,
                    _ => {
                        writeln!(self.output, "Invalid choice. Assuming trusted authentication.")?;
                        None
                    }
                }
            }
        };
        let password = match (&username, preset.password) {
            (Some(_), Some(password)) => Some(password),
            (Some(_), None) if self.secrets.is_interactive() => Some(self.secrets.read_secret("Password: ")?),
            (Some(_), None) => Some(self.ask("Password: ")?),
            (None, _) => None,
        };

        let output_dir = match preset.output_dir {
            Some(dir) => dir,
            None => {
                let default = default_output_dir(&database);
                let answer = self.ask(&format!("Output directory [{}]: ", default.display()))?;
                if answer.is_empty() {
                    default
                } else {
                    PathBuf::from(answer)
                }
            }
        };

        Ok(ConnectionDetails {
            server,
            database,
            username,
            password,
            output_dir,
        })
    }
}
