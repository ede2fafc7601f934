//! The console's single reader of terminal input
//!
//! One thread owns the line editor and serves every read, whether the
//! console wants its next command or the prompter wants a confirmation
//! reply. A requester that gives up (a prompt that timed out or was
//! cancelled) does not lose the line it was waiting for: the line goes to
//! the next read instead.

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread::JoinHandle;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::oneshot;

use crate::error::CliError;

/// What one read produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// Ctrl-C
    Interrupted,
    /// Ctrl-D, or input is closed
    Eof,
}

/// Where the console's lines come from
pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> ReadOutcome;

    /// Keep a command for recall
    fn add_history(&mut self, _line: &str) {}

    /// Called once when the console closes
    fn close(&mut self) -> Result<(), CliError> {
        Ok(())
    }
}

/// Interactive terminal input with history kept across sessions
pub struct EditorSource {
    editor: DefaultEditor,
    history_path: PathBuf,
}

impl EditorSource {
    pub fn open(history_path: PathBuf) -> Result<Self, CliError> {
        let mut editor = DefaultEditor::new()?;
        if history_path.exists() {
            editor.load_history(&history_path).ok();
        }
        Ok(Self {
            editor,
            history_path,
        })
    }
}

impl LineSource for EditorSource {
    fn read_line(&mut self, prompt: &str) -> ReadOutcome {
        match self.editor.readline(prompt) {
            Ok(line) => ReadOutcome::Line(line),
            Err(ReadlineError::Interrupted) => ReadOutcome::Interrupted,
            Err(ReadlineError::Eof) => ReadOutcome::Eof,
            Err(err) => {
                tracing::warn!(error = %err, "reading input failed");
                ReadOutcome::Eof
            }
        }
    }

    fn add_history(&mut self, line: &str) {
        if let Err(err) = self.editor.add_history_entry(line) {
            tracing::debug!(error = %err, "history entry dropped");
        }
    }

    fn close(&mut self) -> Result<(), CliError> {
        if let Some(parent) = self.history_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.editor.save_history(&self.history_path)?;
        Ok(())
    }
}

/// Where history lives unless told otherwise
pub fn default_history_path() -> PathBuf {
    dirs::cache_dir()
        .map(|p| p.join("toolgate/history.txt"))
        .unwrap_or_else(|| ".toolgate/history.txt".into())
}

struct ReadRequest {
    prompt: String,
    history: bool,
    reply: oneshot::Sender<ReadOutcome>,
}

enum Message {
    Read(ReadRequest),
    Close,
}

/// Owner of the input thread
pub struct Console {
    requests: mpsc::Sender<Message>,
    worker: JoinHandle<Result<(), CliError>>,
}

impl Console {
    /// Terminal input with history at `history_path`
    pub fn open(history_path: PathBuf) -> Result<Self, CliError> {
        Self::spawn(move || EditorSource::open(history_path))
    }

    /// Start the input thread over the source `make` builds on it
    pub fn spawn<S, F>(make: F) -> Result<Self, CliError>
    where
        S: LineSource,
        F: FnOnce() -> Result<S, CliError> + Send + 'static,
    {
        let (requests, inbox) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let worker = std::thread::Builder::new()
            .name("toolgate-input".into())
            .spawn(move || {
                let source = match make() {
                    Ok(source) => {
                        let _ = ready_tx.send(Ok(()));
                        source
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return Ok(());
                    }
                };
                serve(source, inbox)
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { requests, worker }),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(thread_gone()),
        }
    }

    pub fn handle(&self) -> ConsoleHandle {
        ConsoleHandle {
            requests: self.requests.clone(),
        }
    }

    /// Stop the input thread and save history
    ///
    /// Reads through outstanding handles return [`ReadOutcome::Eof`]
    /// afterwards.
    pub fn close(self) -> Result<(), CliError> {
        let _ = self.requests.send(Message::Close);
        self.worker.join().map_err(|_| thread_gone())?
    }
}

/// Cloneable way in to the console's input
#[derive(Clone)]
pub struct ConsoleHandle {
    requests: mpsc::Sender<Message>,
}

impl ConsoleHandle {
    /// Read a command; non-blank commands go into history
    pub async fn read_command(&self, prompt: &str) -> ReadOutcome {
        self.read(prompt, true).await
    }

    /// Read an answer to a question; answers stay out of history
    pub async fn read_reply(&self, prompt: &str) -> ReadOutcome {
        self.read(prompt, false).await
    }

    async fn read(&self, prompt: &str, history: bool) -> ReadOutcome {
        let (reply, outcome) = oneshot::channel();
        let request = ReadRequest {
            prompt: prompt.to_string(),
            history,
            reply,
        };
        if self.requests.send(Message::Read(request)).is_err() {
            return ReadOutcome::Eof;
        }
        outcome.await.unwrap_or(ReadOutcome::Eof)
    }
}

fn serve<S: LineSource>(mut source: S, inbox: mpsc::Receiver<Message>) -> Result<(), CliError> {
    // A line read for a requester that has since gone away
    let mut unclaimed: Option<ReadOutcome> = None;

    while let Ok(Message::Read(request)) = inbox.recv() {
        if request.reply.is_closed() {
            continue;
        }
        let outcome = match unclaimed.take() {
            Some(outcome) => outcome,
            None => source.read_line(&request.prompt),
        };

        let remembered = match &outcome {
            ReadOutcome::Line(line) if request.history && !line.trim().is_empty() => {
                Some(line.trim().to_string())
            }
            _ => None,
        };
        match request.reply.send(outcome) {
            Ok(()) => {
                if let Some(line) = remembered {
                    source.add_history(&line);
                }
            }
            Err(outcome) => unclaimed = Some(outcome),
        }
    }

    source.close()
}

fn thread_gone() -> CliError {
    CliError::Io(std::io::Error::other("console input thread stopped"))
}
