use crate::session::{Session, Step};
use anyhow::Result;
use chapterbind_acquire::WebClient;
use chapterbind_bind::Pipeline;
use chapterbind_model::{Chapter, ChapterError, Document};
use std::collections::VecDeque;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::watch;

/// Set once the user asks to stop; checked before each chapter starts.
#[derive(Debug, Clone)]
pub struct StopSignal(watch::Receiver<bool>);

impl StopSignal {
    pub fn channel() -> (watch::Sender<bool>, StopSignal) {
        let (tx, rx) = watch::channel(false);
        (tx, StopSignal(rx))
    }

    pub fn is_set(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the signal is set. Never resolves if the sender is gone.
    pub async fn wait(&mut self) {
        while !*self.0.borrow_and_update() {
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Where session tokens come from.
pub enum Input {
    /// Prompts on stdout, answers from stdin.
    Interactive(Lines<BufReader<Stdin>>),
    /// Pre-recorded tokens; running out means quit.
    Scripted(VecDeque<String>),
}

impl Input {
    pub fn interactive() -> Self {
        Input::Interactive(BufReader::new(tokio::io::stdin()).lines())
    }

    pub fn scripted<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Input::Scripted(tokens.into_iter().map(Into::into).collect())
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, Input::Interactive(_))
    }

    /// Next token, or `None` on end of input or a stop request.
    pub async fn next_token(&mut self, prompt: &str, stop: &mut StopSignal) -> Result<Option<String>> {
        match self {
            Input::Interactive(lines) => {
                print!("{prompt}");
                std::io::stdout().flush()?;
                tokio::select! {
                    line = lines.next_line() => Ok(line?),
                    _ = stop.wait() => Ok(None),
                }
            }
            Input::Scripted(tokens) => Ok(tokens.pop_front()),
        }
    }

    pub fn show(&self, message: &str) {
        match self {
            Input::Interactive(_) => println!("{message}"),
            Input::Scripted(_) => tracing::info!("{message}"),
        }
    }
}

/// Outcome of every chapter the session processed.
#[derive(Debug, Default)]
pub struct Summary {
    pub written: Vec<Document>,
    pub failed: Vec<(Chapter, ChapterError)>,
}

impl Summary {
    pub fn record(&mut self, chapter: &Chapter, outcome: Result<Document, ChapterError>) {
        match outcome {
            Ok(document) => {
                tracing::info!(
                    chapter = %chapter.display_name(),
                    path = %document.path.display(),
                    pages = document.pages,
                    skipped = document.skipped.len(),
                    "Downloaded chapter"
                );
                self.written.push(document);
            }
            Err(err) => {
                tracing::error!(
                    chapter = %chapter.display_name(),
                    url = %chapter.source_url(),
                    kind = err.kind(),
                    error = %err,
                    "Chapter failed"
                );
                self.failed.push((chapter.clone(), err));
            }
        }
    }
}

/// Drive the selection session until it is done, the input ends, or a stop
/// is requested. Chapter failures are recorded and the session carries on.
pub async fn run_session<C: WebClient>(
    pipeline: &Pipeline<C>,
    chapters: Vec<Chapter>,
    input: &mut Input,
    stop: &mut StopSignal,
) -> Result<Summary> {
    let mut session = Session::new(chapters);
    let mut summary = Summary::default();

    'session: while let Some(prompt) = session.prompt() {
        if stop.is_set() {
            break;
        }
        let token = match input.next_token(&prompt, stop).await? {
            Some(token) => token,
            None => break,
        };

        let step = session.advance(&token);
        tracing::debug!(token = %token.trim(), state = ?session.state(), "Session advanced");
        match step {
            Step::Prompt(message) => {
                if let Some(message) = message {
                    input.show(&message);
                }
            }
            Step::Quit => break,
            Step::Process(batch) => {
                for chapter in &batch {
                    if stop.is_set() {
                        tracing::warn!(chapter = %chapter.display_name(), "Stop requested, not starting chapter");
                        break 'session;
                    }
                    let outcome = pipeline.process_chapter(chapter).await;
                    summary.record(chapter, outcome);
                }
                session.complete_batch();
                if session.is_done() {
                    break;
                }
            }
        }
    }

    tracing::info!(
        written = summary.written.len(),
        failed = summary.failed.len(),
        "Session finished"
    );
    Ok(summary)
}
