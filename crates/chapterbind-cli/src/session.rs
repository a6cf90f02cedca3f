// Chapter selection as an explicit state machine.
//
// AwaitingMode -> AwaitingChapterChoice -> Processing -> Done, each
// transition driven by one input token. The driver owns I/O and the
// pipeline; this module only decides what happens next.

use chapterbind_model::Chapter;

pub const MODE_MENU: &str = "\
Choose an option:
  1. Download all chapters
  2. Download chapters one by one
  3. Download a particular chapter
  4. Quit (q)
> ";

#[derive(Debug, Clone, PartialEq)]
pub enum Choice {
    /// Offering chapters one at a time, starting at `cursor`.
    Sequential { cursor: usize },
    /// Waiting for an exact chapter name.
    Named,
}

#[derive(Debug, Clone, PartialEq)]
pub enum State {
    AwaitingMode,
    AwaitingChapterChoice(Choice),
    /// `batch` is being processed; `next` is where the session resumes.
    Processing { batch: Vec<Chapter>, next: Box<State> },
    Done,
}

/// What the driver should do after feeding a token.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Show the message, if any, and prompt again.
    Prompt(Option<String>),
    /// Run these chapters in order, then call `complete_batch`.
    Process(Vec<Chapter>),
    Quit,
}

#[derive(Debug)]
pub struct Session {
    chapters: Vec<Chapter>,
    state: State,
}

impl Session {
    pub fn new(chapters: Vec<Chapter>) -> Self {
        Self {
            chapters,
            state: State::AwaitingMode,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Prompt for the current state; `None` when no input is expected.
    pub fn prompt(&self) -> Option<String> {
        match &self.state {
            State::AwaitingMode => Some(MODE_MENU.to_string()),
            State::AwaitingChapterChoice(Choice::Sequential { cursor }) => {
                self.chapters.get(*cursor).map(|c| {
                    format!("{}: {}\nDownload? (y/N/q): ", c.display_name(), c.source_url())
                })
            }
            State::AwaitingChapterChoice(Choice::Named) => {
                Some("Enter the name of the chapter to download (q to quit): ".to_string())
            }
            State::Processing { .. } | State::Done => None,
        }
    }

    /// Feed one input token.
    pub fn advance(&mut self, input: &str) -> Step {
        let token = input.trim();
        let state = std::mem::replace(&mut self.state, State::Done);
        let (next, step) = match state {
            State::AwaitingMode => self.on_mode(token),
            State::AwaitingChapterChoice(Choice::Sequential { cursor }) => {
                self.on_confirm(cursor, token)
            }
            State::AwaitingChapterChoice(Choice::Named) => self.on_name(token),
            State::Processing { batch, next } => {
                let step = Step::Process(batch.clone());
                (State::Processing { batch, next }, step)
            }
            State::Done => (State::Done, Step::Quit),
        };
        self.state = next;
        step
    }

    /// Leave `Processing` for the state it was resuming to.
    pub fn complete_batch(&mut self) {
        let state = std::mem::replace(&mut self.state, State::Done);
        self.state = match state {
            State::Processing { next, .. } => *next,
            other => other,
        };
    }

    fn on_mode(&self, token: &str) -> (State, Step) {
        match token.to_ascii_lowercase().as_str() {
            "1" => {
                if self.chapters.is_empty() {
                    return (State::Done, Step::Quit);
                }
                let batch = self.chapters.clone();
                processing(batch, State::Done)
            }
            "2" => settle(self.sequential_from(0), None),
            "3" => (
                State::AwaitingChapterChoice(Choice::Named),
                Step::Prompt(Some(self.chapter_list())),
            ),
            "4" | "q" => (State::Done, Step::Quit),
            _ => (
                State::AwaitingMode,
                Step::Prompt(Some("Invalid choice, please try again.".to_string())),
            ),
        }
    }

    fn on_confirm(&self, cursor: usize, token: &str) -> (State, Step) {
        match token.to_ascii_lowercase().as_str() {
            "y" | "yes" => match self.chapters.get(cursor) {
                Some(chapter) => processing(vec![chapter.clone()], self.sequential_from(cursor + 1)),
                None => (State::Done, Step::Quit),
            },
            "q" => (State::Done, Step::Quit),
            // Anything else, including an empty answer, skips the chapter.
            _ => settle(self.sequential_from(cursor + 1), None),
        }
    }

    fn on_name(&self, token: &str) -> (State, Step) {
        if token.eq_ignore_ascii_case("q") {
            return (State::Done, Step::Quit);
        }
        match self.chapters.iter().find(|c| c.display_name() == token) {
            Some(chapter) => processing(vec![chapter.clone()], State::Done),
            None => (
                State::AwaitingChapterChoice(Choice::Named),
                Step::Prompt(Some("Chapter not found.".to_string())),
            ),
        }
    }

    fn sequential_from(&self, cursor: usize) -> State {
        if cursor < self.chapters.len() {
            State::AwaitingChapterChoice(Choice::Sequential { cursor })
        } else {
            State::Done
        }
    }

    fn chapter_list(&self) -> String {
        let mut out = String::from("Available chapters:");
        for c in &self.chapters {
            out.push_str(&format!("\n  {}: {}", c.display_name(), c.source_url()));
        }
        out
    }
}

fn processing(batch: Vec<Chapter>, next: State) -> (State, Step) {
    let step = Step::Process(batch.clone());
    (
        State::Processing {
            batch,
            next: Box::new(next),
        },
        step,
    )
}

fn settle(next: State, message: Option<String>) -> (State, Step) {
    if next == State::Done {
        (State::Done, Step::Quit)
    } else {
        (next, Step::Prompt(message))
    }
}
