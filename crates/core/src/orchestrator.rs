//! Turn-taking dialog between the human teacher and the simulated student.
//!
//! The [`Orchestrator`] is an explicit state machine driven through
//! [`Orchestrator::dispatch`]. It owns two pieces of state: the
//! [`DialogView`] that a UI renders, and the append-only [`Transcript`].
//! Every visible change is published on a `watch` channel.
//!
//! Handles are cheap to clone, so a help request can be dispatched from
//! another task while a student workflow is still running. Submissions are
//! serialized by the `send_active` flag: a submission that arrives while it
//! is false is dropped.

use crate::{
    agent::Agent,
    message::ChatMessage,
    persona::{STUDENT_OPENING_SENTENCE, SUPERVISOR_REQUEST, USER_OPENING_SENTENCE},
    text::strip_speaker_label,
    transcript::{Channel, EntryRole, Transcript, TranscriptEntry},
};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio::sync::{Mutex, OnceCell, watch};
use tracing::{debug, error, info, warn};

/// Shown in place of a reply that could not be produced.
pub const APOLOGY_MESSAGE: &str = "Sorry, I'm having trouble connecting. Please try refreshing.";

/// Prefix put on every teacher message before it reaches the log and the agent.
pub const TEACHER_PREFIX: &str = "Teacher (to the student): ";

/// Joins the parts of the opening reply into one turn.
const OPENING_PART_SEPARATOR: &str = "\n\n";

/// Creates the agent the first time the dialog needs one.
pub type AgentFactory = Box<dyn Fn() -> Arc<dyn Agent> + Send + Sync>;

/// Artificial pacing of the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogTimings {
    /// Wait before the student's opening reply is requested.
    pub read_delay: Duration,
    /// Wait after the opening reply before input is enabled.
    pub init_settle: Duration,
    /// Wait after a failed opening before input is enabled anyway.
    pub init_failure_settle: Duration,
    /// Wait between echoing the teacher's message and logging it.
    pub submit_echo: Duration,
    /// Pause after each delivered reply part.
    pub part_pause: Duration,
    /// How long the next part's thinking placeholder is shown.
    pub next_part_thinking: Duration,
    /// Wait after the whole reply before input is enabled.
    pub workflow_settle: Duration,
}

impl Default for DialogTimings {
    fn default() -> Self {
        Self {
            read_delay: Duration::from_millis(3000),
            init_settle: Duration::from_millis(800),
            init_failure_settle: Duration::from_millis(1000),
            submit_echo: Duration::from_millis(200),
            part_pause: Duration::from_millis(2200),
            next_part_thinking: Duration::from_millis(1000),
            workflow_settle: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Agent,
}

/// One rendered chat bubble. A pending turn is a thinking placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibleTurn {
    pub text: String,
    pub role: TurnRole,
    pub pending: bool,
}

impl VisibleTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role: TurnRole::User,
            pending: false,
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role: TurnRole::Agent,
            pending: false,
        }
    }

    pub fn thinking() -> Self {
        Self {
            text: String::new(),
            role: TurnRole::Agent,
            pending: true,
        }
    }
}

/// Content of the side panel where the professor answers help requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "text", rename_all = "snake_case")]
pub enum SupervisorSlot {
    /// The standing request shown before any help is given.
    Prompt(String),
    ProfessorThinking,
    /// A reply to be revealed incrementally by the renderer.
    Reveal(String),
}

impl SupervisorSlot {
    pub fn prompt() -> Self {
        SupervisorSlot::Prompt(SUPERVISOR_REQUEST.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotStarted,
    Init,
    Idle,
    UserTurn,
    StudentWorkflow,
}

/// Everything a renderer needs, and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialogView {
    pub turns: Vec<VisibleTurn>,
    pub supervisor: SupervisorSlot,
    pub send_active: bool,
    pub phase: Phase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Runs the opening sequence. Only the first `Start` has an effect.
    Start,
    /// The teacher sends a message to the student.
    Submit(String),
    /// The teacher asks the professor for help.
    RequestHelp,
    /// The teacher pasted text into the input.
    Paste(String),
}

/// Whether an event was acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Accepted,
    Ignored,
}

struct DialogState {
    view: DialogView,
    transcript: Transcript,
    started: bool,
}

struct Inner {
    factory: AgentFactory,
    agent: OnceCell<Arc<dyn Agent>>,
    timings: DialogTimings,
    state: Mutex<DialogState>,
    view_tx: watch::Sender<DialogView>,
}

#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

/// Replaces the most recent thinking placeholder, or appends if there is none.
fn resolve_placeholder(turns: &mut Vec<VisibleTurn>, text: &str) {
    match turns.iter().rposition(|t| t.pending) {
        Some(idx) => turns[idx] = VisibleTurn::agent(text),
        None => turns.push(VisibleTurn::agent(text)),
    }
}

impl Orchestrator {
    pub fn new<F>(factory: F, timings: DialogTimings) -> Self
    where
        F: Fn() -> Arc<dyn Agent> + Send + Sync + 'static,
    {
        let mut transcript = Transcript::default();
        transcript.append(
            Channel::Main,
            TranscriptEntry::now(USER_OPENING_SENTENCE, EntryRole::User),
        );
        transcript.append(
            Channel::Supervisor,
            TranscriptEntry::now(SUPERVISOR_REQUEST, EntryRole::Supervisor),
        );

        let view = DialogView {
            turns: vec![VisibleTurn::agent(strip_speaker_label(
                STUDENT_OPENING_SENTENCE,
            ))],
            supervisor: SupervisorSlot::prompt(),
            send_active: false,
            phase: Phase::NotStarted,
        };
        let (view_tx, _) = watch::channel(view.clone());

        Self {
            inner: Arc::new(Inner {
                factory: Box::new(factory),
                agent: OnceCell::new(),
                timings,
                state: Mutex::new(DialogState {
                    view,
                    transcript,
                    started: false,
                }),
                view_tx,
            }),
        }
    }

    /// The current visible state.
    pub fn view(&self) -> DialogView {
        self.inner.view_tx.borrow().clone()
    }

    /// A receiver that observes every visible change.
    pub fn subscribe(&self) -> watch::Receiver<DialogView> {
        self.inner.view_tx.subscribe()
    }

    /// A copy of the transcript as it stands.
    pub async fn transcript(&self) -> Transcript {
        self.inner.state.lock().await.transcript.clone()
    }

    pub async fn start(&self) -> Dispatch {
        self.dispatch(Event::Start).await
    }

    /// Runs one event to completion, including all of its timed delays.
    pub async fn dispatch(&self, event: Event) -> Dispatch {
        match event {
            Event::Start => self.run_init().await,
            Event::Submit(message) => self.run_submit(message).await,
            Event::RequestHelp => self.run_help().await,
            Event::Paste(text) => self.record_paste(text).await,
        }
    }

    async fn agent(&self) -> Arc<dyn Agent> {
        self.inner
            .agent
            .get_or_init(|| async { (self.inner.factory)() })
            .await
            .clone()
    }

    /// Applies `f` under the state lock and publishes the resulting view.
    async fn update<R>(&self, f: impl FnOnce(&mut DialogState) -> R) -> R {
        let mut state = self.inner.state.lock().await;
        let result = f(&mut state);
        self.inner.view_tx.send_replace(state.view.clone());
        result
    }

    async fn run_init(&self) -> Dispatch {
        let first = self
            .update(|s| {
                if s.started {
                    return false;
                }
                s.started = true;
                s.view.phase = Phase::Init;
                true
            })
            .await;
        if !first {
            debug!("Dialog already started");
            return Dispatch::Ignored;
        }

        let agent = self.agent().await;
        info!("Dialog starting");
        tokio::time::sleep(self.inner.timings.read_delay).await;
        self.update(|s| s.view.turns.push(VisibleTurn::thinking())).await;

        let settle = match agent.generate_reply().await {
            Ok(parts) => {
                let shown = parts
                    .iter()
                    .map(|p| strip_speaker_label(p))
                    .collect::<Vec<_>>()
                    .join(OPENING_PART_SEPARATOR);
                let reply = parts.join(OPENING_PART_SEPARATOR);
                self.update(|s| {
                    resolve_placeholder(&mut s.view.turns, &shown);
                    s.transcript
                        .append(Channel::Main, TranscriptEntry::now(reply, EntryRole::Agent));
                })
                .await;
                self.inner.timings.init_settle
            }
            Err(e) => {
                error!(error = ?e, "Opening reply failed");
                self.update(|s| resolve_placeholder(&mut s.view.turns, APOLOGY_MESSAGE))
                    .await;
                self.inner.timings.init_failure_settle
            }
        };

        tokio::time::sleep(settle).await;
        self.update(|s| {
            s.view.send_active = true;
            s.view.phase = Phase::Idle;
        })
        .await;
        info!("Dialog ready for input");
        Dispatch::Accepted
    }

    async fn run_submit(&self, message: String) -> Dispatch {
        if message.trim().is_empty() {
            return Dispatch::Ignored;
        }
        let accepted = self
            .update(|s| {
                if !s.view.send_active {
                    return false;
                }
                s.view.send_active = false;
                s.view.phase = Phase::UserTurn;
                s.view.turns.push(VisibleTurn::user(message.clone()));
                true
            })
            .await;
        if !accepted {
            debug!("Submission dropped while input is inactive");
            return Dispatch::Ignored;
        }

        tokio::time::sleep(self.inner.timings.submit_echo).await;
        let content = format!("{TEACHER_PREFIX}{message}");
        self.update(|s| {
            s.transcript.append(
                Channel::Main,
                TranscriptEntry::now(content.clone(), EntryRole::User),
            );
            s.view.supervisor = SupervisorSlot::prompt();
        })
        .await;

        let agent = self.agent().await;
        agent.append_message(ChatMessage::user(content)).await;
        self.student_workflow(agent.as_ref()).await;

        tokio::time::sleep(self.inner.timings.workflow_settle).await;
        self.update(|s| {
            s.view.send_active = true;
            s.view.phase = Phase::Idle;
        })
        .await;
        Dispatch::Accepted
    }

    async fn student_workflow(&self, agent: &dyn Agent) {
        self.update(|s| {
            s.view.phase = Phase::StudentWorkflow;
            s.view.turns.push(VisibleTurn::thinking());
        })
        .await;

        let parts = match agent.generate_reply().await {
            Ok(parts) => parts,
            Err(e) => {
                error!(error = ?e, "Student reply failed");
                self.update(|s| resolve_placeholder(&mut s.view.turns, APOLOGY_MESSAGE))
                    .await;
                return;
            }
        };
        if parts.is_empty() {
            warn!("Agent returned an empty reply");
            self.update(|s| s.view.turns.retain(|t| !t.pending)).await;
            return;
        }

        let count = parts.len();
        for (i, part) in parts.into_iter().enumerate() {
            self.update(|s| {
                resolve_placeholder(&mut s.view.turns, strip_speaker_label(&part));
                s.transcript
                    .append(Channel::Main, TranscriptEntry::now(part, EntryRole::Agent));
            })
            .await;
            tokio::time::sleep(self.inner.timings.part_pause).await;

            if i + 1 < count {
                self.update(|s| s.view.turns.push(VisibleTurn::thinking())).await;
                tokio::time::sleep(self.inner.timings.next_part_thinking).await;
            }
        }
        debug!(parts = count, "Student reply delivered");
    }

    async fn run_help(&self) -> Dispatch {
        let agent = self.agent().await;
        self.update(|s| s.view.supervisor = SupervisorSlot::ProfessorThinking)
            .await;

        match agent.generate_help_reply().await {
            Ok(reply) => {
                self.update(|s| {
                    s.view.supervisor =
                        SupervisorSlot::Reveal(strip_speaker_label(&reply).to_string());
                    s.transcript.append(
                        Channel::Help,
                        TranscriptEntry::now(reply, EntryRole::Supervisor),
                    );
                })
                .await;
            }
            Err(e) => {
                error!(error = ?e, "Help request failed");
                self.update(|s| {
                    s.view.supervisor = SupervisorSlot::Reveal(APOLOGY_MESSAGE.to_string())
                })
                .await;
            }
        }
        Dispatch::Accepted
    }

    async fn record_paste(&self, text: String) -> Dispatch {
        let mut state = self.inner.state.lock().await;
        state
            .transcript
            .append(Channel::Paste, TranscriptEntry::now(text, EntryRole::User));
        Dispatch::Accepted
    }
}
