//! Application state and the commands that drive it.
//!
//! Every user action and every network completion arrives as a [`Command`].
//! [`AppState::dispatch`] applies it and returns the [`Effect`]s the shell
//! must perform (requests, timers, clipboard). Nothing in here touches the
//! network or the window, so whole upload/chat flows can be replayed in tests.

use std::time::{Duration, Instant};

use crate::api::{ApiError, ChatAnswer, FilePart, SessionId, UploadResult};
use crate::chat::{self, ChatMessage, MessageRejected, Transcript};
use crate::config::LimitsConfig;
use crate::notify::{Notifications, Severity};
use crate::session::SessionInitError;
use crate::upload::{self, FileSelection, SelectedFile, SimulatedProgress, UploadPhase};

pub const PREPARING_CHAT: &str = "Preparing chat...";
const SESSION_NOT_READY: &str = "Session is not ready yet. Please wait a moment.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Upload,
    Chat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Initializing,
    Ready(SessionId),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirm {
    NewSession,
    ClearChat,
}

#[derive(Debug, Clone)]
pub enum Command {
    SessionReady {
        generation: u64,
        result: Result<SessionId, SessionInitError>,
    },
    RetrySession,
    FilesPicked {
        files: Vec<SelectedFile>,
        unreadable: Vec<String>,
    },
    RemoveFile(usize),
    Upload,
    UploadFinished {
        generation: u64,
        result: Result<UploadResult, ApiError>,
    },
    ShowChat {
        generation: u64,
    },
    ProgressTick,
    InputChanged(String),
    Send,
    AnswerReceived {
        generation: u64,
        result: Result<ChatAnswer, ApiError>,
    },
    ToggleSources(usize),
    CopyMessage(usize),
    RequestNewSession,
    RequestClearChat,
    Confirm,
    CancelConfirm,
    DismissToast(u64),
    ExpireToasts(Instant),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    InitSession {
        generation: u64,
    },
    /// Drop the stored session id, then create a fresh one.
    ResetSession {
        generation: u64,
    },
    Upload {
        generation: u64,
        session: SessionId,
        files: Vec<FilePart>,
    },
    ShowChatAfterDelay {
        generation: u64,
    },
    SendMessage {
        generation: u64,
        session: SessionId,
        text: String,
    },
    CopyToClipboard(String),
}

#[derive(Debug, Clone)]
pub struct AppState {
    limits: LimitsConfig,
    toast_duration: Duration,
    /// Bumped on every new session; results tagged with an older value are stale.
    generation: u64,
    pub session: SessionStatus,
    pub screen: Screen,
    pub busy: bool,
    pub selection: FileSelection,
    pub phase: UploadPhase,
    pub progress: SimulatedProgress,
    pub transcript: Transcript,
    pub input: String,
    pub overlay: Option<String>,
    pub confirm: Option<Confirm>,
    pub notifications: Notifications,
    pending_welcome: Option<String>,
}

impl AppState {
    pub fn new(limits: LimitsConfig, toast_duration: Duration) -> Self {
        Self::with_generation(limits, toast_duration, 0)
    }

    fn with_generation(limits: LimitsConfig, toast_duration: Duration, generation: u64) -> Self {
        AppState {
            limits,
            toast_duration,
            generation,
            session: SessionStatus::Initializing,
            screen: Screen::Upload,
            busy: false,
            selection: FileSelection::default(),
            phase: UploadPhase::Idle,
            progress: SimulatedProgress::default(),
            transcript: Transcript::default(),
            input: String::new(),
            overlay: None,
            confirm: None,
            notifications: Notifications::new(toast_duration),
            pending_welcome: None,
        }
    }

    /// Effects to run when the client starts.
    pub fn start(&self) -> Vec<Effect> {
        vec![Effect::InitSession {
            generation: self.generation,
        }]
    }

    pub fn limits(&self) -> LimitsConfig {
        self.limits
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        match &self.session {
            SessionStatus::Ready(id) => Some(id),
            _ => None,
        }
    }

    pub fn notify(&mut self, message: impl Into<String>, severity: Severity) {
        self.notifications.notify(message, severity);
    }

    pub fn switch_screen(&mut self, target: Screen) {
        if self.screen != target {
            tracing::debug!(?target, "switching screen");
            self.screen = target;
        }
    }

    pub fn set_busy_overlay(&mut self, visible: bool, message: &str) {
        self.overlay = visible.then(|| message.to_string());
    }

    pub fn input_chars(&self) -> usize {
        self.input.chars().count()
    }

    pub fn dispatch(&mut self, command: Command) -> Vec<Effect> {
        match command {
            Command::SessionReady { generation, result } => {
                if self.is_stale(generation) {
                    return Vec::new();
                }
                match result {
                    Ok(id) => self.session = SessionStatus::Ready(id),
                    Err(e) => {
                        tracing::error!(error = %e, "session init failed");
                        self.notify(e.to_string(), Severity::Error);
                        self.session = SessionStatus::Failed(e.to_string());
                    }
                }
                Vec::new()
            }
            Command::RetrySession => {
                if !matches!(self.session, SessionStatus::Failed(_)) {
                    return Vec::new();
                }
                self.session = SessionStatus::Initializing;
                self.start()
            }
            Command::FilesPicked { files, unreadable } => {
                for name in unreadable {
                    self.notify(format!("{name}: Could not read file"), Severity::Error);
                }
                if self.screen == Screen::Upload && !self.busy {
                    self.selection.add(files);
                }
                Vec::new()
            }
            Command::RemoveFile(index) => {
                if !self.busy {
                    self.selection.remove(index);
                }
                Vec::new()
            }
            Command::Upload => self.begin_upload(),
            Command::UploadFinished { generation, result } => {
                if self.is_stale(generation) {
                    return Vec::new();
                }
                self.finish_upload(result)
            }
            Command::ShowChat { generation } => {
                if self.is_stale(generation) || self.phase != UploadPhase::Succeeded {
                    return Vec::new();
                }
                let welcome = self
                    .pending_welcome
                    .take()
                    .unwrap_or_else(|| upload::WELCOME_FALLBACK.to_string());

                self.switch_screen(Screen::Chat);
                self.set_busy_overlay(false, "");
                self.transcript.clear();
                self.transcript.push(ChatMessage::bot(welcome, Vec::new()));
                self.selection.clear();
                self.phase = UploadPhase::Idle;
                self.progress.reset();
                self.busy = false;
                Vec::new()
            }
            Command::ProgressTick => {
                if self.phase == UploadPhase::Uploading {
                    self.progress.tick();
                }
                Vec::new()
            }
            Command::InputChanged(value) => {
                self.input = value;
                Vec::new()
            }
            Command::Send => self.begin_send(),
            Command::AnswerReceived { generation, result } => {
                if self.is_stale(generation) {
                    return Vec::new();
                }
                match result {
                    Ok(answer) => {
                        tracing::info!(sources = answer.sources.len(), "answer received");
                        self.transcript.apply_answer(answer);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "chat request failed");
                        self.transcript.apply_failure();
                        self.notify(e.to_string(), Severity::Error);
                    }
                }
                self.busy = false;
                Vec::new()
            }
            Command::ToggleSources(index) => {
                self.transcript.toggle_sources(index);
                Vec::new()
            }
            Command::CopyMessage(index) => match self.transcript.get(index) {
                Some(message) => {
                    let text = message.text.clone();
                    self.notify("Copied to clipboard", Severity::Info);
                    vec![Effect::CopyToClipboard(text)]
                }
                None => Vec::new(),
            },
            Command::RequestNewSession => {
                self.confirm = Some(Confirm::NewSession);
                Vec::new()
            }
            Command::RequestClearChat => {
                if self.screen == Screen::Chat && !self.busy {
                    self.confirm = Some(Confirm::ClearChat);
                }
                Vec::new()
            }
            Command::Confirm => match self.confirm.take() {
                Some(Confirm::NewSession) => self.reset(),
                Some(Confirm::ClearChat) => {
                    if !self.busy {
                        self.transcript.clear();
                    }
                    Vec::new()
                }
                None => Vec::new(),
            },
            Command::CancelConfirm => {
                self.confirm = None;
                Vec::new()
            }
            Command::DismissToast(id) => {
                self.notifications.dismiss(id);
                Vec::new()
            }
            Command::ExpireToasts(now) => {
                self.notifications.expire(now);
                Vec::new()
            }
        }
    }

    fn is_stale(&self, generation: u64) -> bool {
        if generation != self.generation {
            tracing::debug!(generation, current = self.generation, "dropping stale result");
            return true;
        }
        false
    }

    fn begin_upload(&mut self) -> Vec<Effect> {
        if self.busy || self.screen != Screen::Upload {
            return Vec::new();
        }
        let Some(session) = self.session_id().cloned() else {
            self.notify(SESSION_NOT_READY, Severity::Warning);
            return Vec::new();
        };
        if self.selection.is_empty() {
            self.notify(upload::EMPTY_SELECTION, Severity::Warning);
            return Vec::new();
        }

        let rejected = upload::validate_files(self.selection.files(), self.limits.max_file_size_bytes);
        if !rejected.is_empty() {
            tracing::info!(rejected = rejected.len(), "upload rejected by validation");
            for reason in rejected {
                self.notify(reason.to_string(), Severity::Error);
            }
            return Vec::new();
        }

        tracing::info!(
            files = self.selection.files().len(),
            bytes = self.selection.total_size(),
            "uploading documents"
        );
        self.busy = true;
        self.phase = UploadPhase::Uploading;
        self.progress.reset();

        vec![Effect::Upload {
            generation: self.generation,
            session,
            files: self.selection.files().iter().map(SelectedFile::to_part).collect(),
        }]
    }

    fn finish_upload(&mut self, result: Result<UploadResult, ApiError>) -> Vec<Effect> {
        match result {
            Ok(result) => {
                tracing::info!(acknowledged = result.acknowledged, "upload finished");
                self.progress.complete();
                self.phase = UploadPhase::Succeeded;
                self.pending_welcome = result
                    .welcome_message
                    .filter(|message| !message.trim().is_empty());
                self.notify(upload::SUCCESS_NOTICE, Severity::Success);
                self.set_busy_overlay(true, PREPARING_CHAT);
                vec![Effect::ShowChatAfterDelay {
                    generation: self.generation,
                }]
            }
            Err(e) => {
                tracing::warn!(error = %e, "upload failed");
                self.notify(e.to_string(), Severity::Error);
                self.phase = UploadPhase::Idle;
                self.progress.reset();
                self.busy = false;
                Vec::new()
            }
        }
    }

    fn begin_send(&mut self) -> Vec<Effect> {
        if self.busy || self.screen != Screen::Chat {
            return Vec::new();
        }

        let text = match chat::validate_message(&self.input, self.limits.max_message_chars) {
            Ok(text) => text,
            Err(MessageRejected::Empty) => return Vec::new(),
            Err(e @ MessageRejected::TooLong { .. }) => {
                self.notify(e.to_string(), Severity::Warning);
                return Vec::new();
            }
        };
        let Some(session) = self.session_id().cloned() else {
            self.notify(SESSION_NOT_READY, Severity::Warning);
            return Vec::new();
        };

        tracing::info!(chars = text.chars().count(), "sending question");
        self.transcript.begin_exchange(text.clone());
        self.input.clear();
        self.busy = true;

        vec![Effect::SendMessage {
            generation: self.generation,
            session,
            text,
        }]
    }

    /// Returns to a blank upload screen under a new generation and asks for a fresh session.
    fn reset(&mut self) -> Vec<Effect> {
        tracing::info!("starting a new session");
        *self = Self::with_generation(self.limits, self.toast_duration, self.generation + 1);
        vec![Effect::ResetSession {
            generation: self.generation,
        }]
    }
}
