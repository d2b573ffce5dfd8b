mod api;
mod chat;
mod config;
mod controller;
mod markdown;
mod notify;
mod session;
mod upload;
mod view;

use iced::{
    event::{self, Event as IcedEvent},
    keyboard::{self, Key},
    time, window, Element, Size, Subscription, Task, Theme,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

use api::{ApiClient, Backend};
use config::Config;
use controller::{AppState, Command, Effect};
use session::SessionStore;
use upload::{SelectedFile, UploadPhase};

const TOAST_SWEEP: Duration = Duration::from_millis(250);

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pdf_chat=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let config = Config::load();
    let backend: Arc<dyn Backend> = Arc::new(ApiClient::with_config(&config.backend)?);
    tracing::info!(backend = %config.backend.base_url, "starting pdf-chat");

    let window_size = Size::new(config.window.width as f32, config.window.height as f32);

    iced::application("PDF Chat", App::update, App::view)
        .theme(App::theme)
        .subscription(App::subscription)
        .window(window::Settings {
            size: window_size,
            position: window::Position::Centered,
            ..Default::default()
        })
        .run_with(move || App::new(config, backend))?;

    Ok(())
}

#[derive(Debug, Clone)]
pub enum Message {
    Dispatch(Command),
    PickFiles,
    FilesChosen(Vec<PathBuf>),
    ToastSweep(Instant),
    ProgressTick,
    Escape,
}

struct App {
    config: Config,
    state: AppState,
    backend: Arc<dyn Backend>,
    sessions: SessionStore,
}

impl App {
    fn new(config: Config, backend: Arc<dyn Backend>) -> (Self, Task<Message>) {
        let state = AppState::new(config.limits, config.toast_duration());
        let startup = state.start();

        let app = App {
            config,
            state,
            backend,
            sessions: SessionStore::new(),
        };
        let task = app.perform(startup);

        (app, task)
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Dispatch(command) => {
                let effects = self.state.dispatch(command);
                self.perform(effects)
            }
            Message::PickFiles => Task::perform(
                async {
                    rfd::AsyncFileDialog::new()
                        .set_title("Select PDF documents")
                        .add_filter("PDF", &["pdf"])
                        .pick_files()
                        .await
                        .map(|files| {
                            files
                                .iter()
                                .map(|f| f.path().to_path_buf())
                                .collect::<Vec<PathBuf>>()
                        })
                        .unwrap_or_default()
                },
                Message::FilesChosen,
            ),
            Message::FilesChosen(paths) => {
                if paths.is_empty() {
                    return Task::none();
                }
                let command = read_selection(paths);
                self.update(Message::Dispatch(command))
            }
            Message::ToastSweep(now) => self.update(Message::Dispatch(Command::ExpireToasts(now))),
            Message::ProgressTick => self.update(Message::Dispatch(Command::ProgressTick)),
            Message::Escape => {
                if self.state.confirm.is_some() {
                    self.update(Message::Dispatch(Command::CancelConfirm))
                } else {
                    Task::none()
                }
            }
        }
    }

    fn perform(&self, effects: Vec<Effect>) -> Task<Message> {
        Task::batch(effects.into_iter().map(|effect| self.perform_one(effect)))
    }

    fn perform_one(&self, effect: Effect) -> Task<Message> {
        let backend = self.backend.clone();

        match effect {
            Effect::InitSession { generation } => {
                let sessions = self.sessions.clone();
                Task::future(async move {
                    let result = sessions.get_or_create(backend.as_ref()).await;
                    Message::Dispatch(Command::SessionReady { generation, result })
                })
            }
            Effect::ResetSession { generation } => {
                let sessions = self.sessions.clone();
                Task::future(async move {
                    sessions.reset();
                    let result = sessions.get_or_create(backend.as_ref()).await;
                    Message::Dispatch(Command::SessionReady { generation, result })
                })
            }
            Effect::Upload {
                generation,
                session,
                files,
            } => Task::future(async move {
                let result = backend.upload_files(&session, &files).await;
                Message::Dispatch(Command::UploadFinished { generation, result })
            }),
            Effect::ShowChatAfterDelay { generation } => {
                let delay = self.config.chat_switch_delay();
                Task::future(async move {
                    tokio::time::sleep(delay).await;
                    Message::Dispatch(Command::ShowChat { generation })
                })
            }
            Effect::SendMessage {
                generation,
                session,
                text,
            } => Task::future(async move {
                let result = backend.send_message(&session, &text).await;
                Message::Dispatch(Command::AnswerReceived { generation, result })
            }),
            Effect::CopyToClipboard(text) => iced::clipboard::write(text),
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        let mut subscriptions = Vec::new();

        if !self.state.notifications.is_empty() {
            subscriptions.push(time::every(TOAST_SWEEP).map(Message::ToastSweep));
        }

        if self.state.phase == UploadPhase::Uploading {
            subscriptions.push(time::every(self.config.progress_tick()).map(|_| Message::ProgressTick));
        }

        subscriptions.push(event::listen_with(|event, _status, _id| match event {
            IcedEvent::Window(window::Event::FileDropped(path)) => {
                Some(Message::FilesChosen(vec![path]))
            }
            IcedEvent::Keyboard(keyboard::Event::KeyPressed {
                key: Key::Named(keyboard::key::Named::Escape),
                ..
            }) => Some(Message::Escape),
            _ => None,
        }));

        Subscription::batch(subscriptions)
    }

    fn view(&self) -> Element<Message> {
        view::view(&self.state)
    }

    fn theme(&self) -> Theme {
        Theme::TokyoNight
    }
}

/// Reads metadata for chosen paths; paths that cannot be read are reported by name.
fn read_selection(paths: Vec<PathBuf>) -> Command {
    let mut files = Vec::new();
    let mut unreadable = Vec::new();

    for path in paths {
        match SelectedFile::from_path(&path) {
            Ok(file) => files.push(file),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read selected file");
                unreadable.push(
                    path.file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| path.display().to_string()),
                );
            }
        }
    }

    Command::FilesPicked { files, unreadable }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_selection_splits_unreadable() {
        let good = std::env::temp_dir().join(format!("pdf-chat-main-{}.pdf", std::process::id()));
        std::fs::write(&good, b"%PDF").unwrap();
        let missing = PathBuf::from("/no/such/dir/ghost.pdf");

        match read_selection(vec![good.clone(), missing]) {
            Command::FilesPicked { files, unreadable } => {
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].path, good);
                assert_eq!(unreadable, vec!["ghost.pdf".to_string()]);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        std::fs::remove_file(&good).ok();
    }
}
