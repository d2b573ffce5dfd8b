//! Widgets for the upload and chat screens. Reads [`AppState`]; every
//! interaction is sent back as a [`Command`].

use iced::widget::{
    button, center, column, container, horizontal_space, opaque, progress_bar, row, scrollable,
    stack, text, text_input, Column,
};
use iced::{alignment, font, Border, Color, Element, Font, Length, Theme};

use crate::chat::{ChatMessage, MessageKind, Role};
use crate::controller::{AppState, Command, Confirm, Screen, SessionStatus};
use crate::markdown::{self, Block};
use crate::notify::{Severity, Toast};
use crate::upload::{self, UploadPhase};
use crate::Message;

const BOLD: Font = Font {
    weight: font::Weight::Bold,
    ..Font::DEFAULT
};

const ERROR_COLOR: Color = Color {
    r: 0.97,
    g: 0.45,
    b: 0.45,
    a: 1.0,
};
const MUTED_COLOR: Color = Color {
    r: 0.6,
    g: 0.62,
    b: 0.7,
    a: 1.0,
};

fn dispatch(command: Command) -> Message {
    Message::Dispatch(command)
}

pub fn view(state: &AppState) -> Element<'_, Message> {
    let body: Element<Message> = match &state.session {
        SessionStatus::Failed(reason) => session_failed(reason),
        _ => match state.screen {
            Screen::Upload => upload_screen(state),
            Screen::Chat => chat_screen(state),
        },
    };

    let content = container(column![header(state), body].spacing(12).padding(12))
        .width(Length::Fill)
        .height(Length::Fill);

    let mut layers = stack![content];

    if !state.notifications.is_empty() {
        layers = layers.push(toasts(state.notifications.toasts()));
    }
    if let Some(message) = &state.overlay {
        layers = layers.push(busy_overlay(message));
    }
    if let Some(confirm) = state.confirm {
        layers = layers.push(confirm_dialog(confirm));
    }

    layers.into()
}

fn header(state: &AppState) -> Element<'_, Message> {
    let status = match &state.session {
        SessionStatus::Initializing => "Connecting...",
        SessionStatus::Ready(_) => "Session active",
        SessionStatus::Failed(_) => "Disconnected",
    };

    row![
        text("PDF Chat").size(22).font(BOLD),
        horizontal_space(),
        text(status).size(13).color(MUTED_COLOR),
        button(text("New Session").size(14))
            .style(button::secondary)
            .on_press(dispatch(Command::RequestNewSession)),
    ]
    .spacing(12)
    .align_y(alignment::Vertical::Center)
    .into()
}

fn session_failed(reason: &str) -> Element<'_, Message> {
    center(
        column![
            text("Could not connect to the document service").size(20).font(BOLD),
            text(reason).size(14).color(ERROR_COLOR),
            button(text("Reload")).on_press(dispatch(Command::RetrySession)),
        ]
        .spacing(12)
        .align_x(alignment::Horizontal::Center),
    )
    .into()
}

fn upload_screen(state: &AppState) -> Element<'_, Message> {
    let busy = state.busy;
    let max_size = upload::format_limit(state.limits().max_file_size_bytes);

    let mut files = Column::new().spacing(6);
    for (index, file) in state.selection.files().iter().enumerate() {
        let remove = button(text("✕").size(12))
            .style(button::text)
            .on_press_maybe((!busy).then(|| dispatch(Command::RemoveFile(index))));

        files = files.push(
            row![
                text(&file.name).size(15),
                horizontal_space(),
                text(upload::format_size(file.size)).size(13).color(MUTED_COLOR),
                remove,
            ]
            .spacing(10)
            .align_y(alignment::Vertical::Center),
        );
    }

    let actions = row![
        button(text("Choose PDFs..."))
            .style(button::secondary)
            .on_press_maybe((!busy).then_some(Message::PickFiles)),
        button(text("Upload & Process"))
            .style(button::primary)
            .on_press_maybe((!busy).then(|| dispatch(Command::Upload))),
    ]
    .spacing(10);

    let mut content = column![
        text("Upload your documents").size(20).font(BOLD),
        text(format!(
            "Choose PDF files or drop them on this window. Up to {max_size} per file."
        ))
        .size(14)
        .color(MUTED_COLOR),
        files,
        actions,
    ]
    .spacing(14)
    .max_width(640);

    if state.phase != UploadPhase::Idle {
        let percent = state.progress.percent();
        content = content.push(
            column![
                progress_bar(0.0..=100.0, percent),
                text(format!("Processing documents... {percent:.0}%")).size(13),
            ]
            .spacing(6),
        );
    }

    center(content).into()
}

fn chat_screen(state: &AppState) -> Element<'_, Message> {
    let limits = state.limits();
    let transcript = &state.transcript;

    let mut messages = Column::new().spacing(12).padding(4);
    for (index, message) in transcript.messages().iter().enumerate() {
        messages = messages.push(message_bubble(index, message));
    }
    if transcript.is_composing() {
        messages = messages.push(text("Assistant is typing...").size(14).color(MUTED_COLOR));
    }

    let chars = state.input_chars();
    let counter_color = if chars > limits.max_message_chars {
        ERROR_COLOR
    } else {
        MUTED_COLOR
    };

    let input = text_input("Ask a question about your documents...", &state.input)
        .on_input(|value| dispatch(Command::InputChanged(value)))
        .on_submit(dispatch(Command::Send))
        .padding(12)
        .size(16);

    let controls = row![
        text(format!("{chars}/{}", limits.max_message_chars))
            .size(12)
            .color(counter_color),
        horizontal_space(),
        button(text("Clear Chat").size(14))
            .style(button::secondary)
            .on_press_maybe((!state.busy).then(|| dispatch(Command::RequestClearChat))),
        button(text("Send").size(14))
            .style(button::primary)
            .on_press_maybe((!state.busy).then(|| dispatch(Command::Send))),
    ]
    .spacing(10)
    .align_y(alignment::Vertical::Center);

    column![
        scrollable(messages).height(Length::Fill),
        input,
        controls,
    ]
    .spacing(10)
    .into()
}

fn message_bubble(index: usize, message: &ChatMessage) -> Element<'_, Message> {
    let mut body = Column::new().spacing(6);

    match (message.role, message.kind) {
        (Role::User, _) => body = body.push(text(&message.text).size(15)),
        (Role::Bot, MessageKind::Error) => {
            body = body.push(text(&message.text).size(15).color(ERROR_COLOR));
        }
        (Role::Bot, MessageKind::Normal) => {
            for block in markdown::parse(&message.text) {
                body = body.push(render_block(block));
            }
        }
    }

    if !message.sources.is_empty() {
        let arrow = if message.sources_expanded { "▾" } else { "▸" };
        body = body.push(
            button(text(format!("{arrow} {}", message.sources_summary())).size(13))
                .style(button::text)
                .padding(0)
                .on_press(dispatch(Command::ToggleSources(index))),
        );
        if message.sources_expanded {
            for source in &message.sources {
                body = body.push(text(format!("  • {}", source.label())).size(13).color(MUTED_COLOR));
            }
        }
    }

    if message.role == Role::Bot && message.kind == MessageKind::Normal {
        body = body.push(
            button(text("[Copy]").size(12))
                .style(button::text)
                .padding(0)
                .on_press(dispatch(Command::CopyMessage(index))),
        );
    }

    let bubble = container(body)
        .padding(12)
        .max_width(640)
        .style(container::rounded_box);

    match message.role {
        Role::User => row![horizontal_space(), bubble].into(),
        Role::Bot => row![bubble, horizontal_space()].into(),
    }
}

fn render_block(block: Block) -> Element<'static, Message> {
    match block {
        Block::Heading { level, text: heading } => {
            let size = match level {
                1 => 22.0,
                2 => 19.0,
                _ => 17.0,
            };
            text(heading).size(size).font(BOLD).into()
        }
        Block::Paragraph(body) => text(body).size(15).into(),
        Block::ListItem {
            marker,
            depth,
            text: item,
        } => row![
            text(format!("{}{marker}", "    ".repeat(depth))).size(15),
            text(item).size(15),
        ]
        .spacing(6)
        .into(),
        Block::Code(code) => container(text(code).size(13).font(Font::MONOSPACE))
            .padding(8)
            .width(Length::Fill)
            .style(container::rounded_box)
            .into(),
        Block::Quote(body) => text(format!("│ {body}")).size(15).color(MUTED_COLOR).into(),
        Block::Rule => text("────────").color(MUTED_COLOR).into(),
    }
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Info => Color::from_rgb(0.45, 0.65, 0.98),
        Severity::Success => Color::from_rgb(0.45, 0.85, 0.55),
        Severity::Warning => Color::from_rgb(0.98, 0.75, 0.35),
        Severity::Error => ERROR_COLOR,
    }
}

fn toasts(toasts: &[Toast]) -> Element<'_, Message> {
    let list = toasts
        .iter()
        .fold(Column::new().spacing(8).width(Length::Fixed(340.0)), |list, toast| {
            list.push(toast_card(toast))
        });

    container(list)
        .width(Length::Fill)
        .height(Length::Fill)
        .align_x(alignment::Horizontal::Right)
        .align_y(alignment::Vertical::Bottom)
        .padding(16)
        .into()
}

fn toast_card(toast: &Toast) -> Element<'_, Message> {
    let color = severity_color(toast.severity);

    container(
        row![
            text(&toast.message).size(14).width(Length::Fill),
            button(text("✕").size(12))
                .style(button::text)
                .on_press(dispatch(Command::DismissToast(toast.id))),
        ]
        .spacing(8)
        .align_y(alignment::Vertical::Center),
    )
    .padding(10)
    .width(Length::Fill)
    .style(move |theme: &Theme| container::Style {
        border: Border {
            color,
            width: 2.0,
            radius: 6.0.into(),
        },
        ..container::rounded_box(theme)
    })
    .into()
}

fn backdrop(_theme: &Theme) -> container::Style {
    container::Style {
        background: Some(Color::from_rgba(0.0, 0.0, 0.0, 0.6).into()),
        ..container::Style::default()
    }
}

fn busy_overlay(message: &str) -> Element<'_, Message> {
    opaque(
        center(
            container(text(message).size(18))
                .padding(24)
                .style(container::rounded_box),
        )
        .style(backdrop),
    )
}

fn confirm_dialog(confirm: Confirm) -> Element<'static, Message> {
    let (title, body, action) = match confirm {
        Confirm::NewSession => (
            "Start a new session?",
            "Your uploaded documents and this conversation will be discarded.",
            "New Session",
        ),
        Confirm::ClearChat => (
            "Clear the conversation?",
            "All messages will be removed. Your documents stay loaded.",
            "Clear",
        ),
    };

    let dialog = container(
        column![
            text(title).size(18).font(BOLD),
            text(body).size(14),
            row![
                horizontal_space(),
                button(text("Cancel"))
                    .style(button::secondary)
                    .on_press(dispatch(Command::CancelConfirm)),
                button(text(action))
                    .style(button::danger)
                    .on_press(dispatch(Command::Confirm)),
            ]
            .spacing(10),
        ]
        .spacing(14),
    )
    .padding(20)
    .max_width(420)
    .style(container::rounded_box);

    opaque(center(dialog).style(backdrop))
}
