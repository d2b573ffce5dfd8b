//! Converts assistant answers from markdown into blocks the view can lay out.

use pulldown_cmark::{Event, HeadingLevel, Parser, Tag};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    Paragraph(String),
    ListItem { marker: String, depth: usize, text: String },
    Code(String),
    Quote(String),
    Rule,
}

pub fn parse(markdown: &str) -> Vec<Block> {
    let mut renderer = Renderer::default();
    for event in Parser::new(markdown) {
        renderer.handle(event);
    }
    renderer.finish()
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Block containers that can hold paragraphs.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Container {
    Item(String),
    Quote,
}

#[derive(Default)]
struct Renderer {
    blocks: Vec<Block>,
    buf: String,
    /// Next number for each open list; `None` for bullet lists.
    lists: Vec<Option<u64>>,
    /// Open list items and block quotes, innermost last.
    containers: Vec<Container>,
    heading: Option<u8>,
    in_code: bool,
}

impl Renderer {
    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) | Event::Code(text) => self.buf.push_str(&text),
            Event::SoftBreak => self.buf.push(' '),
            Event::HardBreak => self.buf.push('\n'),
            Event::Rule => {
                self.flush_pending();
                self.blocks.push(Block::Rule);
            }
            Event::TaskListMarker(done) => self.buf.push_str(if done { "[x] " } else { "[ ] " }),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading(level, _, _) => {
                self.flush_pending();
                self.heading = Some(heading_level(level));
            }
            Tag::BlockQuote => {
                self.flush_pending();
                self.containers.push(Container::Quote);
            }
            Tag::CodeBlock(_) => {
                self.flush_pending();
                self.in_code = true;
            }
            Tag::List(start) => {
                self.flush_pending();
                self.lists.push(start);
            }
            Tag::Item => {
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{n}.");
                        *n += 1;
                        marker
                    }
                    _ => "•".to_string(),
                };
                self.containers.push(Container::Item(marker));
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => match self.containers.last() {
                Some(Container::Item(_)) => self.buf.push('\n'),
                _ => self.flush_paragraph(),
            },
            Tag::Heading(..) => {
                let text = self.take_buf();
                let level = self.heading.take().unwrap_or(1);
                if !text.is_empty() {
                    self.blocks.push(Block::Heading { level, text });
                }
            }
            Tag::BlockQuote => {
                self.flush_paragraph();
                self.containers.pop();
            }
            Tag::CodeBlock(_) => {
                self.in_code = false;
                let code = std::mem::take(&mut self.buf);
                self.blocks.push(Block::Code(code.trim_end_matches('\n').to_string()));
            }
            Tag::List(_) => {
                self.lists.pop();
            }
            Tag::Item => {
                self.flush_item();
                self.containers.pop();
            }
            _ => {}
        }
    }

    fn take_buf(&mut self) -> String {
        let text = self.buf.trim().to_string();
        self.buf.clear();
        text
    }

    /// Emits text gathered so far before a nested block starts.
    fn flush_pending(&mut self) {
        match self.containers.last() {
            Some(Container::Item(_)) => self.flush_item(),
            _ => self.flush_paragraph(),
        }
    }

    fn flush_paragraph(&mut self) {
        let text = self.take_buf();
        if text.is_empty() {
            return;
        }
        if self.containers.contains(&Container::Quote) {
            self.blocks.push(Block::Quote(text));
        } else {
            self.blocks.push(Block::Paragraph(text));
        }
    }

    fn flush_item(&mut self) {
        let Some(Container::Item(marker)) = self.containers.last().cloned() else {
            return;
        };
        let text = self.take_buf();
        if !text.is_empty() {
            self.blocks.push(Block::ListItem {
                marker,
                depth: self.lists.len().saturating_sub(1),
                text,
            });
        }
    }

    fn finish(mut self) -> Vec<Block> {
        if self.in_code {
            let code = std::mem::take(&mut self.buf);
            self.blocks.push(Block::Code(code.trim_end_matches('\n').to_string()));
        } else {
            self.flush_paragraph();
        }
        self.blocks
    }
}
