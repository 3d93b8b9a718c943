//! Terminal renderer for notices, streamed replies and history.

use super::MessageLevel;
use crate::session::{ChatMessage, MessageRole};
use crossterm::{
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    ExecutableCommand,
};
use std::io::{stdout, Write};

const ERROR_COLOR: Color = Color::Red;
const USER_COLOR: Color = Color::Cyan;
const ASSISTANT_COLOR: Color = Color::Magenta;

/// Terminal renderer.
#[derive(Debug, Default)]
pub struct TerminalRenderer;

impl TerminalRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Print a one-line status notice.
    pub fn render_notice(&self, level: MessageLevel, text: &str) -> std::io::Result<()> {
        stdout()
            .execute(SetForegroundColor(level_color(level)))?
            .execute(Print(level_prefix(level)))?
            .execute(Print(text))?
            .execute(Print("\n"))?
            .execute(ResetColor)?;
        Ok(())
    }

    /// Print the speaker label that precedes a streamed reply.
    pub fn render_reply_header(&self, model: &str) -> std::io::Result<()> {
        println!();
        stdout()
            .execute(SetForegroundColor(ASSISTANT_COLOR))?
            .execute(SetAttribute(Attribute::Bold))?
            .execute(Print(model))?
            .execute(Print(":"))?
            .execute(SetAttribute(Attribute::Reset))?
            .execute(ResetColor)?;
        println!();
        Ok(())
    }

    /// Print newly streamed reply text without a trailing newline.
    pub fn render_delta(&self, text: &str) -> std::io::Result<()> {
        let mut stdout = stdout();
        stdout.execute(Print(text))?;
        stdout.flush()
    }

    /// Close off a streamed reply.
    pub fn render_reply_end(&self) -> std::io::Result<()> {
        println!();
        println!();
        Ok(())
    }

    /// Print a turn failure.
    pub fn render_error(&self, text: &str) -> std::io::Result<()> {
        stdout()
            .execute(SetForegroundColor(ERROR_COLOR))?
            .execute(SetAttribute(Attribute::Bold))?
            .execute(Print(text))?
            .execute(SetAttribute(Attribute::Reset))?
            .execute(ResetColor)?;
        println!();
        Ok(())
    }

    /// Print the whole conversation log.
    pub fn render_history(&self, messages: &[ChatMessage]) -> std::io::Result<()> {
        if messages.is_empty() {
            return self.render_notice(MessageLevel::Info, "History is empty");
        }
        for message in messages {
            let color = if message.is_error() {
                ERROR_COLOR
            } else {
                match message.role {
                    MessageRole::User => USER_COLOR,
                    MessageRole::Assistant => ASSISTANT_COLOR,
                }
            };
            stdout()
                .execute(SetForegroundColor(Color::DarkGrey))?
                .execute(Print(format!("[{}] ", message.timestamp())))?
                .execute(SetForegroundColor(color))?
                .execute(Print(format!("{}: ", speaker(message))))?
                .execute(ResetColor)?
                .execute(Print(&message.text))?
                .execute(Print("\n"))?;
        }
        Ok(())
    }
}

fn level_color(level: MessageLevel) -> Color {
    match level {
        MessageLevel::Info => Color::White,
        MessageLevel::Success => Color::Green,
        MessageLevel::Warning => Color::Yellow,
        MessageLevel::Error => ERROR_COLOR,
        MessageLevel::Debug => Color::DarkGrey,
    }
}

fn level_prefix(level: MessageLevel) -> &'static str {
    match level {
        MessageLevel::Success => "✓ ",
        MessageLevel::Warning => "⚠ ",
        MessageLevel::Error => "✗ ",
        _ => "",
    }
}

fn speaker(message: &ChatMessage) -> &'static str {
    match message.role {
        MessageRole::User => "you",
        MessageRole::Assistant if message.is_error() => "error",
        MessageRole::Assistant => "assistant",
    }
}
