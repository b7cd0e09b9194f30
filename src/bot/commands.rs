//! Bot commands and their replies

use crate::core::Counter;

pub const START_TEXT: &str =
    "Привет! Команда /stats покажет, сколько человек за сегодня открыли приложение.";
pub const ADMIN_ONLY_TEXT: &str = "⛔ Команда доступна только администратору.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stats,
}

impl Command {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "/start" => Some(Command::Start),
            "/stats" => Some(Command::Stats),
            _ => None,
        }
    }
}

/// Reply text for `command` sent from `chat_id`
pub fn reply(command: Command, chat_id: i64, admin_id: Option<&str>, counter: &Counter) -> String {
    match command {
        Command::Start => START_TEXT.to_string(),
        Command::Stats => {
            if admin_id.is_some_and(|admin| admin != chat_id.to_string()) {
                return ADMIN_ONLY_TEXT.to_string();
            }
            counter.today_summary().to_string()
        }
    }
}
