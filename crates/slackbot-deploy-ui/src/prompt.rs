//! Operator interaction. Every suspension point in the bootstrap goes through
//! [`Prompter`] so runs can be scripted.

use dialoguer::Input;
use slackbot_deploy_core::AppError;
use std::collections::VecDeque;
use std::sync::Mutex;

pub trait Prompter: Send + Sync {
    /// Block until the operator acknowledges `message`.
    fn pause(&self, message: &str) -> Result<(), AppError>;

    /// Ask for a line of text. An empty answer is returned as-is unless
    /// `default` is set, in which case the default is returned.
    fn input(&self, label: &str, default: Option<&str>) -> Result<String, AppError>;
}

/// Interactive prompts on the controlling terminal.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn pause(&self, message: &str) -> Result<(), AppError> {
        Input::<String>::new()
            .with_prompt(format!("{message} (press Enter to continue)"))
            .allow_empty(true)
            .interact_text()
            .map_err(|e| AppError::Prompt(e.to_string()))?;
        Ok(())
    }

    fn input(&self, label: &str, default: Option<&str>) -> Result<String, AppError> {
        let mut input = Input::<String>::new().with_prompt(label).allow_empty(true);
        if let Some(d) = default {
            input = input.default(d.to_string());
        }
        input
            .interact_text()
            .map_err(|e| AppError::Prompt(e.to_string()))
    }
}

/// Canned answers for unattended runs and tests. Pauses return immediately.
/// Text prompts consume answers in order; once they run out a prompt's
/// default is used, and a prompt without one fails.
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<String>>,
    pauses: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            pauses: Mutex::new(Vec::new()),
        }
    }

    /// Messages of every pause hit so far.
    pub fn pauses(&self) -> Vec<String> {
        self.pauses.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Prompter for ScriptedPrompter {
    fn pause(&self, message: &str) -> Result<(), AppError> {
        if let Ok(mut pauses) = self.pauses.lock() {
            pauses.push(message.to_string());
        }
        Ok(())
    }

    fn input(&self, label: &str, default: Option<&str>) -> Result<String, AppError> {
        let answer = self
            .answers
            .lock()
            .map_err(|_| AppError::Prompt("answer queue poisoned".into()))?
            .pop_front();
        match (answer, default) {
            (Some(a), Some(d)) if a.is_empty() => Ok(d.to_string()),
            (Some(a), _) => Ok(a),
            (None, Some(d)) => Ok(d.to_string()),
            (None, None) => Err(AppError::Prompt(format!("no answer available for `{label}`"))),
        }
    }
}
