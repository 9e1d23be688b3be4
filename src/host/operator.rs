//! Operator-input collaborator
//!
//! Modal prompts that suspend the workflow until the operator answers or
//! cancels. `TerminalOperator` asks on a terminal, `ScriptedOperator` answers
//! from a file for unattended runs.

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome<T> {
    Entered(T),
    Cancelled,
}

impl<T> PromptOutcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PromptOutcome::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmKind {
    /// A business-rule warning the operator must accept to continue
    Warning,
    /// Final go-ahead for a receipt without identifiers
    Receipt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPrompt {
    pub kind: ConfirmKind,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPrompt {
    pub item_number: String,
    /// Exact number of serial numbers to collect
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotPrompt {
    pub item_number: String,
    pub quantity: String,
    pub expiration_required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotEntry {
    pub lot: String,
    pub expiration: Option<NaiveDate>,
}

#[derive(Debug, Error)]
pub enum OperatorError {
    #[error("operator input unavailable: {message}")]
    Unavailable { message: String },
    #[error("invalid scripted answer: {message}")]
    InvalidScript { message: String },
}

impl From<std::io::Error> for OperatorError {
    fn from(err: std::io::Error) -> Self {
        OperatorError::Unavailable {
            message: err.to_string(),
        }
    }
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait OperatorPrompt: Send + Sync {
    async fn confirm(&self, prompt: &ConfirmPrompt) -> Result<PromptOutcome<()>, OperatorError>;

    async fn serial_numbers(
        &self,
        prompt: &SerialPrompt,
    ) -> Result<PromptOutcome<Vec<String>>, OperatorError>;

    async fn lot(&self, prompt: &LotPrompt) -> Result<PromptOutcome<LotEntry>, OperatorError>;
}

/// Keyword that fills today's date into an expiration prompt
pub const TODAY_SHORTCUT: &str = "t";
/// Line that cancels any terminal prompt
pub const CANCEL_INPUT: &str = ":cancel";

/// Parse an expiration answer: the today shortcut, `YYYY-MM-DD` or `YYYYMMDD`
pub fn parse_expiration(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let input = input.trim();
    if input.eq_ignore_ascii_case(TODAY_SHORTCUT) || input.eq_ignore_ascii_case("today") {
        return Some(today);
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(input, "%Y%m%d"))
        .ok()
}

type TodayFn = Box<dyn Fn() -> NaiveDate + Send + Sync>;

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Prompts on a line-oriented terminal. End of input or `:cancel` cancels.
pub struct TerminalOperator<R, W> {
    io: tokio::sync::Mutex<(R, W)>,
    today: TodayFn,
}

impl TerminalOperator<tokio::io::BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(tokio::io::BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> TerminalOperator<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: tokio::sync::Mutex::new((reader, writer)),
            today: Box::new(local_today),
        }
    }

    pub fn with_today(mut self, today: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.today = Box::new(today);
        self
    }

    /// Write a question and read one answer line; `None` means cancelled
    async fn ask(io: &mut (R, W), question: &str) -> Result<Option<String>, OperatorError> {
        let (reader, writer) = io;
        writer.write_all(question.as_bytes()).await?;
        writer.flush().await?;

        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        let answer = line.trim_end_matches(['\r', '\n']).to_string();
        if answer.trim() == CANCEL_INPUT {
            return Ok(None);
        }
        Ok(Some(answer))
    }
}

#[async_trait]
impl<R, W> OperatorPrompt for TerminalOperator<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn confirm(&self, prompt: &ConfirmPrompt) -> Result<PromptOutcome<()>, OperatorError> {
        let mut io = self.io.lock().await;
        let question = format!("\n{}\n{}\nProceed? [y/N] ", prompt.title, prompt.message);
        match Self::ask(&mut io, &question).await? {
            Some(answer) if matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") => {
                Ok(PromptOutcome::Entered(()))
            }
            _ => Ok(PromptOutcome::Cancelled),
        }
    }

    async fn serial_numbers(
        &self,
        prompt: &SerialPrompt,
    ) -> Result<PromptOutcome<Vec<String>>, OperatorError> {
        let mut io = self.io.lock().await;
        let mut serials = Vec::with_capacity(prompt.count as usize);
        for index in 1..=prompt.count {
            let question = format!(
                "Serial number {index}/{} for {}: ",
                prompt.count, prompt.item_number
            );
            match Self::ask(&mut io, &question).await? {
                Some(serial) => serials.push(serial.trim().to_string()),
                None => return Ok(PromptOutcome::Cancelled),
            }
        }
        Ok(PromptOutcome::Entered(serials))
    }

    async fn lot(&self, prompt: &LotPrompt) -> Result<PromptOutcome<LotEntry>, OperatorError> {
        let mut io = self.io.lock().await;
        let question = format!(
            "Lot number for {} ({}): ",
            prompt.item_number, prompt.quantity
        );
        let Some(lot) = Self::ask(&mut io, &question).await? else {
            return Ok(PromptOutcome::Cancelled);
        };

        let mut expiration = None;
        if prompt.expiration_required {
            loop {
                let question = format!("Expiration date (YYYY-MM-DD, '{TODAY_SHORTCUT}' for today): ");
                let Some(answer) = Self::ask(&mut io, &question).await? else {
                    return Ok(PromptOutcome::Cancelled);
                };
                if let Some(date) = parse_expiration(&answer, (self.today)()) {
                    expiration = Some(date);
                    break;
                }
                io.1.write_all(b"Not a valid date.\n").await?;
            }
        }

        Ok(PromptOutcome::Entered(LotEntry {
            lot: lot.trim().to_string(),
            expiration,
        }))
    }
}

/// Answers for an unattended run
///
/// ```toml
/// confirmations = [true, false]   # consumed in order, then `default_confirm`
/// serials = ["SN-1", "SN-2"]      # leave out to cancel the serial prompt
/// lot = "LOT-42"
/// expiration = "today"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedAnswers {
    #[serde(default)]
    pub confirmations: Vec<bool>,
    #[serde(default = "default_confirm")]
    pub default_confirm: bool,
    pub serials: Option<Vec<String>>,
    pub lot: Option<String>,
    pub expiration: Option<String>,
}

fn default_confirm() -> bool {
    true
}

impl Default for ScriptedAnswers {
    fn default() -> Self {
        Self {
            confirmations: Vec::new(),
            default_confirm: default_confirm(),
            serials: None,
            lot: None,
            expiration: None,
        }
    }
}

/// Prompt shown to a scripted operator, kept for audit and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShownPrompt {
    Confirm(ConfirmPrompt),
    Serials(SerialPrompt),
    Lot(LotPrompt),
}

pub struct ScriptedOperator {
    answers: ScriptedAnswers,
    shown: Mutex<Vec<ShownPrompt>>,
    today: NaiveDate,
}

impl ScriptedOperator {
    pub fn new(answers: ScriptedAnswers) -> Self {
        Self {
            answers,
            shown: Mutex::new(Vec::new()),
            today: local_today(),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::new(toml::from_str(&content)?))
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn shown(&self) -> Vec<ShownPrompt> {
        self.shown
            .lock()
            .map(|shown| shown.clone())
            .unwrap_or_default()
    }

    /// Index of the next confirmation to answer, after recording the prompt
    fn record(&self, prompt: ShownPrompt) -> usize {
        let mut shown = self.shown.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        shown.push(prompt);
        shown
            .iter()
            .filter(|p| matches!(p, ShownPrompt::Confirm(_)))
            .count()
    }
}

#[async_trait]
impl OperatorPrompt for ScriptedOperator {
    async fn confirm(&self, prompt: &ConfirmPrompt) -> Result<PromptOutcome<()>, OperatorError> {
        let position = self.record(ShownPrompt::Confirm(prompt.clone())) - 1;
        let proceed = self
            .answers
            .confirmations
            .get(position)
            .copied()
            .unwrap_or(self.answers.default_confirm);
        Ok(if proceed {
            PromptOutcome::Entered(())
        } else {
            PromptOutcome::Cancelled
        })
    }

    async fn serial_numbers(
        &self,
        prompt: &SerialPrompt,
    ) -> Result<PromptOutcome<Vec<String>>, OperatorError> {
        self.record(ShownPrompt::Serials(prompt.clone()));
        Ok(match &self.answers.serials {
            Some(serials) => PromptOutcome::Entered(serials.clone()),
            None => PromptOutcome::Cancelled,
        })
    }

    async fn lot(&self, prompt: &LotPrompt) -> Result<PromptOutcome<LotEntry>, OperatorError> {
        self.record(ShownPrompt::Lot(prompt.clone()));
        let Some(lot) = &self.answers.lot else {
            return Ok(PromptOutcome::Cancelled);
        };

        let expiration = match (&self.answers.expiration, prompt.expiration_required) {
            (_, false) => None,
            (None, true) => return Ok(PromptOutcome::Cancelled),
            (Some(raw), true) => Some(parse_expiration(raw, self.today).ok_or_else(|| {
                OperatorError::InvalidScript {
                    message: format!("expiration '{raw}' is not a date"),
                }
            })?),
        };

        Ok(PromptOutcome::Entered(LotEntry {
            lot: lot.clone(),
            expiration,
        }))
    }
}
