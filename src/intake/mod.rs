//! Turning free text into drafts. The ledger core never parses text itself;
//! front-ends run an extractor and hand the result to the recorder or the engine.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Cents, DebtDraft, Direction, ParseCentsError, SettlementDraft, parse_cents};

/// What a message asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Debt(DebtDraft),
    Settlement(SettlementDraft),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Could not understand: {0}")]
    Unrecognized(String),

    #[error("Invalid amount '{input}': {source}")]
    InvalidAmount {
        input: String,
        source: ParseCentsError,
    },
}

/// Field-extraction collaborator.
#[async_trait]
pub trait DraftExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<Extraction, ExtractionError>;
}

/// Recognizes a handful of fixed phrasings:
///
/// - `settle <person> <amount>` or `paid <person> <amount>`
/// - `<person> owes me <amount> [for] [description]`
/// - `i owe <person> <amount> [for] [description]`
/// - `<amount> <description> (<person>)`, the user fronted the money
#[derive(Debug, Clone, Copy, Default)]
pub struct ShorthandExtractor;

impl ShorthandExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, text: &str) -> Result<Extraction, ExtractionError> {
        let text = text.trim();
        let words: Vec<&str> = text.split_whitespace().collect();
        let unrecognized = || ExtractionError::Unrecognized(text.to_string());

        let Some(first) = words.first() else {
            return Err(unrecognized());
        };

        match first.to_lowercase().as_str() {
            "settle" | "paid" => return parse_settlement(&words[1..]).ok_or_else(unrecognized)?,
            "i" if words.get(1).is_some_and(|w| w.eq_ignore_ascii_case("owe")) => {
                return parse_debt(&words[2..], Direction::OwedByUser).ok_or_else(unrecognized)?;
            }
            _ => {}
        }

        if let Some(pos) = find_phrase(&words, &["owes", "me"]) {
            let person = words[..pos].join(" ");
            let rest = &words[pos + 2..];
            let (amount, description) = split_amount(rest).ok_or_else(unrecognized)?;
            if person.is_empty() {
                return Err(unrecognized());
            }
            return Ok(Extraction::Debt(debt_draft(
                person,
                amount?,
                description,
                Direction::OwedToUser,
            )));
        }

        if let Some(extraction) = parse_fronted(text, &words) {
            return extraction;
        }

        Err(unrecognized())
    }
}

#[async_trait]
impl DraftExtractor for ShorthandExtractor {
    async fn extract(&self, text: &str) -> Result<Extraction, ExtractionError> {
        self.parse(text)
    }
}

fn parse_settlement(words: &[&str]) -> Option<Result<Extraction, ExtractionError>> {
    let (amount, person) = words.split_last()?;
    if person.is_empty() {
        return None;
    }
    Some(amount_from(amount).map(|amount| {
        Extraction::Settlement(SettlementDraft {
            person: person.join(" "),
            amount,
            date: None,
        })
    }))
}

/// `<person words> <amount> [for] [description]`
fn parse_debt(words: &[&str], direction: Direction) -> Option<Result<Extraction, ExtractionError>> {
    let pos = words.iter().position(|w| looks_like_amount(w))?;
    if pos == 0 {
        return None;
    }
    let person = words[..pos].join(" ");
    let (amount, description) = split_amount(&words[pos..])?;
    Some(amount.map(|amount| Extraction::Debt(debt_draft(person, amount, description, direction))))
}

/// `<amount> <description> (<person>)`
fn parse_fronted(text: &str, words: &[&str]) -> Option<Result<Extraction, ExtractionError>> {
    if !looks_like_amount(words.first()?) || !text.ends_with(')') {
        return None;
    }
    let open = text.rfind('(')?;
    let person = text[open + 1..text.len() - 1].trim();
    if person.is_empty() {
        return None;
    }
    let head: Vec<&str> = text[..open].split_whitespace().collect();
    let (amount, description) = split_amount(&head)?;
    Some(amount.map(|amount| {
        Extraction::Debt(debt_draft(
            person.to_string(),
            amount,
            description,
            Direction::OwedToUser,
        ))
    }))
}

/// Split `<amount> [for] [description...]`.
fn split_amount(words: &[&str]) -> Option<(Result<Cents, ExtractionError>, String)> {
    let (amount, rest) = words.split_first()?;
    let rest = match rest.first() {
        Some(w) if w.eq_ignore_ascii_case("for") => &rest[1..],
        _ => rest,
    };
    Some((amount_from(amount), rest.join(" ")))
}

fn amount_from(word: &str) -> Result<Cents, ExtractionError> {
    let cleaned = word.trim_start_matches(['$', '€', '£']);
    parse_cents(cleaned).map_err(|source| ExtractionError::InvalidAmount {
        input: word.to_string(),
        source,
    })
}

fn looks_like_amount(word: &str) -> bool {
    word.trim_start_matches(['$', '€', '£'])
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit())
}

fn find_phrase(words: &[&str], phrase: &[&str]) -> Option<usize> {
    words.windows(phrase.len()).position(|window| {
        window
            .iter()
            .zip(phrase)
            .all(|(w, p)| w.eq_ignore_ascii_case(p))
    })
}

fn debt_draft(person: String, amount: Cents, description: String, direction: Direction) -> DebtDraft {
    DebtDraft {
        person,
        amount,
        description,
        direction,
        date: None,
    }
}
