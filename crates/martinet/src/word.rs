//! Command words and their expansion.
//!
//! A [`Word`] is the unit a command line is built from: literal text,
//! variable references, or a concatenation of both, either quoted or
//! unquoted. Expansion resolves variables against the session table and —
//! for unquoted words only — splits the *resolved* text on the mode's IFS
//! characters. Literal text is never re-split, and a quoted word always
//! produces exactly one field. Runs of separators collapse, so expansion
//! never yields empty fields; an unquoted word that resolves to nothing
//! vanishes entirely.

use crate::error::{Error, Result};
use crate::mode::Mode;
use crate::session::VarTable;

/// One segment of a word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordPart {
    /// Literal text, passed through untouched.
    Text(String),
    /// A variable reference, resolved at expansion time.
    Var(String),
}

/// A command word: parts plus a quoting flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    parts: Vec<WordPart>,
    quoted: bool,
}

impl Word {
    /// A literal word.
    pub fn lit(text: impl Into<String>) -> Self {
        Word {
            parts: vec![WordPart::Text(text.into())],
            quoted: false,
        }
    }

    /// An unquoted variable reference, subject to field splitting.
    pub fn var(name: impl Into<String>) -> Self {
        Word {
            parts: vec![WordPart::Var(name.into())],
            quoted: false,
        }
    }

    /// A quoted variable reference: always exactly one field.
    pub fn var_quoted(name: impl Into<String>) -> Self {
        Word {
            parts: vec![WordPart::Var(name.into())],
            quoted: true,
        }
    }

    /// An unquoted concatenation of parts.
    pub fn unquoted(parts: Vec<WordPart>) -> Self {
        Word { parts, quoted: false }
    }

    /// A quoted concatenation of parts.
    pub fn quoted(parts: Vec<WordPart>) -> Self {
        Word { parts, quoted: true }
    }

    /// Whether this word is quoted.
    pub fn is_quoted(&self) -> bool {
        self.quoted
    }

    /// Resolve variables and split into fields.
    ///
    /// With nounset active, referencing an unset variable is an
    /// [`Error::UndefinedVariable`]; otherwise it resolves empty.
    pub fn expand(&self, vars: &VarTable, mode: &Mode) -> Result<Vec<String>> {
        let mut fields: Vec<String> = Vec::new();
        // A quoted word contributes a field even when it resolves empty.
        let mut current: Option<String> = self.quoted.then(String::new);

        for part in &self.parts {
            match part {
                WordPart::Text(text) => {
                    current.get_or_insert_with(String::new).push_str(text);
                }
                WordPart::Var(name) => {
                    let value = match vars.get(name) {
                        Some(value) => value,
                        None if mode.nounset() => {
                            return Err(Error::UndefinedVariable { name: name.clone() });
                        }
                        None => "",
                    };
                    if self.quoted {
                        current.get_or_insert_with(String::new).push_str(value);
                    } else {
                        split_into(value, mode.ifs(), &mut fields, &mut current);
                    }
                }
            }
        }

        if let Some(last) = current {
            fields.push(last);
        }
        Ok(fields)
    }

    /// The word as written, for display in traces: variables stay
    /// unexpanded as `${NAME}` and quoted words keep their quotes.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.quoted {
            out.push('"');
        }
        for part in &self.parts {
            match part {
                WordPart::Text(text) => out.push_str(text),
                WordPart::Var(name) => {
                    out.push_str("${");
                    out.push_str(name);
                    out.push('}');
                }
            }
        }
        if self.quoted {
            out.push('"');
        }
        out
    }
}

impl From<&str> for Word {
    fn from(text: &str) -> Self {
        Word::lit(text)
    }
}

impl From<String> for Word {
    fn from(text: String) -> Self {
        Word::lit(text)
    }
}

/// Walk a resolved value, closing the accumulating field at each separator.
///
/// Adjacent separators collapse; a leading separator closes nothing and a
/// trailing one leaves no empty field behind.
fn split_into(value: &str, ifs: &str, fields: &mut Vec<String>, current: &mut Option<String>) {
    for ch in value.chars() {
        if ifs.contains(ch) {
            if let Some(done) = current.take() {
                fields.push(done);
            }
        } else {
            current.get_or_insert_with(String::new).push(ch);
        }
    }
}
