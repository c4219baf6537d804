use std::{borrow::Cow, fmt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One element of a [`Message`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Atom {
    Int(i64),
    Str(String),
    List(Message),
}

/// A Message is what gets passed around: a "bang", an int, a string, or a vector.
///
/// A message holding exactly one int (or string) atom *is* that int (or string)
/// for classification purposes. Anything else that is not empty is a vector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(Vec<Atom>);

#[derive(Debug, Error, PartialEq)]
pub enum MessageError {
    #[error("cannot convert JSON value to a message: {0}")]
    Unsupported(String),
}

/// Build a [`Message`] from a list of ints, strings and nested messages.
///
/// `msg![]` is a bang, `msg![1, "a", msg![2, 3]]` is a nested vector.
#[macro_export]
macro_rules! msg {
    () => {
        $crate::message::Message::bang()
    };
    ($($atom:expr),+ $(,)?) => {
        $crate::message::Message::from(vec![$($crate::message::Atom::from($atom)),+])
    };
}

impl Message {
    pub fn bang() -> Self {
        Message(Vec::new())
    }

    /// Parse whitespace separated tokens, turning each token into an int when
    /// it lexes as one and keeping it as a string otherwise.
    pub fn parse(text: &str) -> Self {
        text.split_whitespace().map(Atom::from_token).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Atom> {
        self.0.iter()
    }

    pub fn push(&mut self, atom: impl Into<Atom>) {
        self.0.push(atom.into());
    }

    pub fn is_bang(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_int(&self) -> bool {
        matches!(self.0.as_slice(), [Atom::Int(_)])
    }

    pub fn is_string(&self) -> bool {
        matches!(self.0.as_slice(), [Atom::Str(_)])
    }

    /// True for anything that is neither a bang, an int nor a string.
    pub fn is_vector(&self) -> bool {
        !(self.is_bang() || self.is_int() || self.is_string())
    }

    /// The int in this message, else 0.
    pub fn as_int(&self) -> i64 {
        match self.0.as_slice() {
            [Atom::Int(n)] => *n,
            _ => 0,
        }
    }

    /// The string in this message, else "".
    pub fn as_string(&self) -> &str {
        match self.0.as_slice() {
            [Atom::Str(s)] => s,
            _ => "",
        }
    }

    /// Index into arbitrarily deeply nested messages.
    ///
    /// Every index unwraps one level. A scalar element behaves like a vector of
    /// length one, and any out-of-range step yields a bang.
    pub fn at(&self, indices: &[usize]) -> Message {
        let mut current = self;
        for (step, &index) in indices.iter().enumerate() {
            match current.0.get(index) {
                Some(Atom::List(inner)) => current = inner,
                Some(scalar) => {
                    let rest = &indices[step + 1..];
                    return if rest.iter().all(|&i| i == 0) {
                        Message(vec![scalar.clone()])
                    } else {
                        Message::bang()
                    };
                }
                None => return Message::bang(),
            }
        }
        current.clone()
    }

    pub fn to_json(&self) -> Value {
        Value::Array(self.0.iter().map(Atom::to_json).collect())
    }
}

impl Atom {
    /// An int if `token` lexes as one, else a string.
    pub fn from_token(token: &str) -> Self {
        match token.parse::<i64>() {
            Ok(n) => Atom::Int(n),
            Err(_) => Atom::Str(token.to_string()),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Atom::Int(n) => Value::from(*n),
            Atom::Str(s) => Value::from(s.as_str()),
            Atom::List(m) => m.to_json(),
        }
    }
}

/// Strings are quoted when they could be mistaken for something else.
fn render_string(s: &str) -> Cow<'_, str> {
    if s.is_empty() {
        return Cow::Borrowed("\"\"");
    }
    let quoted = quote(s);
    if s.parse::<i64>().is_ok() || s.contains(' ') || quoted.len() != s.len() + 2 {
        Cow::Owned(quoted)
    } else {
        Cow::Borrowed(s)
    }
}

/// Double-quote `s`, escaping quotes, backslashes and non-printable chars
/// the way Go's `%q` verb does.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            c if is_printable(c) => out.push(c),
            '\u{7}' => out.push_str("\\a"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{b}' => out.push_str("\\v"),
            c if c < ' ' || c == '\u{7f}' => out.push_str(&format!("\\x{:02x}", c as u32)),
            c if (c as u32) < 0x10000 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push_str(&format!("\\U{:08x}", c as u32)),
        }
    }
    out.push('"');
    out
}

/// Letters, marks, numbers, punctuation, symbols and the ASCII space.
///
/// Controls, separators other than ' ', format characters, private use
/// and noncharacters are not printable. Unassigned code points count as
/// printable.
fn is_printable(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    let cp = c as u32;
    let format = matches!(
        cp,
        0xad | 0x600..=0x605
            | 0x61c
            | 0x6dd
            | 0x70f
            | 0x890..=0x891
            | 0x8e2
            | 0x180e
            | 0x200b..=0x200f
            | 0x202a..=0x202e
            | 0x2060..=0x2064
            | 0x2066..=0x206f
            | 0xfeff
            | 0xfff9..=0xfffb
            | 0x110bd
            | 0x110cd
            | 0x13430..=0x1343f
            | 0x1bca0..=0x1bca3
            | 0x1d173..=0x1d17a
            | 0xe0001
            | 0xe0020..=0xe007f
    );
    let private_use = matches!(cp, 0xe000..=0xf8ff | 0xf0000..=0xffffd | 0x100000..=0x10fffd);
    let noncharacter = matches!(cp, 0xfdd0..=0xfdef) || cp & 0xfffe == 0xfffe;
    !(c.is_control() || c.is_whitespace() || format || private_use || noncharacter)
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => f.write_str("[]"),
            [Atom::Int(n)] => write!(f, "{n}"),
            [Atom::Str(s)] => f.write_str(&render_string(s)),
            atoms => {
                for (i, atom) in atoms.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    match atom {
                        Atom::Int(n) => write!(f, "{n}")?,
                        Atom::Str(s) => f.write_str(&render_string(s))?,
                        Atom::List(inner) if inner.is_vector() => write!(f, "[{inner}]")?,
                        Atom::List(inner) => write!(f, "{inner}")?,
                    }
                }
                Ok(())
            }
        }
    }
}

impl From<i64> for Atom {
    fn from(n: i64) -> Self {
        Atom::Int(n)
    }
}

impl From<i32> for Atom {
    fn from(n: i32) -> Self {
        Atom::Int(n.into())
    }
}

impl From<&str> for Atom {
    fn from(s: &str) -> Self {
        Atom::Str(s.to_string())
    }
}

impl From<String> for Atom {
    fn from(s: String) -> Self {
        Atom::Str(s)
    }
}

impl From<Message> for Atom {
    fn from(m: Message) -> Self {
        Atom::List(m)
    }
}

impl From<Vec<Atom>> for Message {
    fn from(atoms: Vec<Atom>) -> Self {
        Message(atoms)
    }
}

impl From<i64> for Message {
    fn from(n: i64) -> Self {
        Message(vec![Atom::Int(n)])
    }
}

impl From<i32> for Message {
    fn from(n: i32) -> Self {
        Message(vec![Atom::from(n)])
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message(vec![Atom::from(s)])
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Message(vec![Atom::Str(s)])
    }
}

impl FromIterator<Atom> for Message {
    fn from_iter<I: IntoIterator<Item = Atom>>(iter: I) -> Self {
        Message(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Message {
    type Item = &'a Atom;
    type IntoIter = std::slice::Iter<'a, Atom>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl TryFrom<Value> for Message {
    type Error = MessageError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(Message::bang()),
            Value::Array(items) => items
                .into_iter()
                .map(Atom::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(Message),
            scalar => Atom::try_from(scalar).map(|atom| Message(vec![atom])),
        }
    }
}

impl TryFrom<Value> for Atom {
    type Error = MessageError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(Atom::List(Message::bang())),
            Value::Number(n) => n
                .as_i64()
                .map(Atom::Int)
                .ok_or_else(|| MessageError::Unsupported(n.to_string())),
            Value::String(s) => Ok(Atom::Str(s)),
            Value::Array(_) => Message::try_from(value).map(Atom::List),
            other => Err(MessageError::Unsupported(other.to_string())),
        }
    }
}
