use qs_core::TableKey;
use thiserror::Error;

/// A variable path failed to parse. Never shown to end users directly;
/// callers substitute a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("invalid character '{character}' at position {position}")]
    InvalidCharacter { character: char, position: usize },
    #[error("unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { character: char, position: usize },
    #[error("unexpected end of path")]
    UnexpectedEndOfInput,
    #[error("empty path component")]
    EmptyPathComponent,
}

/// Extends a flattened path by one table key.
///
/// Integer keys render in index style (`t[1]`), plain-word keys in dot
/// style (`t.x`), and anything else in quoted-index style (`t["odd key"]`).
/// An empty prefix is the base case and yields the raw key.
pub fn render_path_key(prefix: &str, key: &TableKey) -> String {
    if prefix.is_empty() {
        return match key {
            TableKey::Index(index) => index.to_string(),
            TableKey::Name(name) => name.clone(),
        };
    }

    match key {
        TableKey::Index(index) => format!("{}[{}]", prefix, index),
        TableKey::Name(name) if is_plain_word(name) => format!("{}.{}", prefix, name),
        TableKey::Name(name) => format!("{}[\"{}\"]", prefix, name.replace('"', "\\\"")),
    }
}

fn is_plain_word(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_word_char)
}

fn is_word_char(character: char) -> bool {
    character.is_ascii_alphanumeric() || character == '_'
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Outer,
    Indexing,
    Quoted,
    QuotedEscape,
    ExpectingCloseIndex,
    PostClose,
}

/// Parses a flattened path back into its components, the inverse of
/// repeated `render_path_key`. `t.x` yields `["t", "x"]` and `t[3]` yields
/// `["t", "3"]`.
pub fn parse_path(path: &str) -> Result<Vec<String>, PathError> {
    let mut components = Vec::new();
    let mut word = String::new();
    let mut state = State::Outer;

    for (position, character) in path.chars().enumerate() {
        state = match state {
            State::Outer => match character {
                '.' => {
                    flush(&mut components, &mut word)?;
                    State::Outer
                }
                '[' => {
                    flush(&mut components, &mut word)?;
                    State::Indexing
                }
                c if is_word_char(c) => {
                    word.push(c);
                    State::Outer
                }
                c => return Err(PathError::InvalidCharacter { character: c, position }),
            },
            State::Indexing => match character {
                '"' if word.is_empty() => State::Quoted,
                '"' => {
                    return Err(PathError::UnexpectedCharacter { character, position });
                }
                ']' => {
                    flush(&mut components, &mut word)?;
                    State::PostClose
                }
                c if c.is_whitespace() && !word.is_empty() => State::ExpectingCloseIndex,
                c if c.is_whitespace() => State::Indexing,
                // Not inside quotes yet, so characters accumulate without
                // the word-character restriction.
                c => {
                    word.push(c);
                    State::Indexing
                }
            },
            State::Quoted => match character {
                '\\' => State::QuotedEscape,
                '"' => State::ExpectingCloseIndex,
                c => {
                    word.push(c);
                    State::Quoted
                }
            },
            State::QuotedEscape => {
                word.push(character);
                State::Quoted
            }
            State::ExpectingCloseIndex => match character {
                ']' => {
                    flush(&mut components, &mut word)?;
                    State::PostClose
                }
                c if c.is_whitespace() => State::ExpectingCloseIndex,
                c => return Err(PathError::UnexpectedCharacter { character: c, position }),
            },
            State::PostClose => match character {
                c if c.is_whitespace() => State::PostClose,
                // The word is always empty here; a close bracket flushed it.
                '[' => State::Indexing,
                '.' => State::Outer,
                c => return Err(PathError::UnexpectedCharacter { character: c, position }),
            },
        };
    }

    match state {
        State::Outer => {
            flush(&mut components, &mut word)?;
            Ok(components)
        }
        State::PostClose => Ok(components),
        _ => Err(PathError::UnexpectedEndOfInput),
    }
}

fn flush(components: &mut Vec<String>, word: &mut String) -> Result<(), PathError> {
    if word.is_empty() {
        return Err(PathError::EmptyPathComponent);
    }
    components.push(std::mem::take(word));
    Ok(())
}
