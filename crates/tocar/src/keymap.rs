//! Printable US-keyboard lookup for synthetic key events.
//!
//! Maps printable characters to the `key`/`code`/`which`/shift-state
//! parameters a real keyboard would produce on a US layout. Characters
//! outside the table fall back to a same-character, no-shift guess.

use serde::{Deserialize, Serialize};

/// Parameters of one synthetic key press
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStroke {
    /// Logical key value (the character produced)
    pub key: String,
    /// Physical key code (e.g. "KeyA", "Digit1", "Semicolon")
    pub code: String,
    /// Legacy numeric key identifier (the character's code point)
    pub which: u32,
    /// Whether shift is held while producing this character
    pub shift: bool,
}

impl KeyStroke {
    fn new(ch: char, code: impl Into<String>, shift: bool) -> Self {
        Self {
            key: ch.to_string(),
            code: code.into(),
            which: ch as u32,
            shift,
        }
    }
}

/// Look up the keystroke for a printable US-keyboard character.
///
/// Letters and digits are derived positionally; shifted punctuation uses
/// the fixed US layout table. Unknown characters produce a same-character,
/// no-shift guess so typing arbitrary text never fails.
#[must_use]
pub fn keystroke_for(ch: char) -> KeyStroke {
    if ch.is_ascii_digit() {
        return KeyStroke::new(ch, format!("Digit{ch}"), false);
    }
    if ch.is_ascii_alphabetic() {
        let upper = ch.to_ascii_uppercase();
        return KeyStroke::new(ch, format!("Key{upper}"), ch.is_ascii_uppercase());
    }

    let (code, shift) = match ch {
        ' ' => ("Space", false),
        '!' => ("Digit1", true),
        '@' => ("Digit2", true),
        '#' => ("Digit3", true),
        '$' => ("Digit4", true),
        '%' => ("Digit5", true),
        '^' => ("Digit6", true),
        '&' => ("Digit7", true),
        '*' => ("Digit8", true),
        '(' => ("Digit9", true),
        ')' => ("Digit0", true),
        '`' => ("Backquote", false),
        '~' => ("Backquote", true),
        '-' => ("Minus", false),
        '_' => ("Minus", true),
        '=' => ("Equal", false),
        '+' => ("Equal", true),
        '[' => ("BracketLeft", false),
        '{' => ("BracketLeft", true),
        ']' => ("BracketRight", false),
        '}' => ("BracketRight", true),
        '\\' => ("Backslash", false),
        '|' => ("Backslash", true),
        ';' => ("Semicolon", false),
        ':' => ("Semicolon", true),
        '\'' => ("Quote", false),
        '"' => ("Quote", true),
        ',' => ("Comma", false),
        '<' => ("Comma", true),
        '.' => ("Period", false),
        '>' => ("Period", true),
        '/' => ("Slash", false),
        '?' => ("Slash", true),
        // Same-character, no-shift guess for anything off the US layout
        _ => {
            return KeyStroke {
                key: ch.to_string(),
                code: ch.to_string(),
                which: ch as u32,
                shift: false,
            }
        }
    };
    KeyStroke::new(ch, code, shift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_letters() {
        let lower = keystroke_for('a');
        assert_eq!(lower.key, "a");
        assert_eq!(lower.code, "KeyA");
        assert_eq!(lower.which, 97);
        assert!(!lower.shift);

        let upper = keystroke_for('A');
        assert_eq!(upper.key, "A");
        assert_eq!(upper.code, "KeyA");
        assert_eq!(upper.which, 65);
        assert!(upper.shift);
    }

    #[test]
    fn test_digits() {
        let five = keystroke_for('5');
        assert_eq!(five.code, "Digit5");
        assert_eq!(five.which, 53);
        assert!(!five.shift);
    }

    #[test]
    fn test_shifted_punctuation() {
        let bang = keystroke_for('!');
        assert_eq!(bang.code, "Digit1");
        assert_eq!(bang.which, 33);
        assert!(bang.shift);

        let colon = keystroke_for(':');
        assert_eq!(colon.code, "Semicolon");
        assert!(colon.shift);

        let semi = keystroke_for(';');
        assert_eq!(semi.code, "Semicolon");
        assert!(!semi.shift);
    }

    #[test]
    fn test_space() {
        let space = keystroke_for(' ');
        assert_eq!(space.code, "Space");
        assert_eq!(space.which, 32);
    }

    #[test]
    fn test_fallback_guess() {
        let unknown = keystroke_for('é');
        assert_eq!(unknown.key, "é");
        assert_eq!(unknown.code, "é");
        assert!(!unknown.shift);
    }

    proptest! {
        #[test]
        fn prop_which_is_code_point(ch in proptest::char::range(' ', '~')) {
            let stroke = keystroke_for(ch);
            prop_assert_eq!(stroke.which, ch as u32);
            prop_assert_eq!(stroke.key, ch.to_string());
        }
    }
}
