//! Line-oriented macro file format
//!
//! One action per line:
//!
//! ```text
//! # comment
//! 0x11, 0x43, COMBO, 67:17
//! Ctrl, T, TEXT, Hello, world
//! F5, WAIT, 250
//! ```
//!
//! Every field before the TYPE token is a hotkey. Lines that share a hotkey
//! set with an earlier line append to that macro.

use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::model::{Macro, MacroAction};
use crate::hotkey::KeyCode;

const HEADER: &str = "# Hotkey, ..., TYPE, Data\n\
# TYPE is COMBO (colon-separated key codes), TEXT (literal text) or WAIT (milliseconds)\n";

/// Why a line was skipped during parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LineError {
    #[error("expected at least one hotkey, a TYPE and data")]
    MissingFields,

    #[error("unknown action type {0:?}")]
    UnknownType(String),

    #[error("no recognised hotkeys")]
    NoHotkeys,

    #[error("combo has no valid key codes")]
    EmptyCombo,
}

/// A line the parser could not use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number
    pub line: usize,
    pub reason: LineError,
}

/// Macros recovered from a file, plus the lines that were dropped
#[derive(Debug, Default)]
pub struct ParsedMacros {
    pub macros: Vec<Macro>,
    pub skipped: Vec<SkippedLine>,
}

/// Errors reading or writing the macro file
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to read macro file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write macro file {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionType {
    Combo,
    Text,
    Wait,
}

impl ActionType {
    fn from_token(token: &str) -> Option<Self> {
        match token.trim() {
            "COMBO" => Some(Self::Combo),
            "TEXT" => Some(Self::Text),
            "WAIT" => Some(Self::Wait),
            _ => None,
        }
    }
}

/// Parse the whole file content. Bad lines are skipped individually.
pub fn parse(content: &str) -> ParsedMacros {
    let mut parsed = ParsedMacros::default();

    for (number, raw) in content.lines().enumerate() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let (hotkeys, action) = match parse_line(line) {
            Ok(entry) => entry,
            Err(reason) => {
                parsed.skipped.push(SkippedLine { line: number + 1, reason });
                continue;
            }
        };

        match parsed.macros.iter_mut().find(|m| m.has_hotkeys(&hotkeys)) {
            Some(existing) => existing.push_action(action),
            None => match Macro::new(hotkeys, vec![action]) {
                Ok(m) => parsed.macros.push(m),
                // parse_line already rejected empty hotkeys and combos
                Err(_) => parsed.skipped.push(SkippedLine {
                    line: number + 1,
                    reason: LineError::NoHotkeys,
                }),
            },
        }
    }

    parsed
}

fn parse_line(line: &str) -> Result<(Vec<KeyCode>, MacroAction), LineError> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 3 {
        return Err(LineError::MissingFields);
    }

    // TEXT data may itself contain commas, so a TEXT line is split at the
    // first TYPE token after the leading hotkey. COMBO and WAIT data never
    // contain commas and their TYPE must be the second-to-last field.
    let found = fields
        .iter()
        .enumerate()
        .skip(1)
        .find_map(|(i, field)| ActionType::from_token(field).map(|kind| (i, kind)));

    let last_type = fields.len() - 2;
    let (type_index, kind) = match found {
        Some((i, ActionType::Text)) if i + 1 < fields.len() => (i, ActionType::Text),
        Some((i, kind)) if i == last_type => (i, kind),
        Some((i, _)) if i + 1 == fields.len() => return Err(LineError::MissingFields),
        _ => {
            let unknown = fields[last_type].trim().to_string();
            return Err(LineError::UnknownType(unknown));
        }
    };

    let hotkeys: Vec<KeyCode> = fields[..type_index]
        .iter()
        .map(|token| KeyCode::parse_token(token))
        .filter(|key| !key.is_null())
        .collect();
    if hotkeys.is_empty() {
        return Err(LineError::NoHotkeys);
    }

    let data = fields[type_index + 1..].join(",");
    let data = data.trim_matches([' ', '\t']);

    let action = match kind {
        ActionType::Combo => {
            let keys: Vec<KeyCode> = data
                .split(':')
                .filter_map(|code| code.trim().parse::<u16>().ok())
                .map(KeyCode)
                .collect();
            if keys.is_empty() {
                return Err(LineError::EmptyCombo);
            }
            MacroAction::Combo { keys }
        }
        ActionType::Text => MacroAction::Text { text: data.to_string() },
        ActionType::Wait => MacroAction::Wait {
            ms: data.parse().unwrap_or(0),
        },
    };

    Ok((hotkeys, action))
}

/// Render macros in the file format, one line per action
pub fn serialize(macros: &[Macro]) -> String {
    let mut out = String::from(HEADER);

    for m in macros {
        let hotkeys: String = m
            .hotkeys()
            .iter()
            .map(|key| format!("0x{:02X}, ", key.0))
            .collect();

        for action in m.actions() {
            out.push_str(&hotkeys);
            out.push_str(action.kind());
            out.push_str(", ");
            match action {
                MacroAction::Combo { keys } => {
                    let codes: Vec<String> = keys.iter().map(|key| key.0.to_string()).collect();
                    out.push_str(&codes.join(":"));
                }
                MacroAction::Text { text } => out.push_str(text),
                MacroAction::Wait { ms } => {
                    let _ = write!(out, "{}", ms);
                }
            }
            out.push('\n');
        }
    }

    out
}

/// Load macros from `path`. A missing file yields an empty list.
pub fn load(path: &Path) -> Result<ParsedMacros, CodecError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "macro file not found, starting with no macros");
            return Ok(ParsedMacros::default());
        }
        Err(source) => {
            return Err(CodecError::Read {
                path: path.to_owned(),
                source,
            })
        }
    };

    let parsed = parse(&content);
    for skipped in &parsed.skipped {
        warn!(path = %path.display(), line = skipped.line, reason = %skipped.reason, "skipping macro line");
    }
    debug!(path = %path.display(), count = parsed.macros.len(), "parsed macro file");

    Ok(parsed)
}

/// Write macros to `path`, replacing the file
pub fn save(path: &Path, macros: &[Macro]) -> Result<(), CodecError> {
    std::fs::write(path, serialize(macros)).map_err(|source| CodecError::Write {
        path: path.to_owned(),
        source,
    })?;
    info!(path = %path.display(), count = macros.len(), "macros saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macros::MacroError;

    fn key(c: char) -> KeyCode {
        KeyCode::from_ascii(c).unwrap()
    }

    #[test]
    fn test_combo_line() {
        let parsed = parse("0x11, 0x43, COMBO, 67:17\n");
        assert!(parsed.skipped.is_empty());
        assert_eq!(parsed.macros.len(), 1);

        let m = &parsed.macros[0];
        assert_eq!(m.hotkeys(), &[KeyCode::CONTROL, key('C')]);
        assert_eq!(
            m.actions(),
            &[MacroAction::Combo { keys: vec![KeyCode(67), KeyCode(17)] }]
        );
    }

    #[test]
    fn test_combo_line_serializes_back() {
        let parsed = parse("0x11, 0x43, COMBO, 67:17\n");
        let out = serialize(&parsed.macros);
        assert!(out.starts_with('#'));
        assert!(out.contains("0x11, 0x43, COMBO, 67:17\n"));
    }

    #[test]
    fn test_lines_with_same_hotkeys_fold() {
        let content = "\
# header
Ctrl, T, TEXT, Hello

T, Ctrl, WAIT, 100
F5, WAIT, 20
Ctrl, T, COMBO, 13
";
        let parsed = parse(content);
        assert_eq!(parsed.macros.len(), 2);
        assert_eq!(
            parsed.macros[0].actions(),
            &[
                MacroAction::Text { text: "Hello".into() },
                MacroAction::Wait { ms: 100 },
                MacroAction::Combo { keys: vec![KeyCode::RETURN] },
            ]
        );
        assert_eq!(parsed.macros[1].hotkeys(), &[KeyCode(0x74)]);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let content = "\
F1, TEXT
F1, PRESS, 65
Hyper, TEXT, lost
F2, COMBO, x:y
F3, TEXT, kept
";
        let parsed = parse(content);
        assert_eq!(parsed.macros.len(), 1);
        assert_eq!(parsed.macros[0].actions(), &[MacroAction::Text { text: "kept".into() }]);

        let reasons: Vec<(usize, LineError)> =
            parsed.skipped.into_iter().map(|s| (s.line, s.reason)).collect();
        assert_eq!(
            reasons,
            vec![
                (1, LineError::MissingFields),
                (2, LineError::UnknownType("PRESS".into())),
                (3, LineError::NoHotkeys),
                (4, LineError::EmptyCombo),
            ]
        );
    }

    #[test]
    fn test_unknown_hotkey_tokens_dropped() {
        let parsed = parse("Ctrl, Hyper, J, WAIT, 10\n");
        assert_eq!(parsed.macros[0].hotkeys(), &[KeyCode::CONTROL, key('J')]);
    }

    #[test]
    fn test_wait_defaults_to_zero() {
        let parsed = parse("F1, WAIT, soon\nF1, WAIT, -5\n");
        assert_eq!(
            parsed.macros[0].actions(),
            &[MacroAction::Wait { ms: 0 }, MacroAction::Wait { ms: 0 }]
        );
    }

    #[test]
    fn test_text_keeps_commas_and_may_be_empty() {
        let parsed = parse("F1, TEXT, Hello, world\r\nF2, TEXT, \n");
        assert_eq!(
            parsed.macros[0].actions(),
            &[MacroAction::Text { text: "Hello, world".into() }]
        );
        assert_eq!(parsed.macros[1].actions(), &[MacroAction::Text { text: String::new() }]);
    }

    #[test]
    fn test_round_trip() {
        let macros = vec![
            Macro::new(
                vec![KeyCode::CONTROL, KeyCode::SHIFT, key('V')],
                vec![
                    MacroAction::Combo { keys: vec![KeyCode::CONTROL, key('A')] },
                    MacroAction::Wait { ms: 50 },
                    MacroAction::Text { text: "こんにちは, world".into() },
                ],
            )
            .unwrap(),
            Macro::new(vec![KeyCode::RMENU, KeyCode::F1], vec![MacroAction::Wait { ms: 0 }]).unwrap(),
        ];

        let parsed = parse(&serialize(&macros));
        assert!(parsed.skipped.is_empty());
        assert_eq!(parsed.macros, macros);
    }

    #[test]
    fn test_combo_and_wait_type_must_be_second_to_last() {
        let content = "\
F1, WAIT, 5, 6
F2, COMBO, 65, 66
F3, WAIT, 7
F4, TEXT, 5, 6
";
        let parsed = parse(content);
        assert_eq!(parsed.macros.len(), 2);
        assert_eq!(parsed.macros[0].actions(), &[MacroAction::Wait { ms: 7 }]);
        assert_eq!(parsed.macros[1].actions(), &[MacroAction::Text { text: "5, 6".into() }]);

        let reasons: Vec<(usize, LineError)> =
            parsed.skipped.into_iter().map(|s| (s.line, s.reason)).collect();
        assert_eq!(
            reasons,
            vec![
                (1, LineError::UnknownType("5".into())),
                (2, LineError::UnknownType("65".into())),
            ]
        );
    }

    #[test]
    fn test_stored_text_reads_back_unchanged() {
        let macros = vec![
            Macro::new(
                vec![KeyCode::F1],
                vec![MacroAction::Text { text: "line1, F9, WAIT, 5".into() }],
            )
            .unwrap(),
            Macro::new(
                vec![KeyCode::F2],
                vec![MacroAction::Text { text: "inner  \t spacing".into() }],
            )
            .unwrap(),
        ];

        let parsed = parse(&serialize(&macros));
        assert!(parsed.skipped.is_empty());
        assert_eq!(parsed.macros, macros);
    }

    #[test]
    fn test_text_with_line_breaks_never_reaches_the_file() {
        for text in ["line1\nF9, WAIT, 5", "  indented "] {
            let rejected = Macro::new(vec![KeyCode::F1], vec![MacroAction::Text { text: text.into() }]);
            assert!(matches!(rejected, Err(MacroError::UnstorableText { position: 0 })));
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let path = std::env::temp_dir().join(format!("winhot-missing-{}.txt", std::process::id()));
        let parsed = load(&path).unwrap();
        assert!(parsed.macros.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!("winhot-codec-{}.txt", std::process::id()));
        let macros = vec![Macro::new(vec![KeyCode::F1], vec![MacroAction::Text { text: "x".into() }]).unwrap()];

        save(&path, &macros).unwrap();
        let parsed = load(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(parsed.macros, macros);
    }

    #[test]
    fn test_save_to_unwritable_path() {
        let path = std::env::temp_dir()
            .join(format!("winhot-no-such-dir-{}", std::process::id()))
            .join("macros.txt");
        let err = save(&path, &[]).unwrap_err();
        assert!(matches!(err, CodecError::Write { .. }));
    }
}
