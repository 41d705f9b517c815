//! Shell command line segmentation.
//!
//! A command line is split into independent segments on `||`, `&&`, `;`,
//! `|`, `&` and newlines, ignoring separators inside quotes. Each segment's
//! leading words are scanned past variable assignments, wrappers such as
//! `sudo` and grouping keywords to find the program that actually runs.
//! Command substitutions and `sh -c` scripts are exposed separately so the
//! classifier can inspect what they run.

use std::path::Path;

/// A program that runs another program given as its arguments.
struct Wrapper {
    name: &'static str,
    /// Short flags that consume the following word.
    value_flags: &'static [&'static str],
    /// Positional words consumed before the wrapped program.
    positional: usize,
    /// Whether the wrapped program receives extra arguments from stdin.
    feeds_args: bool,
}

const WRAPPERS: &[Wrapper] = &[
    Wrapper {
        name: "sudo",
        value_flags: &["-u", "-g", "-C", "-D", "-h", "-p", "-r", "-t", "-U"],
        positional: 0,
        feeds_args: false,
    },
    Wrapper {
        name: "doas",
        value_flags: &["-u", "-C"],
        positional: 0,
        feeds_args: false,
    },
    Wrapper {
        name: "env",
        value_flags: &["-u", "-C", "-S"],
        positional: 0,
        feeds_args: false,
    },
    Wrapper {
        name: "command",
        value_flags: &[],
        positional: 0,
        feeds_args: false,
    },
    Wrapper {
        name: "builtin",
        value_flags: &[],
        positional: 0,
        feeds_args: false,
    },
    Wrapper {
        name: "exec",
        value_flags: &["-a"],
        positional: 0,
        feeds_args: false,
    },
    Wrapper {
        name: "nohup",
        value_flags: &[],
        positional: 0,
        feeds_args: false,
    },
    Wrapper {
        name: "time",
        value_flags: &["-f", "-o"],
        positional: 0,
        feeds_args: false,
    },
    Wrapper {
        name: "nice",
        value_flags: &["-n"],
        positional: 0,
        feeds_args: false,
    },
    Wrapper {
        name: "timeout",
        value_flags: &["-s", "-k"],
        positional: 1,
        feeds_args: false,
    },
    Wrapper {
        name: "xargs",
        value_flags: &["-I", "-n", "-P", "-L", "-d", "-E", "-s", "-a"],
        positional: 0,
        feeds_args: true,
    },
];

/// Words that may precede a command without being one.
const KEYWORDS: &[&str] = &[
    "!", "(", "{", "if", "then", "else", "elif", "do", "while", "until",
];

/// Split a command line into trimmed, non-empty segments.
///
/// Separators inside single or double quotes, or escaped with a backslash,
/// do not split. `&` that belongs to a redirection (`2>&1`, `&>file`) is
/// not a separator.
#[must_use]
pub fn split_segments(command: &str) -> Vec<&str> {
    let bytes = command.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;
    let mut in_single = false;
    let mut in_double = false;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i.saturating_add(1)).copied();
        let prev = i.checked_sub(1).map(|p| bytes[p]);

        if in_single {
            if b == b'\'' {
                in_single = false;
            }
            i = i.saturating_add(1);
            continue;
        }
        if b == b'\\' {
            i = i.saturating_add(2);
            continue;
        }
        if in_double {
            if b == b'"' {
                in_double = false;
            }
            i = i.saturating_add(1);
            continue;
        }

        let sep_len = match b {
            b'\'' => {
                in_single = true;
                0
            },
            b'"' => {
                in_double = true;
                0
            },
            b';' | b'\n' => 1,
            b'|' if matches!(next, Some(b'|' | b'&')) => 2,
            b'|' => 1,
            b'&' if next == Some(b'&') => 2,
            b'&' if matches!(prev, Some(b'>' | b'<')) || next == Some(b'>') => 0,
            b'&' => 1,
            _ => 0,
        };

        if sep_len > 0 {
            push_segment(&mut segments, &command[start..i]);
            i = i.saturating_add(sep_len);
            start = i;
        } else {
            i = i.saturating_add(1);
        }
    }

    if start < command.len() {
        push_segment(&mut segments, &command[start..]);
    }
    segments
}

fn push_segment<'a>(segments: &mut Vec<&'a str>, raw: &'a str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        segments.push(trimmed);
    }
}

/// One segment with its program identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    /// The segment text.
    pub text: &'a str,
    /// Basename of the program that runs, if any.
    pub program: Option<String>,
    /// Words after the program, or `None` when quoting was unparsable.
    pub args: Option<Vec<String>>,
    /// The program receives extra arguments from stdin (`xargs`).
    pub stdin_args: bool,
}

impl<'a> Segment<'a> {
    /// Parse one segment.
    ///
    /// The program is still identified from a whitespace split when shell
    /// quoting is unbalanced, so a deletion is detected even when its
    /// arguments cannot be trusted.
    #[must_use]
    pub fn parse(text: &'a str) -> Self {
        if let Some(words) = shlex::split(text) {
            let located = locate_program(&words);
            return match located {
                Some((idx, stdin_args)) => Self {
                    text,
                    program: Some(program_name(&words[idx])),
                    args: Some(words[idx.saturating_add(1)..].to_vec()),
                    stdin_args,
                },
                None => Self {
                    text,
                    program: None,
                    args: Some(Vec::new()),
                    stdin_args: false,
                },
            };
        }

        let words: Vec<&str> = text.split_whitespace().collect();
        let located = locate_program(&words);
        Self {
            text,
            program: located.map(|(idx, _)| program_name(words[idx])),
            args: None,
            stdin_args: located.is_some_and(|(_, s)| s),
        }
    }
}

/// Index of the word naming the program, skipping assignments, keywords
/// and wrappers. The flag reports an `xargs`-style wrapper.
fn locate_program<S: AsRef<str>>(words: &[S]) -> Option<(usize, bool)> {
    let mut i = 0usize;
    let mut stdin_args = false;

    while i < words.len() {
        let word = words[i].as_ref();

        if KEYWORDS.contains(&word) || is_assignment(word) {
            i = i.saturating_add(1);
            continue;
        }

        let name = program_name(word);
        let Some(wrapper) = WRAPPERS.iter().find(|w| w.name == name) else {
            return Some((i, stdin_args));
        };

        stdin_args |= wrapper.feeds_args;
        i = i.saturating_add(1);
        let mut positional = wrapper.positional;
        while i < words.len() {
            let w = words[i].as_ref();
            if w == "--" {
                i = i.saturating_add(1);
                break;
            }
            if w.starts_with('-') && w.len() > 1 {
                let consumes = wrapper.value_flags.contains(&w);
                i = i.saturating_add(if consumes { 2 } else { 1 });
                continue;
            }
            if name == "env" && is_assignment(w) {
                i = i.saturating_add(1);
                continue;
            }
            if positional > 0 {
                positional = positional.saturating_sub(1);
                i = i.saturating_add(1);
                continue;
            }
            break;
        }
    }
    None
}

/// `NAME=value` with a valid shell identifier on the left.
fn is_assignment(word: &str) -> bool {
    let Some((name, _)) = word.split_once('=') else {
        return false;
    };
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Basename of a program word, without grouping punctuation.
fn program_name(word: &str) -> String {
    let trimmed = word.trim_start_matches(['(', '{']);
    Path::new(trimmed)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(trimmed)
        .to_owned()
}

/// Shells whose `-c` argument is itself a command line.
const SHELLS: &[&str] = &["sh", "bash", "zsh", "dash", "ksh"];

/// Bodies of `$(...)` and backtick substitutions, in order of appearance.
///
/// Single-quoted text is skipped. Substitutions nested inside a body are
/// left in it for the caller to scan again. An unclosed substitution is
/// dropped: the shell rejects the line before anything runs.
#[must_use]
pub fn substitutions(command: &str) -> Vec<&str> {
    let bytes = command.as_bytes();
    let mut bodies = Vec::new();
    let mut i = 0usize;
    let mut in_single = false;
    let mut in_double = false;

    while i < bytes.len() {
        let b = bytes[i];
        if in_single {
            in_single = b != b'\'';
            i = i.saturating_add(1);
            continue;
        }
        match b {
            b'\\' => {
                i = i.saturating_add(2);
                continue;
            },
            b'\'' if !in_double => in_single = true,
            b'"' => in_double = !in_double,
            b'$' if bytes.get(i.saturating_add(1)) == Some(&b'(') => {
                let open = i.saturating_add(2);
                let Some(close) = closing_paren(bytes, open) else {
                    break;
                };
                bodies.push(&command[open..close]);
                i = close.saturating_add(1);
                continue;
            },
            b'`' => {
                let open = i.saturating_add(1);
                let Some(len) = bytes[open..].iter().position(|c| *c == b'`') else {
                    break;
                };
                let close = open.saturating_add(len);
                bodies.push(&command[open..close]);
                i = close.saturating_add(1);
                continue;
            },
            _ => {},
        }
        i = i.saturating_add(1);
    }
    bodies
}

/// Index of the `)` balancing an already consumed `(`.
fn closing_paren(bytes: &[u8], from: usize) -> Option<usize> {
    let mut depth = 1usize;
    for (offset, b) in bytes.get(from..)?.iter().enumerate() {
        match b {
            b'(' => depth = depth.saturating_add(1),
            b')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(from.saturating_add(offset));
                }
            },
            _ => {},
        }
    }
    None
}

/// The script a shell runs with `-c` (`bash -c 'rm x'`, `sh -ec '...'`).
#[must_use]
pub fn inline_script<'s>(program: &str, args: &'s [String]) -> Option<&'s str> {
    if !SHELLS.contains(&program) {
        return None;
    }
    let flag = args
        .iter()
        .position(|a| a.starts_with('-') && !a.starts_with("--") && a.contains('c'))?;
    args.get(flag.saturating_add(1)).map(String::as_str)
}

/// If `word` is a redirection operator, report whether the target is the
/// following word (`> file`) rather than attached (`>file`, `2>&1`).
#[must_use]
pub fn redirection(word: &str) -> Option<bool> {
    let rest = word.trim_start_matches(|c: char| c.is_ascii_digit() || c == '&');
    let op_len = if rest.starts_with(">>") || rest.starts_with("<<") {
        2
    } else if rest.starts_with('>') || rest.starts_with('<') {
        1
    } else {
        return None;
    };
    let target = rest[op_len..].trim_start_matches(['&', '|']);
    Some(target.is_empty())
}
