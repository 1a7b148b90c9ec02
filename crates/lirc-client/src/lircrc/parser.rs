use std::path::{Path, PathBuf};

use tracing::warn;

use super::{Entry, EntryFlags, KeySpec, WILDCARD};

/// Error in an lircrc file, with the file and 1-based line it occurred on.
/// Line 0 means the file itself could not be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}: line {line}: {message}", file.display())]
pub struct ParseError {
    pub file: PathBuf,
    pub line: usize,
    pub message: String,
}

/// Parse an lircrc file, following `include` directives up to `max_depth`
/// levels deep.
///
/// # Errors
///
/// Returns a [`ParseError`] for unreadable files, unknown keys, unbalanced
/// `begin`/`end`, bad numbers and incomplete entries.
pub fn parse_file(path: &Path, max_depth: usize) -> Result<Vec<Entry>, ParseError> {
    let mut parser = Parser::new(max_depth);
    parser.parse_file(path, 0)?;
    parser.finish(path)
}

/// Parse lircrc text. Relative includes resolve against `origin`'s directory.
///
/// # Errors
///
/// See [`parse_file`].
pub fn parse_str(source: &str, origin: &Path, max_depth: usize) -> Result<Vec<Entry>, ParseError> {
    let mut parser = Parser::new(max_depth);
    parser.parse_source(source, origin, 0)?;
    parser.finish(origin)
}

#[derive(Debug, Default)]
struct PendingEntry {
    entry: Entry,
    line: usize,
    remote: Option<String>,
    buttons: Vec<(Option<String>, String)>,
}

struct Parser {
    max_depth: usize,
    entries: Vec<Entry>,
    block_mode: Option<(String, usize)>,
    pending: Option<PendingEntry>,
}

impl Parser {
    fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            entries: Vec::new(),
            block_mode: None,
            pending: None,
        }
    }

    fn parse_file(&mut self, path: &Path, depth: usize) -> Result<(), ParseError> {
        let source = std::fs::read_to_string(path).map_err(|e| ParseError {
            file: path.to_path_buf(),
            line: 0,
            message: e.to_string(),
        })?;
        self.parse_source(&source, path, depth)
    }

    fn parse_source(&mut self, source: &str, file: &Path, depth: usize) -> Result<(), ParseError> {
        for (index, raw) in source.lines().enumerate() {
            let line = index + 1;
            let fail = |message: String| ParseError {
                file: file.to_path_buf(),
                line,
                message,
            };

            let text = raw.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            if self.pending.is_some() {
                self.parse_entry_line(text, line).map_err(fail)?;
                continue;
            }

            let (keyword, argument) = match text.split_once(char::is_whitespace) {
                Some((keyword, rest)) => (keyword, rest.trim()),
                None => (text, ""),
            };

            match keyword {
                "begin" if argument.is_empty() => {
                    self.pending = Some(PendingEntry {
                        line,
                        ..PendingEntry::default()
                    });
                }
                "begin" => {
                    if let Some((mode, _)) = &self.block_mode {
                        return Err(fail(format!(
                            "mode block \"{argument}\" nested in \"{mode}\""
                        )));
                    }
                    self.block_mode = Some((argument.to_string(), line));
                }
                "end" => match self.block_mode.take() {
                    Some((mode, _)) if mode == argument => {}
                    Some((mode, _)) => {
                        return Err(fail(format!(
                            "\"end {argument}\" does not close mode \"{mode}\""
                        )));
                    }
                    None => return Err(fail(format!("unexpected \"{text}\""))),
                },
                "include" => {
                    if depth >= self.max_depth {
                        return Err(fail("too many nested includes".to_string()));
                    }
                    let target = include_path(argument, file).ok_or_else(|| {
                        fail("include without a file name".to_string())
                    })?;
                    self.parse_file(&target, depth + 1)?;
                }
                _ => return Err(fail(format!("unknown token \"{keyword}\""))),
            }
        }
        Ok(())
    }

    fn parse_entry_line(&mut self, text: &str, line: usize) -> Result<(), String> {
        if text == "end" {
            let pending = self.pending.take().unwrap_or_default();
            let entry = self.complete(pending)?;
            self.entries.push(entry);
            return Ok(());
        }

        let Some((key, value)) = text.split_once('=') else {
            return Err(if text.starts_with("begin") || text.starts_with("end") {
                format!("\"{text}\" inside an entry")
            } else {
                format!("unknown token \"{text}\"")
            });
        };
        let (key, value) = (key.trim(), value.trim());
        let Some(pending) = self.pending.as_mut() else {
            return Err(format!("\"{key}\" outside of an entry"));
        };

        match key {
            "prog" => pending.entry.prog = value.to_string(),
            "remote" => pending.remote = Some(value.to_string()),
            "button" => pending
                .buttons
                .push((pending.remote.clone(), value.to_string())),
            "repeat" => pending.entry.repeat = parse_number(key, value)?,
            "delay" => pending.entry.delay = parse_number(key, value)?,
            "config" => pending.entry.configs.push(unescape(value)),
            "mode" => pending.entry.change_mode = Some(value.to_string()),
            "flags" => parse_flags(value, &mut pending.entry.flags, line),
            _ => return Err(format!("unknown token \"{key}\"")),
        }
        Ok(())
    }

    fn complete(&self, pending: PendingEntry) -> Result<Entry, String> {
        let PendingEntry {
            mut entry,
            remote,
            buttons,
            ..
        } = pending;

        if entry.prog.is_empty() {
            return Err("prog missing".to_string());
        }
        if entry.configs.is_empty() && entry.change_mode.is_none() && !entry.flags.quit {
            return Err("config missing".to_string());
        }

        let fallback = remote.unwrap_or_else(|| WILDCARD.to_string());
        entry.codes = buttons
            .into_iter()
            .map(|(remote, button)| {
                KeySpec::new(remote.unwrap_or_else(|| fallback.clone()), button)
            })
            .collect();
        entry.mode = self.block_mode.as_ref().map(|(mode, _)| mode.clone());
        Ok(entry)
    }

    fn finish(self, file: &Path) -> Result<Vec<Entry>, ParseError> {
        if let Some(pending) = self.pending {
            return Err(ParseError {
                file: file.to_path_buf(),
                line: pending.line,
                message: "entry without \"end\"".to_string(),
            });
        }
        if let Some((mode, line)) = self.block_mode {
            return Err(ParseError {
                file: file.to_path_buf(),
                line,
                message: format!("mode \"{mode}\" without \"end {mode}\""),
            });
        }
        Ok(self.entries)
    }
}

fn include_path(argument: &str, including: &Path) -> Option<PathBuf> {
    let name = argument
        .trim_start_matches(['<', '"'])
        .trim_end_matches(['>', '"'])
        .trim();
    if name.is_empty() {
        return None;
    }

    let path = crate::config::expand_home(name);
    if path.is_relative() {
        let base = including.parent().unwrap_or_else(|| Path::new("."));
        return Some(base.join(path));
    }
    Some(path)
}

fn parse_number(key: &str, value: &str) -> Result<u32, String> {
    value
        .parse()
        .map_err(|_| format!("bad number \"{value}\" for {key}"))
}

fn parse_flags(value: &str, flags: &mut EntryFlags, line: usize) {
    for flag in value.split(|c: char| c == '|' || c.is_whitespace()) {
        match flag {
            "" => {}
            "once" => flags.once = true,
            "quit" => flags.quit = true,
            "mode" => flags.mode = true,
            "startup_mode" => flags.startup_mode = true,
            "toggle_reset" => flags.toggle_reset = true,
            other => warn!("Ignoring unknown lircrc flag \"{}\" on line {}", other, line),
        }
    }
}

/// Process C-style escapes in a `config` value.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escaped) = chars.next() else {
            out.push('\\');
            break;
        };
        match escaped {
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'e' | 'E' => out.push('\x1b'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            'x' => {
                let mut digits = String::new();
                while digits.len() < 2
                    && let Some(d) = chars.next_if(char::is_ascii_hexdigit)
                {
                    digits.push(d);
                }
                match u8::from_str_radix(&digits, 16) {
                    Ok(byte) => out.push(char::from(byte)),
                    Err(_) => out.push('x'),
                }
            }
            '0'..='7' => {
                let mut digits = String::from(escaped);
                while digits.len() < 3
                    && let Some(d) = chars.next_if(|d| ('0'..='7').contains(d))
                {
                    digits.push(d);
                }
                let code = u32::from_str_radix(&digits, 8).unwrap_or(0);
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<Vec<Entry>, ParseError> {
        parse_str(source, Path::new("test.lircrc"), 10)
    }

    #[test]
    fn test_parse_single_entry() {
        let entries = parse(
            "# media keys\n\
             begin\n\
                 prog = player\n\
                 remote = tv\n\
                 button = KEY_PLAY\n\
                 repeat = 2\n\
                 delay = 1\n\
                 config = play\n\
                 config = pause\n\
             end\n",
        )
        .unwrap();

        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.prog, "player");
        assert_eq!(entry.codes, vec![KeySpec::new("tv", "KEY_PLAY")]);
        assert_eq!(entry.repeat, 2);
        assert_eq!(entry.delay, 1);
        assert_eq!(entry.configs, vec!["play", "pause"]);
        assert_eq!(entry.mode, None);
    }

    #[test]
    fn test_remote_defaults_to_wildcard() {
        let entries = parse("begin\nprog = p\nbutton = KEY_1\nconfig = one\nend\n").unwrap();
        assert_eq!(entries[0].codes[0].remote, WILDCARD);
    }

    #[test]
    fn test_remote_after_button_applies() {
        let entries =
            parse("begin\nprog = p\nbutton = KEY_1\nremote = dvd\nconfig = one\nend\n").unwrap();
        assert_eq!(entries[0].codes[0].remote, "dvd");
    }

    #[test]
    fn test_mode_block() {
        let entries = parse(
            "begin tv\n\
               begin\nprog = p\nbutton = KEY_1\nconfig = ch1\nend\n\
             end tv\n\
             begin\nprog = p\nbutton = KEY_TV\nmode = tv\nflags = once | quit\nend\n",
        )
        .unwrap();

        assert_eq!(entries[0].mode.as_deref(), Some("tv"));
        assert_eq!(entries[1].mode, None);
        assert_eq!(entries[1].change_mode.as_deref(), Some("tv"));
        assert!(entries[1].flags.once);
        assert!(entries[1].flags.quit);
    }

    #[test]
    fn test_unknown_token_reports_line() {
        let err = parse("begin\nprog = p\nbogus = 1\nend\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("bogus"));
    }

    #[test]
    fn test_missing_prog() {
        let err = parse("begin\nbutton = KEY_1\nconfig = x\nend\n").unwrap_err();
        assert_eq!(err.message, "prog missing");
    }

    #[test]
    fn test_missing_config() {
        let err = parse("begin\nprog = p\nbutton = KEY_1\nend\n").unwrap_err();
        assert_eq!(err.message, "config missing");
    }

    #[test]
    fn test_unterminated_entry() {
        let err = parse("begin\nprog = p\nconfig = x\n").unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_mismatched_mode_end() {
        let err = parse("begin tv\nend radio\n").unwrap_err();
        assert!(err.message.contains("radio"));
    }

    #[test]
    fn test_unterminated_mode() {
        let err = parse("begin tv\n").unwrap_err();
        assert!(err.message.contains("without"));
    }

    #[test]
    fn test_bad_number() {
        let err = parse("begin\nprog = p\nrepeat = often\nconfig = x\nend\n").unwrap_err();
        assert!(err.message.contains("bad number"));
    }

    #[test]
    fn test_unknown_flag_is_ignored() {
        let entries = parse("begin\nprog = p\nconfig = x\nflags = sparkle quit\nend\n").unwrap();
        assert!(entries[0].flags.quit);
    }

    #[test]
    fn test_unescape_sequences() {
        assert_eq!(unescape(r"a\tb\n"), "a\tb\n");
        assert_eq!(unescape(r"\x41\102\\"), "AB\\");
        assert_eq!(unescape(r"\e[A"), "\x1b[A");
        assert_eq!(unescape(r"trailing\"), "trailing\\");
    }

    #[test]
    fn test_include_relative_to_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("extra.lircrc"),
            "begin\nprog = p\nbutton = KEY_2\nconfig = two\nend\n",
        )
        .unwrap();
        let main = dir.path().join("main.lircrc");
        std::fs::write(
            &main,
            "begin\nprog = p\nbutton = KEY_1\nconfig = one\nend\ninclude \"extra.lircrc\"\n",
        )
        .unwrap();

        let entries = parse_file(&main, 10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].configs, vec!["two"]);
    }

    #[test]
    fn test_include_depth_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loop.lircrc");
        std::fs::write(&path, "include <loop.lircrc>\n").unwrap();

        let err = parse_file(&path, 3).unwrap_err();
        assert!(err.message.contains("nested includes"));
    }

    #[test]
    fn test_unreadable_file() {
        let err = parse_file(Path::new("/nonexistent/lircrc"), 10).unwrap_err();
        assert_eq!(err.line, 0);
    }
}
