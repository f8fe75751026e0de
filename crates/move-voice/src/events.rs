//! Line protocol for `listen` mode.
//!
//! Each stdin line is one of:
//! - `[priority:]id id ...`: a new event made of the listed clip ids
//! - `!pause`, `!clear`, `!volume <v>`: control commands
//! - blank or starting with `#`: ignored

use anyhow::{Context, Result, anyhow, bail};

#[derive(Clone, Debug, PartialEq)]
pub enum InputLine {
    Event {
        priority: Option<i32>,
        ids: Vec<String>,
    },
    Pause,
    Clear,
    Volume(f32),
    Skip,
}

pub fn parse_line(line: &str) -> Result<InputLine> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(InputLine::Skip);
    }

    if let Some(control) = line.strip_prefix('!') {
        let mut parts = control.split_whitespace();
        let cmd = parts.next().unwrap_or_default();
        return match cmd {
            "pause" => Ok(InputLine::Pause),
            "clear" => Ok(InputLine::Clear),
            "volume" => {
                let raw = parts.next().ok_or_else(|| anyhow!("!volume needs a value"))?;
                let value = raw
                    .parse::<f32>()
                    .with_context(|| format!("parse volume {raw:?}"))?;
                Ok(InputLine::Volume(value))
            }
            other => bail!("unknown command: !{other}"),
        };
    }

    let (priority, rest) = match line.split_once(':') {
        Some((head, rest)) if !head.contains(char::is_whitespace) && !head.contains('/') => {
            let priority = head
                .trim()
                .parse::<i32>()
                .with_context(|| format!("parse priority {head:?}"))?;
            (Some(priority), rest)
        }
        _ => (None, line),
    };

    let ids = rest.split_whitespace().map(str::to_string).collect();
    Ok(InputLine::Event { priority, ids })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(priority: Option<i32>, ids: &[&str]) -> InputLine {
        InputLine::Event {
            priority,
            ids: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn plain_ids() {
        assert_eq!(
            parse_line("piece/knight square/f3").unwrap(),
            event(None, &["piece/knight", "square/f3"])
        );
    }

    #[test]
    fn prioritized_ids() {
        assert_eq!(
            parse_line("10: check").unwrap(),
            event(Some(10), &["check"])
        );
        assert_eq!(
            parse_line("-1:piece/pawn").unwrap(),
            event(Some(-1), &["piece/pawn"])
        );
    }

    #[test]
    fn bad_priority_is_an_error() {
        assert!(parse_line("loud: check").is_err());
    }

    #[test]
    fn priority_without_ids_is_an_empty_event() {
        assert_eq!(parse_line("3:").unwrap(), event(Some(3), &[]));
    }

    #[test]
    fn control_lines() {
        assert_eq!(parse_line("!pause").unwrap(), InputLine::Pause);
        assert_eq!(parse_line("  !clear ").unwrap(), InputLine::Clear);
        assert_eq!(parse_line("!volume 0.25").unwrap(), InputLine::Volume(0.25));
        assert!(parse_line("!volume").is_err());
        assert!(parse_line("!volume loud").is_err());
        assert!(parse_line("!rewind").is_err());
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        assert_eq!(parse_line("").unwrap(), InputLine::Skip);
        assert_eq!(parse_line("   ").unwrap(), InputLine::Skip);
        assert_eq!(parse_line("# opening").unwrap(), InputLine::Skip);
    }
}
