//! Configuration-file reader
//!
//! DOS-era conf files are INI-like with one special case: the `[autoexec]`
//! section is raw script content, kept verbatim. Everything this front-end
//! cares about is that section plus the `autoexec_section` join policy.

/// The pieces of a conf file the shell consumes.
#[derive(Debug, Default, PartialEq)]
pub struct ConfFile {
    /// Raw `[autoexec]` section content, if present and non-empty.
    pub autoexec: Option<String>,
    /// Whether `autoexec_section = join` was set.
    pub join_autoexec: bool,
}

/// Extract the `[autoexec]` section and join policy from conf text.
pub fn parse_conf(text: &str) -> ConfFile {
    let mut autoexec_lines: Vec<&str> = Vec::new();
    let mut in_autoexec = false;
    let mut join = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            in_autoexec = trimmed.eq_ignore_ascii_case("[autoexec]");
            continue;
        }
        if in_autoexec {
            autoexec_lines.push(line);
            continue;
        }
        if trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = trimmed.split_once('=') {
            if key.trim().eq_ignore_ascii_case("autoexec_section") {
                join = value.trim().eq_ignore_ascii_case("join");
            }
        }
    }

    // Trailing blank lines are just file formatting, not script content.
    while autoexec_lines.last().is_some_and(|l| l.trim().is_empty()) {
        autoexec_lines.pop();
    }

    ConfFile {
        autoexec: (!autoexec_lines.is_empty()).then(|| autoexec_lines.join("\n")),
        join_autoexec: join,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_autoexec_section() {
        let conf = parse_conf("[dosbox]\nmemsize = 16\n\n[autoexec]\n@echo off\nset X=1\n");
        assert_eq!(conf.autoexec.as_deref(), Some("@echo off\nset X=1"));
        assert!(!conf.join_autoexec);
    }

    #[test]
    fn detects_join_policy() {
        let conf = parse_conf("[dosbox]\nautoexec_section = join\n[autoexec]\ndir\n");
        assert!(conf.join_autoexec);
    }

    #[test]
    fn section_content_is_kept_verbatim() {
        let conf = parse_conf("[autoexec]\n  mount c \"my games\"  \n");
        assert_eq!(conf.autoexec.as_deref(), Some("  mount c \"my games\"  "));
    }

    #[test]
    fn missing_section_yields_none() {
        assert_eq!(parse_conf("[dosbox]\nmemsize = 16\n"), ConfFile::default());
    }
}
