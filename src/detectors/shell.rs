//! Shell Injection Detection
//!
//! Decides whether a piece of user input changes the meaning of the shell
//! command it ended up in. Input that is safely wrapped in quotes and free of
//! escape characters is fine; input carrying shell metacharacters, or input
//! that resolves to a standalone command name within the command line, is not.

use super::data::{
    SHELL_COMMANDS, SHELL_DANGEROUS_CHARS, SHELL_PATH_PREFIXES, SHELL_SEPARATORS,
};

/// Returns true when `user_input` constitutes a shell injection within
/// `command`.
pub fn is_shell_injection(command: &str, user_input: &str) -> bool {
    // A lone tilde expands to the home directory, which is enough of a
    // behavior change to flag on its own.
    if user_input == "~" {
        return command.len() > 1 && command.contains('~');
    }
    if user_input.len() <= 1 {
        return false;
    }
    if user_input.len() > command.len() || !command.contains(user_input) {
        return false;
    }
    if is_safely_encapsulated(command, user_input) {
        return false;
    }
    contains_shell_syntax(command, user_input)
}

/// True when every occurrence of the input sits between matching quote
/// characters that the input cannot break out of. Inside double quotes the
/// shell still interprets `$`, backticks, backslashes, and `!`, so those
/// disqualify the encapsulation.
fn is_safely_encapsulated(command: &str, user_input: &str) -> bool {
    for (start, _) in command.match_indices(user_input) {
        let before = command[..start].chars().next_back();
        let after = command[start + user_input.len()..].chars().next();

        let quote = match before {
            Some(c @ ('\'' | '"')) => c,
            _ => return false,
        };
        if let Some(c) = after {
            if c != quote {
                return false;
            }
        }
        if user_input.contains(quote) {
            return false;
        }
        if quote == '"' && user_input.contains(['$', '`', '\\', '!']) {
            return false;
        }
    }
    true
}

fn contains_shell_syntax(command: &str, user_input: &str) -> bool {
    if user_input.contains(SHELL_DANGEROUS_CHARS) {
        return true;
    }

    // No metacharacters. Still dangerous when the input is itself a command
    // name standing on its own in the command line.
    if !is_command_name(user_input.trim()) {
        return false;
    }
    for (start, _) in command.match_indices(user_input) {
        let before = command[..start].chars().next_back();
        let after = command[start + user_input.len()..].chars().next();
        let bounded_before = before.is_none_or(|c| SHELL_SEPARATORS.contains(&c));
        let bounded_after = after.is_none_or(|c| SHELL_SEPARATORS.contains(&c));
        if bounded_before && bounded_after {
            return true;
        }
    }
    false
}

/// True when `input` is one of the known command names, optionally prefixed
/// by a standard binary directory. Case-insensitive.
fn is_command_name(input: &str) -> bool {
    let lowered = input.to_lowercase();
    let name = SHELL_PATH_PREFIXES
        .iter()
        .find_map(|prefix| lowered.strip_prefix(prefix))
        .unwrap_or(&lowered);
    SHELL_COMMANDS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chained_command_is_flagged() {
        assert!(is_shell_injection(
            "ls -la /home/user/; rm -rf /; #",
            "; rm -rf /; #"
        ));
        assert!(is_shell_injection("echo $(whoami)", "$(whoami)"));
    }

    #[test]
    fn plain_argument_is_not_flagged() {
        assert!(!is_shell_injection("ls -la /home/user/documents", "documents"));
        assert!(!is_shell_injection("ls", "ls -la")); // input longer than command
        assert!(!is_shell_injection("cat file.txt", "x")); // single char
    }

    #[test]
    fn quoted_input_is_safe_when_it_cannot_escape() {
        assert!(!is_shell_injection("echo 'hello world'", "hello world"));
        assert!(!is_shell_injection("grep \"some term\" file", "some term"));
        // Breaks out of its own quotes.
        assert!(is_shell_injection("echo 'it's here'", "it's here"));
        // Double quotes do not neutralize command substitution.
        assert!(is_shell_injection("echo \"`id`\"", "`id`"));
        // Mismatched quote characters around the occurrence.
        assert!(is_shell_injection("echo \"rm -rf'", "rm -rf"));
    }

    #[test]
    fn bare_command_name_is_flagged_when_it_stands_alone() {
        assert!(is_shell_injection("looks_like nothing | curl | true", "curl"));
        assert!(is_shell_injection("/usr/bin/wget http://x", "/usr/bin/wget"));
        // Part of a longer word, not a standalone command.
        assert!(!is_shell_injection("binary --domain www.example.com", "www"));
        assert!(!is_shell_injection("curlything run", "curlything"));
    }

    #[test]
    fn lone_tilde_expansion() {
        assert!(is_shell_injection("ls ~", "~"));
        assert!(!is_shell_injection("ls /tmp", "~"));
    }
}
