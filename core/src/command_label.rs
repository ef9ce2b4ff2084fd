use shlex::try_join;

/// Display form of an invocation, for acknowledgment text and summaries.
/// Spawn paths never consume this; they always receive discrete argv.
pub fn command_line_for_display(command: &str, args: &[String]) -> String {
    let mut tokens: Vec<&str> = Vec::with_capacity(args.len() + 1);
    tokens.push(command);
    tokens.extend(args.iter().map(String::as_str));
    try_join(tokens.iter().copied()).unwrap_or_else(|_| tokens.join(" "))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn plain_tokens_join_unquoted() {
        let args = vec!["run".to_string(), "dev".to_string()];
        assert_eq!(command_line_for_display("npm", &args), "npm run dev");
    }

    #[test]
    fn tokens_with_whitespace_are_quoted() {
        let args = vec!["-c".to_string(), "echo hi".to_string()];
        assert_eq!(command_line_for_display("sh", &args), "sh -c \"echo hi\"");
    }
}
