//! Plain-text renderings of the registry.

use std::fmt::Write;

use keybridge_commands::{CommandDescriptor, CommandRegistry};

pub const NO_KEY_WARNING: &str = "WARNING: No private key set, the available commands will be very limited";

/// The command listing served at `/`.
pub fn render_listing(registry: &CommandRegistry, key_loaded: bool) -> String {
    let mut out = String::new();
    if !key_loaded {
        out.push_str(NO_KEY_WARNING);
        out.push_str("\n\n");
    }
    out.push_str("List of supported commands\n");
    for command in registry.listable(key_loaded) {
        let _ = writeln!(out, "Name: {}\n{}", command.name, command.help);
        if !command.args.is_empty() {
            out.push_str("Arguments:\n");
            for arg in &command.args {
                let _ = writeln!(out, "name: {} - Description: {}", arg.name, arg.help);
            }
        }
        out.push('\n');
    }
    out
}

/// Help text for a single command, served for `?help`.
pub fn render_help(command: &CommandDescriptor) -> String {
    let mut out = format!("{}\n", command.help);
    for arg in &command.args {
        let _ = writeln!(out, "Argument name: {} - Description: {}", arg.name, arg.help);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_without_key_warns_and_hides_auth() {
        let text = render_listing(&CommandRegistry::new(), false);
        assert!(text.starts_with(NO_KEY_WARNING));
        assert!(text.contains("Name: wake\n"));
        assert!(!text.contains("Name: unlock\n"));
        assert!(!text.contains("Name: product-info\n"));
    }

    #[test]
    fn listing_with_key_shows_arguments() {
        let text = render_listing(&CommandRegistry::new(), true);
        assert!(text.starts_with("List of supported commands\n"));
        assert!(text.contains("Name: charging-set-limit\n"));
        assert!(text.contains("Arguments:\nname: percent - Description: "));
    }

    #[test]
    fn help_lists_every_argument() {
        let registry = CommandRegistry::new();
        let text = render_help(registry.lookup("add-key-request").unwrap());
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("Argument name: public_key - Description: "));
        assert!(lines[3].starts_with("Argument name: form_factor - Description: "));
    }
}
