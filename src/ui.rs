//! Terminal interaction helpers.
//!
//! Confirmation prompts for destructive commands and the tree renderings
//! printed by the `list` commands. Readers and writers are generic so the
//! prompt can be driven from tests.

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

pub const CONFIRM_QUESTION: &str = "Are you sure ? (y/N)";

/// Ask `question` on stdout and read the answer from stdin.
pub fn confirm(question: &str) -> io::Result<bool> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    confirm_with(question, &mut stdin.lock(), &mut stdout.lock())
}

/// Ask until the answer is yes or no. An empty answer or end of input is no.
pub fn confirm_with<R: BufRead, W: Write>(
    question: &str,
    input: &mut R,
    output: &mut W,
) -> io::Result<bool> {
    loop {
        write!(output, "{question} ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(false);
        }
        match line.trim() {
            "y" | "Y" | "yes" => return Ok(true),
            "" | "n" | "N" | "no" => return Ok(false),
            other => writeln!(output, "Please answer y or n (got '{other}')")?,
        }
    }
}

/// One line per CA, the current one marked with `* `.
pub fn render_ca_list(cas: &[String], current: Option<&str>) -> String {
    let mut out = String::new();
    for ca in cas {
        if Some(ca.as_str()) == current {
            out.push_str(&format!("* {}\n", ca.green().bold()));
        } else {
            out.push_str(&format!("  {ca}\n"));
        }
    }
    out
}

/// Tree of identities and the files each one holds.
pub fn render_identity_tree(ca: &str, identities: &[(String, Vec<PathBuf>)]) -> String {
    let mut out = format!("{}\n", ca.bold());
    for (i, (identity, files)) in identities.iter().enumerate() {
        let last = i + 1 == identities.len();
        out.push_str(&format!("{} {identity}\n", if last { "└──" } else { "├──" }));
        let indent = if last { "    " } else { "│   " };
        for (j, file) in files.iter().enumerate() {
            let branch = if j + 1 == files.len() { "└──" } else { "├──" };
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            out.push_str(&format!("{indent}{branch} {name}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn answer(input: &str) -> (bool, String) {
        let mut output = Vec::new();
        let result = confirm_with(CONFIRM_QUESTION, &mut Cursor::new(input), &mut output).unwrap();
        (result, String::from_utf8(output).unwrap())
    }

    #[test]
    fn default_answer_is_no() {
        assert!(!answer("\n").0);
        assert!(!answer("").0);
        assert!(!answer("N\n").0);
    }

    #[test]
    fn accepts_yes_forms() {
        assert!(answer("y\n").0);
        assert!(answer("Y\n").0);
        assert!(answer("yes\n").0);
    }

    #[test]
    fn unrecognised_answer_asks_again() {
        let (result, output) = answer("maybe\ny\n");
        assert!(result);
        assert_eq!(output.matches(CONFIRM_QUESTION).count(), 2);
    }

    #[test]
    fn identity_tree_lists_files() {
        colored::control::set_override(false);
        let tree = render_identity_tree(
            "acme",
            &[
                ("db1".to_string(), vec![PathBuf::from("/x/db1.crt")]),
                (
                    "web1".to_string(),
                    vec![PathBuf::from("/x/web1.crt"), PathBuf::from("/x/web1.p8")],
                ),
            ],
        );
        assert_eq!(
            tree,
            "acme\n├── db1\n│   └── db1.crt\n└── web1\n    ├── web1.crt\n    └── web1.p8\n"
        );
    }

    #[test]
    fn current_ca_is_marked() {
        colored::control::set_override(false);
        let list = render_ca_list(&["acme".to_string(), "other".to_string()], Some("acme"));
        assert_eq!(list, "* acme\n  other\n");
    }
}
