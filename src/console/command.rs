//! Console verbs.

use std::fmt;

/// Every command the console understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Create,
    Show,
    Destroy,
    All,
    Count,
    Update,
    Help,
    Quit,
    Eof,
}

impl Verb {
    /// All verbs, in help order.
    pub const ALL: [Verb; 9] = [
        Verb::Eof,
        Verb::All,
        Verb::Count,
        Verb::Create,
        Verb::Destroy,
        Verb::Help,
        Verb::Quit,
        Verb::Show,
        Verb::Update,
    ];

    /// Resolve the first word of a line. Case-sensitive.
    pub fn parse(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|verb| verb.name() == word)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Verb::Create => "create",
            Verb::Show => "show",
            Verb::Destroy => "destroy",
            Verb::All => "all",
            Verb::Count => "count",
            Verb::Update => "update",
            Verb::Help => "help",
            Verb::Quit => "quit",
            Verb::Eof => "EOF",
        }
    }

    /// Verbs reachable through `ClassName.verb(...)`.
    ///
    /// `create` is deliberately not among them.
    pub fn is_dot_verb(&self) -> bool {
        matches!(
            self,
            Verb::All | Verb::Count | Verb::Show | Verb::Destroy | Verb::Update
        )
    }

    /// Help text printed by `help <verb>`.
    pub fn usage(&self) -> &'static str {
        match self {
            Verb::Create => {
                "Creates a class of any type\n[Usage]: create <className> [<key>=<value> ...]"
            }
            Verb::Show => {
                "Shows an individual instance of a class\n[Usage]: show <className> <objectId>"
            }
            Verb::Destroy => {
                "Destroys an individual instance of a class\n[Usage]: destroy <className> <objectId>"
            }
            Verb::All => "Shows all objects, or all of a class\n[Usage]: all [<className>]",
            Verb::Count => "Counts the instances of a class\n[Usage]: count <className>",
            Verb::Update => {
                "Updates an object with new information\n\
                 [Usage]: update <className> <id> <attName> <attVal> [<attName> <attVal> ...]\n\
                 [Usage]: update <className> <id> {<attName>: <attVal>, ...}"
            }
            Verb::Help => "List available commands with \"help\" or detailed help with \"help cmd\".",
            Verb::Quit => "Exits the program with formatting",
            Verb::Eof => "Exits the program without formatting",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
