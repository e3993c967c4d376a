//! The command console: normalizes a line, resolves its verb and runs the
//! matching handler against the storage engine.
//!
//! Handlers write their output to any `io::Write`, which is how the REPL
//! prints to stdout and how the tests capture output.

mod args;
mod command;
mod error;
mod normalize;
mod repl;

use std::io::Write;

use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{ModelClass, Record};
use crate::storage::{open_storage, StorageConfig, StorageEngine, StorageKey, StorageResult};

pub use args::{parse_mapping, split_args};
pub use command::Verb;
pub use error::{ConsoleError, ConsoleResult};
pub use normalize::normalize;
pub use repl::{Repl, ReplConfig};

/// What the REPL should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// The console, owning its storage engine.
pub struct Console {
    storage: Box<dyn StorageEngine>,
}

impl Console {
    /// Wrap an engine. The engine is used as-is; call `start` to reload it.
    pub fn new(storage: Box<dyn StorageEngine>) -> Self {
        Self { storage }
    }

    /// Wrap an engine and load it from durable storage.
    pub fn start(mut storage: Box<dyn StorageEngine>) -> StorageResult<Self> {
        storage.reload()?;
        debug!(backend = %storage.kind(), "storage reloaded");
        Ok(Self::new(storage))
    }

    /// Open the configured engine and load it.
    pub fn open(config: &StorageConfig) -> StorageResult<Self> {
        Self::start(open_storage(config))
    }

    pub fn storage(&self) -> &dyn StorageEngine {
        self.storage.as_ref()
    }

    /// Release the engine's resources.
    pub fn shutdown(&mut self) -> StorageResult<()> {
        self.storage.close()
    }

    /// Normalize and run a raw input line.
    pub fn handle_line(&mut self, line: &str, out: &mut dyn Write) -> std::io::Result<Flow> {
        let canonical = normalize(line);
        if canonical != line {
            debug!(raw = line, canonical = %canonical, "normalized dot syntax");
        }
        self.onecmd(&canonical, out)
    }

    /// Run one canonical command line, printing its output or error.
    ///
    /// Only output failures are returned; command errors are printed.
    pub fn onecmd(&mut self, line: &str, out: &mut dyn Write) -> std::io::Result<Flow> {
        match self.execute(line, out) {
            Ok(flow) => Ok(flow),
            Err(e) if e.is_fatal() => Err(e.into_io()),
            Err(e) => {
                if let ConsoleError::Storage(ref cause) = e {
                    warn!(error = %cause, line, "storage failure");
                }
                writeln!(out, "{}", e)?;
                Ok(Flow::Continue)
            }
        }
    }

    fn execute(&mut self, line: &str, out: &mut dyn Write) -> ConsoleResult<Flow> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }

        let (word, rest) = args::split_word(line);
        let verb = Verb::parse(word).ok_or_else(|| ConsoleError::UnknownSyntax(line.to_string()))?;
        debug!(%verb, rest, "dispatching");

        match verb {
            Verb::Create => self.do_create(rest, out)?,
            Verb::Show => self.do_show(rest, out)?,
            Verb::Destroy => self.do_destroy(rest)?,
            Verb::All => self.do_all(rest, out)?,
            Verb::Count => self.do_count(rest, out)?,
            Verb::Update => self.do_update(rest)?,
            Verb::Help => do_help(rest, out)?,
            Verb::Quit => return Ok(Flow::Exit),
            Verb::Eof => {
                writeln!(out)?;
                return Ok(Flow::Exit);
            }
        }
        Ok(Flow::Continue)
    }

    /// Class, then id, then lookup. Returns the record and whatever
    /// follows the id.
    fn locate<'a>(&self, rest: &'a str) -> ConsoleResult<(Record, &'a str)> {
        let (class_name, rest) = args::split_word(rest);
        let class = resolve_class(class_name)?;
        let (id, rest) = args::split_word(rest);
        if id.is_empty() {
            return Err(ConsoleError::InstanceIdMissing);
        }
        let record = self
            .storage
            .get(&StorageKey::new(class, id))?
            .ok_or(ConsoleError::InstanceNotFound)?;
        Ok((record, rest))
    }

    fn do_create(&mut self, rest: &str, out: &mut dyn Write) -> ConsoleResult<()> {
        let (class_name, params) = args::split_word(rest);
        let class = resolve_class(class_name)?;
        let record = class.instantiate_with(args::parse_create_params(class, params));
        let id = record.id().to_string();

        self.storage.new(record)?;
        self.storage.save()?;
        writeln!(out, "{}", id)?;
        Ok(())
    }

    fn do_show(&mut self, rest: &str, out: &mut dyn Write) -> ConsoleResult<()> {
        let (record, _) = self.locate(rest)?;
        writeln!(out, "{}", record)?;
        Ok(())
    }

    fn do_destroy(&mut self, rest: &str) -> ConsoleResult<()> {
        let (record, _) = self.locate(rest)?;
        self.storage.delete(Some(&record))?;
        self.storage.save()?;
        Ok(())
    }

    fn do_all(&mut self, rest: &str, out: &mut dyn Write) -> ConsoleResult<()> {
        let (class_name, _) = args::split_word(rest);
        let class = if class_name.is_empty() {
            None
        } else {
            Some(resolve_class(class_name)?)
        };

        let shown: Vec<String> = self
            .storage
            .all(class)?
            .records()
            .map(|record| format!("\"{}\"", record))
            .collect();
        writeln!(out, "[{}]", shown.join(", "))?;
        Ok(())
    }

    fn do_count(&mut self, rest: &str, out: &mut dyn Write) -> ConsoleResult<()> {
        let (class_name, _) = args::split_word(rest);
        let class = resolve_class(class_name)?;
        writeln!(out, "{}", self.storage.count(Some(class))?)?;
        Ok(())
    }

    fn do_update(&mut self, rest: &str) -> ConsoleResult<()> {
        let (mut record, rest) = self.locate(rest)?;
        let class = record.class();
        let assignments = update_assignments(class, rest)?;

        let mut applied = 0;
        for (name, value) in assignments {
            if record.set(name.as_str(), value) {
                applied += 1;
            } else {
                warn!(%class, name = name.as_str(), "ignoring update of reserved attribute");
            }
        }
        if applied == 0 {
            return Ok(());
        }
        record.touch();
        self.storage.new(record)?;
        self.storage.save()?;
        Ok(())
    }
}

fn resolve_class(name: &str) -> ConsoleResult<ModelClass> {
    if name.is_empty() {
        return Err(ConsoleError::ClassNameMissing);
    }
    ModelClass::lookup(name).ok_or(ConsoleError::ClassNotFound)
}

/// Every pair is checked before anything is assigned, so a bad pair
/// leaves the record untouched.
fn update_assignments(class: ModelClass, rest: &str) -> ConsoleResult<Vec<(String, Value)>> {
    let rest = rest.trim();
    if rest.starts_with('{') && rest.ends_with('}') {
        if let Some(pairs) = parse_mapping(rest) {
            if pairs.is_empty() {
                return Err(ConsoleError::AttributeNameMissing);
            }
            return pairs
                .into_iter()
                .map(|(name, value)| {
                    let shown = value.to_string();
                    args::coerce_value(class, &name, value)
                        .map(|value| (name.clone(), value))
                        .ok_or(ConsoleError::InvalidValue { name, value: shown })
                })
                .collect();
        }
    }

    let tokens = split_args(rest);
    if tokens.is_empty() {
        return Err(ConsoleError::AttributeNameMissing);
    }
    tokens
        .chunks(2)
        .map(|pair| {
            let name = &pair[0];
            if name.is_empty() {
                return Err(ConsoleError::AttributeNameMissing);
            }
            let raw = pair
                .get(1)
                .filter(|v| !v.is_empty())
                .ok_or(ConsoleError::AttributeValueMissing)?;
            args::coerce_text(class, name, raw)
                .map(|value| (name.clone(), value))
                .ok_or_else(|| ConsoleError::InvalidValue {
                    name: name.clone(),
                    value: raw.clone(),
                })
        })
        .collect()
}

fn do_help(topic: &str, out: &mut dyn Write) -> ConsoleResult<()> {
    let (topic, _) = args::split_word(topic);
    if topic.is_empty() {
        writeln!(out)?;
        writeln!(out, "Documented commands (type help <topic>):")?;
        writeln!(out, "========================================")?;
        let names: Vec<&str> = Verb::ALL.iter().map(|v| v.name()).collect();
        writeln!(out, "{}", names.join("  "))?;
        writeln!(out)?;
        return Ok(());
    }

    match Verb::parse(topic) {
        Some(verb) => {
            writeln!(out, "{}", verb.usage())?;
            writeln!(out)?;
        }
        None => writeln!(out, "*** No help on {}", topic)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DbConfig, DbStorage, Environment, FileStorage};
    use tempfile::TempDir;

    struct Harness {
        _dir: TempDir,
        console: Console,
    }

    impl Harness {
        fn file() -> Self {
            let dir = TempDir::new().unwrap();
            let storage = FileStorage::new(dir.path().join("file.json"));
            let console = Console::start(Box::new(storage)).unwrap();
            Self { _dir: dir, console }
        }

        fn db() -> Self {
            let dir = TempDir::new().unwrap();
            let config = DbConfig::new(dir.path().join("hbnb.db")).environment(Environment::Test);
            let console = Console::start(Box::new(DbStorage::new(config))).unwrap();
            Self { _dir: dir, console }
        }

        fn run(&mut self, line: &str) -> String {
            let mut out = Vec::new();
            self.console.handle_line(line, &mut out).unwrap();
            String::from_utf8(out).unwrap()
        }

        fn create(&mut self, line: &str) -> String {
            self.run(line).trim().to_string()
        }
    }

    fn both() -> Vec<Harness> {
        vec![Harness::file(), Harness::db()]
    }

    #[test]
    fn test_create_errors() {
        let mut h = Harness::file();
        assert_eq!(h.run("create"), "** class name missing **\n");
        assert_eq!(h.run("create asdfsfsd"), "** class doesn't exist **\n");
    }

    #[test]
    fn test_create_every_class_then_all() {
        for mut h in both() {
            for class in ModelClass::ALL {
                let id = h.create(&format!("create {}", class));
                assert_eq!(id.len(), 26);
                let listed = h.run(&format!("all {}", class));
                assert!(listed.contains(&id));
                assert!(listed.starts_with(&format!("[\"[{}] ({})", class, id)));
            }
            assert_eq!(h.run("count State"), "1\n");
        }
    }

    #[test]
    fn test_create_with_params() {
        for mut h in both() {
            let id = h.create(
                r#"create Place city_id="0001" name="My_house" number_rooms=6 latitude=37.77 longitude=43.434"#,
            );
            let output = h.run("all Place");
            assert!(output.contains(&id));
            assert!(output.contains("'city_id': '0001'"));
            assert!(output.contains("'name': 'My house'"));
            assert!(output.contains("'number_rooms': 6"));
            assert!(output.contains("'latitude': 37.77"));
            assert!(output.contains("'longitude': 43.434"));
        }
    }

    #[test]
    fn test_create_state_then_all() {
        for mut h in both() {
            let id = h.create(r#"create State name="California""#);
            let output = h.run("all State");
            assert!(output.contains(&format!("({})", id)));
            assert!(output.contains("'name': 'California'"));
        }
    }

    #[test]
    fn test_show_unknown_class() {
        let mut h = Harness::file();
        assert_eq!(h.run("show Widget 123"), "** class doesn't exist **\n");
    }

    #[test]
    fn test_validation_order() {
        let mut h = Harness::file();
        for verb in ["show", "destroy", "update"] {
            assert_eq!(h.run(verb), "** class name missing **\n");
            assert_eq!(h.run(&format!("{} Widget", verb)), "** class doesn't exist **\n");
            assert_eq!(h.run(&format!("{} User", verb)), "** instance id missing **\n");
            assert_eq!(h.run(&format!("{} User nope", verb)), "** no instance found **\n");
        }
        assert_eq!(h.run("all Widget"), "** class doesn't exist **\n");
        assert_eq!(h.run("count"), "** class name missing **\n");
        assert_eq!(h.run("count Widget"), "** class doesn't exist **\n");
    }

    #[test]
    fn test_show_prints_record() {
        let mut h = Harness::file();
        let id = h.create("create User");
        let shown = h.run(&format!("show User {}", id));
        assert!(shown.starts_with(&format!("[User] ({}) {{'id': '{}'", id, id)));
        assert_eq!(h.run(&format!("show User {} trailing junk", id)), shown);
    }

    #[test]
    fn test_destroy_then_show() {
        for mut h in both() {
            let id = h.create("create City");
            assert_eq!(h.run(&format!("destroy City {}", id)), "");
            assert_eq!(h.run(&format!("show City {}", id)), "** no instance found **\n");
            assert_eq!(h.run("count City"), "0\n");
        }
    }

    #[test]
    fn test_update_pairs_are_typed() {
        for mut h in both() {
            let id = h.create("create Place");
            assert_eq!(h.run(&format!("update Place {} number_rooms 6 latitude 37.77", id)), "");
            let shown = h.run(&format!("show Place {}", id));
            assert!(shown.contains("'number_rooms': 6,") || shown.contains("'number_rooms': 6}"));
            assert!(shown.contains("'latitude': 37.77"));

            let key = StorageKey::new(ModelClass::Place, id.as_str());
            let record = h.console.storage().get(&key).unwrap().unwrap();
            assert_eq!(record.get("number_rooms"), Some(&Value::from(6)));
            assert!(record.get("latitude").unwrap().is_f64());
            assert!(record.updated_at() >= record.created_at());
        }
    }

    #[test]
    fn test_update_quoted_value() {
        let mut h = Harness::file();
        let id = h.create("create User");
        h.run(&format!(r#"update User {} first_name "Betty Holberton""#, id));
        assert!(h
            .run(&format!("show User {}", id))
            .contains("'first_name': 'Betty Holberton'"));
    }

    #[test]
    fn test_update_missing_name_or_value() {
        let mut h = Harness::file();
        let id = h.create("create User");
        assert_eq!(h.run(&format!("update User {}", id)), "** attribute name missing **\n");
        assert_eq!(h.run(&format!("update User {} email", id)), "** value missing **\n");
        assert_eq!(
            h.run(&format!("update User {} first_name Ada email", id)),
            "** value missing **\n"
        );
        // nothing from the rejected pairs was applied
        assert!(!h.run(&format!("show User {}", id)).contains("first_name"));
    }

    #[test]
    fn test_update_invalid_number() {
        let mut h = Harness::file();
        let id = h.create("create Place");
        assert_eq!(
            h.run(&format!("update Place {} max_guest lots", id)),
            "** invalid value for max_guest: lots **\n"
        );
    }

    #[test]
    fn test_update_cannot_touch_identity() {
        let mut h = Harness::file();
        let id = h.create("create State");
        h.run(&format!("update State {} id forged name Utah", id));
        let shown = h.run(&format!("show State {}", id));
        assert!(shown.contains("'name': 'Utah'"));
        assert!(!shown.contains("forged"));
    }

    #[test]
    fn test_update_of_only_reserved_names_is_a_noop() {
        for mut h in both() {
            let id = h.create("create State");
            let key = StorageKey::new(ModelClass::State, id.as_str());
            let before = h.console.storage().get(&key).unwrap().unwrap();

            assert_eq!(h.run(&format!("update State {} id forged", id)), "");
            assert_eq!(h.run(&format!("update State {} {{'created_at': 'x'}}", id)), "");

            let after = h.console.storage().get(&key).unwrap().unwrap();
            assert_eq!(after, before);
            assert_eq!(after.updated_at(), before.updated_at());
        }
    }

    #[test]
    fn test_update_with_mapping() {
        for mut h in both() {
            let id = h.create("create Place");
            h.run(&format!(
                r#"Place.update("{}", {{'name': "Beach hut", 'max_guest': 4, "latitude": 12}})"#,
                id
            ));
            let shown = h.run(&format!("show Place {}", id));
            assert!(shown.contains("'name': 'Beach hut'"));
            assert!(shown.contains("'max_guest': 4"));
            assert!(shown.contains("'latitude': 12.0"));
        }
    }

    #[test]
    fn test_dot_syntax_matches_canonical() {
        let mut h = Harness::file();
        let id = h.create("create User");
        h.run(&format!("update User {} first_name Ada", id));

        let pairs = [
            (format!(r#"User.show("{}")"#, id), format!("show User {}", id)),
            ("User.all()".to_string(), "all User".to_string()),
            ("User.count()".to_string(), "count User".to_string()),
            (r#"User.show("missing")"#.to_string(), "show User missing".to_string()),
            ("Widget.all()".to_string(), "all Widget".to_string()),
        ];
        for (dot, canonical) in pairs {
            assert_eq!(h.run(&dot), h.run(&canonical), "{}", dot);
        }

        h.run(&format!(r#"User.update("{}", "last_name", "Lovelace")"#, id));
        assert!(h.run(&format!("show User {}", id)).contains("'last_name': 'Lovelace'"));
        h.run(&format!(r#"User.destroy("{}")"#, id));
        assert_eq!(h.run("User.count()"), "0\n");
    }

    #[test]
    fn test_unknown_syntax() {
        let mut h = Harness::file();
        assert_eq!(h.run("fly away"), "*** Unknown syntax: fly away\n");
        assert_eq!(h.run("User.create()"), "*** Unknown syntax: User.create()\n");
    }

    #[test]
    fn test_empty_line_does_nothing() {
        let mut h = Harness::file();
        h.create("create State");
        assert_eq!(h.run(""), "");
        assert_eq!(h.run("   "), "");
        assert_eq!(h.run("count State"), "1\n");
    }

    #[test]
    fn test_quit_and_eof() {
        let mut h = Harness::file();
        let mut out = Vec::new();
        assert_eq!(h.console.onecmd("quit", &mut out).unwrap(), Flow::Exit);
        assert!(out.is_empty());
        assert_eq!(h.console.onecmd("EOF", &mut out).unwrap(), Flow::Exit);
        assert_eq!(out, b"\n");
    }

    #[test]
    fn test_help() {
        let mut h = Harness::file();
        let listing = h.run("help");
        assert!(listing.contains("Documented commands"));
        assert!(listing.contains("create"));
        assert!(h.run("help create").contains("[Usage]: create <className>"));
        assert_eq!(h.run("help fly"), "*** No help on fly\n");
    }

    #[test]
    fn test_storage_failure_is_reported_not_fatal() {
        let mut h = Harness::db();
        h.console.shutdown().unwrap();
        let output = h.run("create State");
        assert!(output.starts_with("** storage unavailable"));
        assert_eq!(h.run("help quit"), "Exits the program with formatting\n\n");
    }

    #[test]
    fn test_records_survive_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.json");
        let mut first = Console::start(Box::new(FileStorage::new(&path))).unwrap();
        let mut out = Vec::new();
        first.onecmd(r#"create Amenity name="Wifi""#, &mut out).unwrap();
        let id = String::from_utf8(out).unwrap().trim().to_string();
        first.shutdown().unwrap();

        let mut second = Console::start(Box::new(FileStorage::new(&path))).unwrap();
        let mut out = Vec::new();
        second.onecmd(&format!("show Amenity {}", id), &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("'name': 'Wifi'"));
    }
}
