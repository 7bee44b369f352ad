//! Agent operations end to end against the fake editor server

use std::fs;
use std::path::Path;

use libvimbridge_agent::EditorAgent;
use libvimbridge_core::diff::{apply_patch, NO_CHANGES};
use libvimbridge_core::translate::{GraphResolver, Translator};
use libvimbridge_core::{BridgeError, CodeGraph, EditorCommand, ResolutionError};
use libvimbridge_rpc::Session;
use tempfile::TempDir;
use vimbridge_testkit::{start_server, test_config, write_fixture, FakeEditorServer};

fn agent(server: &FakeEditorServer, root: &Path) -> EditorAgent<Session> {
    EditorAgent::connect(&test_config(server.endpoint()), Translator::pass_through(), root).unwrap()
}

fn graph_agent(server: &FakeEditorServer, root: &Path, graph: &str) -> EditorAgent<Session> {
    let graph = CodeGraph::from_json(graph).unwrap();
    let translator = Translator::new(Box::new(GraphResolver::new(graph, root)));
    EditorAgent::connect(&test_config(server.endpoint()), translator, root).unwrap()
}

#[test]
fn test_insert_into_empty_file_is_recorded_once() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), "a.py", "");
    let server = start_server(dir.path());
    let mut agent = agent(&server, dir.path());

    agent.open(Path::new("a.py")).unwrap();
    let outcome = agent.execute("ihello<Esc>").unwrap();
    assert!(outcome.changed());
    assert!(outcome.diff.contains("+hello"), "{}", outcome.diff);

    let changes: Vec<_> = agent.get_changes(None).collect();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].seq, 1);
    assert_eq!(changes[0].path(), path.as_path());
    assert!(changes[0].diff().contains("+hello"));

    // Same content again: nothing new to record
    let outcome = agent
        .execute_command(&EditorCommand::SetLines {
            start: 0,
            end: Some(1),
            lines: vec!["hello".to_string()],
        })
        .unwrap();
    assert!(!outcome.changed());
    assert_eq!(agent.get_changes(None).count(), 1);

    assert_eq!(fs::read_to_string(&path).unwrap(), "hello\n");
}

#[test]
fn test_navigation_records_nothing() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path(), "nav.txt", "one\ntwo\nthree\n");
    let server = start_server(dir.path());
    let mut agent = agent(&server, dir.path());

    agent.open(Path::new("nav.txt")).unwrap();
    for raw in [":2", "j", ":$", "gg", ":/three"] {
        let outcome = agent.execute(raw).unwrap();
        assert!(!outcome.changed(), "{raw} changed the buffer");
    }
    assert!(agent.get_changes(None).next().is_none());
    assert_eq!(agent.diff_changes(None), NO_CHANGES);
}

#[test]
fn test_execute_captures_output() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path(), "b.txt", "one\ntwo\nthree\n");
    let server = start_server(dir.path());
    let mut agent = agent(&server, dir.path());

    agent.open(Path::new("b.txt")).unwrap();
    agent.execute(":3").unwrap();
    let outcome = agent.execute(":echo line(\".\")").unwrap();
    assert_eq!(outcome.output.as_deref(), Some("3"));
}

#[test]
fn test_rejected_command_leaves_session_usable() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path(), "b.txt", "one\n");
    let server = start_server(dir.path());
    let mut agent = agent(&server, dir.path());

    agent.open(Path::new("b.txt")).unwrap();
    let err = agent.execute(":frobnicate").unwrap_err();
    assert!(err.is_command_rejection());
    assert!(agent.execute(":1").is_ok());
    assert!(agent.tracker().is_empty());
}

#[test]
fn test_failed_search_typed_as_keys_is_rejected() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path(), "a.txt", "alpha\nbeta\n");
    let server = start_server(dir.path());
    let mut agent = agent(&server, dir.path());

    agent.open(Path::new("a.txt")).unwrap();
    let err = agent.execute("/nosuchpattern<CR>").unwrap_err();
    assert!(err.is_command_rejection());
    assert!(err.to_string().contains("E486"), "{}", err);

    // The error does not leak into the next command
    assert!(agent.execute("/beta<CR>").is_ok());
    assert!(agent.tracker().is_empty());
}

#[test]
fn test_dotted_paths_name_the_same_buffer() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), "a.py", "import os\n");
    let server = start_server(dir.path());
    let mut agent = agent(&server, dir.path());

    let outcome = agent.open(Path::new("./a.py")).unwrap();
    assert_eq!(outcome.path.as_deref(), Some(path.as_path()));

    let parent = Path::new("..")
        .join(dir.path().file_name().unwrap())
        .join("a.py");
    agent.add_import(&parent, "import sys").unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "import os\nimport sys\n");

    let changes: Vec<_> = agent.get_changes(Some(Path::new("./a.py"))).collect();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].path(), path.as_path());
    assert_eq!(server.editor().buffers().len(), 2);
}

#[test]
fn test_edit_function_replaces_block() {
    let dir = TempDir::new().unwrap();
    let original = "import os\n\ndef greet(name):\n    return 'hi ' + name\n\n\ndef other():\n    pass\n";
    let path = write_fixture(dir.path(), "a.py", original);
    let server = start_server(dir.path());
    let mut agent = agent(&server, dir.path());

    let outcome = agent
        .edit_function(
            "greet",
            Some(Path::new("a.py")),
            Some("def greet(name):\n    return f'hello {name}'\n"),
        )
        .unwrap();
    assert!(outcome.changed());
    assert!(outcome.message.starts_with("Replaced function"));

    let expected = "import os\n\ndef greet(name):\n    return f'hello {name}'\n\n\ndef other():\n    pass\n";
    assert_eq!(fs::read_to_string(&path).unwrap(), expected);

    let record = agent.get_changes(Some(Path::new("a.py"))).next().unwrap();
    assert_eq!(
        apply_patch(&record.before.text(), &record.diff()).unwrap(),
        record.after.text()
    );

    // Replacing with identical content is a no-op
    let outcome = agent
        .edit_function(
            "greet",
            Some(Path::new("a.py")),
            Some("def greet(name):\n    return f'hello {name}'\n"),
        )
        .unwrap();
    assert!(!outcome.changed());
    assert!(outcome.message.contains("already up to date"));
    assert_eq!(agent.get_changes(None).count(), 1);
}

#[test]
fn test_edit_function_navigates() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path(), "lib.rs", "use std::fs;\n\npub fn parse() {}\n\nfn main() {\n    parse();\n}\n");
    let server = start_server(dir.path());
    let mut agent = agent(&server, dir.path());

    let outcome = agent.edit_function("main", Some(Path::new("lib.rs")), None).unwrap();
    assert!(!outcome.changed());
    assert_eq!(server.editor().cursor().row, 4);
}

#[test]
fn test_missing_declaration_is_rejected() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path(), "a.py", "def f():\n    pass\n");
    let server = start_server(dir.path());
    let mut agent = agent(&server, dir.path());

    let err = agent
        .edit_function("nope", Some(Path::new("a.py")), Some("def nope():\n    pass"))
        .unwrap_err();
    assert!(err.is_command_rejection());
    assert!(err.to_string().contains("E486"), "{err}");
    assert!(agent.get_changes(None).next().is_none());
}

#[test]
fn test_function_without_file_or_graph() {
    let dir = TempDir::new().unwrap();
    let server = start_server(dir.path());
    let mut agent = agent(&server, dir.path());

    let err = agent.edit_function("f", None, None).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Resolution(ResolutionError::FileRequired { .. })
    ));
}

#[test]
fn test_edit_method_through_graph() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(
        dir.path(),
        "b.py",
        "class Greeter:\n    def __init__(self):\n        self.n = 0\n\n    def hello(self):\n        return \"hello\"\n",
    );
    let server = start_server(dir.path());
    let graph = r#"{
        "files": [{"name": "b.py", "language": "python"}],
        "classes": [{
            "file": "b.py",
            "name": "Greeter",
            "line": 1,
            "methods": [{"name": "__init__", "line": 2}, {"name": "hello", "line": 5}]
        }]
    }"#;
    let mut agent = graph_agent(&server, dir.path(), graph);

    let outcome = agent
        .edit_class("Greeter", Some("hello"), None, Some("def hello(self):\n    return 'hi'"))
        .unwrap();
    assert!(outcome.changed());
    assert_eq!(outcome.path.as_deref(), Some(path.as_path()));
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "class Greeter:\n    def __init__(self):\n        self.n = 0\n\n    def hello(self):\n        return 'hi'\n"
    );
}

#[test]
fn test_edit_class_without_graph_line() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path(), "c.py", "x = 1\n\nclass Shape:\n    pass\n");
    let server = start_server(dir.path());
    let mut agent = agent(&server, dir.path());

    agent.edit_class("Shape", None, Some(Path::new("c.py")), None).unwrap();
    assert_eq!(server.editor().cursor().row, 2);
}

#[test]
fn test_ambiguous_function_lists_candidates() {
    let dir = TempDir::new().unwrap();
    let server = start_server(dir.path());
    let graph = r#"{
        "functions": [
            {"file": "a.py", "name": "parse", "line": 3},
            {"file": "b.py", "name": "parse", "line": 8}
        ]
    }"#;
    let mut agent = graph_agent(&server, dir.path(), graph);

    let err = agent.edit_function("parse", None, None).unwrap_err();
    match err {
        BridgeError::Resolution(ResolutionError::Ambiguous { candidates, .. }) => {
            assert_eq!(candidates.len(), 2);
        }
        other => panic!("expected ambiguity, got {other}"),
    }
    // Nothing was sent to the editor
    assert!(server.editor().history.is_empty());
}

#[test]
fn test_add_import_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), "m.py", "import os\n\nx = 1\n");
    let server = start_server(dir.path());
    let mut agent = agent(&server, dir.path());

    let outcome = agent.add_import(Path::new("m.py"), "import sys").unwrap();
    assert!(outcome.changed());
    assert_eq!(fs::read_to_string(&path).unwrap(), "import os\nimport sys\n\nx = 1\n");

    let outcome = agent.add_import(Path::new("m.py"), "import sys").unwrap();
    assert!(!outcome.changed());
    assert!(outcome.message.contains("already present"));
    assert_eq!(agent.get_changes(None).count(), 1);
}

#[test]
fn test_insert_after_pattern() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), "list.txt", "a\nb\nc\n");
    let server = start_server(dir.path());
    let mut agent = agent(&server, dir.path());

    agent
        .insert_after_pattern(Path::new("list.txt"), "^b$", "x\ny")
        .unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\nx\ny\nc\n");
}

#[test]
fn test_create_file_writes_to_disk() {
    let dir = TempDir::new().unwrap();
    let server = start_server(dir.path());
    let mut agent = agent(&server, dir.path());

    let outcome = agent
        .create_file(Path::new("pkg/new.py"), "print(1)\nprint(2)\n")
        .unwrap();
    assert!(outcome.changed());
    assert!(outcome.diff.contains("+print(2)"));

    let path = dir.path().join("pkg/new.py");
    assert_eq!(fs::read_to_string(&path).unwrap(), "print(1)\nprint(2)\n");
    assert!(agent.tracker().is_tracking(&path));
}

#[test]
fn test_changes_filter_and_reset() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path(), "a.txt", "a\n");
    write_fixture(dir.path(), "b.txt", "b\n");
    let server = start_server(dir.path());
    let mut agent = agent(&server, dir.path());

    agent.insert_after_pattern(Path::new("a.txt"), "^a$", "a2").unwrap();
    agent.insert_after_pattern(Path::new("b.txt"), "^b$", "b2").unwrap();
    agent.insert_after_pattern(Path::new("a.txt"), "^a2$", "a3").unwrap();

    let seqs: Vec<u64> = agent.get_changes(None).map(|r| r.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
    assert_eq!(agent.get_changes(Some(Path::new("a.txt"))).count(), 2);

    let diff = agent.diff_changes(Some(Path::new("b.txt")));
    assert!(diff.contains("+b2"));
    assert!(!diff.contains("a2"));

    assert_eq!(agent.reset_changes(), 3);
    assert_eq!(agent.diff_changes(None), NO_CHANGES);

    // Baselines survive a reset: the next record diffs against current content
    agent.insert_after_pattern(Path::new("b.txt"), "^b2$", "b3").unwrap();
    let record = agent.get_changes(None).next().unwrap();
    assert_eq!(record.before.lines(), ["b", "b2"]);
}

#[test]
fn test_without_auto_write_buffer_stays_unsaved() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), "a.txt", "a\n");
    let server = start_server(dir.path());
    let mut config = test_config(server.endpoint());
    config.tracking.auto_write = false;
    let mut agent = EditorAgent::connect(&config, Translator::pass_through(), dir.path()).unwrap();

    agent.insert_after_pattern(Path::new("a.txt"), "^a$", "b").unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "a\n");
    assert_eq!(
        server.editor().lines_of(&path).unwrap(),
        ["a".to_string(), "b".to_string()]
    );
}
