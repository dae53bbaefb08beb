//! Integration tests for path dispatch over the plain fixture document.
//!
//! `tests/data/simple_test.xml` holds two `person` elements separated by
//! `person2` and `person3`, and a self-closing `person4`.

#![allow(clippy::unwrap_used)]

use std::cell::RefCell;
use std::io::Write;
use std::path::{Path, PathBuf};

use xmlreg::reader::XmlCursor;
use xmlreg::{
    Callback, Document, DriverState, Error, ReaderOptions, RegReader, Value, XmlNodeType,
    XmlReader,
};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

fn open(name: &str) -> RegReader<XmlReader<std::io::BufReader<std::fs::File>>> {
    RegReader::open(fixture(name)).unwrap_or_else(|e| panic!("cannot open {name}: {e}"))
}

/// Collects `(capture 1, text)` for every match of `pattern`.
fn text_matches<C: XmlCursor>(reader: &mut RegReader<C>, pattern: &str) -> Vec<(String, String)> {
    let mut found = Vec::new();
    reader
        .process([(
            pattern,
            Callback::text(|text, caps| {
                found.push((caps.get(1).unwrap_or_default().to_string(), text));
                Ok(())
            }),
        )])
        .unwrap();
    found
}

fn pairs(expected: &[(&str, &str)]) -> Vec<(String, String)> {
    expected
        .iter()
        .map(|&(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

// --- Text values ---

#[test]
fn test_fetch_single_firstname() {
    let mut reader = open("simple_test.xml");
    let mut first_name = String::new();
    reader
        .process([(
            "/root/person2/firstname",
            Callback::text(|text, _| {
                first_name = text;
                Ok(())
            }),
        )])
        .unwrap();

    assert_eq!(first_name, "John3");
    assert_eq!(reader.state(), DriverState::Stopped);
}

#[test]
fn test_fetch_firstnames_with_array_notation() {
    let mut reader = open("simple_test.xml");
    let found = text_matches(&mut reader, "(.*/firstname)");
    assert_eq!(
        found,
        pairs(&[
            ("/root/person/firstname", "John"),
            ("/root/person2/firstname", "John3"),
            ("/root/person3/firstname", "John1"),
            ("/root/person[1]/firstname", "John32"),
        ])
    );
}

#[test]
fn test_fetch_firstnames_without_array_notation() {
    let mut reader = open("simple_test.xml");
    reader.set_array_notation(false);
    let found = text_matches(&mut reader, "(.*/firstname)");
    assert_eq!(
        found,
        pairs(&[
            ("/root/person/firstname", "John"),
            ("/root/person2/firstname", "John3"),
            ("/root/person3/firstname", "John1"),
            ("/root/person/firstname", "John32"),
        ])
    );
}

#[test]
fn test_fetch_person_inner_text() {
    let mut reader = open("simple_test.xml");
    let found = text_matches(&mut reader, r"(.*/person(?:\[\d*\])?)");
    assert_eq!(
        found,
        pairs(&[
            (
                "/root/person",
                "<firstname>John</firstname>\n        <lastname>Doe</lastname>"
            ),
            (
                "/root/person[1]",
                "<firstname>John32</firstname>\n        <lastname>Doe3</lastname>"
            ),
        ])
    );
}

#[test]
fn test_person_pattern_with_escaped_slash() {
    let mut reader = open("simple_test.xml");
    let mut paths = Vec::new();
    reader
        .process([(
            r"(.*\/person(?:\[\d*\])?)",
            Callback::text(|_, caps| {
                paths.push(caps[1].to_string());
                Ok(())
            }),
        )])
        .unwrap();
    assert_eq!(paths, vec!["/root/person", "/root/person[1]"]);
}

#[test]
fn test_capture_groups_skip_unmatched() {
    let mut reader = open("simple_test.xml");
    let mut found = Vec::new();
    reader
        .process([(
            r"(.*/person)(\[\d*\])?",
            Callback::text(|text, caps| {
                found.push((text, caps.clone().into_vec()));
                Ok(())
            }),
        )])
        .unwrap();

    assert_eq!(found.len(), 2);
    assert_eq!(found[0].1, vec!["/root/person", "/root/person"]);
    assert_eq!(found[1].1, vec!["/root/person[1]", "/root/person", "[1]"]);
    assert_eq!(
        found[1].0,
        "<firstname>John32</firstname>\n        <lastname>Doe3</lastname>"
    );
}

#[test]
fn test_self_closing_element_text_is_empty() {
    let mut reader = open("simple_test.xml");
    let found = text_matches(&mut reader, "(/root/person4)");
    assert_eq!(found, pairs(&[("/root/person4", "")]));
}

// --- Tree values ---

#[test]
fn test_fetch_person_nodes() {
    let mut reader = open("simple_test.xml");
    let mut found = Vec::new();
    reader
        .process([(
            r"(.*/person(?:\[\d*\])?)",
            Callback::node(|node, caps| {
                assert!(node.parent().is_none(), "values are detached");
                let first = node.child("firstname").map(|n| n.text());
                found.push((caps[1].to_string(), node.to_xml(), first));
                Ok(())
            }),
        )])
        .unwrap();

    assert_eq!(found.len(), 2);
    assert_eq!(found[0].0, "/root/person");
    assert_eq!(
        found[0].1,
        "<person>\n        <firstname>John</firstname>\n        <lastname>Doe</lastname>\n    </person>"
    );
    assert_eq!(found[0].2.as_deref(), Some("John"));
    assert_eq!(found[1].0, "/root/person[1]");
    assert_eq!(found[1].2.as_deref(), Some("John32"));
}

#[test]
fn test_outer_xml_of_matched_elements() {
    let mut reader = open("simple_test.xml");
    let mut found = Vec::new();
    reader
        .process([(
            "(.*/firstname)",
            Callback::node(|node, caps| {
                found.push((caps[1].to_string(), node.to_xml()));
                Ok(())
            }),
        )])
        .unwrap();

    let outer: Vec<&str> = found.iter().map(|(_, xml)| xml.as_str()).collect();
    assert_eq!(
        outer,
        vec![
            "<firstname>John</firstname>",
            "<firstname>John3</firstname>",
            "<firstname>John1</firstname>",
            "<firstname>John32</firstname>",
        ]
    );
}

#[test]
fn test_self_closing_element_node() {
    let mut reader = open("simple_test.xml");
    let mut found = Vec::new();
    reader
        .process([(
            r"(.*/person4(?:\[\d*\])?)",
            Callback::node(|node, caps| {
                found.push((caps[1].to_string(), node.to_xml(), node.attribute("id").map(str::to_string)));
                Ok(())
            }),
        )])
        .unwrap();

    assert_eq!(
        found,
        vec![(
            "/root/person4".to_string(),
            r#"<person4 id="12"/>"#.to_string(),
            Some("12".to_string())
        )]
    );
}

#[test]
fn test_declared_callbacks_mixed_in_one_call() {
    let mut reader = open("simple_test.xml");
    let seen = RefCell::new(Vec::new());
    reader
        .process([
            (
                r"(.*/person(?:\[\d*\])?)",
                Callback::declared("element", |value, caps| {
                    let Value::Node(node) = value else {
                        panic!("element callbacks receive nodes");
                    };
                    seen.borrow_mut()
                        .push(format!("1) {} {}", &caps[1], node.local_name().unwrap_or_default()));
                    Ok(())
                }),
            ),
            (
                r"(.*/person3(\[\d*\])?)",
                Callback::declared("NodeRef", |value, caps| {
                    assert!(value.as_node().is_some());
                    seen.borrow_mut().push(format!("2) {}", &caps[1]));
                    Ok(())
                }),
            ),
            (
                "/root/person2/firstname",
                Callback::declared("string", |value, _| {
                    seen.borrow_mut().push(format!("3) {value}"));
                    Ok(())
                }),
            ),
        ])
        .unwrap();

    assert_eq!(
        seen.into_inner(),
        vec![
            "1) /root/person person",
            "3) John3",
            "2) /root/person3",
            "1) /root/person[1] person",
        ]
    );
}

#[test]
fn test_tree_values_owned_by_supplied_document() {
    let mut reader = open("simple_test.xml");
    reader.set_array_notation(false);
    assert!(reader.set_document(Document::new()).is_none());

    let mut ids = Vec::new();
    reader
        .process([(
            "(.*/person)",
            Callback::node(|node, caps| {
                assert_eq!(&caps[1], "/root/person");
                ids.push(node.id());
                Ok(())
            }),
        )])
        .unwrap();

    let doc = reader.take_document().unwrap();
    let names: Vec<String> = ids
        .iter()
        .map(|&id| doc.get(id).child("firstname").map(|n| n.text()).unwrap_or_default())
        .collect();
    assert_eq!(names, vec!["John", "John32"]);
    for id in ids {
        assert!(doc.parent(id).is_none());
    }
}

#[test]
fn test_overlapping_patterns_get_independent_copies() {
    let mut reader = open("simple_test.xml");
    let ids = RefCell::new(Vec::new());
    reader
        .process([
            (
                "/root/person3",
                Callback::node(|node, _| {
                    ids.borrow_mut().push(node.id());
                    Ok(())
                }),
            ),
            (
                r"(.*/person3(\[\d*\])?)",
                Callback::node(|node, _| {
                    ids.borrow_mut().push(node.id());
                    Ok(())
                }),
            ),
        ])
        .unwrap();

    let ids = ids.into_inner();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);

    let doc = reader.document().unwrap();
    let first = doc.get(ids[0]);
    let second = doc.get(ids[1]);
    assert_eq!(first.to_xml(), second.to_xml());
    assert_eq!(first.child("firstname").map(|n| n.text()).as_deref(), Some("John1"));
}

// --- Registration and errors ---

#[test]
fn test_unsupported_type_rejected_before_reading() {
    let mut reader = open("simple_test.xml");
    let result = reader.process([("(.*/person)", Callback::declared("int", |_, _| Ok(())))]);

    let Err(err) = result else {
        panic!("int is not a value type");
    };
    assert!(matches!(err, Error::Registration(_)));
    assert!(err.to_string().contains("cannot pass value to callback as type int"));
    assert_eq!(reader.state(), DriverState::Idle);
    assert_eq!(reader.cursor().node_type(), XmlNodeType::None);
}

#[test]
fn test_invalid_regex_rejected() {
    let mut reader = open("simple_test.xml");
    let result = reader.process([("(.*/person", Callback::text(|_, _| Ok(())))]);
    let Err(Error::Pattern { pattern, .. }) = result else {
        panic!("unbalanced group should not compile");
    };
    assert_eq!(pattern, "(.*/person");
}

#[test]
fn test_callback_error_surfaces_with_pattern() {
    let mut reader = open("simple_test.xml");
    let mut calls = 0;
    let result = reader.process([(
        ".*/firstname",
        Callback::text(|text, _| {
            calls += 1;
            if text == "John3" {
                return Err(format!("rejected {text}").into());
            }
            Ok(())
        }),
    )]);

    let Err(Error::Callback { pattern, source }) = result else {
        panic!("callback error should abort processing");
    };
    assert_eq!(pattern, ".*/firstname");
    assert_eq!(source.to_string(), "rejected John3");
    assert_eq!(calls, 2);
}

#[test]
fn test_malformed_input_is_a_parse_error() {
    let xml = b"<root><person><firstname>John</firstname></root>";
    let mut reader = RegReader::from_bytes(xml);
    let mut names = Vec::new();
    let result = reader.process([(
        ".*/firstname",
        Callback::text(|text, _| {
            names.push(text);
            Ok(())
        }),
    )]);

    assert!(matches!(result, Err(Error::Parse(_))));
    assert_eq!(names, vec!["John"]);
}

#[test]
fn test_open_missing_file() {
    let result = RegReader::open(fixture("no_such_file.xml"));
    assert!(matches!(result, Err(Error::Io(_))));
}

// --- Stopping ---

#[test]
fn test_stop_after_first_match() {
    let mut reader = open("simple_test.xml");
    let stop = reader.stop_handle();
    let mut first_names = Vec::new();
    let stats = reader
        .process([(
            "(.*/firstname)",
            Callback::text(|text, _| {
                first_names.push(text);
                stop.request_stop();
                Ok(())
            }),
        )])
        .unwrap();

    assert_eq!(first_names, vec!["John"]);
    assert!(stats.stopped_early);
    assert_eq!(stats.matches, 1);
    assert_eq!(reader.state(), DriverState::Stopped);
}

#[test]
fn test_stop_lets_other_patterns_on_same_element_fire() {
    let mut reader = open("simple_test.xml");
    let stop = reader.stop_handle();
    let seen = RefCell::new(Vec::new());
    reader
        .process([
            (
                r"(.*/person3(\[\d*\])?)",
                Callback::node(|_, caps| {
                    seen.borrow_mut().push(format!("stop at {}", &caps[1]));
                    stop.request_stop();
                    Ok(())
                }),
            ),
            (
                "/root/person[^/]*",
                Callback::text(|_, caps| {
                    seen.borrow_mut().push(caps.path().to_string());
                    Ok(())
                }),
            ),
        ])
        .unwrap();

    assert_eq!(
        seen.into_inner(),
        vec!["/root/person", "/root/person2", "stop at /root/person3", "/root/person3"]
    );
}

#[test]
fn test_process_again_after_stop_resumes_stream() {
    let mut reader = open("simple_test.xml");
    let stop = reader.stop_handle();
    let mut first = Vec::new();
    reader
        .process([(
            ".*/firstname",
            Callback::text(|text, _| {
                first.push(text);
                stop.request_stop();
                Ok(())
            }),
        )])
        .unwrap();

    // The second call picks up where the first stopped, with a fresh path
    // rooted at the elements still to come.
    let mut rest = Vec::new();
    let stats = reader
        .process([(
            ".*/firstname",
            Callback::text(|text, _| {
                rest.push(text);
                Ok(())
            }),
        )])
        .unwrap();

    assert_eq!(first, vec!["John"]);
    assert_eq!(rest, vec!["John3", "John1", "John32"]);
    assert!(!stats.stopped_early);
}

// --- Sources ---

#[test]
fn test_open_temp_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "<catalog><book><title>Dune</title></book><book><title>Emma</title></book></catalog>"
    )
    .unwrap();
    file.flush().unwrap();

    let mut reader = RegReader::open(file.path()).unwrap();
    let found = text_matches(&mut reader, r"(/catalog/book(\[\d+\])?)/title");
    assert_eq!(
        found,
        pairs(&[("/catalog/book", "Dune"), ("/catalog/book[1]", "Emma")])
    );
}

#[test]
fn test_with_options_from_custom_cursor() {
    let xml = "<a><b/><b/><b/></a>";
    let cursor = XmlReader::new(xml.as_bytes());
    let mut reader = RegReader::with_options(cursor, ReaderOptions::default().array_notation(false));
    let mut paths = Vec::new();
    let stats = reader
        .process([(
            "/a/b",
            Callback::node(|_, caps| {
                paths.push(caps.path().to_string());
                Ok(())
            }),
        )])
        .unwrap();

    assert_eq!(paths, vec!["/a/b", "/a/b", "/a/b"]);
    assert_eq!(stats.elements, 4);
    assert_eq!(stats.matches, 3);
}

#[test]
fn test_crlf_source_reads_like_lf_source() {
    let mut lf = open("simple_test.xml");
    let mut crlf = open("simple_crlf.xml");
    let pattern = r"(.*/person(?:\[\d*\])?)";

    let expected = text_matches(&mut lf, pattern);
    let found = text_matches(&mut crlf, pattern);
    assert_eq!(found, expected);
    assert!(found.iter().all(|(_, text)| !text.contains('\r') && !text.contains("&#13;")));
}

#[test]
fn test_internal_subset_entities_expand() {
    let xml = br#"<!DOCTYPE root [<!ENTITY e "Jo"><!ENTITY doe "Doe">]>
<root>
    <person><firstname>&e;hn</firstname><lastname>&doe;</lastname></person>
</root>"#;
    let mut reader = RegReader::from_bytes(xml);
    let found = RefCell::new(Vec::new());
    reader
        .process([
            (
                "/root/person/firstname",
                Callback::text(|text, _| {
                    found.borrow_mut().push(text);
                    Ok(())
                }),
            ),
            (
                "/root/person/lastname",
                Callback::node(|node, _| {
                    found.borrow_mut().push(node.to_xml());
                    Ok(())
                }),
            ),
        ])
        .unwrap();
    let found = found.into_inner();

    assert_eq!(found, vec!["John", "<lastname>Doe</lastname>"]);
}

#[test]
fn test_unbound_prefix_tolerated_with_local_names() {
    let xml = b"<root><a:person><firstname>John</firstname></a:person></root>";

    let mut strict = RegReader::from_bytes(xml);
    let result = strict.process([("/root/a:person", Callback::text(|_, _| Ok(())))]);
    assert!(matches!(result, Err(Error::Parse(_))));

    let mut reader = RegReader::from_bytes(xml);
    reader.set_use_namespaces(false);
    let found = text_matches(&mut reader, "(/root/person)");
    assert_eq!(found, pairs(&[("/root/person", "<firstname>John</firstname>")]));
}
