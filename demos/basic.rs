//! Regex path dispatch over the bundled test documents.
//!
//! Shows tree and text callbacks side by side, array notation on and off,
//! namespace stripping, and stopping from inside a callback.
//!
//! Run with: `cargo run --example basic`
#![allow(clippy::expect_used)]

use std::path::{Path, PathBuf};

use xmlreg::{Callback, RegReader};

fn data(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

fn main() {
    let simple = data("simple_test.xml");
    let namespaced = data("namespace_test.xml");

    let mut reader = RegReader::open(&simple).expect("failed to open simple_test.xml");
    reader
        .process([
            (
                r"(.*/person(?:\[\d*\])?)",
                Callback::node(|node, caps| {
                    println!("1) Value for {} is\n{node}", &caps[1]);
                    Ok(())
                }),
            ),
            (
                r"(.*/person3(\[\d*\])?)",
                Callback::node(|node, caps| {
                    let names: Vec<_> = node.child_elements().filter_map(|c| c.local_name()).collect();
                    println!("2) Value for {} has children {names:?}", &caps[1]);
                    Ok(())
                }),
            ),
            (
                "/root/person2/firstname",
                Callback::text(|text, _| {
                    println!("3) Value for /root/person2/firstname is {text}");
                    Ok(())
                }),
            ),
        ])
        .expect("processing failed");

    println!("\n\nWithout array notation...");
    let mut reader = RegReader::open(&simple).expect("failed to open simple_test.xml");
    reader.set_array_notation(false);
    reader
        .process([
            (
                "(.*/person)",
                Callback::node(|node, caps| {
                    println!("4) Value for {} is\n{node}", &caps[1]);
                    Ok(())
                }),
            ),
            (
                "/root/person2/firstname",
                Callback::declared("string", |value, _| {
                    println!("6) Value for /root/person2/firstname is {value}");
                    Ok(())
                }),
            ),
        ])
        .expect("processing failed");

    println!("\n\nWith namespaces, but not in output...");
    let mut reader = RegReader::open(&namespaced).expect("failed to open namespace_test.xml");
    reader.set_array_notation(false);
    reader.set_output_namespaces(false);
    reader
        .process([(
            "(.*/d:person4)",
            Callback::node(|node, caps| {
                println!("4) Value for {} is\n{node}", &caps[1]);
                Ok(())
            }),
        )])
        .expect("processing failed");

    println!("\n\nWithout namespaces...");
    let mut reader = RegReader::open(&namespaced).expect("failed to open namespace_test.xml");
    reader.set_array_notation(false);
    reader.set_use_namespaces(false);
    reader
        .process([(
            "(.*/person)",
            Callback::node(|node, caps| {
                println!("4) Value for {} is\n{node}", &caps[1]);
                Ok(())
            }),
        )])
        .expect("processing failed");

    println!("\n\nRead XML and stop after first person3 element...");
    let mut reader = RegReader::open(&namespaced).expect("failed to open namespace_test.xml");
    let stop = reader.stop_handle();
    let stats = reader
        .process([
            (
                r"(.*/person(\[\d*\])?)",
                Callback::node(|node, caps| {
                    println!("1) Value for {} is\n{node}", &caps[1]);
                    Ok(())
                }),
            ),
            (
                r"(.*/person3(\[\d*\])?)",
                Callback::node(|node, caps| {
                    println!("2) Value for {} is\n{node}", &caps[1]);
                    stop.request_stop();
                    Ok(())
                }),
            ),
            (
                "/root/person2/firstname",
                Callback::text(|text, _| {
                    println!("3) Value for /root/person2/firstname is {text}");
                    Ok(())
                }),
            ),
        ])
        .expect("processing failed");

    println!(
        "\nStopped early: {} after {} element(s)",
        stats.stopped_early, stats.elements
    );
}
