//! The streaming rewriter and the full-load updater must agree: for any
//! input index and operation, the documents they produce hold the same
//! entries and records, timestamps aside.

pub mod common;

use common::{chart_tgz, index_text, seed_chart, BASE_URL};
use serde_yaml::{Mapping, Value};
use std::sync::Arc;
use wharf_index::archive::ChartArchive;
use wharf_index::full_index::IndexYaml;
use wharf_index::mapping::IndexMapping;
use wharf_index::repo::{ChartRepo, DeleteTarget};
use wharf_storage::memory::MemoryStorageProvider;

/// Entries reduced to comparable shape: chart -> [(version, digest, urls)],
/// with the volatile `created` field dropped.
fn semantics(doc: &str) -> Vec<(String, Vec<Mapping>)> {
    let mut index = IndexMapping::from_str(doc).unwrap();
    let names: Vec<String> = index
        .entries()
        .keys()
        .map(|k| k.as_str().unwrap().to_owned())
        .collect();
    let mut out: Vec<(String, Vec<Mapping>)> = names
        .into_iter()
        .map(|name| {
            let records = index
                .entries_by_chart(&name)
                .into_iter()
                .map(|mut record| {
                    record.remove(&Value::from("created"));
                    record
                })
                .collect();
            (name, records)
        })
        .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

async fn streaming_outcome(ops: &[Op]) -> String {
    let storage = Arc::new(MemoryStorageProvider::new());
    let repo = ChartRepo::new(storage.clone(), BASE_URL.to_owned());
    for op in ops {
        match op {
            Op::Add(name, version) => {
                let key = seed_chart(&storage, name, version).await;
                repo.add(&[key]).await.unwrap();
            }
            Op::DeleteChart(name) => {
                repo.delete(&[DeleteTarget::Chart((*name).to_owned())])
                    .await
                    .unwrap();
            }
            Op::DeleteVersion(name, version) => {
                repo.delete(&[DeleteTarget::Version {
                    name: (*name).to_owned(),
                    version: (*version).to_owned(),
                }])
                .await
                .unwrap();
            }
        }
    }
    index_text(&storage).await
}

async fn full_load_outcome(ops: &[Op]) -> String {
    let storage = Arc::new(MemoryStorageProvider::new());
    let index = IndexYaml::new(storage.clone(), BASE_URL.to_owned());
    for op in ops {
        match op {
            Op::Add(name, version) => {
                let archive = ChartArchive::new(chart_tgz(name, version)).unwrap();
                index.update(&archive).await.unwrap();
            }
            Op::DeleteChart(name) => index.delete_by_name(name).await.unwrap(),
            Op::DeleteVersion(name, version) => index
                .delete_by_name_and_version(name, version)
                .await
                .unwrap(),
        }
    }
    index_text(&storage).await
}

enum Op {
    Add(&'static str, &'static str),
    DeleteChart(&'static str),
    DeleteVersion(&'static str, &'static str),
}

async fn assert_equivalent(ops: &[Op]) {
    let streamed = streaming_outcome(ops).await;
    let loaded = full_load_outcome(ops).await;
    assert_eq!(semantics(&streamed), semantics(&loaded));
}

#[tokio::test]
async fn single_add_agrees() {
    assert_equivalent(&[Op::Add("ark", "1.0.1")]).await;
}

#[tokio::test]
async fn multi_chart_history_agrees() {
    assert_equivalent(&[
        Op::Add("ark", "1.0.1"),
        Op::Add("tomcat", "0.4.1"),
        Op::Add("ark", "1.2.0"),
    ])
    .await;
}

#[tokio::test]
async fn delete_of_version_agrees() {
    assert_equivalent(&[
        Op::Add("ark", "1.0.1"),
        Op::Add("ark", "1.2.0"),
        Op::Add("tomcat", "0.4.1"),
        Op::DeleteVersion("ark", "1.0.1"),
    ])
    .await;
}

#[tokio::test]
async fn delete_of_chart_agrees() {
    assert_equivalent(&[
        Op::Add("ark", "1.0.1"),
        Op::Add("ark", "1.2.0"),
        Op::Add("tomcat", "0.4.1"),
        Op::DeleteChart("ark"),
    ])
    .await;
}
