mod support;

use std::path::PathBuf;
use std::sync::Arc;

use patent_enrich::clients::NoSecondarySource;
use patent_enrich::{App, ItemStatus};
use support::{config, gate, MockLlm, Mode};

struct TempDir(PathBuf);

impl TempDir {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("patent_enrich_{}_{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

const INPUT: &str = r#"{
  "invention": {
    "invention_name": "Protein folding predictor",
    "problem_statement": "Structure prediction is slow",
    "solution_approach": "Transformer attention",
    "key_technical_features": ["attention", "folding"]
  },
  "patents": [
    {"patent_number": "US1000B2", "url": "", "title": "First"},
    {"patent_number": "US1001B2", "url": "https://patents.example.com/patent/US1001B2/en"},
    {"patent_number": "us1000b2", "url": ""},
    {"patent_number": "US1002B2", "url": ""},
    {"patent_number": "US1003B2", "url": ""},
    {"patent_number": "US1004B2", "url": ""}
  ]
}"#;

#[tokio::test]
async fn full_pipeline_writes_report() {
    let dir = TempDir::new("full");
    let input_path = dir.0.join("input.json");
    std::fs::write(&input_path, INPUT).unwrap();

    let mut config = config(true, 2);
    config.detailed_analysis_enabled = true;
    config.summarization_enabled = true;
    config.max_abstract_sentences = 1;
    config.max_patents_to_fetch = 4;
    config.details.max_items = 4;
    config.analysis.max_items = 3;
    config.input_file = input_path.display().to_string();
    config.output_file = dir.0.join("out").join("results.json").display().to_string();

    let llm = MockLlm::new(Mode::Echo);
    let app = App::with_components(config.clone(), gate(llm.clone()), Arc::new(NoSecondarySource))
        .unwrap();

    let report = app.run().await.unwrap();

    // 去重后前 4 条，空 URL 被补全
    let references: Vec<&str> = report
        .references
        .iter()
        .map(|r| r.patent_number.as_str())
        .collect();
    assert_eq!(references, vec!["US1000B2", "US1001B2", "US1002B2", "US1003B2"]);
    assert_eq!(
        report.references[0].url,
        "https://patents.google.com/patent/US1000B2/en"
    );

    assert_eq!(report.results.len(), 4);
    assert!(report.results.iter().all(|r| r.status == ItemStatus::Complete));
    assert_eq!(report.metadata.analyzed, 3);
    assert!(report.results[3].analysis.is_none());
    assert!(report.results[3].details.is_some());

    // 摘要已压缩到 1 句
    let details = report.results[0].details.as_ref().unwrap();
    assert_eq!(details.abstract_text, "Abstract of US1000B2.");

    let stage_names: Vec<&str> = report.stages.iter().map(|s| s.stage.as_str()).collect();
    assert_eq!(stage_names, vec!["details", "summarize", "analysis"]);
    // details: 2 批；analysis: 3 条分 2 批
    assert_eq!(report.stages[0].external_calls, 2);
    assert_eq!(report.stages[1].external_calls, 0);
    assert_eq!(report.stages[2].external_calls, 2);
    assert_eq!(llm.calls(), 4);

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&config.output_file).unwrap()).unwrap();
    assert_eq!(written["metadata"]["references_found"], 4);
    assert_eq!(written["results"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn references_past_the_details_cap_are_carried_through() {
    let dir = TempDir::new("capped");
    let input_path = dir.0.join("input.json");
    std::fs::write(&input_path, INPUT).unwrap();

    let mut config = config(true, 2);
    config.detailed_analysis_enabled = true;
    config.max_patents_to_fetch = 4;
    config.details.max_items = 2;
    config.analysis.max_items = 1;
    config.input_file = input_path.display().to_string();
    config.output_file = dir.0.join("results.json").display().to_string();

    let llm = MockLlm::new(Mode::Echo);
    let app = App::with_components(config, gate(llm.clone()), Arc::new(NoSecondarySource)).unwrap();

    let report = app.run().await.unwrap();

    // 每条引用都有一个输出，顺序不变
    let numbers: Vec<&str> = report
        .results
        .iter()
        .map(|r| r.item.patent_number.as_str())
        .collect();
    assert_eq!(numbers, vec!["US1000B2", "US1001B2", "US1002B2", "US1003B2"]);
    let statuses: Vec<ItemStatus> = report.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            ItemStatus::Complete,
            ItemStatus::Complete,
            ItemStatus::NotAttempted,
            ItemStatus::NotAttempted,
        ]
    );
    assert!(report.results[1].analysis.is_none());
    assert!(report.results[1].details.is_some());

    let details = &report.stages[0];
    assert_eq!(details.stage, "details");
    assert_eq!((details.items, details.complete, details.external_calls), (2, 2, 1));

    let analysis = &report.stages[1];
    assert_eq!(analysis.stage, "analysis");
    assert_eq!((analysis.items, analysis.complete, analysis.external_calls), (1, 1, 1));
    assert_eq!(report.metadata.analyzed, 1);
    assert_eq!(llm.calls(), 2);
}

#[tokio::test]
async fn lightweight_mode_lists_references_without_calls() {
    let dir = TempDir::new("light");
    let input_path = dir.0.join("input.json");
    std::fs::write(&input_path, INPUT).unwrap();

    let mut config = config(false, 1);
    config.max_patents_to_fetch = 10;
    config.input_file = input_path.display().to_string();
    config.output_file = dir.0.join("results.json").display().to_string();

    let llm = MockLlm::new(Mode::Echo);
    let app = App::with_components(config, gate(llm.clone()), Arc::new(NoSecondarySource)).unwrap();

    let report = app.run().await.unwrap();

    assert_eq!(report.references.len(), 5);
    assert!(report.results.is_empty());
    assert!(report.stages.is_empty());
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn invalid_config_is_fatal() {
    let mut config = config(true, 0);
    config.detailed_analysis_enabled = true;

    let llm = MockLlm::new(Mode::Echo);
    let result = App::with_components(config, gate(llm.clone()), Arc::new(NoSecondarySource));

    assert!(result.is_err());
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn missing_input_file_is_an_error() {
    let mut config = config(false, 1);
    config.input_file = "/nonexistent/patent_enrich/input.json".to_string();

    let llm = MockLlm::new(Mode::Echo);
    let app = App::with_components(config, gate(llm), Arc::new(NoSecondarySource)).unwrap();

    assert!(app.run().await.is_err());
}
