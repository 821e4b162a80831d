//! Terminal and JSON rendering of completed runs.

use clap::ValueEnum;
use sanity_core::{CheckEntry, CheckSpecSet, RecordSummary, RunCompletion};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct JsonResult {
    #[serde(flatten)]
    summary: RecordSummary,
    trace_token: Option<String>,
}

#[derive(Serialize)]
struct JsonRun {
    run_id: String,
    spec_digest: Option<String>,
    overall_satisfied: bool,
    duration_ms: u64,
    finished_at: String,
    results: Vec<JsonResult>,
}

/// One line per record, numbered from 1, with trace links.
pub fn render_text(completion: &RunCompletion) -> String {
    let mut out = String::new();
    let digest = completion
        .spec_digest
        .as_deref()
        .map(|d| &d[..d.len().min(12)])
        .unwrap_or("unparsed");
    out.push_str(&format!("Run {} (spec {})\n", completion.run_id, digest));

    for (i, result) in completion.results.iter().enumerate() {
        let status = if result.record.is_satisfied() { "✓" } else { "✗" };
        out.push_str(&format!(
            "  [{}] {} {}: {}",
            i + 1,
            status,
            result.record.check(),
            result.record.message()
        ));
        if let Some(token) = result.trace_token {
            out.push_str(&format!(" (trace: {token})"));
        }
        out.push('\n');
    }

    let failed = completion.failed_count();
    out.push_str(&format!(
        "\nOverall: {} ({}/{} checks failed, {}ms)\n",
        if completion.overall_satisfied { "✓ PASSED" } else { "✗ FAILED" },
        failed,
        completion.results.len(),
        completion.duration_ms
    ));
    out
}

pub fn render_json(completion: &RunCompletion) -> serde_json::Result<String> {
    let run = JsonRun {
        run_id: completion.run_id.to_string(),
        spec_digest: completion.spec_digest.clone(),
        overall_satisfied: completion.overall_satisfied,
        duration_ms: completion.duration_ms,
        finished_at: completion.finished_at.to_rfc3339(),
        results: completion
            .results
            .iter()
            .map(|r| JsonResult {
                summary: r.record.summary(),
                trace_token: r.trace_token.map(|t| t.to_string()),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&run)
}

/// Entry listing for `sanity validate`.
pub fn render_spec(spec: &CheckSpecSet) -> String {
    let mut out = String::new();
    for (i, entry) in spec.entries().iter().enumerate() {
        match entry {
            CheckEntry::Check(request) => {
                let params: Vec<String> = request
                    .parameters
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect();
                out.push_str(&format!(
                    "  [{}] ✓ {} {}\n",
                    i + 1,
                    request.check_type,
                    params.join(" ")
                ));
            }
            CheckEntry::Malformed { error, .. } => {
                out.push_str(&format!("  [{}] ✗ {}\n", i + 1, error));
            }
        }
    }
    out.push_str(&format!("\nDigest: {}\n", spec.digest()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sanity_core::fakes::ScriptedRunner;
    use sanity_core::{
        Document, Orchestrator, OrchestratorConfig, ProblemList, ResultRecord,
        TraceActionRegistry,
    };
    use std::sync::Arc;
    use tokio::runtime::Handle;

    async fn completion(records: Vec<ResultRecord>) -> Arc<RunCompletion> {
        let orch = Orchestrator::new(
            Arc::new(ScriptedRunner::new(records)),
            ProblemList::new(),
            Arc::new(TraceActionRegistry::new()),
            OrchestratorConfig::default(),
            Handle::current(),
        );
        orch.start(r#"{"checks": []}"#, Arc::new(Document::new("m")));
        orch.join().await;
        orch.last_completion().expect("no completion")
    }

    #[tokio::test]
    async fn test_text_lists_records_with_trace_links() {
        let completion = completion(vec![
            ResultRecord::satisfied("template-locations", "All locations reachable"),
            ResultRecord::violated("receivesyncs", "no receiver").with_trace(Arc::new(|| {})),
        ])
        .await;

        let text = render_text(&completion);
        assert!(text.contains("[1] ✓ template-locations: All locations reachable"));
        assert!(text.contains("[2] ✗ receivesyncs: no receiver (trace: trace-1)"));
        assert!(text.contains("✗ FAILED (1/2 checks failed"));
    }

    #[tokio::test]
    async fn test_json_output() {
        let completion = completion(vec![ResultRecord::satisfied("a", "ok")]).await;

        let json: serde_json::Value =
            serde_json::from_str(&render_json(&completion).unwrap()).unwrap();
        assert_eq!(json["overall_satisfied"], true);
        assert_eq!(json["results"][0]["check"], "a");
        assert!(json["results"][0]["trace_token"].is_null());
    }

    #[test]
    fn test_render_spec_marks_malformed_entries() {
        let spec =
            CheckSpecSet::parse(r#"{"checks": [{"type": "receivesyncs", "channel": "go"}, 3]}"#)
                .unwrap();
        let text = render_spec(&spec);
        assert!(text.contains("[1] ✓ receivesyncs channel=\"go\""));
        assert!(text.contains("[2] ✗"));
        assert!(text.contains("Digest: "));
    }
}
