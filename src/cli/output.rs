//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};

use crate::cli::args::{DisplayFormat, PokembedArgs};
use crate::error::Result;
use crate::pipeline::{BatchFailure, FailedItem};
use crate::similarity::Neighbor;
use crate::verify::VerificationReport;

/// Result structure for an embedding run.
#[derive(Debug, Serialize, Deserialize)]
pub struct EmbedSummary {
    pub model: String,
    pub dimension: usize,
    pub total_items: usize,
    pub embedded: usize,
    pub failed: usize,
    pub batches: usize,
    pub failed_batches: Vec<BatchFailure>,
    pub failures: Vec<FailedItem>,
    pub output_files: Vec<String>,
    pub output_bytes: u64,
    pub duration_ms: u64,
}

/// Result structure for verification.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub passed: bool,
    #[serde(flatten)]
    pub report: VerificationReport,
}

/// Result structure for similarity lookup.
#[derive(Debug, Serialize, Deserialize)]
pub struct SimilarityResults {
    pub query: i64,
    pub neighbors: Vec<Neighbor>,
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &PokembedArgs) -> Result<()> {
    match args.display_format {
        DisplayFormat::Human => output_human(message, result, args),
        DisplayFormat::Json => output_json(result, args),
    }
}

/// Output in human-readable format.
fn output_human<T: Serialize>(message: &str, result: &T, args: &PokembedArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
        println!();
    }

    let value = serde_json::to_value(result)?;

    match result {
        _ if std::any::type_name::<T>().contains("EmbedSummary") => output_embed_summary_human(&value),
        _ if std::any::type_name::<T>().contains("VerificationSummary") => {
            output_verification_human(&value)
        }
        _ if std::any::type_name::<T>().contains("SimilarityResults") => {
            output_similarity_human(&value)
        }
        _ => output_generic_human(&value),
    }
}

/// Output an embedding run summary in human format.
fn output_embed_summary_human(value: &serde_json::Value) -> Result<()> {
    let Some(obj) = value.as_object() else {
        return output_generic_human(value);
    };

    println!("Embedding Summary:");
    println!("══════════════════");
    for key in ["model", "dimension", "total_items", "embedded", "failed", "batches"] {
        if let Some(val) = obj.get(key) {
            println!("{}: {}", key.replace('_', " "), format_value(val));
        }
    }
    if let Some(bytes) = obj.get("output_bytes").and_then(|b| b.as_u64()) {
        println!("output size: {}", format_bytes(bytes));
    }
    if let Some(duration) = obj.get("duration_ms").and_then(|d| d.as_u64()) {
        println!("time: {duration}ms");
    }

    if let Some(files) = obj.get("output_files").and_then(|f| f.as_array()) {
        println!();
        println!("Written:");
        for file in files.iter().filter_map(|f| f.as_str()) {
            println!("  {file}");
        }
    }

    if let Some(batches) = obj.get("failed_batches").and_then(|b| b.as_array())
        && !batches.is_empty()
    {
        println!();
        println!("Failed batches:");
        println!("───────────────");
        for batch in batches {
            println!(
                "  batch {}: {}",
                batch.get("index").map(format_value).unwrap_or_default(),
                batch.get("reason").map(format_value).unwrap_or_default()
            );
        }
    }

    if let Some(failures) = obj.get("failures").and_then(|f| f.as_array())
        && !failures.is_empty()
    {
        println!();
        println!("Failed items:");
        println!("─────────────");
        for failure in failures {
            println!(
                "  #{}: {}",
                failure.get("id").map(format_value).unwrap_or_default(),
                failure.get("reason").map(format_value).unwrap_or_default()
            );
        }
    }
    Ok(())
}

/// Output a verification report in human format.
fn output_verification_human(value: &serde_json::Value) -> Result<()> {
    let Some(obj) = value.as_object() else {
        return output_generic_human(value);
    };

    println!("Embeddings Verification:");
    println!("════════════════════════");
    let count = |key: &str| obj.get(key).and_then(|v| v.as_u64()).unwrap_or(0);
    println!("ids: {}", count("id_count"));
    println!("embeddings: {} x {}", count("embedding_rows"), count("dimension"));

    if let Some(range) = obj.get("id_range").and_then(|r| r.as_array())
        && range.len() == 2
    {
        println!("id range: {} to {}", format_value(&range[0]), format_value(&range[1]));
    }

    if let Some(norms) = obj.get("norms").and_then(|n| n.as_object()) {
        let stat = |key: &str| norms.get(key).and_then(|v| v.as_f64()).unwrap_or(f64::NAN);
        println!();
        println!("Normalization:");
        println!("  min norm: {:.6}", stat("min"));
        println!("  max norm: {:.6}", stat("max"));
        let offending = norms
            .get("offending_rows")
            .and_then(|r| r.as_array())
            .map_or(0, Vec::len);
        println!("  rows outside tolerance: {offending}");
    }

    println!();
    for (key, label) in [
        ("missing_ids", "Missing ids"),
        ("unexpected_ids", "Unexpected ids"),
        ("duplicate_ids", "Duplicate ids"),
    ] {
        let listed = obj
            .get(key)
            .and_then(|v| v.as_array())
            .filter(|ids| !ids.is_empty())
            .map(|ids| ids.iter().map(format_value).collect::<Vec<_>>().join(", "))
            .unwrap_or_else(|| "None".to_string());
        println!("{label}: {listed}");
    }

    let passed = obj.get("passed").and_then(|p| p.as_bool()).unwrap_or(false);
    println!();
    println!("Result: {}", if passed { "PASSED" } else { "FAILED" });
    Ok(())
}

/// Output similarity results in human format.
fn output_similarity_human(value: &serde_json::Value) -> Result<()> {
    let Some(obj) = value.as_object() else {
        return output_generic_human(value);
    };

    if let Some(query) = obj.get("query") {
        println!("Most similar to #{}:", format_value(query));
        println!("─────────────────────");
    }
    if let Some(neighbors) = obj.get("neighbors").and_then(|n| n.as_array()) {
        for (rank, neighbor) in neighbors.iter().enumerate() {
            println!(
                "{:>3}. #{:<6} {:.4}",
                rank + 1,
                neighbor.get("id").map(format_value).unwrap_or_default(),
                neighbor.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0)
            );
        }
    }
    Ok(())
}

/// Output generic data in human format.
fn output_generic_human(value: &serde_json::Value) -> Result<()> {
    match value {
        serde_json::Value::Object(obj) => {
            for (key, val) in obj {
                let formatted_val = format_value(val);
                println!("{key}: {formatted_val}");
            }
        }
        _ => {
            let formatted_value = format_value(value);
            println!("{formatted_value}");
        }
    }
    Ok(())
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &PokembedArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    println!("{json}");
    Ok(())
}

/// Format a JSON value for display.
fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Array(arr) => {
            let formatted_values = arr.iter().map(format_value).collect::<Vec<_>>().join(", ");
            format!("[{formatted_values}]")
        }
        serde_json::Value::Object(_) => "[object]".to_string(),
        serde_json::Value::Null => "null".to_string(),
    }
}

/// Format bytes into human-readable format.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    let unit = UNITS[unit_index];
    if unit_index == 0 {
        format!("{bytes} {unit}")
    } else {
        format!("{size:.2} {unit}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&serde_json::json!("test")), "test");
        assert_eq!(format_value(&serde_json::json!(42)), "42");
        assert_eq!(format_value(&serde_json::json!([1, 2])), "[1, 2]");
        assert_eq!(format_value(&serde_json::Value::Null), "null");
    }

    #[test]
    fn test_verification_summary_flattens_report() {
        use crate::embedding::vector::EmbeddingMatrix;
        use crate::verify::Verifier;

        let matrix = EmbeddingMatrix::from_flat(1, vec![1.0, 1.0]).unwrap();
        let report = Verifier::new().verify(&[1, 2], &matrix);
        let summary = VerificationSummary {
            passed: report.passed(),
            report,
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["passed"], true);
        assert_eq!(value["id_count"], 2);
    }
}
