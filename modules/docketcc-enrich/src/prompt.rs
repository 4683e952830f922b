use docketcc_common::Filing;

use crate::extract::ExtractedDocument;

pub const SYSTEM_PROMPT: &str = "You are a telecommunications regulatory analyst. \
You read filings submitted to the Federal Communications Commission and explain them \
to professionals who track those proceedings. Be factual and concise. Only state what \
the filing supports; if the document text is missing or thin, say so and lower your \
confidence accordingly.";

/// Build the user prompt for one filing. Document text is included up to
/// `max_chars` in total, first chunk of each document first.
pub fn build_prompt(filing: &Filing, documents: &[ExtractedDocument], max_chars: usize) -> String {
    let mut prompt = format!(
        "Summarize this FCC filing.\n\n\
         Docket: {}\n\
         Title: {}\n\
         Filed by: {}\n\
         Filing type: {}\n\
         Received: {}\n",
        filing.docket_number,
        filing.title,
        filing.author,
        filing.filing_type,
        filing.date_received.format("%Y-%m-%d"),
    );

    if documents.is_empty() {
        prompt.push_str("\nNo document text was available. Work from the metadata above.\n");
        return prompt;
    }

    let mut budget = max_chars;
    for doc in documents {
        if budget == 0 {
            break;
        }
        prompt.push_str(&format!("\n--- Document: {} ---\n", doc.filename));
        for chunk in &doc.chunks {
            if budget == 0 {
                prompt.push_str("[truncated]\n");
                break;
            }
            let piece: String = chunk.chars().take(budget).collect();
            budget -= piece.chars().count();
            prompt.push_str(&piece);
            prompt.push('\n');
        }
    }

    prompt.push_str(
        "\nReturn a plain-language summary, the key points, the stakeholders affected, \
         the likely regulatory impact, and a confidence score between 0 and 1.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn filing() -> Filing {
        Filing {
            id: "1".into(),
            docket_number: "23-108".into(),
            title: "Comments on Broadband Labels".into(),
            author: "Consumer Coalition".into(),
            filing_type: "COMMENT".into(),
            date_received: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            filing_url: String::new(),
            documents: vec![],
            raw_data: json!({}),
        }
    }

    #[test]
    fn metadata_only_prompt() {
        let prompt = build_prompt(&filing(), &[], 1000);
        assert!(prompt.contains("Docket: 23-108"));
        assert!(prompt.contains("Filed by: Consumer Coalition"));
        assert!(prompt.contains("Received: 2024-03-01"));
        assert!(prompt.contains("No document text"));
    }

    #[test]
    fn document_text_respects_budget() {
        let docs = vec![
            ExtractedDocument {
                filename: "a.pdf".into(),
                url: String::new(),
                chunks: vec!["a".repeat(30), "b".repeat(30)],
            },
            ExtractedDocument {
                filename: "b.pdf".into(),
                url: String::new(),
                chunks: vec!["c".repeat(30)],
            },
        ];
        let prompt = build_prompt(&filing(), &docs, 45);
        assert!(prompt.contains(&"a".repeat(30)));
        assert!(prompt.contains(&"b".repeat(15)));
        assert!(!prompt.contains(&"b".repeat(16)));
        assert!(!prompt.contains("b.pdf"));
    }
}
