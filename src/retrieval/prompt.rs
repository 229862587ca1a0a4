//! Prompt template for grounded answers

use crate::store::ScoredRecord;

/// Exact reply the model must give when the context does not cover the question
pub const NO_DATA: &str = "No data";

/// Concatenate retrieved records into a numbered context block.
pub fn build_context(hits: &[ScoredRecord]) -> String {
    let mut context = String::new();

    for hit in hits {
        let record = &hit.record;
        let mut source_ref = format!("{} ({})", record.source, record.year);
        if let Some(page) = record.page {
            source_ref.push_str(&format!(", page {}", page));
        }

        context.push_str(&format!(
            "[{}] {}\n{}\n\n---\n\n",
            hit.rank, source_ref, record.content
        ));
    }

    context
}

/// Fill the fixed instruction template with `context` and `question`.
pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        r#"Use only the context below to answer the question.
If the context does not contain the information needed, answer exactly "{no_data}" and nothing else.

CONTEXT:
{context}

QUESTION:
{question}

TECHNICAL ANSWER:"#,
        no_data = NO_DATA,
        context = context,
        question = question
    )
}
