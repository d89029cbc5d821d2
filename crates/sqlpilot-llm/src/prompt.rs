use sqlpilot_common::MemoryTurn;
use sqlpilot_retrieval::Example;

/// Fixed policy block placed at the top of every generation prompt. The
/// rules target the execution-accuracy failure modes the review pass and
/// the deterministic rewrites also watch for.
pub const SYSTEM_POLICY: &str = "\
You are an expert text-to-SQL assistant. Convert the question into a single SQLite-compatible SQL statement. Follow every rule:
1. Output exactly one executable SQL statement - no explanation, no prefix or suffix, no markdown.
2. Select the fields the question asks for: when it wants names or titles, return those columns, never surrogate identifiers such as course_id, unless identifiers are explicitly requested.
3. Order the selected fields exactly as the question mentions them (for \"name and salary\" write SELECT name, salary).
4. Prefer INNER JOIN. Use LEFT JOIN only when the question explicitly asks to include items without matches or with zero counts.
5. For superlatives (highest, most, least, lowest) prefer ORDER BY ... DESC/ASC LIMIT 1 over MAX/MIN subqueries, so ties behave consistently.
6. Do not use DISTINCT unless the question explicitly asks for distinct, different, unique, or deduplicated values.
7. Use COUNT(DISTINCT ...) when counting distinct entities; use COUNT(*) when the question counts rows or records.
8. Do not add GROUP BY or ORDER BY clauses the question does not need.
9. Check the schema's foreign-key relationships so every join condition is correct.
10. Handle NULL values deliberately inside aggregates such as AVG and SUM.
11. The final output must start with SELECT.";

/// Instruction used to rewrite an elliptical follow-up question into a
/// self-contained one before retrieval.
pub const REWRITE_INSTRUCTION: &str = "\
You rewrite conversational follow-up questions. Using the conversation history, rewrite the latest question as one complete, standalone natural-language query a text-to-SQL system can answer without the history. Output only the rewritten question, nothing else.";

/// Assemble the full generation prompt.
///
/// Pure formatting: fixed section order (policy, schema, examples, memory,
/// question), byte-for-byte stable for identical inputs so evaluation logs
/// are reproducible.
pub fn build_prompt(
    schema_text: &str,
    examples: &[Example],
    question: &str,
    memory: &[MemoryTurn],
) -> String {
    let mut parts: Vec<String> = vec![
        SYSTEM_POLICY.to_string(),
        String::new(),
        "Database schema:".to_string(),
        schema_text.to_string(),
        String::new(),
    ];

    if !examples.is_empty() {
        parts.push("Examples:".to_string());
        for example in examples {
            parts.push(format!("Q: {}", example.question));
            parts.push(format!("SQL: {}", example.sql));
            parts.push(String::new());
        }
    }

    if !memory.is_empty() {
        parts.push("Recent conversation (for reference only):".to_string());
        for turn in memory {
            parts.push(format!("Q: {}", turn.question));
            parts.push(format!("SQL: {}", turn.sql));
            parts.push(String::new());
        }
    }

    parts.push("Convert the following question to SQL. Output only the SQL:".to_string());
    parts.push(format!("Question: {question}"));
    parts.push("SQL:".to_string());
    parts.join("\n")
}

/// Assemble the follow-up rewrite prompt from the conversation history.
pub fn build_rewrite_prompt(question: &str, memory: &[MemoryTurn]) -> String {
    let mut history = String::new();
    for turn in memory {
        history.push_str(&format!("Q: {}\nA: (answered with SQL)\n", turn.question));
    }
    format!(
        "{REWRITE_INSTRUCTION}\n\nConversation history:\n{history}\nLatest question: {question}\n\nRewritten question:"
    )
}
