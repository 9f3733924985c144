//! Fixed instruction template sent with every log batch.
//!
//! The model is walked through a chain of "expert" turns (classify, rate,
//! find the root cause, propose a fix) before writing the final report in a
//! fixed markdown layout.
use super::models::ChatMessage;

const SYSTEM: &str = "The last assistant turn combines the opinions above into the final \
analysis. Always include both a natural-language explanation and the key results as JSON.";

const CLASSIFIER: &str = r#"You are an expert at identifying browser console log types.
For every log supplied by the user, describe:
1. isNew: whether this is a new kind of log (rare compared to the past; see `_isNew`)
2. Technical nature: network failure / JavaScript error / missing resource / ...
3. A summary of where it happened, based on the URL
4. An analysis of the source code in `snippet`, when present
Write the result as a JSON array:
[
  {
    "newType": true,
    "type": "network failure",
    "url": "https://example.com/page",
    "code": ">>  9175 | xhr.send( options.hasContent && options.data || null );"
  },
  ...
]"#;

const SEVERITY: &str = r#"You are an expert at rating the practical importance of logs.
For the logs supplied by the user, write:
1. The impact on site functionality or user experience
2. A severity score out of 5, to one decimal place, based on risk, user-experience impact
   and frequency. Add 0.6 points when a code snippet is present and 1 point when the log is new.
Explain each rating in technical detail from a front-end UI/UX point of view."#;

const ROOT_CAUSE: &str = r#"You are an expert at analysing the technical cause of logs.
Using the severity scores above, analyse only the single highest-rated log:
1. Background (e.g. CDN failure, JS exception, security policy)
2. If a code snippet is present, the root cause found in it (e.g. missing resource, CORS
   configuration, 404 response)
3. Likelihood of recurrence and impact on the system
Back the cause with evidence from the snippet wherever possible."#;

const REMEDIATION: &str = r#"You are a working web developer proposing fixes from error messages and snippets.
For the single most severe log chosen above, propose:
1. Immediate actions (e.g. check resource paths, invalidate CDN caches)
2. Front-end / back-end code changes that prevent it
3. A concrete example fix as real code (CSS, JS fallback, ...); if a snippet is present,
   edit that code directly
Be clear and specific enough for a practitioner to act on immediately."#;

const REPORT: &str = r#"You combine the expert opinions above into the **final analysis report**.
Use exactly the layout below, including the bold text. The key log summary may list up to
three logs; everything from the cause analysis on covers only the most severe one.
Prefix each location with a severity marker:
  - 4.5 or higher: 🔥
  - 4.0 or higher: ⚠️
  - 3.5 or higher: ℹ️

## 📌 Key log summary (top 3 by severity)

1. (most severe) Location URL:
Type and message:
Severity (number, stars, reason):
2. (second) Location URL:
Type and message:
Severity (number, stars, reason):
3. (third) Location URL:
Type and message:
Severity (number, stars, reason):

## 📌 Cause analysis (top 1)

- Background
- Source file and error line (only if available)
- Root cause
- Error message
- Likelihood of recurrence and system impact

## 📌 Remediation (top 1)

- Immediate actions
- Preventive improvements
- Fix code (edit the snippet directly when one is present)

## 📌 Business and user-experience impact (top 1 only)"#;

/// Builds the full message list for one batch.
///
/// `log_content` is the annotated batch, already serialized as JSON.
pub fn build_messages(log_content: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::new("system", SYSTEM),
        ChatMessage::new("assistant", CLASSIFIER),
        ChatMessage::new("assistant", SEVERITY),
        ChatMessage::new("assistant", ROOT_CAUSE),
        ChatMessage::new("assistant", REMEDIATION),
        ChatMessage::new("assistant", REPORT),
        ChatMessage::new(
            "user",
            format!(
                "Analyse the following JSON logs with a natural-language explanation.\n\
                 Log data: {}",
                log_content
            ),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_goes_into_the_final_user_turn() {
        let messages = build_messages("[\n  {\"message\": \"boom\"}\n]");

        assert_eq!(messages.len(), 7);
        assert_eq!(messages[0].role, "system");
        assert!(messages[1..6].iter().all(|m| m.role == "assistant"));
        let last = messages.last().unwrap();
        assert_eq!(last.role, "user");
        assert!(last.content.ends_with("Log data: [\n  {\"message\": \"boom\"}\n]"));
    }
}
