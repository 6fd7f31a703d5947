//! Token-budget estimation and history assembly for the chat handler.
//!
//! Token counts are never exact (no tokenizer is shared with the model). The budget
//! is a worst-case-over-estimate built from character length alone, so the handler
//! can cheaply decide what fits without ever sending more than the model can accept.

/// One message as assembled into the prompt passed to the LLM.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetedMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, Copy)]
pub struct TokenBudget {
    pub max_prompt_tokens: usize,
    pub max_message_tokens: usize,
    pub max_history_messages: usize,
    pub reserved_response_tokens: usize,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            max_prompt_tokens: 6000,
            max_message_tokens: 4000,
            max_history_messages: 10,
            reserved_response_tokens: 1500,
        }
    }
}

/// `ceil(len(text) / 4) + 1`, a fixed character-to-token ratio.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4) + 1
}

/// Truncate `text` (by character count) so its estimated token count is at most
/// `max_tokens`, preferring to cut whole characters off the end.
fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    if estimate_tokens(text) <= max_tokens {
        return text.to_string();
    }
    // Inverse of estimate_tokens: max_chars such that ceil(max_chars/4)+1 <= max_tokens.
    let max_chars = max_tokens.saturating_sub(1).saturating_mul(4);
    text.chars().take(max_chars).collect()
}

/// A single history entry, newest-to-oldest order assumed by the caller.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub role: &'static str,
    pub content: String,
}

/// Assemble the message list sent to the LLM under the token budget: the current
/// message always fits (truncating its file-content portion first if oversized),
/// then history is walked newest-to-oldest, including whatever fits in the
/// remaining budget, up to `max_history_messages` entries.
///
/// `system_prompt_tokens` is counted against the budget but is not itself part of
/// the returned message list.
pub fn assemble_budgeted_messages(
    budget: &TokenBudget,
    system_prompt_tokens: usize,
    current_user_text: &str,
    current_file_text: Option<&str>,
    history_newest_first: &[HistoryEntry],
) -> Vec<BudgetedMessage> {
    let available_for_response = budget
        .max_prompt_tokens
        .saturating_sub(budget.reserved_response_tokens);
    let mut remaining = available_for_response.saturating_sub(system_prompt_tokens);

    let current_content = match current_file_text {
        Some(file_text) => format!("{current_user_text}{file_text}"),
        None => current_user_text.to_string(),
    };
    let current_content = if estimate_tokens(&current_content) > budget.max_message_tokens {
        let user_tokens = estimate_tokens(current_user_text);
        let budget_left_for_file = budget.max_message_tokens.saturating_sub(user_tokens);
        match current_file_text {
            Some(file_text) => format!(
                "{current_user_text}{}",
                truncate_to_tokens(file_text, budget_left_for_file)
            ),
            None => truncate_to_tokens(current_user_text, budget.max_message_tokens),
        }
    } else {
        current_content
    };

    let current_tokens = estimate_tokens(&current_content);
    remaining = remaining.saturating_sub(current_tokens);

    let mut history_messages = Vec::new();
    for entry in history_newest_first.iter().take(budget.max_history_messages) {
        let half_cap = budget.max_message_tokens / 2;
        let content = if estimate_tokens(&entry.content) > half_cap {
            truncate_to_tokens(&entry.content, half_cap)
        } else {
            entry.content.clone()
        };

        let tokens = estimate_tokens(&content);
        if tokens > remaining {
            continue;
        }
        remaining -= tokens;
        history_messages.push(BudgetedMessage {
            role: entry.role,
            content,
        });
    }

    // history was walked newest-to-oldest; present it oldest-to-newest in the prompt.
    history_messages.reverse();
    history_messages.push(BudgetedMessage {
        role: "user",
        content: current_content,
    });
    history_messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_tokens_matches_formula() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("abcd"), 2);
        assert_eq!(estimate_tokens("abcde"), 3);
    }

    #[test]
    fn assemble_always_includes_current_message() {
        let budget = TokenBudget::default();
        let messages = assemble_budgeted_messages(&budget, 10, "hello", None, &[]);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hello");
    }

    #[test]
    fn assemble_caps_history_at_ten_messages() {
        let budget = TokenBudget::default();
        let history: Vec<HistoryEntry> = (0..20)
            .map(|i| HistoryEntry {
                role: "user",
                content: format!("message {i}"),
            })
            .collect();
        let messages = assemble_budgeted_messages(&budget, 10, "current", None, &history);
        // 10 history entries plus the current message.
        assert_eq!(messages.len(), 11);
    }

    #[test]
    fn assemble_drops_oldest_history_first_when_budget_is_tight() {
        let budget = TokenBudget {
            max_prompt_tokens: 40,
            max_message_tokens: 4000,
            max_history_messages: 10,
            reserved_response_tokens: 0,
        };
        let history = vec![
            HistoryEntry {
                role: "user",
                content: "a".repeat(80),
            },
            HistoryEntry {
                role: "assistant",
                content: "recent reply".to_string(),
            },
        ];
        let messages = assemble_budgeted_messages(&budget, 0, "current", None, &history);
        // the oversized oldest entry should not fit; the recent one should.
        assert!(messages.iter().any(|m| m.content == "recent reply"));
        assert!(!messages.iter().any(|m| m.content.len() == 80));
    }

    #[test]
    fn assemble_truncates_file_content_before_user_text() {
        let budget = TokenBudget {
            max_prompt_tokens: 6000,
            max_message_tokens: 20,
            max_history_messages: 10,
            reserved_response_tokens: 0,
        };
        let file_text = "z".repeat(200);
        let messages = assemble_budgeted_messages(&budget, 0, "short", Some(&file_text), &[]);
        let current = &messages.last().unwrap().content;
        assert!(current.starts_with("short"));
        assert!(current.len() < 200 + 5);
    }
}
