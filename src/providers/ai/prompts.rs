//! Prompt construction shared by all providers.

use super::traits::{CompletionRequest, Message};

/// Instructions used when the user supplies none.
pub const DEFAULT_REPLY_INSTRUCTIONS: &str = "Write a professional, helpful reply";

const SUMMARY_SYSTEM_PROMPT: &str = "You are an AI assistant that creates concise email summaries.";
const REPLY_SYSTEM_PROMPT: &str = "You are an AI assistant that writes professional email replies.";
const TASK_SYSTEM_PROMPT: &str = "You are an AI assistant that creates actionable tasks from emails.";

/// Builds the request asking for a 2-3 sentence summary.
pub fn summary_request(email: &str) -> CompletionRequest {
    let prompt = format!(
        "Summarize this email in 2-3 sentences. Focus on:\n\
         - Main purpose/request\n\
         - Any action needed\n\
         - Important details\n\
         \n\
         Email content:\n{email}"
    );

    CompletionRequest::new(vec![Message::user(prompt)])
        .with_system_prompt(SUMMARY_SYSTEM_PROMPT)
        .with_temperature(0.3)
        .with_max_tokens(150)
}

/// Builds the request asking for a reply body.
pub fn reply_request(email: &str, instructions: &str) -> CompletionRequest {
    let instructions = match instructions.trim() {
        "" => DEFAULT_REPLY_INSTRUCTIONS,
        given => given,
    };
    let prompt = format!(
        "Write a professional email reply based on:\n\
         \n\
         Original email: {email}\n\
         \n\
         Instructions: {instructions}\n\
         \n\
         Write only the reply body (no subject line, no signature):"
    );

    CompletionRequest::new(vec![Message::user(prompt)])
        .with_system_prompt(REPLY_SYSTEM_PROMPT)
        .with_temperature(0.5)
        .with_max_tokens(300)
}

/// Builds the request asking for a task title and description.
pub fn task_request(email: &str) -> CompletionRequest {
    let prompt = format!(
        "Based on this email, create a task title and description:\n\
         \n\
         {email}\n\
         \n\
         Respond with:\n\
         Title: [Clear, actionable task title]\n\
         Description: [Brief description of what needs to be done]"
    );

    CompletionRequest::new(vec![Message::user(prompt)])
        .with_system_prompt(TASK_SYSTEM_PROMPT)
        .with_temperature(0.3)
        .with_max_tokens(200)
}

/// Smallest request that proves the endpoint and key work.
pub fn connection_check_request() -> CompletionRequest {
    CompletionRequest::new(vec![Message::user("Hello")]).with_max_tokens(5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_prompt_embeds_email() {
        let request = summary_request("From: a@example.com\nSubject: Hi\n\nLunch?");
        assert_eq!(request.system_prompt.as_deref(), Some(SUMMARY_SYSTEM_PROMPT));
        assert!(request.messages[0].content.contains("Lunch?"));
        assert!(request.messages[0].content.starts_with("Summarize this email"));
        assert_eq!(request.max_tokens, Some(150));
    }

    #[test]
    fn blank_instructions_use_default() {
        let request = reply_request("Can we meet?", "   ");
        assert!(request.messages[0]
            .content
            .contains("Instructions: Write a professional, helpful reply"));
    }

    #[test]
    fn custom_instructions_kept() {
        let request = reply_request("Can we meet?", "Decline politely");
        assert!(request.messages[0].content.contains("Instructions: Decline politely"));
        assert!(request.messages[0].content.contains("Original email: Can we meet?"));
    }

    #[test]
    fn task_prompt_asks_for_title_and_description() {
        let request = task_request("From: a@example.com\nSubject: Budget\n\nSend numbers");
        let content = &request.messages[0].content;
        assert!(content.contains("Subject: Budget"));
        assert!(content.contains("Title: [Clear, actionable task title]"));
        assert!(content.contains("Description: [Brief description"));
        assert_eq!(request.system_prompt.as_deref(), Some(TASK_SYSTEM_PROMPT));
        assert_eq!(request.max_tokens, Some(200));
    }

    #[test]
    fn connection_check_is_tiny() {
        let request = connection_check_request();
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.max_tokens, Some(5));
        assert!(request.system_prompt.is_none());
    }
}
