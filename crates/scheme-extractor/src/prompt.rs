//! Prompt construction for each reasoning stage

use crate::config::TieBreak;
use crate::rules::ClassificationRules;
use scheme_domain::Message;
use serde_json::json;

/// Shared system message for the narrow stages 1-5 and 7
const STAGE_SYSTEM: &str = "You analyse brand emails that announce retail claim schemes. \
Read only what is provided. Never invent values: use null when a value is not stated. \
Respond with a single JSON object and nothing else.";

const EXTRACTION_ROLE: &str = "\
You extract scheme headers for a retail claims system from brand emails, \
extracted document text and pasted CSV tables.

Priorities: accuracy over completeness, null instead of guesses, strict JSON output.
Read subject, body and tables together and report every scheme described.";

const SCHEME_SHAPE: &str = r#"{
  "schemes": [
    {
      "scheme_type": "BUY_SIDE | SELL_SIDE | ONE_OFF | OTHER",
      "scheme_sub_type": "PERIODIC_CLAIM | PDC | PUC_FDC | COUPON | SUPER_COIN | PREXO | BANK_OFFER | LIFESTYLE | ONE_OFF | OTHER",
      "scheme_name": "string",
      "scheme_description": "string",
      "scheme_period": "EVENT | DURATION",
      "duration_start_date": "YYYY-MM-DD or null",
      "duration_end_date": "YYYY-MM-DD or null",
      "starting_at": "YYYY-MM-DD or null",
      "ending_at": "YYYY-MM-DD or null",
      "price_drop_date": "YYYY-MM-DD or null",
      "discount_type": "Percentage of MRP | Percentage of NLC | Absolute | Other",
      "discount_value": number or null,
      "min_order_value": number or null,
      "max_discount_cap": number or null,
      "global_cap_amount": number or null,
      "min_actual_or_agreed": "Yes | No",
      "remove_gst_from_final_claim": "Yes | No",
      "over_and_above": "Yes | No",
      "discount_slab_type": "Flat | Quantity_Slab | Value_Slab | Other",
      "best_bet": "Yes | No",
      "brand_support_absolute": number or null,
      "gst_rate": number or null,
      "remarks": "string",
      "vendors": [{"vendor_name": "string", "location": "string or null", "amount": number or null}],
      "confidence": number between 0 and 1,
      "needs_escalation": true or false
    }
  ]
}"#;

const FIELD_RULES: &str = "\
Dates: YYYY-MM-DD. A month or year alone means its first and last day. No dates means null for both.
starting_at equals duration_start_date and ending_at equals duration_end_date.
price_drop_date only for PDC schemes, otherwise null.
Numbers: plain numbers without commas or currency symbols, or null.
global_cap_amount only when a cap is stated explicitly; min_actual_or_agreed is \"Yes\" when a cap exists.
remove_gst_from_final_claim is \"Yes\" only when amounts are inclusive of GST.
gst_rate only when a percentage is stated.
vendors is always present: an empty list when no vendors are named; missing location or amount is null.
When a required field is missing, dates are unclear, classification is uncertain or amounts disagree, \
set needs_escalation to true and keep confidence below 0.75.
When no scheme is present return {\"schemes\": []}.";

/// Builds the message list for every stage
#[derive(Debug, Clone, Copy)]
pub struct PromptBuilder<'a> {
    rules: &'a ClassificationRules,
    tie_break: TieBreak,
}

impl<'a> PromptBuilder<'a> {
    /// Create a prompt builder over a rule table
    pub fn new(rules: &'a ClassificationRules, tie_break: TieBreak) -> Self {
        Self { rules, tie_break }
    }

    /// Full extraction instructions shared by stage 6 and single-shot mode
    pub fn extraction_system_prompt(&self) -> String {
        format!(
            "{}\n\nOutput format:\n{}\n\n{}\n{}\n\nOutput JSON only. No markdown, no commentary.",
            EXTRACTION_ROLE,
            SCHEME_SHAPE,
            self.rules.render(self.tie_break),
            FIELD_RULES
        )
    }

    /// Stage 1: key facts
    pub fn key_facts(&self, subject: &str, body: &str) -> Vec<Message> {
        stage_messages(
            "List the key facts of this email before any classification.",
            &[("mail_subject", subject), ("mail_body", body)],
            r#"{"scheme_names": ["..."], "key_dates": ["..."], "key_amounts": ["..."], "keywords": ["..."], "vendor_names": ["..."], "reasoning": "..."}"#,
        )
    }

    /// Stage 2: classification
    pub fn classification(&self, scheme_names: &str, keywords: &str, context: &str) -> Vec<Message> {
        let task = format!(
            "Classify the scheme. Follow the rules exactly and never override them on intuition.\n{}",
            self.rules.render(self.tie_break)
        );
        stage_messages(
            &task,
            &[
                ("scheme_description", scheme_names),
                ("keywords", keywords),
                ("content_context", context),
            ],
            r#"{"scheme_type": "...", "scheme_sub_type": "...", "confidence": 0.0, "reasoning": "..."}"#,
        )
    }

    /// Stage 3: dates
    pub fn dates(&self, text: &str, context: &str) -> Vec<Message> {
        stage_messages(
            "Extract the scheme dates as YYYY-MM-DD. A month or year alone means its first and last day. \
             No dates means null. price_drop_date applies to price drop claims only.",
            &[("text_content", text), ("context", context)],
            r#"{"duration_start_date": null, "duration_end_date": null, "starting_at": null, "ending_at": null, "price_drop_date": null, "reasoning": "..."}"#,
        )
    }

    /// Stage 4: financials
    pub fn financials(&self, text: &str, table: &str) -> Vec<Message> {
        stage_messages(
            "Extract the financial terms. Numbers only, without commas or currency symbols.",
            &[("text_content", text), ("table_data", table)],
            r#"{"discount_type": "Percentage of MRP | Percentage of NLC | Absolute | Other | null", "discount_value": null, "min_order_value": null, "max_discount_cap": null, "gst_rate": null, "brand_support_absolute": null, "reasoning": "..."}"#,
        )
    }

    /// Stage 5: vendors
    pub fn vendors(&self, table: &str, vendor_names: &str) -> Vec<Message> {
        stage_messages(
            "Extract the participating vendors. Use an empty list when none are named.",
            &[("table_data", table), ("text_content", vendor_names)],
            r#"{"vendors": [{"vendor_name": "...", "location": null, "amount": null}], "reasoning": "..."}"#,
        )
    }

    /// Stage 6: full assembly from the stage summary and the source context
    pub fn assembly(&self, subject: &str, body: &str) -> Vec<Message> {
        let user = format!(
            "{}\n\nAdd a top-level \"reasoning\" string next to \"schemes\" explaining the decisions.",
            payload(subject, body)
        );
        vec![Message::system(self.extraction_system_prompt()), Message::user(user)]
    }

    /// Stage 7: confidence assessment
    pub fn confidence(&self, extracted: &str, reasoning: &str) -> Vec<Message> {
        stage_messages(
            "Assess the extraction. Flag escalation when required fields are missing, \
             dates are unclear, classification is uncertain or amounts are inconsistent.",
            &[("extracted_data", extracted), ("extraction_reasoning", reasoning)],
            r#"{"confidence_score": 0.0, "needs_escalation": false, "missing_fields": ["..."], "quality_issues": ["..."], "reasoning": "..."}"#,
        )
    }

    /// Single-shot extraction: one system prompt, one payload
    pub fn single_shot(&self, subject: &str, body: &str) -> Vec<Message> {
        vec![
            Message::system(self.extraction_system_prompt()),
            Message::user(payload(subject, body)),
        ]
    }
}

fn payload(subject: &str, body: &str) -> String {
    json!({ "mail_subject": subject, "mail_body": body }).to_string()
}

fn stage_messages(task: &str, inputs: &[(&str, &str)], shape: &str) -> Vec<Message> {
    let mut user = String::from(task);
    user.push_str("\n\n");
    for (name, value) in inputs {
        user.push_str(&format!("{}:\n---\n{}\n---\n\n", name, value));
    }
    user.push_str("Respond with one JSON object of this shape:\n");
    user.push_str(shape);

    vec![Message::system(STAGE_SYSTEM), Message::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheme_domain::Role;

    fn builder(rules: &ClassificationRules) -> PromptBuilder<'_> {
        PromptBuilder::new(rules, TieBreak::FirstMatch)
    }

    #[test]
    fn test_stage_messages_shape() {
        let rules = ClassificationRules::default();
        let msgs = builder(&rules).key_facts("JBP Q1", "Body here");
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::System);
        assert_eq!(msgs[1].role, Role::User);
        assert!(msgs[1].content.contains("mail_subject:\n---\nJBP Q1\n---"));
        assert!(msgs[1].content.contains("\"reasoning\""));
    }

    #[test]
    fn test_classification_prompt_carries_rules() {
        let rules = ClassificationRules::default();
        let msgs = builder(&rules).classification("JBP", "jbp, quarter", "ctx");
        assert!(msgs[1].content.contains("BUY_SIDE / PERIODIC_CLAIM"));
        assert!(msgs[1].content.contains("earliest group wins"));
    }

    #[test]
    fn test_single_shot_payload_is_json() {
        let rules = ClassificationRules::default();
        let msgs = builder(&rules).single_shot("Subj \"quoted\"", "Body");
        assert!(msgs[0].content.contains("PERIODIC_CLAIM"));
        let payload: serde_json::Value = serde_json::from_str(&msgs[1].content).unwrap();
        assert_eq!(payload["mail_subject"], "Subj \"quoted\"");
        assert_eq!(payload["mail_body"], "Body");
    }

    #[test]
    fn test_assembly_asks_for_reasoning() {
        let rules = ClassificationRules::default();
        let msgs = builder(&rules).assembly("s", "b");
        assert!(msgs[1].content.contains("\"reasoning\""));
        assert!(msgs[0].content.contains("\"schemes\""));
    }
}
