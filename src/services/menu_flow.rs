//! WhatsApp menu journey rule
//!
//! The WATI bot opens every menu with a fixed prompt, then asks a fixed
//! sequence of questions that depends on the first two answers (what the
//! tenant wants, and who they are). This rule finds the latest menu journey
//! in a conversation and reads the tenant's answers back into named fields.

use serde_json::Value;
use std::collections::BTreeMap;

use super::journey_extractor::ExtractionRule;
use crate::config::MenuFlowConfig;
use crate::models::{Conversation, Direction};
use crate::utils::normalization::{is_greeting, strip_emoji};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    RentTenant,
    RentOwner,
    BuyBuyer,
    BuySeller,
    ChannelPartner,
    TalkToExpert,
    Unknown,
}

/// One bot question and where the answer goes
#[derive(Debug, Clone, Copy)]
enum Step {
    Text(&'static str),
    /// Apartment size buttons; "More" opens a second list
    Configuration { field: &'static str, more: &'static str },
    /// Repeats until a plain number; the rejected answers are kept too
    Numeric { correct: &'static str, wrong: &'static str },
    /// Asked only when an earlier answer contains one of `any_of`
    TextIf {
        field: &'static str,
        depends_on: &'static str,
        any_of: &'static [&'static str],
    },
}

const RENT_TENANT: &[Step] = &[
    Step::Text("rent_tenant_btn_city"),
    Step::Configuration {
        field: "rent_tenant_btn_configuration",
        more: "rent_tenant_btn_configuration_more",
    },
    Step::Text("rent_tenant_txt_locality"),
    Step::Numeric {
        correct: "rent_tenant_txt_budget_correct",
        wrong: "rent_tenant_txt_budget_wrong",
    },
    Step::Text("rent_tenant_txt_email"),
    Step::Text("rent_tenant_btn_est_move_in"),
];

const RENT_OWNER: &[Step] = &[
    Step::Text("rent_owner_btn_city"),
    Step::Configuration {
        field: "rent_owner_btn_configuration",
        more: "rent_owner_btn_configuration_more",
    },
    Step::Text("rent_owner_txt_locality"),
    Step::Numeric {
        correct: "rent_owner_txt_rent_expectation_correct",
        wrong: "rent_owner_txt_rent_expectation_wrong",
    },
];

const BUY_BUYER: &[Step] = &[
    Step::Configuration {
        field: "buy_buyer_btn_configuration",
        more: "buy_buyer_btn_configuration_more",
    },
    Step::Text("buy_buyer_txt_locality"),
    Step::Numeric {
        correct: "buy_buyer_txt_budget_correct",
        wrong: "buy_buyer_txt_budget_wrong",
    },
    Step::Text("buy_buyer_txt_email"),
];

const BUY_SELLER: &[Step] = &[
    Step::Configuration {
        field: "buy_seller_btn_configuration",
        more: "buy_seller_btn_configuration_more",
    },
    Step::Text("buy_seller_txt_locality"),
    Step::Numeric {
        correct: "buy_seller_txt_sale_expectation_correct",
        wrong: "buy_seller_txt_sale_expectation_wrong",
    },
    Step::Text("buy_seller_txt_email"),
];

const CHANNEL_PARTNER: &[Step] = &[
    Step::Text("cp_mode_of_operation"),
    Step::TextIf {
        field: "cp_name",
        depends_on: "cp_mode_of_operation",
        any_of: &["firm", "company"],
    },
    Step::Text("cp_area_expertise"),
    Step::Text("cp_office_location"),
    Step::Text("cp_rera_registered"),
    Step::TextIf {
        field: "cp_rera_info",
        depends_on: "cp_rera_registered",
        any_of: &["yes"],
    },
];

const COMMON_FIELDS: &[&str] = &[
    "flow",
    "main_selection",
    "intro_selection",
    "journey_attempts",
    "extra_responses",
    "message",
];

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::RentTenant => "RentTenant",
            Flow::RentOwner => "RentOwner",
            Flow::BuyBuyer => "BuyBuyer",
            Flow::BuySeller => "BuySeller",
            Flow::ChannelPartner => "ChannelPartner",
            Flow::TalkToExpert => "TalkToExpert",
            Flow::Unknown => "Unknown",
        }
    }

    /// From the first answer (main menu) and the second (who you are)
    pub fn detect(main_selection: &str, intro_selection: &str) -> Flow {
        let main = main_selection.to_lowercase();
        let intro = intro_selection.to_lowercase();

        if main.contains("rent") {
            if intro.contains("tenant") {
                Flow::RentTenant
            } else if intro.contains("owner") {
                Flow::RentOwner
            } else if intro.contains("channel") {
                Flow::ChannelPartner
            } else {
                Flow::Unknown
            }
        } else if main.contains("buy") || main.contains("sell") {
            if intro.contains("buyer") {
                Flow::BuyBuyer
            } else if intro.contains("seller") {
                Flow::BuySeller
            } else if intro.contains("channel") {
                Flow::ChannelPartner
            } else {
                Flow::Unknown
            }
        } else if main.contains("talk") {
            Flow::TalkToExpert
        } else {
            Flow::Unknown
        }
    }

    fn steps(&self) -> &'static [Step] {
        match self {
            Flow::RentTenant => RENT_TENANT,
            Flow::RentOwner => RENT_OWNER,
            Flow::BuyBuyer => BUY_BUYER,
            Flow::BuySeller => BUY_SELLER,
            Flow::ChannelPartner => CHANNEL_PARTNER,
            Flow::TalkToExpert | Flow::Unknown => &[],
        }
    }

    const ALL: [Flow; 7] = [
        Flow::RentTenant,
        Flow::RentOwner,
        Flow::BuyBuyer,
        Flow::BuySeller,
        Flow::ChannelPartner,
        Flow::TalkToExpert,
        Flow::Unknown,
    ];
}

fn is_numeric_answer(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

pub struct MenuFlowRule {
    start_prompt: String,
}

impl MenuFlowRule {
    pub fn new(config: &MenuFlowConfig) -> Self {
        Self {
            start_prompt: config.start_prompt.to_lowercase(),
        }
    }

    fn is_start_prompt(&self, direction: Direction, text: &str) -> bool {
        direction == Direction::Outbound && text.to_lowercase().contains(&self.start_prompt)
    }

    /// Tenant answers of each journey, emoji and greetings removed; journeys
    /// without any answer are dropped
    fn journeys(&self, conversation: &Conversation) -> Vec<Vec<String>> {
        let mut journeys = Vec::new();
        let mut current: Option<Vec<String>> = None;

        for entry in &conversation.entries {
            if self.is_start_prompt(entry.direction, &entry.message_text) {
                if let Some(answers) = current.take() {
                    journeys.push(answers);
                }
                current = Some(Vec::new());
                continue;
            }

            if entry.direction != Direction::Inbound {
                continue;
            }
            if let Some(answers) = current.as_mut() {
                let text = strip_emoji(&entry.message_text).trim().to_string();
                if !text.is_empty() && !is_greeting(&text) {
                    answers.push(text);
                }
            }
        }
        if let Some(answers) = current {
            journeys.push(answers);
        }

        journeys.retain(|answers| !answers.is_empty());
        journeys
    }
}

fn walk_steps(steps: &[Step], answers: &[String], fields: &mut BTreeMap<String, Value>) -> usize {
    let mut pointer = 2;

    for step in steps {
        if pointer >= answers.len() {
            break;
        }
        match *step {
            Step::Text(field) => {
                fields.insert(field.to_string(), Value::String(answers[pointer].clone()));
                pointer += 1;
            }
            Step::Configuration { field, more } => {
                let choice = &answers[pointer];
                fields.insert(field.to_string(), Value::String(choice.clone()));
                pointer += 1;
                if choice.eq_ignore_ascii_case("more") && pointer < answers.len() {
                    fields.insert(more.to_string(), Value::String(answers[pointer].clone()));
                    pointer += 1;
                }
            }
            Step::Numeric { correct, wrong } => {
                let mut rejected = Vec::new();
                while pointer < answers.len() {
                    let answer = &answers[pointer];
                    pointer += 1;
                    if is_numeric_answer(answer) {
                        fields.insert(correct.to_string(), Value::String(answer.clone()));
                        break;
                    }
                    rejected.push(answer.as_str());
                }
                if !rejected.is_empty() {
                    fields.insert(wrong.to_string(), Value::String(rejected.join("; ")));
                }
            }
            Step::TextIf {
                field,
                depends_on,
                any_of,
            } => {
                let previous = fields
                    .get(depends_on)
                    .and_then(Value::as_str)
                    .map(str::to_lowercase)
                    .unwrap_or_default();
                if any_of.iter().any(|k| previous.contains(k)) {
                    fields.insert(field.to_string(), Value::String(answers[pointer].clone()));
                    pointer += 1;
                }
            }
        }
    }

    pointer
}

impl ExtractionRule for MenuFlowRule {
    fn name(&self) -> &str {
        "menu_flow"
    }

    fn fields(&self) -> Vec<String> {
        let mut names: Vec<String> = COMMON_FIELDS.iter().map(|s| s.to_string()).collect();
        for flow in Flow::ALL {
            for step in flow.steps() {
                match *step {
                    Step::Text(field) | Step::TextIf { field, .. } => names.push(field.to_string()),
                    Step::Configuration { field, more } => {
                        names.push(field.to_string());
                        names.push(more.to_string());
                    }
                    Step::Numeric { correct, wrong } => {
                        names.push(correct.to_string());
                        names.push(wrong.to_string());
                    }
                }
            }
        }
        names
    }

    fn apply(&self, conversation: &Conversation, fields: &mut BTreeMap<String, Value>) {
        let journeys = self.journeys(conversation);
        let Some(answers) = journeys.last() else {
            return;
        };

        let main_selection = answers[0].as_str();
        let intro_selection = answers.get(1).map(String::as_str).unwrap_or_default();
        let flow = Flow::detect(main_selection, intro_selection);

        fields.insert("flow".to_string(), Value::String(flow.as_str().to_string()));
        fields.insert("main_selection".to_string(), Value::String(main_selection.to_string()));
        if !intro_selection.is_empty() {
            fields.insert("intro_selection".to_string(), Value::String(intro_selection.to_string()));
        }
        fields.insert("journey_attempts".to_string(), Value::from(journeys.len()));

        if flow == Flow::TalkToExpert {
            fields.insert("message".to_string(), Value::String("Talk to Expert selected".to_string()));
        }

        let consumed = walk_steps(flow.steps(), answers, fields);
        if consumed < answers.len() {
            fields.insert("extra_responses".to_string(), Value::String(answers[consumed..].join("; ")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogEntry;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    const PROMPT: &str = "Welcome to RentMax! How can we assist you today?";

    fn conversation(messages: &[(Direction, &str)]) -> Conversation {
        let entries = messages
            .iter()
            .enumerate()
            .map(|(i, (direction, text))| LogEntry {
                timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 10, 0).unwrap(),
                phone_number: "919800000001".to_string(),
                direction: *direction,
                message_text: text.to_string(),
                raw_payload: Value::Null,
            })
            .collect();
        Conversation::from_entries("919800000001", entries)
    }

    fn run(messages: &[(Direction, &str)]) -> BTreeMap<String, Value> {
        let rule = MenuFlowRule::new(&MenuFlowConfig::default());
        let mut fields = BTreeMap::new();
        rule.apply(&conversation(messages), &mut fields);
        fields
    }

    use Direction::{Inbound as In, Outbound as Out};

    #[test]
    fn test_detect_flow() {
        assert_eq!(Flow::detect("🏠 Rent", "I'm a Tenant"), Flow::RentTenant);
        assert_eq!(Flow::detect("Rent", "Owner"), Flow::RentOwner);
        assert_eq!(Flow::detect("Buy/Sell", "Seller"), Flow::BuySeller);
        assert_eq!(Flow::detect("Buy/Sell", "Channel Partner"), Flow::ChannelPartner);
        assert_eq!(Flow::detect("Talk to an expert", ""), Flow::TalkToExpert);
        assert_eq!(Flow::detect("Careers", "x"), Flow::Unknown);
    }

    #[test]
    fn test_rent_tenant_journey() {
        let fields = run(&[
            (In, "Hi"),
            (Out, PROMPT),
            (In, "🏠 Rent"),
            (Out, "Are you a tenant or an owner?"),
            (In, "Tenant"),
            (In, "Pune"),
            (In, "More"),
            (In, "4 BHK"),
            (In, "Baner"),
            (In, "around 30k"),
            (In, "30000"),
            (In, "asha@example.com"),
            (In, "Next month"),
            (In, "thanks"),
        ]);

        assert_eq!(fields["flow"], json!("RentTenant"));
        assert_eq!(fields["main_selection"], json!("Rent"));
        assert_eq!(fields["intro_selection"], json!("Tenant"));
        assert_eq!(fields["journey_attempts"], json!(1));
        assert_eq!(fields["rent_tenant_btn_city"], json!("Pune"));
        assert_eq!(fields["rent_tenant_btn_configuration"], json!("More"));
        assert_eq!(fields["rent_tenant_btn_configuration_more"], json!("4 BHK"));
        assert_eq!(fields["rent_tenant_txt_locality"], json!("Baner"));
        assert_eq!(fields["rent_tenant_txt_budget_correct"], json!("30000"));
        assert_eq!(fields["rent_tenant_txt_budget_wrong"], json!("around 30k"));
        assert_eq!(fields["rent_tenant_txt_email"], json!("asha@example.com"));
        assert_eq!(fields["rent_tenant_btn_est_move_in"], json!("Next month"));
        assert_eq!(fields["extra_responses"], json!("thanks"));
    }

    #[test]
    fn test_latest_journey_wins_and_attempts_counted() {
        let fields = run(&[
            (Out, PROMPT),
            (In, "Rent"),
            (In, "Owner"),
            (Out, PROMPT),
            (In, "Talk to Expert"),
        ]);

        assert_eq!(fields["flow"], json!("TalkToExpert"));
        assert_eq!(fields["message"], json!("Talk to Expert selected"));
        assert_eq!(fields["journey_attempts"], json!(2));
        assert!(!fields.contains_key("intro_selection"));
    }

    #[test]
    fn test_channel_partner_branches() {
        let fields = run(&[
            (Out, PROMPT),
            (In, "Rent"),
            (In, "Channel Partner"),
            (In, "Individual"),
            (In, "Residential"),
            (In, "Kothrud"),
            (In, "No"),
        ]);
        assert_eq!(fields["flow"], json!("ChannelPartner"));
        assert!(!fields.contains_key("cp_name"));
        assert_eq!(fields["cp_area_expertise"], json!("Residential"));
        assert_eq!(fields["cp_rera_registered"], json!("No"));
        assert!(!fields.contains_key("cp_rera_info"));

        let fields = run(&[
            (Out, PROMPT),
            (In, "Buy/Sell"),
            (In, "Channel Partner"),
            (In, "Firm"),
            (In, "Acme Realty"),
            (In, "Commercial"),
            (In, "Viman Nagar"),
            (In, "Yes"),
            (In, "P52100012345"),
        ]);
        assert_eq!(fields["cp_name"], json!("Acme Realty"));
        assert_eq!(fields["cp_rera_info"], json!("P52100012345"));
        assert!(!fields.contains_key("extra_responses"));
    }

    #[test]
    fn test_no_prompt_sets_nothing() {
        let fields = run(&[(In, "Hi, interested in 2BR"), (In, "Can I see it Friday?")]);
        assert!(fields.is_empty());
    }

    #[test]
    fn test_prompt_without_answers_sets_nothing() {
        let fields = run(&[(Out, PROMPT), (In, "hello")]);
        assert!(fields.is_empty());
    }

    #[test]
    fn test_declared_fields_cover_all_steps() {
        let rule = MenuFlowRule::new(&MenuFlowConfig::default());
        let names = rule.fields();
        for expected in ["flow", "cp_rera_info", "buy_seller_txt_sale_expectation_wrong", "rent_owner_btn_configuration_more"] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }
    }
}
