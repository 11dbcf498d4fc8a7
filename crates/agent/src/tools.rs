use helpdesk_core::domain::agent::AgentProfile;

/// Reply used when a transactional query matched no tool the agent may use.
/// Note: this offers escalation conversationally but does not flag the turn.
pub const NO_TOOL_ACCESS_REPLY: &str =
    "I don't have access to perform that action. Would you like me to escalate this to a human?";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolName {
    CheckOrderStatus,
    InitiateRefund,
    SendEmail,
    CreateSupportTicket,
    ApplyDiscount,
    GetCustomerProfile,
    UpdateOrderAddress,
    NotifyVendor,
}

impl ToolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckOrderStatus => "check_order_status",
            Self::InitiateRefund => "initiate_refund",
            Self::SendEmail => "send_email",
            Self::CreateSupportTicket => "create_support_ticket",
            Self::ApplyDiscount => "apply_discount",
            Self::GetCustomerProfile => "get_customer_profile",
            Self::UpdateOrderAddress => "update_order_address",
            Self::NotifyVendor => "notify_vendor",
        }
    }
}

struct ToolEntry {
    name: ToolName,
    keywords: &'static [&'static str],
    response: &'static str,
}

// Declared order is the tie-breaker: the first entry with any keyword hit
// wins, regardless of match quality.
const TOOL_TABLE: &[ToolEntry] = &[
    ToolEntry {
        name: ToolName::CheckOrderStatus,
        keywords: &["check order", "order status", "where is my order", "track order"],
        response: "I checked your order status. It is currently 'Shipped' (demo).",
    },
    ToolEntry {
        name: ToolName::InitiateRefund,
        keywords: &["refund", "money back", "return"],
        response: "I initiated a refund for your order (demo).",
    },
    ToolEntry {
        name: ToolName::SendEmail,
        keywords: &["email", "send mail", "notify by email"],
        response: "I sent an email notification with the latest update (demo).",
    },
    ToolEntry {
        name: ToolName::CreateSupportTicket,
        keywords: &["ticket", "support ticket", "escalate", "escalation"],
        response: "I created a support ticket for escalation to a human (demo).",
    },
    ToolEntry {
        name: ToolName::ApplyDiscount,
        keywords: &["discount", "promo", "coupon"],
        response: "I applied the discount code to your account (demo).",
    },
    ToolEntry {
        name: ToolName::GetCustomerProfile,
        keywords: &["profile", "account info", "customer details"],
        response: "I fetched your profile details (demo).",
    },
    ToolEntry {
        name: ToolName::UpdateOrderAddress,
        keywords: &["change address", "update address", "delivery address"],
        response: "I updated the delivery address on your order (demo).",
    },
    ToolEntry {
        name: ToolName::NotifyVendor,
        keywords: &["vendor", "restaurant", "partner alert", "notify partner"],
        response: "I notified the vendor with your message (demo).",
    },
];

/// Keyword-driven dispatch over the fixed tool set. Execution is a stub
/// contract: each tool resolves to a canned descriptive reply.
#[derive(Clone, Copy, Debug, Default)]
pub struct ToolDispatcher;

impl ToolDispatcher {
    pub fn match_query(&self, query: &str) -> Option<ToolName> {
        let lowered = query.to_lowercase();
        TOOL_TABLE
            .iter()
            .find(|entry| entry.keywords.iter().any(|keyword| lowered.contains(keyword)))
            .map(|entry| entry.name)
    }

    pub fn is_available(&self, tool: ToolName, agent: &AgentProfile) -> bool {
        agent.has_tool(tool.as_str())
    }

    pub fn execute(&self, tool: ToolName) -> &'static str {
        TOOL_TABLE
            .iter()
            .find(|entry| entry.name == tool)
            .map(|entry| entry.response)
            .unwrap_or("Action completed (demo).")
    }
}
