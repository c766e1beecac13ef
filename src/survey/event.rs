//! Survey domain events and block classification
//!
//! Classification is a pure function of one block and the survey
//! extension. Correlation against live conversations happens later in the
//! router; here a keypress on any channel is still a candidate.

use std::fmt;

use crate::ami::RawBlock;

/// AMI event names recognised by [`classify`]
pub mod events {
    /// Outbound dial, Asterisk 1.8 style (`SubEvent: Begin`)
    pub const DIAL: &str = "Dial";

    /// Outbound dial, Asterisk 12+
    pub const DIAL_BEGIN: &str = "DialBegin";

    /// Keypress, Asterisk 1.8 style (`Begin`/`End` flags)
    pub const DTMF: &str = "DTMF";

    /// Keypress finished, Asterisk 12+
    pub const DTMF_END: &str = "DTMFEnd";

    /// Caller entered a queue, Asterisk 1.8 style
    pub const JOIN: &str = "Join";

    /// Caller entered a queue, Asterisk 12+
    pub const QUEUE_CALLER_JOIN: &str = "QueueCallerJoin";
}

/// Field names, first match wins
mod fields {
    pub const CALL_ID: &[&str] = &["Uniqueid"];
    pub const DESTINATION: &[&str] = &["Dest", "DestExten", "Exten", "Dialstring"];
    pub const CALLER: &[&str] = &["CallerIDNum"];
    pub const DIGIT: &[&str] = &["Digit"];
}

const DTMF_SYMBOLS: &str = "0123456789*#ABCD";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    AgentStart {
        conversation_id: String,
        agent_extension: String,
    },
    DigitPressed {
        conversation_id: String,
        digit: String,
    },
    CustomerJoin {
        conversation_id: String,
        customer_id: String,
    },
}

impl DomainEvent {
    pub fn conversation_id(&self) -> &str {
        match self {
            DomainEvent::AgentStart { conversation_id, .. }
            | DomainEvent::DigitPressed { conversation_id, .. }
            | DomainEvent::CustomerJoin { conversation_id, .. } => conversation_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::AgentStart { .. } => "agent_start",
            DomainEvent::DigitPressed { .. } => "digit_pressed",
            DomainEvent::CustomerJoin { .. } => "customer_join",
        }
    }
}

impl fmt::Display for DomainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainEvent::AgentStart { conversation_id, agent_extension } => {
                write!(f, "AgentStart({}, agent {})", conversation_id, agent_extension)
            }
            DomainEvent::DigitPressed { conversation_id, digit } => {
                write!(f, "DigitPressed({}, digit {})", conversation_id, digit)
            }
            DomainEvent::CustomerJoin { conversation_id, customer_id } => {
                write!(f, "CustomerJoin({}, customer {})", conversation_id, customer_id)
            }
        }
    }
}

/// Result of classifying one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Event(DomainEvent),
    Ignored,
}

/// Map a block to a candidate survey event.
pub fn classify(block: &RawBlock, survey_extension: &str) -> Classified {
    let Some(name) = block.event_name() else {
        return Classified::Ignored;
    };

    let event = if name.eq_ignore_ascii_case(events::DIAL)
        || name.eq_ignore_ascii_case(events::DIAL_BEGIN)
    {
        classify_dial(block, survey_extension)
    } else if name.eq_ignore_ascii_case(events::DTMF)
        || name.eq_ignore_ascii_case(events::DTMF_END)
    {
        classify_dtmf(block)
    } else if name.eq_ignore_ascii_case(events::JOIN)
        || name.eq_ignore_ascii_case(events::QUEUE_CALLER_JOIN)
    {
        classify_join(block)
    } else {
        None
    };

    event.map_or(Classified::Ignored, Classified::Event)
}

fn classify_dial(block: &RawBlock, survey_extension: &str) -> Option<DomainEvent> {
    // 1.8 emits Begin and End for every dial; only the start counts
    if let Some(sub_event) = block.get("SubEvent") {
        if !sub_event.eq_ignore_ascii_case("Begin") {
            return None;
        }
    }

    let destination = block.get_any(fields::DESTINATION)?;
    if destination != survey_extension {
        return None;
    }

    Some(DomainEvent::AgentStart {
        conversation_id: block.get_any(fields::CALL_ID)?.to_string(),
        agent_extension: block.get_any(fields::CALLER)?.to_string(),
    })
}

fn classify_dtmf(block: &RawBlock) -> Option<DomainEvent> {
    // 1.8 reports each key twice; skip the begin half
    if block
        .get("End")
        .map_or(false, |end| end.eq_ignore_ascii_case("No"))
    {
        return None;
    }

    let digit = block.get_any(fields::DIGIT)?;
    let mut chars = digit.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if DTMF_SYMBOLS.contains(c.to_ascii_uppercase()) => {}
        _ => return None,
    }

    Some(DomainEvent::DigitPressed {
        conversation_id: block.get_any(fields::CALL_ID)?.to_string(),
        digit: digit.to_string(),
    })
}

fn classify_join(block: &RawBlock) -> Option<DomainEvent> {
    Some(DomainEvent::CustomerJoin {
        conversation_id: block.get_any(fields::CALL_ID)?.to_string(),
        customer_id: block.get_any(fields::CALLER)?.to_string(),
    })
}
