//! Keyword triggers that pull a question toward each expert.
//!
//! Single-word triggers match whole tokens ("vm" never fires inside
//! "environment"); multi-word triggers match as substrings of the lowercased
//! question. Weights are relative strength, not probabilities.

use crate::types::ExpertKind;

#[derive(Clone, Copy, Debug)]
pub struct Trigger {
    pub phrase: &'static str,
    pub weight: f32,
}

impl Trigger {
    const fn new(phrase: &'static str, weight: f32) -> Self {
        Self { phrase, weight }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ExpertLexicon {
    pub expert: ExpertKind,
    pub triggers: &'static [Trigger],
}

/// One entry per expert, in priority order.
///
/// The general expert's triggers are question-shape phrases ("what is",
/// "explain") rather than domain nouns, so open-ended questions drift toward
/// it while anything naming real infrastructure stays with a specialist.
pub const LEXICON: &[ExpertLexicon] = &[
    ExpertLexicon {
        expert: ExpertKind::Inventory,
        triggers: &[
            Trigger::new("inventory", 2.5),
            Trigger::new("server", 2.0),
            Trigger::new("servers", 2.0),
            Trigger::new("vm", 2.0),
            Trigger::new("vms", 2.0),
            Trigger::new("virtual machine", 2.0),
            Trigger::new("virtual machines", 2.0),
            Trigger::new("hypervisor", 1.5),
            Trigger::new("firmware", 2.0),
            Trigger::new("blade", 1.5),
            Trigger::new("blades", 1.5),
            Trigger::new("compute", 1.5),
            Trigger::new("serial", 1.5),
            Trigger::new("power state", 1.5),
            Trigger::new("profile", 1.5),
            Trigger::new("profiles", 1.5),
            Trigger::new("device connector", 2.0),
            Trigger::new("device connectors", 2.0),
            Trigger::new("health alert", 1.5),
            Trigger::new("health alerts", 1.5),
            Trigger::new("upgrade", 1.5),
            Trigger::new("upgrades", 1.5),
        ],
    },
    ExpertLexicon {
        expert: ExpertKind::NetworkFabric,
        triggers: &[
            Trigger::new("fabric", 2.5),
            Trigger::new("fabrics", 2.5),
            Trigger::new("switch", 2.0),
            Trigger::new("switches", 2.0),
            Trigger::new("spine", 2.0),
            Trigger::new("spines", 2.0),
            Trigger::new("leaf", 2.0),
            Trigger::new("leaves", 2.0),
            Trigger::new("vxlan", 2.0),
            Trigger::new("telemetry", 2.0),
            Trigger::new("bgp", 1.5),
            Trigger::new("vlan", 1.5),
            Trigger::new("vlans", 1.5),
            Trigger::new("site", 1.5),
            Trigger::new("sites", 1.5),
            Trigger::new("alarm", 1.5),
            Trigger::new("alarms", 1.5),
            Trigger::new("workflow", 1.5),
            Trigger::new("workflows", 1.5),
            Trigger::new("network", 1.5),
            Trigger::new("interface", 1.5),
            Trigger::new("interfaces", 1.5),
            Trigger::new("underlay", 1.5),
            Trigger::new("overlay", 1.5),
        ],
    },
    ExpertLexicon {
        expert: ExpertKind::HardwareDocs,
        triggers: &[
            Trigger::new("gpu", 2.0),
            Trigger::new("gpus", 2.0),
            Trigger::new("accelerator", 2.0),
            Trigger::new("accelerators", 2.0),
            Trigger::new("nvlink", 2.0),
            Trigger::new("liquid cooling", 2.0),
            Trigger::new("hbm", 1.5),
            Trigger::new("pcie", 1.5),
            Trigger::new("cooling", 1.5),
            Trigger::new("thermal", 1.5),
            Trigger::new("thermals", 1.5),
            Trigger::new("rack", 1.5),
            Trigger::new("racks", 1.5),
            Trigger::new("cable", 1.5),
            Trigger::new("cabling", 1.5),
            Trigger::new("datasheet", 1.5),
            Trigger::new("documentation", 1.5),
            Trigger::new("docs", 1.5),
            Trigger::new("manual", 1.5),
            Trigger::new("guide", 1.5),
            Trigger::new("install", 1.5),
            Trigger::new("installation", 1.5),
            Trigger::new("power draw", 1.5),
            Trigger::new("chassis", 1.5),
            Trigger::new("training", 1.0),
            Trigger::new("cluster", 1.0),
            Trigger::new("clusters", 1.0),
        ],
    },
    ExpertLexicon {
        expert: ExpertKind::General,
        triggers: &[
            Trigger::new("what is", 2.0),
            Trigger::new("what are", 2.0),
            Trigger::new("how does", 2.0),
            Trigger::new("how do", 2.0),
            Trigger::new("explain", 2.0),
            Trigger::new("define", 1.5),
            Trigger::new("tell me about", 1.5),
            Trigger::new("why", 1.0),
            Trigger::new("difference", 1.0),
            Trigger::new("history", 1.0),
        ],
    },
];

/// Split a lowercased question into alphanumeric tokens.
pub fn tokenize(text_lc: &str) -> Vec<&str> {
    text_lc
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Sum the weights of every trigger firing in this question.
///
/// Returns the weight sum and the number of distinct triggers that hit.
pub fn score_matches(text_lc: &str, tokens: &[&str], triggers: &[Trigger]) -> (f32, usize) {
    let mut weight_sum = 0.0;
    let mut hits = 0;
    for trigger in triggers {
        let fired = if trigger.phrase.contains(' ') {
            text_lc.contains(trigger.phrase)
        } else {
            tokens.contains(&trigger.phrase)
        };
        if fired {
            weight_sum += trigger.weight;
            hits += 1;
        }
    }
    (weight_sum, hits)
}
