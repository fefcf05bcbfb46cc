//! Elemental types and the anomaly each one drives.

use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    Physical,
    Fire,
    Ice,
    Electric,
    Ether,
}

impl Element {
    pub const ALL: [Element; 5] = [
        Element::Physical,
        Element::Fire,
        Element::Ice,
        Element::Electric,
        Element::Ether,
    ];

    pub fn index(self) -> usize {
        match self {
            Element::Physical => 0,
            Element::Fire => 1,
            Element::Ice => 2,
            Element::Electric => 3,
            Element::Ether => 4,
        }
    }

    /// Name of the status effect this element accumulates toward.
    pub fn anomaly_name(self) -> &'static str {
        match self {
            Element::Physical => "assault",
            Element::Fire => "burn",
            Element::Ice => "freeze",
            Element::Electric => "shock",
            Element::Ether => "corruption",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Element::Physical => "physical",
            Element::Fire => "fire",
            Element::Ice => "ice",
            Element::Electric => "electric",
            Element::Ether => "ether",
        }
    }
}

impl std::fmt::Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
