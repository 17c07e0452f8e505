//! Campaign plan - The top-level outline a game master prepares
//!
//! Session notes only exist inside their plan. They have identifiers so the
//! order and identity of notes survive a reload, but they cannot be created,
//! listed or deleted on their own.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::ObjId;
use crate::object::domain_object;
use crate::registry::{CAMPAIGN_PLAN, SESSION_NOTE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionNote {
    #[serde(default)]
    pub obj_id: ObjId,
    pub title: String,
    pub body: String,
}

impl SessionNote {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            obj_id: ObjId::draft(SESSION_NOTE.prefix),
            title: title.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignPlan {
    #[serde(default)]
    pub obj_id: ObjId,
    pub title: String,
    pub setting: String,
    pub summary: String,
    #[serde(default)]
    pub notes: Vec<SessionNote>,
    #[serde(default)]
    pub arcs: BTreeSet<ObjId>,
    #[serde(default)]
    pub locations: BTreeSet<ObjId>,
    #[serde(default)]
    pub characters: BTreeSet<ObjId>,
}

impl CampaignPlan {
    pub fn new(
        title: impl Into<String>,
        setting: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            obj_id: ObjId::draft(CAMPAIGN_PLAN.prefix),
            title: title.into(),
            setting: setting.into(),
            summary: summary.into(),
            notes: Vec::new(),
            arcs: BTreeSet::new(),
            locations: BTreeSet::new(),
            characters: BTreeSet::new(),
        }
    }

    pub fn with_note(mut self, note: SessionNote) -> Self {
        self.notes.push(note);
        self
    }
}

domain_object!(SessionNote, SESSION_NOTE);
domain_object!(CampaignPlan, CAMPAIGN_PLAN);
