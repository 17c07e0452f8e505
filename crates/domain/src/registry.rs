//! Static registry of domain object shapes.
//!
//! One [`TypeDescriptor`] per concrete type describes how the object maps onto
//! relational rows: which fields are plain columns, which are key/value maps,
//! which are owned child collections and which are links to other objects.
//! Persistence code is written once against these descriptors instead of per
//! type.

use crate::error::DomainError;

/// Column kind of a scalar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Text,
    OptionalText,
    Integer,
    Real,
    Bool,
    /// Ordered list of strings, stored as a JSON array.
    TextList,
}

/// Value kind of a map field (keys are always text).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapValueKind {
    Text,
    Integer,
}

#[derive(Debug)]
pub struct ScalarField {
    pub name: &'static str,
    pub kind: ScalarKind,
}

#[derive(Debug)]
pub struct MapField {
    pub name: &'static str,
    pub value: MapValueKind,
}

/// An owned collection. Children are replaced and deleted with their parent.
#[derive(Debug)]
pub struct ChildField {
    pub name: &'static str,
    pub child: &'static TypeDescriptor,
}

/// A many-to-many link to independently addressable objects.
#[derive(Debug)]
pub struct LinkField {
    pub name: &'static str,
    /// Prefix of the linked type. Equal to the owning type's prefix for
    /// self-referential links.
    pub target: &'static str,
}

#[derive(Debug)]
pub struct TypeDescriptor {
    pub type_name: &'static str,
    pub prefix: &'static str,
    pub table: &'static str,
    /// Whether the type can be created, listed and deleted on its own, or only
    /// exists inside a parent's child collection.
    pub standalone: bool,
    pub scalars: &'static [ScalarField],
    pub maps: &'static [MapField],
    pub children: &'static [ChildField],
    pub links: &'static [LinkField],
}

impl TypeDescriptor {
    /// Table holding the entries of a map field.
    pub fn map_table(&self, field: &MapField) -> String {
        format!("{}_{}", self.table, field.name)
    }

    /// Association table of a link field.
    pub fn link_table(&self, field: &LinkField) -> String {
        format!("{}_{}", self.table, field.name)
    }

    pub fn is_self_link(&self, field: &LinkField) -> bool {
        field.target == self.prefix
    }

    pub fn ensure_standalone(&self) -> Result<(), DomainError> {
        if self.standalone {
            Ok(())
        } else {
            Err(DomainError::validation(format!(
                "{} is only stored inside its parent and is not independently addressable",
                self.type_name
            )))
        }
    }
}

// =============================================================================
// Descriptors
// =============================================================================

const fn scalar(name: &'static str, kind: ScalarKind) -> ScalarField {
    ScalarField { name, kind }
}

const fn map(name: &'static str, value: MapValueKind) -> MapField {
    MapField { name, value }
}

const fn child(name: &'static str, child: &'static TypeDescriptor) -> ChildField {
    ChildField { name, child }
}

const fn link(name: &'static str, target: &'static str) -> LinkField {
    LinkField { name, target }
}

pub static RULE: TypeDescriptor = TypeDescriptor {
    type_name: "Rule",
    prefix: "R",
    table: "rules",
    standalone: true,
    scalars: &[
        scalar("description", ScalarKind::Text),
        scalar("effect", ScalarKind::Text),
        scalar("components", ScalarKind::TextList),
    ],
    maps: &[],
    children: &[],
    links: &[],
};

pub static OBJECTIVE: TypeDescriptor = TypeDescriptor {
    type_name: "Objective",
    prefix: "O",
    table: "objectives",
    standalone: true,
    scalars: &[
        scalar("description", ScalarKind::Text),
        scalar("completion_condition", ScalarKind::OptionalText),
    ],
    maps: &[],
    children: &[],
    links: &[link("prerequisites", "O")],
};

pub static POINT: TypeDescriptor = TypeDescriptor {
    type_name: "Point",
    prefix: "P",
    table: "points",
    standalone: true,
    scalars: &[
        scalar("title", ScalarKind::Text),
        scalar("description", ScalarKind::Text),
    ],
    maps: &[],
    children: &[],
    links: &[link("objectives", "O")],
};

pub static SEGMENT: TypeDescriptor = TypeDescriptor {
    type_name: "Segment",
    prefix: "S",
    table: "segments",
    standalone: true,
    scalars: &[
        scalar("title", ScalarKind::Text),
        scalar("description", ScalarKind::Text),
    ],
    maps: &[],
    children: &[],
    links: &[link("points", "P")],
};

pub static ARC: TypeDescriptor = TypeDescriptor {
    type_name: "Arc",
    prefix: "A",
    table: "arcs",
    standalone: true,
    scalars: &[
        scalar("title", ScalarKind::Text),
        scalar("description", ScalarKind::Text),
    ],
    maps: &[],
    children: &[child("segments", &SEGMENT)],
    links: &[],
};

pub static ITEM: TypeDescriptor = TypeDescriptor {
    type_name: "Item",
    prefix: "I",
    table: "items",
    standalone: true,
    scalars: &[
        scalar("name", ScalarKind::Text),
        scalar("description", ScalarKind::Text),
        scalar("quantity", ScalarKind::Integer),
    ],
    maps: &[map("properties", MapValueKind::Text)],
    children: &[],
    links: &[],
};

pub static CHARACTER: TypeDescriptor = TypeDescriptor {
    type_name: "Character",
    prefix: "C",
    table: "characters",
    standalone: true,
    scalars: &[
        scalar("name", ScalarKind::Text),
        scalar("description", ScalarKind::Text),
        scalar("is_player", ScalarKind::Bool),
    ],
    maps: &[
        map("attributes", MapValueKind::Integer),
        map("skills", MapValueKind::Integer),
    ],
    children: &[],
    links: &[link("inventory", "I"), link("storylines", "A")],
};

pub static LOCATION: TypeDescriptor = TypeDescriptor {
    type_name: "Location",
    prefix: "L",
    table: "locations",
    standalone: true,
    scalars: &[
        scalar("name", ScalarKind::Text),
        scalar("description", ScalarKind::Text),
    ],
    maps: &[],
    children: &[],
    links: &[link("neighboring_locations", "L"), link("characters", "C")],
};

pub static SESSION_NOTE: TypeDescriptor = TypeDescriptor {
    type_name: "SessionNote",
    prefix: "N",
    table: "session_notes",
    standalone: false,
    scalars: &[
        scalar("title", ScalarKind::Text),
        scalar("body", ScalarKind::Text),
    ],
    maps: &[],
    children: &[],
    links: &[],
};

pub static CAMPAIGN_PLAN: TypeDescriptor = TypeDescriptor {
    type_name: "CampaignPlan",
    prefix: "CP",
    table: "campaign_plans",
    standalone: true,
    scalars: &[
        scalar("title", ScalarKind::Text),
        scalar("setting", ScalarKind::Text),
        scalar("summary", ScalarKind::Text),
    ],
    maps: &[],
    children: &[child("notes", &SESSION_NOTE)],
    links: &[
        link("arcs", "A"),
        link("locations", "L"),
        link("characters", "C"),
    ],
};

pub static AGENT_CONFIG: TypeDescriptor = TypeDescriptor {
    type_name: "AgentConfig",
    prefix: "AC",
    table: "agent_configs",
    standalone: true,
    scalars: &[
        scalar("name", ScalarKind::Text),
        scalar("provider", ScalarKind::Text),
        scalar("model", ScalarKind::Text),
        scalar("temperature", ScalarKind::Real),
        scalar("max_tokens", ScalarKind::Integer),
        scalar("system_prompt", ScalarKind::OptionalText),
    ],
    maps: &[],
    children: &[],
    links: &[],
};

/// Every registered type, leaves before the types that own them.
pub static REGISTRY: &[&TypeDescriptor] = &[
    &RULE,
    &OBJECTIVE,
    &POINT,
    &SEGMENT,
    &ARC,
    &ITEM,
    &CHARACTER,
    &LOCATION,
    &SESSION_NOTE,
    &CAMPAIGN_PLAN,
    &AGENT_CONFIG,
];

/// Look up a descriptor by its prefix tag.
pub fn describe_prefix(prefix: &str) -> Result<&'static TypeDescriptor, DomainError> {
    REGISTRY
        .iter()
        .copied()
        .find(|d| d.prefix == prefix)
        .ok_or_else(|| DomainError::unknown_type(prefix))
}

/// Types that can be created and listed on their own.
pub fn standalone_types() -> impl Iterator<Item = &'static TypeDescriptor> {
    REGISTRY.iter().copied().filter(|d| d.standalone)
}

/// Every `(descriptor, link)` pair whose link points at `prefix`.
pub fn links_targeting(
    prefix: &str,
) -> impl Iterator<Item = (&'static TypeDescriptor, &'static LinkField)> + '_ {
    REGISTRY.iter().copied().flat_map(move |d| {
        d.links
            .iter()
            .filter(move |l| l.target == prefix)
            .map(move |l| (d, l))
    })
}
