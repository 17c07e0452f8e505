//! Concrete domain object types

mod agent_config;
mod campaign_plan;
mod character;
mod item;
mod location;
mod objective;
mod rule;
mod story;

pub use agent_config::AgentConfig;
pub use campaign_plan::{CampaignPlan, SessionNote};
pub use character::Character;
pub use item::Item;
pub use location::Location;
pub use objective::Objective;
pub use rule::Rule;
pub use story::{Arc, Point, Segment};
