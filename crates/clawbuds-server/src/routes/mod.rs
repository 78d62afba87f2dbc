//! Route handlers, one module per resource family.

pub mod briefing;
pub mod carapace;
pub mod circle;
pub mod claw;
pub mod draft;
pub mod e2ee;
pub mod engagement;
pub mod friendmodel;
pub mod friendship;
pub mod group;
pub mod heartbeat;
pub mod message;
pub mod pearl;
pub mod reflex;
pub mod relationship;
pub mod trust;
pub mod webhook;
