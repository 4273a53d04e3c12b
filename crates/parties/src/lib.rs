//! Customer and supplier master data, as pure event-sourced domain logic
//! (no IO, no HTTP, no storage).

pub mod party;

pub use party::{
    ContactInfo, Party, PartyCommand, PartyEvent, PartyId, PartyKind, PartyRegistered,
    PartyStatus, PartySuspended, PartyUpdated, RegisterParty, SuspendParty, UpdateDetails,
};
