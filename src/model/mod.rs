//! Domain model
//!
//! Candidate records (what one page said), reconciled entities (what the
//! run concluded), their natural keys, and the value types fields are made
//! of.

mod keys;
mod normalize;
mod records;
mod values;

pub use keys::{CompanyKey, DiscKey, EntityKey, EventKey, PlayerKey};
pub use normalize::{fold_key, non_empty, normalize_text, CompanyAliases};
pub use records::{
    Candidate, CandidateRecord, Company, CompanyCandidate, CompanyDetails, Disc, DiscCandidate,
    Entity, Event, EventCandidate, Player, PlayerCandidate,
};
pub use values::{Field, ReleaseStatus, Stamp, Stamped, Tenths, Thousandths};
