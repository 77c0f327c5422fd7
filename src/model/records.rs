use crate::model::keys::{CompanyKey, DiscKey, EntityKey, EventKey, PlayerKey};
use crate::model::values::{Field, ReleaseStatus, Stamp, Tenths, Thousandths};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;

// ===== Candidates =====

/// What a parser saw about one disc on one page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscCandidate {
    /// Manufacturer display name, already passed through the alias table
    pub manufacturer: String,
    pub model: String,
    pub speed: Option<Tenths>,
    pub glide: Option<Tenths>,
    pub turn: Option<Tenths>,
    pub fade: Option<Tenths>,
    #[serde(default)]
    pub plastics: BTreeSet<String>,
    pub status: Option<ReleaseStatus>,
    pub approved: Option<NaiveDate>,
    /// Grams
    pub max_weight: Option<Tenths>,
    /// Centimeters
    pub diameter: Option<Tenths>,
    /// Centimeters
    pub rim_depth: Option<Tenths>,
    /// Centimeters
    #[serde(default)]
    pub height: Option<Tenths>,
    /// Centimeters
    #[serde(default)]
    pub rim_diameter_inside: Option<Tenths>,
    /// Centimeters
    #[serde(default)]
    pub rim_thickness: Option<Tenths>,
    /// Rim depth over diameter
    #[serde(default)]
    pub rim_ratio: Option<Thousandths>,
    #[serde(default)]
    pub rim_config: Option<Tenths>,
    /// Kilograms
    #[serde(default)]
    pub flex: Option<Thousandths>,
    /// Certification number or type
    #[serde(default)]
    pub cert: Option<String>,
}

impl DiscCandidate {
    pub fn key(&self) -> Option<DiscKey> {
        DiscKey::new(CompanyKey::new(&self.manufacturer)?, &self.model)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyCandidate {
    pub name: String,
    /// City, state and country joined for display
    pub location: Option<String>,
    pub website: Option<String>,
    pub active: Option<bool>,
    #[serde(default)]
    pub details: CompanyDetails,
}

/// Address, contact and social columns of a manufacturer listing row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyDetails {
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub twitter: Option<String>,
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub youtube: Option<String>,
}

impl CompanyCandidate {
    pub fn key(&self) -> Option<CompanyKey> {
        CompanyKey::new(&self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerCandidate {
    pub number: u32,
    pub name: Option<String>,
    pub location: Option<String>,
    pub classification: Option<String>,
    pub membership_status: Option<String>,
    pub member_since: Option<i32>,
    pub rating: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCandidate {
    pub id: u32,
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub tier: Option<String>,
    pub director: Option<String>,
    pub website: Option<String>,
}

/// A partial, unreconciled entity record produced by a parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Candidate {
    Company(CompanyCandidate),
    Disc(DiscCandidate),
    Player(PlayerCandidate),
    Event(EventCandidate),
}

impl Candidate {
    /// Natural key of the entity this candidate contributes to
    pub fn key(&self) -> Option<EntityKey> {
        match self {
            Self::Company(c) => c.key().map(EntityKey::Company),
            Self::Disc(c) => c.key().map(EntityKey::Disc),
            Self::Player(c) => Some(EntityKey::Player(PlayerKey(c.number))),
            Self::Event(c) => Some(EntityKey::Event(EventKey(c.id))),
        }
    }
}

/// A candidate tagged with the page it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    pub stamp: Stamp,
    /// Key of the source page descriptor
    pub source: String,
    pub candidate: Candidate,
}

impl CandidateRecord {
    pub fn new(stamp: Stamp, source: impl Into<String>, candidate: Candidate) -> Self {
        Self {
            stamp,
            source: source.into(),
            candidate,
        }
    }
}

// ===== Entities =====

/// A reconciled disc mold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disc {
    pub key: DiscKey,
    pub model: Field<String>,
    pub manufacturer: Field<String>,
    pub speed: Field<Tenths>,
    pub glide: Field<Tenths>,
    pub turn: Field<Tenths>,
    pub fade: Field<Tenths>,
    pub plastics: BTreeSet<String>,
    pub status: Field<ReleaseStatus>,
    pub approved: Field<NaiveDate>,
    pub max_weight: Field<Tenths>,
    pub diameter: Field<Tenths>,
    pub rim_depth: Field<Tenths>,
    pub height: Field<Tenths>,
    pub rim_diameter_inside: Field<Tenths>,
    pub rim_thickness: Field<Tenths>,
    pub rim_ratio: Field<Thousandths>,
    pub rim_config: Field<Tenths>,
    pub flex: Field<Thousandths>,
    pub cert: Field<String>,
}

impl Disc {
    pub fn new(key: DiscKey) -> Self {
        Self {
            key,
            model: Field::empty(),
            manufacturer: Field::empty(),
            speed: Field::empty(),
            glide: Field::empty(),
            turn: Field::empty(),
            fade: Field::empty(),
            plastics: BTreeSet::new(),
            status: Field::empty(),
            approved: Field::empty(),
            max_weight: Field::empty(),
            diameter: Field::empty(),
            rim_depth: Field::empty(),
            height: Field::empty(),
            rim_diameter_inside: Field::empty(),
            rim_thickness: Field::empty(),
            rim_ratio: Field::empty(),
            rim_config: Field::empty(),
            flex: Field::empty(),
            cert: Field::empty(),
        }
    }

    /// Key of the company this disc references
    pub fn manufacturer_key(&self) -> &CompanyKey {
        &self.key.manufacturer
    }
}

/// A reconciled manufacturer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company {
    pub key: CompanyKey,
    pub name: Field<String>,
    pub location: Field<String>,
    pub website: Field<String>,
    pub active: Field<bool>,
    pub address: Field<String>,
    pub city: Field<String>,
    pub state: Field<String>,
    pub postal_code: Field<String>,
    pub country: Field<String>,
    pub phone: Field<String>,
    pub contact_name: Field<String>,
    pub contact_email: Field<String>,
    pub contact_phone: Field<String>,
    pub twitter: Field<String>,
    pub facebook: Field<String>,
    pub instagram: Field<String>,
    pub youtube: Field<String>,
}

impl Company {
    pub fn new(key: CompanyKey) -> Self {
        Self {
            key,
            name: Field::empty(),
            location: Field::empty(),
            website: Field::empty(),
            active: Field::empty(),
            address: Field::empty(),
            city: Field::empty(),
            state: Field::empty(),
            postal_code: Field::empty(),
            country: Field::empty(),
            phone: Field::empty(),
            contact_name: Field::empty(),
            contact_email: Field::empty(),
            contact_phone: Field::empty(),
            twitter: Field::empty(),
            facebook: Field::empty(),
            instagram: Field::empty(),
            youtube: Field::empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub key: PlayerKey,
    pub name: Field<String>,
    pub location: Field<String>,
    pub classification: Field<String>,
    pub membership_status: Field<String>,
    pub member_since: Field<i32>,
    pub rating: Field<u32>,
}

impl Player {
    pub fn new(key: PlayerKey) -> Self {
        Self {
            key,
            name: Field::empty(),
            location: Field::empty(),
            classification: Field::empty(),
            membership_status: Field::empty(),
            member_since: Field::empty(),
            rating: Field::empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub key: EventKey,
    pub name: Field<String>,
    pub start_date: Field<NaiveDate>,
    pub end_date: Field<NaiveDate>,
    pub location: Field<String>,
    pub tier: Field<String>,
    pub director: Field<String>,
    pub website: Field<String>,
}

impl Event {
    pub fn new(key: EventKey) -> Self {
        Self {
            key,
            name: Field::empty(),
            start_date: Field::empty(),
            end_date: Field::empty(),
            location: Field::empty(),
            tier: Field::empty(),
            director: Field::empty(),
            website: Field::empty(),
        }
    }
}

/// A finalized entity, as handed to a sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Company(Company),
    Disc(Disc),
    Player(Player),
    Event(Event),
}

impl Entity {
    pub fn key(&self) -> EntityKey {
        match self {
            Self::Company(c) => EntityKey::Company(c.key.clone()),
            Self::Disc(d) => EntityKey::Disc(d.key.clone()),
            Self::Player(p) => EntityKey::Player(p.key),
            Self::Event(e) => EntityKey::Event(e.key),
        }
    }

    /// Plain attribute values of the entity, without stamps
    ///
    /// Two runs that observed the same values produce identical payloads,
    /// which is what sinks hash to detect no-op upserts.
    pub fn payload(&self) -> Value {
        match self {
            Self::Company(c) => json!({
                "key": c.key.as_str(),
                "name": c.name.value(),
                "location": c.location.value(),
                "website": c.website.value(),
                "active": c.active.value(),
                "address": c.address.value(),
                "city": c.city.value(),
                "state": c.state.value(),
                "postal_code": c.postal_code.value(),
                "country": c.country.value(),
                "phone": c.phone.value(),
                "contact_name": c.contact_name.value(),
                "contact_email": c.contact_email.value(),
                "contact_phone": c.contact_phone.value(),
                "twitter": c.twitter.value(),
                "facebook": c.facebook.value(),
                "instagram": c.instagram.value(),
                "youtube": c.youtube.value(),
            }),
            Self::Disc(d) => json!({
                "manufacturer_key": d.key.manufacturer.as_str(),
                "model_key": d.key.model,
                "model": d.model.value(),
                "manufacturer": d.manufacturer.value(),
                "speed": d.speed.value().map(Tenths::as_f64),
                "glide": d.glide.value().map(Tenths::as_f64),
                "turn": d.turn.value().map(Tenths::as_f64),
                "fade": d.fade.value().map(Tenths::as_f64),
                "plastics": d.plastics,
                "status": d.status.value().map(ReleaseStatus::as_str),
                "approved": d.approved.value().map(|date| date.to_string()),
                "max_weight": d.max_weight.value().map(Tenths::as_f64),
                "diameter": d.diameter.value().map(Tenths::as_f64),
                "rim_depth": d.rim_depth.value().map(Tenths::as_f64),
                "height": d.height.value().map(Tenths::as_f64),
                "rim_diameter_inside": d.rim_diameter_inside.value().map(Tenths::as_f64),
                "rim_thickness": d.rim_thickness.value().map(Tenths::as_f64),
                "rim_ratio": d.rim_ratio.value().map(Thousandths::as_f64),
                "rim_config": d.rim_config.value().map(Tenths::as_f64),
                "flex": d.flex.value().map(Thousandths::as_f64),
                "cert": d.cert.value(),
            }),
            Self::Player(p) => json!({
                "pdga_number": p.key.0,
                "name": p.name.value(),
                "location": p.location.value(),
                "classification": p.classification.value(),
                "membership_status": p.membership_status.value(),
                "member_since": p.member_since.value(),
                "rating": p.rating.value(),
            }),
            Self::Event(e) => json!({
                "event_id": e.key.0,
                "name": e.name.value(),
                "start_date": e.start_date.value().map(|date| date.to_string()),
                "end_date": e.end_date.value().map(|date| date.to_string()),
                "location": e.location.value(),
                "tier": e.tier.value(),
                "director": e.director.value(),
                "website": e.website.value(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disc_candidate_key() {
        let candidate = DiscCandidate {
            manufacturer: "Innova".to_string(),
            model: "Destroyer".to_string(),
            ..Default::default()
        };
        let key = candidate.key().unwrap();
        assert_eq!(key.manufacturer.as_str(), "innova");
        assert_eq!(key.model, "destroyer");

        let no_model = DiscCandidate {
            manufacturer: "Innova".to_string(),
            ..Default::default()
        };
        assert!(no_model.key().is_none());
    }

    #[test]
    fn test_candidate_journal_json() {
        let candidate = Candidate::Disc(DiscCandidate {
            manufacturer: "Innova".to_string(),
            model: "Destroyer".to_string(),
            glide: Some(Tenths(50)),
            plastics: ["Star".to_string()].into_iter().collect(),
            approved: NaiveDate::from_ymd_opt(2007, 1, 19),
            ..Default::default()
        });

        let json = serde_json::to_string(&candidate).unwrap();
        assert!(json.contains("\"kind\":\"disc\""));
        let back: Candidate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, candidate);
    }

    #[test]
    fn test_payload_omits_stamps() {
        let mut company = Company::new(CompanyKey::new("Innova").unwrap());
        company.name = Field::observed(Some("Innova".to_string()), Stamp(1));
        let first = Entity::Company(company.clone()).payload();

        company.name = Field::observed(Some("Innova".to_string()), Stamp(9));
        let second = Entity::Company(company).payload();

        assert_eq!(first, second);
        assert_eq!(first["name"], "Innova");
        assert!(first["website"].is_null());
    }

    #[test]
    fn test_disc_payload_values() {
        let key = DiscKey::new(CompanyKey::new("Innova").unwrap(), "Destroyer").unwrap();
        let mut disc = Disc::new(key);
        disc.turn = Field::observed(Some(Tenths(-10)), Stamp(1));

        let payload = Entity::Disc(disc).payload();
        assert_eq!(payload["turn"], -1.0);
        assert_eq!(payload["model_key"], "destroyer");
        assert!(payload["speed"].is_null());
    }
}
