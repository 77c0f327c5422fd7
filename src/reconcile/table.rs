use crate::model::{
    Candidate, CandidateRecord, Company, CompanyCandidate, CompanyKey, Disc, DiscCandidate,
    DiscKey, Entity, EntityKey, Event, EventCandidate, EventKey, Field, Player, PlayerCandidate,
    PlayerKey, Stamp,
};
use crate::reconcile::{DanglingReference, FinalizedTable, ReconciliationWarning};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

/// The running table of reconciled entities, one per natural key
///
/// Discs reference companies by key only; the set of discs of a company is
/// computed by [`EntityTable::discs_of`]. Discs whose company has not been
/// seen yet are tracked in a pending set until it arrives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityTable {
    companies: BTreeMap<CompanyKey, Company>,
    discs: BTreeMap<DiscKey, Disc>,
    players: BTreeMap<PlayerKey, Player>,
    events: BTreeMap<EventKey, Event>,
    pending: BTreeMap<CompanyKey, BTreeSet<DiscKey>>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one candidate record into the table
    ///
    /// Returns a warning for every field where the candidate disagreed with
    /// a value already in the table. A candidate without a usable natural
    /// key leaves the table unchanged.
    pub fn merge(&mut self, record: &CandidateRecord) -> Vec<ReconciliationWarning> {
        let mut merger = FieldMerger {
            stamp: record.stamp,
            source: &record.source,
            warnings: Vec::new(),
        };

        match &record.candidate {
            Candidate::Company(c) => self.merge_company(c, &mut merger),
            Candidate::Disc(c) => self.merge_disc(c, &mut merger),
            Candidate::Player(c) => self.merge_player(c, &mut merger),
            Candidate::Event(c) => self.merge_event(c, &mut merger),
        }

        merger.warnings
    }

    fn merge_company(&mut self, candidate: &CompanyCandidate, m: &mut FieldMerger<'_>) {
        let Some(key) = candidate.key() else {
            tracing::debug!("Dropping company candidate without a name from {}", m.source);
            return;
        };
        let entity = EntityKey::Company(key.clone());
        let company = self
            .companies
            .entry(key.clone())
            .or_insert_with(|| Company::new(key.clone()));

        m.absorb(&entity, "name", &mut company.name, Some(candidate.name.clone()));
        m.absorb(&entity, "location", &mut company.location, candidate.location.clone());
        m.absorb(&entity, "website", &mut company.website, candidate.website.clone());
        m.absorb(&entity, "active", &mut company.active, candidate.active);

        let details = &candidate.details;
        for (field, slot, value) in [
            ("address", &mut company.address, &details.address),
            ("city", &mut company.city, &details.city),
            ("state", &mut company.state, &details.state),
            ("postal_code", &mut company.postal_code, &details.postal_code),
            ("country", &mut company.country, &details.country),
            ("phone", &mut company.phone, &details.phone),
            ("contact_name", &mut company.contact_name, &details.contact_name),
            ("contact_email", &mut company.contact_email, &details.contact_email),
            ("contact_phone", &mut company.contact_phone, &details.contact_phone),
            ("twitter", &mut company.twitter, &details.twitter),
            ("facebook", &mut company.facebook, &details.facebook),
            ("instagram", &mut company.instagram, &details.instagram),
            ("youtube", &mut company.youtube, &details.youtube),
        ] {
            m.absorb(&entity, field, slot, value.clone());
        }

        if let Some(discs) = self.pending.remove(&key) {
            tracing::debug!("Company {} resolves {} pending discs", key, discs.len());
        }
    }

    fn merge_disc(&mut self, candidate: &DiscCandidate, m: &mut FieldMerger<'_>) {
        let Some(key) = candidate.key() else {
            tracing::debug!("Dropping disc candidate without a key from {}", m.source);
            return;
        };
        let entity = EntityKey::Disc(key.clone());
        let disc = self
            .discs
            .entry(key.clone())
            .or_insert_with(|| Disc::new(key.clone()));

        m.absorb(&entity, "model", &mut disc.model, Some(candidate.model.clone()));
        m.absorb(
            &entity,
            "manufacturer",
            &mut disc.manufacturer,
            Some(candidate.manufacturer.clone()),
        );
        m.absorb(&entity, "speed", &mut disc.speed, candidate.speed);
        m.absorb(&entity, "glide", &mut disc.glide, candidate.glide);
        m.absorb(&entity, "turn", &mut disc.turn, candidate.turn);
        m.absorb(&entity, "fade", &mut disc.fade, candidate.fade);
        disc.plastics.extend(candidate.plastics.iter().cloned());
        m.absorb(&entity, "status", &mut disc.status, candidate.status);
        m.absorb(&entity, "approved", &mut disc.approved, candidate.approved);
        m.absorb(&entity, "max_weight", &mut disc.max_weight, candidate.max_weight);
        m.absorb(&entity, "diameter", &mut disc.diameter, candidate.diameter);
        m.absorb(&entity, "rim_depth", &mut disc.rim_depth, candidate.rim_depth);
        m.absorb(&entity, "height", &mut disc.height, candidate.height);
        m.absorb(
            &entity,
            "rim_diameter_inside",
            &mut disc.rim_diameter_inside,
            candidate.rim_diameter_inside,
        );
        m.absorb(&entity, "rim_thickness", &mut disc.rim_thickness, candidate.rim_thickness);
        m.absorb(&entity, "rim_ratio", &mut disc.rim_ratio, candidate.rim_ratio);
        m.absorb(&entity, "rim_config", &mut disc.rim_config, candidate.rim_config);
        m.absorb(&entity, "flex", &mut disc.flex, candidate.flex);
        m.absorb(&entity, "cert", &mut disc.cert, candidate.cert.clone());

        if !self.companies.contains_key(&key.manufacturer) {
            self.pending
                .entry(key.manufacturer.clone())
                .or_default()
                .insert(key);
        }
    }

    fn merge_player(&mut self, candidate: &PlayerCandidate, m: &mut FieldMerger<'_>) {
        let key = PlayerKey(candidate.number);
        let entity = EntityKey::Player(key);
        let player = self.players.entry(key).or_insert_with(|| Player::new(key));

        m.absorb(&entity, "name", &mut player.name, candidate.name.clone());
        m.absorb(&entity, "location", &mut player.location, candidate.location.clone());
        m.absorb(
            &entity,
            "classification",
            &mut player.classification,
            candidate.classification.clone(),
        );
        m.absorb(
            &entity,
            "membership_status",
            &mut player.membership_status,
            candidate.membership_status.clone(),
        );
        m.absorb(&entity, "member_since", &mut player.member_since, candidate.member_since);
        m.absorb(&entity, "rating", &mut player.rating, candidate.rating);
    }

    fn merge_event(&mut self, candidate: &EventCandidate, m: &mut FieldMerger<'_>) {
        let key = EventKey(candidate.id);
        let entity = EntityKey::Event(key);
        let event = self.events.entry(key).or_insert_with(|| Event::new(key));

        m.absorb(&entity, "name", &mut event.name, candidate.name.clone());
        m.absorb(&entity, "start_date", &mut event.start_date, candidate.start_date);
        m.absorb(&entity, "end_date", &mut event.end_date, candidate.end_date);
        m.absorb(&entity, "location", &mut event.location, candidate.location.clone());
        m.absorb(&entity, "tier", &mut event.tier, candidate.tier.clone());
        m.absorb(&entity, "director", &mut event.director, candidate.director.clone());
        m.absorb(&entity, "website", &mut event.website, candidate.website.clone());
    }

    // ===== Queries =====

    pub fn company(&self, key: &CompanyKey) -> Option<&Company> {
        self.companies.get(key)
    }

    pub fn disc(&self, key: &DiscKey) -> Option<&Disc> {
        self.discs.get(key)
    }

    pub fn player(&self, key: PlayerKey) -> Option<&Player> {
        self.players.get(&key)
    }

    pub fn event(&self, key: EventKey) -> Option<&Event> {
        self.events.get(&key)
    }

    /// Discs manufactured by a company, in model order
    pub fn discs_of<'a>(&'a self, company: &'a CompanyKey) -> impl Iterator<Item = &'a Disc> + 'a {
        let start = DiscKey {
            manufacturer: company.clone(),
            model: String::new(),
        };
        self.discs
            .range(start..)
            .take_while(move |(key, _)| key.manufacturer == *company)
            .map(|(_, disc)| disc)
    }

    /// Disc keys whose manufacturer has not been seen as a company yet
    pub fn pending(&self) -> impl Iterator<Item = (&CompanyKey, &BTreeSet<DiscKey>)> {
        self.pending.iter()
    }

    pub fn company_count(&self) -> usize {
        self.companies.len()
    }

    pub fn disc_count(&self) -> usize {
        self.discs.len()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.company_count() + self.disc_count() + self.player_count() + self.event_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Produces the sink-ready entity stream and the unresolved references
    ///
    /// Entities come out in natural-key order: companies, then discs,
    /// players and events.
    pub fn finalize(&self) -> FinalizedTable {
        let entities = self
            .companies
            .values()
            .cloned()
            .map(Entity::Company)
            .chain(self.discs.values().cloned().map(Entity::Disc))
            .chain(self.players.values().cloned().map(Entity::Player))
            .chain(self.events.values().cloned().map(Entity::Event))
            .collect();

        let dangling = self
            .pending
            .iter()
            .flat_map(|(company, discs)| {
                discs.iter().map(move |disc| DanglingReference {
                    disc: disc.clone(),
                    manufacturer: company.clone(),
                })
            })
            .collect();

        FinalizedTable { entities, dangling }
    }
}

/// Pure form of [`EntityTable::merge`]
pub fn merge(
    mut table: EntityTable,
    record: &CandidateRecord,
) -> (EntityTable, Vec<ReconciliationWarning>) {
    let warnings = table.merge(record);
    (table, warnings)
}

/// Per-record merge state shared by every field of one candidate
struct FieldMerger<'a> {
    stamp: Stamp,
    source: &'a str,
    warnings: Vec<ReconciliationWarning>,
}

impl FieldMerger<'_> {
    fn absorb<T: Clone + Ord + Display>(
        &mut self,
        entity: &EntityKey,
        field: &'static str,
        current: &mut Field<T>,
        incoming: Option<T>,
    ) {
        let Some(conflict) = current.merge(Field::observed(incoming, self.stamp)) else {
            return;
        };

        let warning = ReconciliationWarning {
            entity: entity.clone(),
            field,
            kept: conflict.kept.value.to_string(),
            kept_stamp: conflict.kept.stamp,
            rejected: conflict.rejected.value.to_string(),
            rejected_stamp: conflict.rejected.stamp,
            source: self.source.to_string(),
        };

        if warning.is_flight_number() {
            tracing::warn!("{}", warning);
        } else {
            tracing::debug!("{}", warning);
        }
        self.warnings.push(warning);
    }
}
