//! Mastery use-case service.
//!
//! # Responsibility
//! - Report practice outcomes and cascade them Item -> Unit -> Language.
//! - Fan exercise outcomes out to associated items.
//! - Serve language snapshots with a healed `current_unit`.
//! - Create, edit and delete hierarchy records around the scoring core.
//!
//! # Invariants
//! - Scores change only through `report_outcome*` and recomputation; detail
//!   edits never touch `score` or `last_practiced`.
//! - Within one report the item write lands before its unit is recomputed,
//!   and the unit write before its language.
//! - Every cascade (report, create, delete) runs inside one
//!   `StudyRepository::atomically` unit, so a failed recompute leaves no
//!   half-applied rollup behind.
//! - No cross-call caching: every operation re-reads storage.

use crate::config::EngineConfig;
use crate::model::item::{Item, ItemBody};
use crate::model::kind::{EntityKind, ItemKind};
use crate::model::language::{Language, LanguageDetails};
use crate::model::unit::{Unit, UnitDetails};
use crate::repo::study_repo::{RepoError, RepoResult, StudyRepository};
use crate::service::aggregation::{recompute_language, recompute_unit, recompute_unit_chain};
use crate::service::allocator::{allocate_id, next_id_after, parse_sequence};
use crate::service::associations::{prune_associations, resolve_associations, ResolvedAssociations};
use crate::service::clock::{Clock, SystemClock};
use crate::service::error::{MasteryError, MasteryResult};
use crate::service::position::{find_current_unit, heal_current_unit};
use crate::service::scorer::MasteryScorer;
use chrono::NaiveDate;
use log::{info, warn};
use serde::Serialize;

/// Everything one reported outcome changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeReport {
    /// The practiced item after its update.
    pub item: Item,
    /// Items re-scored through exercise associations.
    pub associated: Vec<Item>,
    /// Recomputed units, in the order they were first touched.
    pub units: Vec<Unit>,
    /// Recomputed languages, latest state per language.
    pub languages: Vec<Language>,
}

/// Facade over the scoring core for a CRUD/API layer.
pub struct MasteryService<R: StudyRepository, C: Clock = SystemClock> {
    repo: R,
    clock: C,
    scorer: MasteryScorer,
    config: EngineConfig,
}

impl<R: StudyRepository> MasteryService<R, SystemClock> {
    /// Creates a service using the local calendar date.
    pub fn new(repo: R, config: EngineConfig) -> MasteryResult<Self> {
        Self::with_clock(repo, SystemClock, config)
    }
}

impl<R: StudyRepository, C: Clock> MasteryService<R, C> {
    pub fn with_clock(repo: R, clock: C, config: EngineConfig) -> MasteryResult<Self> {
        config.validate()?;
        Ok(Self {
            repo,
            clock,
            scorer: MasteryScorer::new(config.time_weight_k),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Applies one practice outcome and returns the updated item.
    pub fn report_outcome(&self, item_id: &str, success: bool) -> MasteryResult<Item> {
        self.report_outcome_detailed(item_id, success)
            .map(|report| report.item)
    }

    /// Applies one practice outcome and returns every record it changed.
    ///
    /// An exercise passes the same outcome to each live associated item,
    /// scored independently from its own prior score and practice date.
    /// Units touched by several items are recomputed once, after all item
    /// writes.
    pub fn report_outcome_detailed(
        &self,
        item_id: &str,
        success: bool,
    ) -> MasteryResult<OutcomeReport> {
        let now = self.clock.today();
        self.repo
            .atomically(|| self.apply_outcome(item_id, success, now))
    }

    fn apply_outcome(
        &self,
        item_id: &str,
        success: bool,
        now: NaiveDate,
    ) -> MasteryResult<OutcomeReport> {
        let mut item = self
            .repo
            .get_item(item_id)?
            .ok_or_else(|| MasteryError::not_found("item", item_id))?;

        let linked = resolve_associations(&self.repo, &mut item)?.into_items();

        let previous_score = item.score;
        item.score = self
            .scorer
            .update_score(item.score, item.last_practiced, success, now);
        item.last_practiced = now;
        self.repo.put_item(&item)?;
        info!(
            "event=outcome_reported module=mastery status=ok item_id={} success={} previous_score={:.2} score={:.2} linked={}",
            item.id,
            success,
            previous_score,
            item.score,
            linked.len()
        );

        let mut touched_units = vec![item.unit_id.clone()];
        let mut associated = Vec::with_capacity(linked.len());
        for mut linked_item in linked {
            linked_item.score = self.scorer.update_score(
                linked_item.score,
                linked_item.last_practiced,
                success,
                now,
            );
            linked_item.last_practiced = now;
            self.repo.put_item(&linked_item)?;
            if !touched_units.contains(&linked_item.unit_id) {
                touched_units.push(linked_item.unit_id.clone());
            }
            associated.push(linked_item);
        }

        let mut units = Vec::with_capacity(touched_units.len());
        let mut languages: Vec<Language> = Vec::new();
        for unit_id in &touched_units {
            let (unit, language) =
                recompute_unit_chain(&self.repo, unit_id, now, self.config.position_threshold)?;
            languages.retain(|known| known.id != language.id);
            languages.push(language);
            units.push(unit);
        }

        Ok(OutcomeReport {
            item,
            associated,
            units,
            languages,
        })
    }

    /// Loads a language, healing a stale or missing `current_unit`.
    pub fn get_language_snapshot(&self, language_id: &str) -> MasteryResult<Language> {
        let language = self
            .repo
            .get_language(language_id)?
            .ok_or_else(|| MasteryError::not_found("language", language_id))?;
        heal_current_unit(&self.repo, language, self.config.position_threshold)
    }

    /// Lists all languages in creation order, each healed like a snapshot.
    pub fn list_languages(&self) -> MasteryResult<Vec<Language>> {
        self.repo
            .list_languages()?
            .into_iter()
            .map(|language| {
                heal_current_unit(&self.repo, language, self.config.position_threshold)
            })
            .collect()
    }

    /// Resolves an exercise's live associations, pruning stale ids in storage.
    pub fn resolve_associations(&self, exercise_id: &str) -> MasteryResult<ResolvedAssociations> {
        let mut exercise = self.require_item(exercise_id)?;
        if exercise.kind() != ItemKind::Exercise {
            return Err(MasteryError::InvalidInput(format!(
                "`{exercise_id}` is a {} item, not an exercise",
                exercise.kind()
            )));
        }
        resolve_associations(&self.repo, &mut exercise)
    }

    pub fn recompute_unit(&self, unit_id: &str) -> MasteryResult<Unit> {
        recompute_unit(
            &self.repo,
            unit_id,
            self.clock.today(),
            self.config.position_threshold,
        )
    }

    pub fn recompute_language(&self, language_id: &str) -> MasteryResult<Language> {
        recompute_language(
            &self.repo,
            language_id,
            self.clock.today(),
            self.config.position_threshold,
        )
    }

    /// Current unit under the configured threshold.
    pub fn find_current_unit(&self, language_id: &str) -> MasteryResult<Option<String>> {
        find_current_unit(&self.repo, language_id, self.config.position_threshold)
    }

    pub fn find_current_unit_with_threshold(
        &self,
        language_id: &str,
        threshold: f64,
    ) -> MasteryResult<Option<String>> {
        find_current_unit(&self.repo, language_id, threshold)
    }

    pub fn allocate_id(&self, kind: EntityKind, scope: Option<&str>) -> MasteryResult<String> {
        allocate_id(&self.repo, kind, scope)
    }

    pub fn create_language(&self, details: &LanguageDetails) -> MasteryResult<Language> {
        let mut language = Language::new(String::new(), String::new(), self.clock.today());
        details.apply_to(&mut language);

        let id = self.insert_with_allocation(EntityKind::Language, None, |id| {
            language.id = id.to_string();
            self.repo.insert_language(&language)
        })?;
        info!("event=language_created module=mastery status=ok language_id={id}");
        Ok(language)
    }

    pub fn update_language_details(
        &self,
        language_id: &str,
        details: &LanguageDetails,
    ) -> MasteryResult<Language> {
        let mut language = self.get_language_snapshot(language_id)?;
        details.apply_to(&mut language);
        self.repo.put_language(&language)?;
        Ok(language)
    }

    /// Deletes a language with all of its units and items.
    pub fn delete_language(&self, language_id: &str) -> MasteryResult<bool> {
        let deleted = self.repo.delete_language(language_id)?;
        if deleted {
            info!("event=language_deleted module=mastery status=ok language_id={language_id}");
        }
        Ok(deleted)
    }

    /// Creates an empty unit; the language is recomputed to include it.
    pub fn create_unit(&self, language_id: &str, details: &UnitDetails) -> MasteryResult<Unit> {
        if self.repo.get_language(language_id)?.is_none() {
            return Err(MasteryError::not_found("language", language_id));
        }

        let mut unit = Unit::new(String::new(), language_id, String::new(), self.clock.today());
        details.apply_to(&mut unit);

        self.repo.atomically(|| -> MasteryResult<()> {
            let id = self.insert_with_allocation(EntityKind::Unit, Some(language_id), |id| {
                unit.id = id.to_string();
                self.repo.insert_unit(&unit)
            })?;
            info!(
                "event=unit_created module=mastery status=ok unit_id={id} language_id={language_id}"
            );
            self.recompute_language(language_id)?;
            Ok(())
        })?;
        Ok(unit)
    }

    pub fn get_unit(&self, unit_id: &str) -> MasteryResult<Unit> {
        self.repo
            .get_unit(unit_id)?
            .ok_or_else(|| MasteryError::not_found("unit", unit_id))
    }

    pub fn list_units(&self, language_id: &str) -> MasteryResult<Vec<Unit>> {
        if self.repo.get_language(language_id)?.is_none() {
            return Err(MasteryError::not_found("language", language_id));
        }
        Ok(self.repo.list_units(language_id)?)
    }

    /// Units of a language tagged with `level` (`A1`, `B2`, ...), in creation
    /// order.
    pub fn list_units_at_level(&self, language_id: &str, level: &str) -> MasteryResult<Vec<Unit>> {
        let mut units = self.list_units(language_id)?;
        units.retain(|unit| unit.level == level);
        Ok(units)
    }

    pub fn update_unit_details(&self, unit_id: &str, details: &UnitDetails) -> MasteryResult<Unit> {
        let mut unit = self.get_unit(unit_id)?;
        details.apply_to(&mut unit);
        self.repo.put_unit(&unit)?;
        Ok(unit)
    }

    /// Deletes a unit and its items, then recomputes the surviving language.
    pub fn delete_unit(&self, unit_id: &str) -> MasteryResult<bool> {
        let Some(unit) = self.repo.get_unit(unit_id)? else {
            return Ok(false);
        };
        self.repo.atomically(|| {
            let deleted = self.repo.delete_unit(unit_id)?;
            if deleted {
                info!("event=unit_deleted module=mastery status=ok unit_id={unit_id}");
                self.recompute_language(&unit.language_id)?;
            }
            Ok(deleted)
        })
    }

    /// Creates an unpracticed item. Exercise associations are validated
    /// against storage first, dropping ids that do not resolve.
    pub fn create_item(&self, unit_id: &str, body: ItemBody) -> MasteryResult<Item> {
        if self.repo.get_unit(unit_id)?.is_none() {
            return Err(MasteryError::not_found("unit", unit_id));
        }

        let mut item = Item::new(String::new(), unit_id, body, self.clock.today());
        self.prune_body_associations(&mut item)?;
        let kind = EntityKind::Item(item.kind());

        self.repo.atomically(|| -> MasteryResult<()> {
            let id = self.insert_with_allocation(kind, Some(unit_id), |id| {
                item.id = id.to_string();
                self.repo.insert_item(&item)
            })?;
            info!("event=item_created module=mastery status=ok item_id={id} unit_id={unit_id}");
            self.recompute_unit(unit_id)?;
            Ok(())
        })?;
        Ok(item)
    }

    /// Loads an item; exercises come back with pruned associations.
    pub fn get_item(&self, item_id: &str) -> MasteryResult<Item> {
        let mut item = self.require_item(item_id)?;
        resolve_associations(&self.repo, &mut item)?;
        Ok(item)
    }

    pub fn list_items(&self, unit_id: &str, kind: Option<ItemKind>) -> MasteryResult<Vec<Item>> {
        if self.repo.get_unit(unit_id)?.is_none() {
            return Err(MasteryError::not_found("unit", unit_id));
        }
        let mut items = self.repo.list_items(unit_id, kind)?;
        for item in &mut items {
            resolve_associations(&self.repo, item)?;
        }
        Ok(items)
    }

    /// Items across every unit of a language, grouped unit by unit in
    /// creation order.
    pub fn list_language_items(
        &self,
        language_id: &str,
        kind: Option<ItemKind>,
    ) -> MasteryResult<Vec<Item>> {
        let mut items = Vec::new();
        for unit in self.list_units(language_id)? {
            for mut item in self.repo.list_items(&unit.id, kind)? {
                resolve_associations(&self.repo, &mut item)?;
                items.push(item);
            }
        }
        Ok(items)
    }

    /// Replaces an item's content. The kind cannot change and score state is
    /// kept as stored.
    pub fn update_item_details(&self, item_id: &str, body: ItemBody) -> MasteryResult<Item> {
        let mut item = self.require_item(item_id)?;
        if body.kind() != item.kind() {
            return Err(MasteryError::InvalidInput(format!(
                "cannot change `{item_id}` from {} to {}",
                item.kind(),
                body.kind()
            )));
        }
        item.body = body;
        self.prune_body_associations(&mut item)?;
        self.repo.put_item(&item)?;
        Ok(item)
    }

    /// Deletes an item, then recomputes its unit and language.
    ///
    /// Exercises referencing the item keep a dangling id until their next
    /// resolution prunes it.
    pub fn delete_item(&self, item_id: &str) -> MasteryResult<bool> {
        let Some(item) = self.repo.get_item(item_id)? else {
            return Ok(false);
        };
        self.repo.atomically(|| {
            let deleted = self.repo.delete_item(item_id)?;
            if deleted {
                info!("event=item_deleted module=mastery status=ok item_id={item_id}");
                self.recompute_unit(&item.unit_id)?;
            }
            Ok(deleted)
        })
    }

    fn require_item(&self, item_id: &str) -> MasteryResult<Item> {
        self.repo
            .get_item(item_id)?
            .ok_or_else(|| MasteryError::not_found("item", item_id))
    }

    fn prune_body_associations(&self, item: &mut Item) -> MasteryResult<()> {
        if let Some(associations) = item.associations() {
            let (kept, _) = prune_associations(&self.repo, associations)?;
            if let Some(stored) = item.associations_mut() {
                *stored = kept;
            }
        }
        Ok(())
    }

    /// Inserts a new record under an allocated id, retrying on collisions.
    ///
    /// The first id comes from the scoped scan. After a `DuplicateKey` the
    /// next candidate is taken past both the collided suffix and every id of
    /// that kind in any scope, so scoped labels never overwrite each other.
    fn insert_with_allocation<F>(
        &self,
        kind: EntityKind,
        scope: Option<&str>,
        mut insert: F,
    ) -> MasteryResult<String>
    where
        F: FnMut(&str) -> RepoResult<()>,
    {
        let mut candidate = allocate_id(&self.repo, kind, scope)?;
        for attempt in 1..=self.config.allocation_attempts {
            match insert(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(RepoError::DuplicateKey { .. }) if attempt < self.config.allocation_attempts => {
                    warn!(
                        "event=id_collision module=allocator status=retry kind={kind} id={candidate} attempt={attempt}"
                    );
                    let floor = parse_sequence(&candidate).unwrap_or(0);
                    let all_ids = self.repo.list_ids(kind, None)?;
                    candidate = next_id_after(kind, all_ids.iter().map(String::as_str), floor)
                        .ok_or(MasteryError::IdSpaceExhausted { kind })?;
                }
                Err(RepoError::DuplicateKey { .. }) => break,
                Err(err) => return Err(err.into()),
            }
        }

        warn!(
            "event=id_collision module=allocator status=error kind={kind} id={candidate} attempts={}",
            self.config.allocation_attempts
        );
        Err(MasteryError::AllocationCollision {
            kind,
            attempts: self.config.allocation_attempts,
            last_id: candidate,
        })
    }
}
